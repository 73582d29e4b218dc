#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use super::mappers::UserRow;
use super::FreightDb;
use crate::error::{FreightError, Result};
use crate::types::{Role, User, UserId};

impl FreightDb {
    /// # Errors
    /// Returns [`FreightError::DatabaseError`] when persistence fails.
    pub async fn create_user(&self, name: &str, role: Role) -> Result<User> {
        let id = UserId::generate();
        sqlx::query("INSERT INTO users (id, name, role, active) VALUES ($1, $2, $3, TRUE)")
            .bind(id.value())
            .bind(name)
            .bind(role.as_str())
            .execute(self.pool())
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to create user: {e}")))?;

        Ok(User {
            id,
            name: name.to_string(),
            role,
            active: true,
        })
    }

    /// # Errors
    /// Returns [`FreightError::NotFound`] when the user does not exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, role, active FROM users WHERE id = $1",
        )
        .bind(user_id.value())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| FreightError::DatabaseError(format!("Failed to load user: {e}")))?;

        row.map_or_else(
            || Err(FreightError::NotFound(format!("User {user_id} not found"))),
            UserRow::into_user,
        )
    }

    /// # Errors
    /// Returns [`FreightError::DatabaseError`] when persistence fails.
    pub async fn set_user_active(&self, user_id: UserId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE users SET active = $2 WHERE id = $1")
            .bind(user_id.value())
            .bind(active)
            .execute(self.pool())
            .await
            .map_err(|e| FreightError::DatabaseError(format!("Failed to update user: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(FreightError::NotFound(format!("User {user_id} not found")));
        }
        Ok(())
    }
}
