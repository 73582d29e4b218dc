mod mappers;
mod matching_ops;
mod mission_ops;
mod payment_ops;
mod schema;
mod timeline_ops;
mod tracking_ops;
mod user_ops;

#[cfg(test)]
mod payment_behaviors;
#[cfg(test)]
pub(crate) mod test_support;

pub use matching_ops::PickupConfirmation;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::error::Result;

/// Shared transactional persistence handle for the marketplace core. Every
/// multi-row mutation opens an explicit transaction on this pool; no
/// operation falls back to an ambient connection.
#[derive(Clone)]
pub struct FreightDb {
    pool: PgPool,
    currency: String,
    session_ttl_hours: i64,
    storage_prefix: String,
}

impl FreightDb {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::new_with_config(database_url, &Config::default()).await
    }

    pub async fn new_with_config(database_url: &str, config: &Config) -> Result<Self> {
        let max_connections = resolve_pool_max_connections();

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL freight database");
        Ok(Self::new_with_pool_and_config(pool, config))
    }

    /// Create a new `FreightDb` with an existing pool (for testing).
    pub fn new_with_pool(pool: PgPool) -> Self {
        Self::new_with_pool_and_config(pool, &Config::default())
    }

    pub fn new_with_pool_and_config(pool: PgPool, config: &Config) -> Self {
        Self {
            pool,
            currency: config.currency.clone(),
            session_ttl_hours: config.session_ttl_hours,
            storage_prefix: config.storage_prefix.clone(),
        }
    }

    /// Direct pool access, used by test harnesses for seeding and resets.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn currency(&self) -> &str {
        &self.currency
    }

    pub(crate) fn session_ttl_hours(&self) -> i64 {
        self.session_ttl_hours
    }

    pub(crate) fn storage_prefix(&self) -> &str {
        &self.storage_prefix
    }
}

fn resolve_pool_max_connections() -> u32 {
    resolve_pool_max_connections_from(|key| std::env::var(key).ok())
}

fn resolve_pool_max_connections_from<F>(env_lookup: F) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    env_lookup("FREIGHT_DB_MAX_CONNECTIONS")
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(20)
}
