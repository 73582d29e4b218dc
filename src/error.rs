#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use thiserror::Error;

/// Error code constants for type-safe error handling
pub mod code {
    pub const CLI_ERROR: &str = "CLI_ERROR";
    pub const NOTFOUND: &str = "NOTFOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const CONFLICT: &str = "CONFLICT";
    pub const DECIDED: &str = "DECIDED";
    pub const INVALID: &str = "INVALID";
    pub const DEPENDENCY: &str = "DEPENDENCY";
    pub const INTERNAL: &str = "INTERNAL";
}

#[derive(Error, Debug)]
pub enum FreightError {
    /// Mission, bid, payment or user absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Actor is not authorized for the target aggregate.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Operation attempted while the mission is outside its legal status set.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Status update that does not match a declared legal edge.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The carrier's bid for this mission was already accepted or rejected.
    #[error("Already decided: {0}")]
    AlreadyDecided(String),

    /// Malformed input: price below floor, missing upload, bad enum value.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// External collaborator failure (document render, storage, provider).
    #[error("Collaborator error: {0}")]
    CollaboratorError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FreightError {
    /// Returns the protocol error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            FreightError::NotFound(_) => code::NOTFOUND,
            FreightError::Forbidden(_) => code::UNAUTHORIZED,
            FreightError::InvalidState(_) | FreightError::InvalidTransition(_) => code::CONFLICT,
            FreightError::AlreadyDecided(_) => code::DECIDED,
            FreightError::ValidationFailed(_) => code::INVALID,
            FreightError::CollaboratorError(_) => code::DEPENDENCY,
            FreightError::DatabaseError(_) => code::INTERNAL,
            FreightError::SqlxError(_) => code::INTERNAL,
            FreightError::ConfigError(_) => code::INVALID,
            FreightError::IoError(_) => code::DEPENDENCY,
            FreightError::SerializationError(_) => code::INVALID,
            FreightError::Internal(_) => code::INTERNAL,
        }
    }

    /// Returns the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FreightError::NotFound(_) => 2,
            FreightError::Forbidden(_) => 3,
            FreightError::InvalidState(_) => 4,
            FreightError::InvalidTransition(_) => 4,
            FreightError::AlreadyDecided(_) => 5,
            FreightError::ValidationFailed(_) => 6,
            FreightError::CollaboratorError(_) => 7,
            FreightError::DatabaseError(_) => 8,
            FreightError::SqlxError(_) => 8,
            FreightError::ConfigError(_) => 9,
            FreightError::IoError(_) => 7,
            FreightError::SerializationError(_) => 6,
            FreightError::Internal(_) => 10,
        }
    }

    /// Business-rule violations are recoverable and reported to the caller;
    /// only infrastructure failures propagate as fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FreightError::NotFound(_)
                | FreightError::Forbidden(_)
                | FreightError::InvalidState(_)
                | FreightError::InvalidTransition(_)
                | FreightError::AlreadyDecided(_)
                | FreightError::ValidationFailed(_)
        )
    }
}

/// Protocol error codes as documented in the CLI
pub const ERROR_CODES: &[(&str, &str, &str)] = &[
    (
        code::CLI_ERROR,
        "Invalid CLI usage",
        "Run 'freightline --help' for valid options",
    ),
    (
        code::NOTFOUND,
        "Mission, bid, payment or user was not found",
        "List resources and verify the identifier",
    ),
    (
        code::UNAUTHORIZED,
        "Actor does not own the target mission",
        "Use the identity of the mission's shipper or assigned carrier",
    ),
    (
        code::CONFLICT,
        "Operation attempted outside its legal mission status",
        "Inspect the mission timeline for the current status",
    ),
    (
        code::DECIDED,
        "Bid already accepted or rejected",
        "A carrier holds at most one decided bid per mission",
    ),
    (
        code::INVALID,
        "Invalid request payload",
        "Validate required fields and price floors",
    ),
    (
        code::DEPENDENCY,
        "External collaborator failure",
        "Check document/storage/provider connectivity and retry",
    ),
    (
        code::INTERNAL,
        "Unexpected internal failure",
        "Inspect logs and retry command",
    ),
];

/// Get error code details (description and fix) for a given error code
pub fn get_error_info(error_code: &str) -> Option<(&'static str, &'static str)> {
    ERROR_CODES
        .iter()
        .find(|(code, _, _)| *code == error_code)
        .map(|(_, desc, fix)| (*desc, *fix))
}

pub type Result<T> = std::result::Result<T, FreightError>;
