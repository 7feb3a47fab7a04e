//! Error types for cinema-collab.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors. This is the storage failure surfaced to users as
/// a generic "try again" message.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Catalog loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

/// Errors raised while handling one conversation step.
///
/// None of these are fatal: the engine turns each into a user-facing reply.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// Input does not satisfy the active step's constraint.
    #[error("Input rejected by the current step")]
    Validation,

    /// The profile being operated on no longer exists.
    #[error("Profile {user_id} not found")]
    NotFound { user_id: i64 },

    #[error("Storage failure: {0}")]
    Storage(#[from] DatabaseError),
}
