use deadpool_redis::redis::RedisError;
use thiserror::Error;

/// Result type for stream log operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for stream log operations
#[derive(Debug, Error)]
pub enum Error {
    /// The consumer group already exists on the stream
    #[error("Consumer group already exists: {0}")]
    GroupExists(String),

    /// Validation error - invalid input data
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Connection error - server unreachable or authentication failure
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The server rejected a command
    #[error("Command error ({code}): {message}")]
    CommandError { code: String, message: String },

    /// The server replied with something we could not interpret
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Pool error - connection pool issues
    #[error("Pool error: {0}")]
    PoolError(String),
}

impl Error {
    /// Whether this error means the group was already in place
    pub fn is_group_exists(&self) -> bool {
        matches!(self, Error::GroupExists(_))
    }
}

/// Convert Redis errors to stream log errors
impl From<RedisError> for Error {
    fn from(err: RedisError) -> Self {
        if let Some(code) = err.code() {
            let message = err.detail().unwrap_or_default().to_string();

            // XGROUP CREATE on an existing group
            if code == "BUSYGROUP" {
                return Error::GroupExists(message);
            }

            return Error::CommandError {
                code: code.to_string(),
                message,
            };
        }

        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            return Error::ConnectionError(err.to_string());
        }

        Error::ProtocolError(err.to_string())
    }
}

/// Convert deadpool errors to stream log errors
impl From<deadpool_redis::PoolError> for Error {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Error::PoolError(err.to_string())
    }
}

/// Convert deadpool build errors to stream log errors
impl From<deadpool_redis::CreatePoolError> for Error {
    fn from(err: deadpool_redis::CreatePoolError) -> Self {
        Error::ConnectionError(err.to_string())
    }
}
