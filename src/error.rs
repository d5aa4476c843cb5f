//! Error types for the Loginguard service.

use thiserror::Error;

/// Main error type for Loginguard operations.
///
/// The rate limiter itself never fails; these cover the surface around it.
#[derive(Error, Debug)]
pub enum LoginGuardError {
    /// Configuration values that fail validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration sources that cannot be read or deserialized
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// A request that does not name who is logging in
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    /// gRPC server errors
    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::transport::Error),
}

impl From<LoginGuardError> for tonic::Status {
    fn from(err: LoginGuardError) -> Self {
        match err {
            LoginGuardError::InvalidSubject(msg) => tonic::Status::invalid_argument(msg),
            other => tonic::Status::internal(other.to_string()),
        }
    }
}

/// Result type alias for Loginguard operations.
pub type Result<T> = std::result::Result<T, LoginGuardError>;
