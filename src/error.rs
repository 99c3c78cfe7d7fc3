/// Unified error types for the Kejmiltube client
use thiserror::Error;

/// Main error type for the client core
#[derive(Error, Debug)]
pub enum TubeError {
    /// Local input validation failed; one message per violated rule
    #[error("Validation error: {}", .0.join(", "))]
    Validation(Vec<String>),

    /// Credentials rejected or no active session
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Unique constraint violated (e.g., username already taken)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The hosted backend answered with an error status
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Transport-level failure talking to a collaborator
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed payload
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TubeError {
    /// Whether the failure came from local input rather than a collaborator
    pub fn is_validation(&self) -> bool {
        matches!(self, TubeError::Validation(_))
    }

    /// Whether the failure is a uniqueness conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, TubeError::Conflict(_))
    }

    /// Short message suitable for a user-facing notice
    pub fn user_message(&self) -> String {
        match self {
            TubeError::Validation(errors) => errors.join(", "),
            TubeError::Authentication(_) => "Invalid login credentials".to_string(),
            TubeError::Conflict(msg) => msg.clone(),
            TubeError::NotFound(msg) => msg.clone(),
            TubeError::Network(_) => "Could not reach the server, try again".to_string(),
            // Don't leak details
            _ => "Something went wrong, try again".to_string(),
        }
    }
}

/// Result type alias for client operations
pub type TubeResult<T> = Result<T, TubeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_joins_messages() {
        let err = TubeError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation error: a, b");
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "a, b");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = TubeError::Remote {
            status: 500,
            message: "relation \"videos\" does not exist".to_string(),
        };
        assert!(!err.user_message().contains("relation"));
    }

    #[test]
    fn test_conflict_kind() {
        let err = TubeError::Conflict("Username already taken".to_string());
        assert!(err.is_conflict());
        assert_eq!(err.user_message(), "Username already taken");
    }
}
