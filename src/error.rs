use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Config file {path} is unreadable and was left untouched: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("You must specify a {0}")]
    MissingValue(&'static str),

    #[error("{0}")]
    AuthorizationDenied(String),

    #[error("Login timed out after {0} minutes")]
    LoginTimedOut(i64),

    #[error("Login interrupted before authorization completed")]
    Interrupted,

    #[error("Exiting")]
    Aborted,

    /// The server issued `token` but it could not be written to the config
    #[error("New token could not be saved: {reason}")]
    UnsavedToken { token: String, reason: String },

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// Denial and user aborts get their own codes so scripts can tell them
    /// apart from transport failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::AuthorizationDenied(_) => 2,
            CliError::Aborted => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let denied = CliError::AuthorizationDenied("nope".to_string()).exit_code();
        let aborted = CliError::Aborted.exit_code();
        let failed = CliError::LoginTimedOut(5).exit_code();

        assert_eq!(denied, 2);
        assert_eq!(aborted, 3);
        assert_eq!(failed, 1);
    }

    #[test]
    fn test_api_message_is_surfaced_verbatim() {
        let err = CliError::from(ApiError::Status {
            status: 401,
            message: "Invalid auth token".to_string(),
        });
        assert_eq!(err.to_string(), "Invalid auth token");
    }

    #[test]
    fn test_timeout_message_names_minutes() {
        assert_eq!(
            CliError::LoginTimedOut(5).to_string(),
            "Login timed out after 5 minutes"
        );
    }
}
