// Remote auth API contract
mod client;

pub use client::HttpAuthApi;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unable to reach {host}: {reason}")]
    Transport { host: String, reason: String },

    /// Non-success HTTP status. The message is the server's when it sent one.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),
}

/// Where an API call goes and how the connection is verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub verify_tls: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, verify_tls: bool) -> Self {
        Self {
            host: host.into(),
            verify_tls,
        }
    }
}

/// Identity of this workstation, sent with auth code requests for auditing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub version: String,
}

impl HostInfo {
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .map(|value| value.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown-host".to_string());

        Self {
            hostname,
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Response of the code generation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthCode {
    pub code: String,
    pub auth_url: String,
}

/// A completed authorization
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthGrant {
    pub token: String,
    pub name: String,
    pub dashboard_url: String,
}

impl std::fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGrant")
            .field("token", &"<redacted>")
            .field("name", &self.name)
            .field("dashboard_url", &self.dashboard_url)
            .finish()
    }
}

/// Result of one poll of the token exchange endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenExchange {
    /// The code exists but the user has not finished authorizing it yet
    Pending,
    Granted(AuthGrant),
    /// The exchange succeeded at the HTTP level but authorization was refused
    Denied(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExchangeBody {
    Denied { error: Value },
    Granted(AuthGrant),
}

impl TokenExchange {
    /// Decode a successful exchange response body
    pub fn from_body(body: Value) -> Result<Self, ApiError> {
        let decoded: ExchangeBody = serde_json::from_value(body).map_err(|e| {
            ApiError::UnexpectedResponse(format!("token exchange response: {}", e))
        })?;

        Ok(match decoded {
            ExchangeBody::Denied { error } => {
                let message = match error {
                    Value::String(message) => message,
                    other => other.to_string(),
                };
                TokenExchange::Denied(message)
            }
            ExchangeBody::Granted(grant) => TokenExchange::Granted(grant),
        })
    }
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RolledToken {
    pub token: String,
}

impl std::fmt::Debug for RolledToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RolledToken(<redacted>)")
    }
}

/// Operations the CLI consumes from the remote API
#[cfg_attr(test, mockall::automock)]
pub trait AuthApi {
    /// Request a one-time auth code and the URL where it is approved
    fn generate_auth_code(&self, endpoint: &Endpoint, host: &HostInfo)
        -> Result<AuthCode, ApiError>;

    /// Exchange an auth code for a token
    fn get_auth_token(&self, endpoint: &Endpoint, code: &str) -> Result<TokenExchange, ApiError>;

    /// Issue a replacement for `token` and revoke the original
    fn roll_auth_token(&self, endpoint: &Endpoint, token: &str) -> Result<RolledToken, ApiError>;

    fn revoke_auth_token(&self, endpoint: &Endpoint, token: &str) -> Result<(), ApiError>;
}
