use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::{ApiError, AuthApi, AuthCode, Endpoint, HostInfo, RolledToken, TokenExchange};

const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Blocking HTTP implementation of [`AuthApi`]
pub struct HttpAuthApi {
    user_agent: String,
    timeout: Duration,
}

impl HttpAuthApi {
    pub fn new() -> Self {
        Self {
            user_agent: format!("keyscope/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECONDS),
        }
    }

    fn client(&self, endpoint: &Endpoint) -> Result<Client, ApiError> {
        Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!endpoint.verify_tls)
            .build()
            .map_err(|e| transport_error(endpoint, e))
    }

    fn post(&self, endpoint: &Endpoint, path: &str, body: &Value) -> Result<Response, ApiError> {
        let url = format!("{}{}", endpoint.host.trim_end_matches('/'), path);
        tracing::debug!("POST {}", url);

        let response = self
            .client(endpoint)?
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| transport_error(endpoint, e))?;

        tracing::debug!("{} responded with {}", url, response.status());
        Ok(response)
    }
}

impl Default for HttpAuthApi {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthApi for HttpAuthApi {
    fn generate_auth_code(
        &self,
        endpoint: &Endpoint,
        host: &HostInfo,
    ) -> Result<AuthCode, ApiError> {
        let body = json!({
            "hostname": host.hostname,
            "version": host.version,
            "os": host.os,
            "arch": host.arch,
        });
        let response = self.post(endpoint, "/v3/auth/cli/generate", &body)?;
        decode(endpoint, response, "auth code")
    }

    fn get_auth_token(&self, endpoint: &Endpoint, code: &str) -> Result<TokenExchange, ApiError> {
        let response = self.post(endpoint, "/v3/auth/cli/authorize", &json!({ "code": code }))?;

        if response.status() == StatusCode::CONFLICT {
            return Ok(TokenExchange::Pending);
        }

        let body: Value = decode(endpoint, response, "token exchange")?;
        TokenExchange::from_body(body)
    }

    fn roll_auth_token(&self, endpoint: &Endpoint, token: &str) -> Result<RolledToken, ApiError> {
        let response = self.post(endpoint, "/v3/auth/cli/roll", &json!({ "token": token }))?;
        decode(endpoint, response, "rolled token")
    }

    fn revoke_auth_token(&self, endpoint: &Endpoint, token: &str) -> Result<(), ApiError> {
        let response = self.post(endpoint, "/v3/auth/cli/revoke", &json!({ "token": token }))?;
        ensure_success(endpoint, response).map(|_| ())
    }
}

fn ensure_success(endpoint: &Endpoint, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response
        .text()
        .map_err(|e| transport_error(endpoint, e))?;
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(status.as_u16(), &text),
    })
}

fn decode<T: DeserializeOwned>(
    endpoint: &Endpoint,
    response: Response,
    what: &str,
) -> Result<T, ApiError> {
    let text = ensure_success(endpoint, response)?
        .text()
        .map_err(|e| transport_error(endpoint, e))?;

    serde_json::from_str(&text)
        .map_err(|e| ApiError::UnexpectedResponse(format!("{} response: {}", what, e)))
}

/// Extract the server's messages from an error body, falling back to the status
fn error_message(status: u16, body: &str) -> String {
    let messages = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("messages").cloned())
        .and_then(|messages| match messages {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        })
        .unwrap_or_default();

    if messages.is_empty() {
        format!("Request failed with HTTP status {}", status)
    } else {
        messages.join("\n")
    }
}

fn transport_error(endpoint: &Endpoint, err: reqwest::Error) -> ApiError {
    ApiError::Transport {
        host: endpoint.host.clone(),
        reason: err.to_string(),
    }
}
