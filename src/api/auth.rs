//! Authentication endpoints.

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{decode_data, ensure_success, parse_json_body, ApiClient};
use crate::errors::{ClientError, ClientResult};
use crate::models::{LoginRequest, LoginResponse, User};

impl ApiClient {
    /// POST /auth/login - Exchange credentials for tokens.
    ///
    /// A 401 here means bad credentials, not an expired session, so it is
    /// reported as [`ClientError::Authentication`] and the session is untouched.
    pub async fn authenticate(&self, phone: &str, password: &str) -> ClientResult<LoginResponse> {
        let body = serde_json::to_value(LoginRequest {
            phone: phone.to_string(),
            password: password.to_string(),
        })?;

        let raw = self
            .send_raw(
                Method::POST,
                "/auth/login",
                Some(&body),
                &CancellationToken::new(),
            )
            .await?;

        match raw.status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::LOCKED => {
                Err(ClientError::Authentication(rejection_message(
                    raw.status,
                    &raw.body,
                )))
            }
            status => {
                ensure_success(status)?;
                decode_data(parse_json_body(&raw.body)?)
            }
        }
    }

    /// GET /auth/me - The signed-in user.
    pub async fn current_user(&self) -> ClientResult<Option<User>> {
        self.get_data("/auth/me", &CancellationToken::new()).await
    }

    /// POST /auth/logout - Invalidate the token server-side.
    pub async fn server_logout(&self) -> ClientResult<()> {
        self.request(Method::POST, "/auth/logout", None).await?;
        Ok(())
    }
}

/// Server message from a `{ error, message }` body, or the status reason.
fn rejection_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Login rejected").to_string())
}
