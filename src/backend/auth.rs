//! Email one-time-code sign in.
//!
//! Sign in is a two step exchange: `send-otp` emails a six digit code, then
//! `verify-otp` checks the code and returns a token hash that the auth service
//! trades for a session via `/auth/v1/verify`.

use serde::Deserialize;
use serde_json::json;

use super::{endpoint, BackendError};
use crate::config::{AuthSession, SessionUser};

/// Number of digits in an emailed code.
pub const OTP_LENGTH: usize = 6;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyOtpResponse {
    #[allow(dead_code)]
    success: Option<bool>,
    message: Option<String>,
    token: Option<String>,
}

/// Session payload as returned by the auth endpoints.
#[derive(Debug, Deserialize)]
struct SessionResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: Option<String>,
}

impl SessionResponse {
    fn into_session(self, now: i64) -> AuthSession {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(3600));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: SessionUser {
                id: self.user.id,
                email: self.user.email,
            },
        }
    }
}

/// Keeps only digits and caps the code at [`OTP_LENGTH`].
pub fn sanitize_code(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(OTP_LENGTH)
        .collect()
}

/// Whether `code` is ready to be verified.
pub fn is_complete_code(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}

/// Auth endpoints of the backend project.
#[derive(Clone)]
pub struct AuthService {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl AuthService {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    /// Emails a sign-in code to `email`.
    ///
    /// # Errors
    /// - `Rejected` if the address is empty or the server refuses it
    pub async fn send_otp(&self, email: &str) -> Result<(), BackendError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(BackendError::Rejected("Email is required".to_string()));
        }

        let response = self
            .post("functions/v1/send-otp")
            .json(&json!({ "email": email }))
            .send()
            .await?;

        if response.status().as_u16() != 200 {
            return Err(rejection(response, "Failed to send code").await);
        }
        tracing::info!("Sign-in code sent");
        Ok(())
    }

    /// Verifies an emailed code and exchanges it for a session.
    ///
    /// # Errors
    /// - `Rejected` for an incomplete or wrong code, or a missing token
    /// - `InvalidResponse` if the session payload cannot be read
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthSession, BackendError> {
        if !is_complete_code(code) {
            return Err(BackendError::Rejected(format!(
                "Enter the {OTP_LENGTH}-digit code from your email"
            )));
        }

        let response = self
            .post("functions/v1/verify-otp")
            .json(&json!({ "email": email.trim(), "code": code }))
            .send()
            .await?;

        if response.status().as_u16() != 200 {
            return Err(rejection(response, "Invalid code").await);
        }

        let verified: VerifyOtpResponse = response.json().await?;
        if let Some(message) = &verified.message {
            tracing::debug!("verify-otp: {}", message);
        }
        let token_hash = match verified.token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(BackendError::Rejected("No token received".to_string())),
        };

        let response = self
            .post("auth/v1/verify")
            .json(&json!({ "type": "magiclink", "token_hash": token_hash }))
            .send()
            .await?;
        let session = self.read_session(response).await?;
        tracing::info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    /// Trades the refresh token for a new session.
    pub async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, BackendError> {
        let response = self
            .post("auth/v1/token?grant_type=refresh_token")
            .json(&json!({ "refresh_token": session.refresh_token }))
            .send()
            .await?;
        let refreshed = self.read_session(response).await?;
        tracing::debug!("Session refreshed");
        Ok(refreshed)
    }

    /// Revokes the session on the server.
    pub async fn sign_out(&self, session: &AuthSession) -> Result<(), BackendError> {
        let response = self
            .post("auth/v1/logout")
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Server {
                status: status.as_u16(),
                body,
            });
        }
        tracing::info!("Signed out");
        Ok(())
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(endpoint(&self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn read_session(&self, response: reqwest::Response) -> Result<AuthSession, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let payload: SessionResponse = response.json().await?;
        Ok(payload.into_session(chrono::Utc::now().timestamp()))
    }
}

/// Builds a `Rejected` error from an `{ "error": ... }` body, or `fallback`.
async fn rejection(response: reqwest::Response, fallback: &str) -> BackendError {
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_else(|| fallback.to_string());
    BackendError::Rejected(message)
}
