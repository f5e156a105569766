//! Client for the journaling backend.
//!
//! The backend exposes two kinds of HTTPS endpoints under one project URL:
//! edge functions (`/functions/v1/<name>`) that transcribe and analyze entries,
//! and auth endpoints (`/auth/v1/...`) that manage the email OTP session. Every
//! request carries the project's anon key in the `apikey` header.

pub mod auth;
pub mod edge;
pub mod types;

pub use auth::AuthService;
pub use edge::EdgeFunctionClient;
pub use types::{
    AudioUpload, FollowUpResponse, InsightResponse, ProcessEntryResponse, TranscriptionResponse,
};

use thiserror::Error;

/// Failures talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Non-success HTTP status from an edge function.
    #[error("Server error ({status}): {body}")]
    Server { status: u16, body: String },
    /// The server refused the request with a human-readable reason.
    #[error("{0}")]
    Rejected(String),
    #[error("Invalid server response: {0}")]
    InvalidResponse(String),
    #[error("Not signed in. Run 'orb login' first.")]
    NotSignedIn,
    #[error("{0}")]
    Network(String),
    #[error("Failed to read audio: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_connect() {
            "Failed to connect to the orb backend. Check your internet connection.".to_string()
        } else if e.is_timeout() {
            "Request to the orb backend timed out.".to_string()
        } else if e.is_decode() {
            return BackendError::InvalidResponse(e.to_string());
        } else {
            format!("Network error: {e}")
        };
        BackendError::Network(message)
    }
}

/// The three edge functions a recorded entry passes through.
#[async_trait::async_trait]
pub trait JournalBackend {
    /// Uploads recorded audio to `transcribe-audio`.
    async fn transcribe_audio(&self, audio: AudioUpload)
        -> Result<TranscriptionResponse, BackendError>;

    /// Derives a title and sentiment via `process-entry`.
    async fn process_entry(&self, transcription: &str)
        -> Result<ProcessEntryResponse, BackendError>;

    /// Asks `generate-followup` for a reflective question.
    async fn generate_follow_up(
        &self,
        transcription: &str,
        title: &str,
        sentiment: &str,
    ) -> Result<FollowUpResponse, BackendError>;
}

/// Joins a base URL and an absolute endpoint path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_slashes() {
        assert_eq!(
            endpoint("https://x.supabase.co/", "/functions/v1/send-otp"),
            "https://x.supabase.co/functions/v1/send-otp"
        );
        assert_eq!(
            endpoint("http://127.0.0.1:9", "auth/v1/verify"),
            "http://127.0.0.1:9/auth/v1/verify"
        );
    }

    #[test]
    fn test_server_error_display() {
        let err = BackendError::Server {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "Server error (500): boom");
        assert_eq!(BackendError::Rejected("Invalid code".into()).to_string(), "Invalid code");
    }
}
