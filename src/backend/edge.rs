//! Edge function calls made on behalf of the signed-in user.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{FollowUpRequest, ProcessEntryRequest};
use super::{
    endpoint, AudioUpload, BackendError, FollowUpResponse, InsightResponse, JournalBackend,
    ProcessEntryResponse, TranscriptionResponse,
};

/// Authenticated client for `/functions/v1/*`.
#[derive(Clone)]
pub struct EdgeFunctionClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: String,
}

impl EdgeFunctionClient {
    pub fn new(base_url: &str, anon_key: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
            anon_key: anon_key.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn function_url(&self, name: &str) -> String {
        endpoint(&self.base_url, &format!("functions/v1/{name}"))
    }

    /// Calls a JSON edge function and decodes its response.
    ///
    /// # Errors
    /// - `Network` if the request cannot be sent
    /// - `Server` for any non-success status
    /// - `InvalidResponse` if the body does not match `R`
    pub async fn invoke<B, R>(&self, name: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.function_url(name);
        tracing::debug!("Invoking edge function: POST {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("apikey", &self.anon_key)
            .json(body)
            .send()
            .await?;

        decode(name, response).await
    }

    /// Asks `generate-insight` for a reflection across recent entries.
    pub async fn generate_insight(&self) -> Result<InsightResponse, BackendError> {
        self.invoke("generate-insight", &serde_json::json!({})).await
    }
}

#[async_trait::async_trait]
impl JournalBackend for EdgeFunctionClient {
    async fn transcribe_audio(
        &self,
        audio: AudioUpload,
    ) -> Result<TranscriptionResponse, BackendError> {
        let url = self.function_url("transcribe-audio");
        let size = audio.bytes.len();

        let part = reqwest::multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name.clone())
            .mime_str(audio.mime_type)
            .map_err(|e| BackendError::InvalidResponse(format!("Bad audio MIME type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        tracing::debug!(
            "Uploading audio: POST {} ({} bytes, {}, {})",
            url,
            size,
            audio.file_name,
            audio.mime_type
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("apikey", &self.anon_key)
            .multipart(form)
            .send()
            .await?;

        decode("transcribe-audio", response).await
    }

    async fn process_entry(
        &self,
        transcription: &str,
    ) -> Result<ProcessEntryResponse, BackendError> {
        self.invoke("process-entry", &ProcessEntryRequest { transcription })
            .await
    }

    async fn generate_follow_up(
        &self,
        transcription: &str,
        title: &str,
        sentiment: &str,
    ) -> Result<FollowUpResponse, BackendError> {
        let request = FollowUpRequest {
            transcription,
            title,
            sentiment,
        };
        self.invoke("generate-followup", &request).await
    }
}

async fn decode<R: DeserializeOwned>(
    name: &str,
    response: reqwest::Response,
) -> Result<R, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "no body".to_string());
        tracing::warn!("Edge function {} failed with {}: {}", name, status, body);
        return Err(BackendError::Server {
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::warn!("Unexpected response from {}: {}", name, text);
        BackendError::InvalidResponse(format!("{name}: {e}"))
    })
}
