//! Request and response bodies of the edge functions.

use serde::{Deserialize, Serialize};

/// Audio payload for `transcribe-audio`.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TranscriptionResponse {
    pub transcription: String,
}

/// Title and sentiment derived from a transcription.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProcessEntryResponse {
    pub title: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: String,
    #[serde(default)]
    pub emotions: Option<Vec<Emotion>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Emotion {
    pub emotion: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpResponse {
    pub follow_up_question: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InsightResponse {
    pub insight: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProcessEntryRequest<'a> {
    pub transcription: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct FollowUpRequest<'a> {
    pub transcription: &'a str,
    pub title: &'a str,
    pub sentiment: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_entry_without_emotions() {
        let parsed: ProcessEntryResponse = serde_json::from_str(
            r#"{"title":"Morning walk","sentiment":{"score":0.7,"label":"positive"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.title, "Morning walk");
        assert_eq!(parsed.sentiment.label, "positive");
        assert!(parsed.sentiment.emotions.is_none());
    }

    #[test]
    fn test_process_entry_with_emotions() {
        let parsed: ProcessEntryResponse = serde_json::from_str(
            r#"{"title":"t","sentiment":{"score":-0.2,"label":"negative",
                "emotions":[{"emotion":"tired","confidence":0.8}]}}"#,
        )
        .unwrap();
        let emotions = parsed.sentiment.emotions.unwrap();
        assert_eq!(emotions[0].emotion, "tired");
        assert_eq!(emotions[0].confidence, 0.8);
    }

    #[test]
    fn test_follow_up_uses_camel_case() {
        let parsed: FollowUpResponse =
            serde_json::from_str(r#"{"followUpQuestion":"What made it feel that way?"}"#).unwrap();
        assert_eq!(parsed.follow_up_question, "What made it feel that way?");
    }
}
