//! Google Generative AI (Gemini) client.
//!
//! Non-streaming `generateContent` calls: one text model for replies, one
//! TTS model for speech. Auth is via API key in a query parameter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use fastbird_core::config::AssistantConfig;

use crate::{AssistantBackend, ReplyError, VoiceId};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_REPLY_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";

pub struct GeminiClient {
    base_url: String,
    reply_model: String,
    tts_model: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            reply_model: DEFAULT_REPLY_MODEL.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AssistantConfig) -> Self {
        let mut client = Self::new(config.resolve_api_key(), config.base_url.as_deref());
        if let Some(model) = &config.reply_model {
            client.reply_model = model.clone();
        }
        if let Some(model) = &config.tts_model {
            client.tts_model = model.clone();
        }
        client
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, model: &str, api_key: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, api_key
        )
    }

    async fn request_speech(&self, text: &str, voice: VoiceId) -> anyhow::Result<Option<String>> {
        let api_key = match &self.api_key {
            Some(key) => key,
            None => return Ok(None),
        };

        let body = GenerateContentRequest {
            contents: vec![json!({ "parts": [{ "text": text }] })],
            system_instruction: None,
            generation_config: Some(json!({
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.as_str() },
                    },
                },
            })),
        };

        debug!(model = %self.tts_model, voice = %voice, "Requesting speech synthesis");

        let response = self
            .http
            .post(self.endpoint(&self.tts_model, api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini TTS error {status}: {body}");
        }

        let parsed: GenerateContentResponse = response.json().await?;
        Ok(parsed.audio_data())
    }
}

#[async_trait]
impl AssistantBackend for GeminiClient {
    async fn generate_reply(
        &self,
        persona_context: &str,
        utterance: &str,
    ) -> Result<String, ReplyError> {
        // Credential check comes before any network traffic.
        let api_key = self.api_key.as_deref().ok_or(ReplyError::ConfigMissing)?;

        let body = GenerateContentRequest {
            contents: vec![json!({
                "role": "user",
                "parts": [{ "text": utterance }],
            })],
            system_instruction: Some(json!({ "parts": [{ "text": persona_context }] })),
            generation_config: None,
        };

        debug!(model = %self.reply_model, "Requesting assistant reply");

        let response = self
            .http
            .post(self.endpoint(&self.reply_model, api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ReplyError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReplyError::Network(format!(
                "Gemini API error {status}: {body}"
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ReplyError::Malformed(e.to_string()))?;

        let text = parsed.reply_text();
        if text.is_empty() {
            return Err(ReplyError::Malformed("reply contained no text".into()));
        }
        Ok(text)
    }

    async fn synthesize_speech(&self, text: &str, voice: VoiceId) -> Option<String> {
        match self.request_speech(text, voice).await {
            Ok(Some(data)) => Some(data),
            Ok(None) => {
                debug!("Speech response carried no audio payload");
                None
            }
            Err(e) => {
                debug!(%e, "Speech synthesis skipped");
                None
            }
        }
    }
}

// --- Gemini request/response types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    data: String,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn reply_text(&self) -> String {
        let mut text = String::new();
        if let Some(content) = self.candidates.first().and_then(|c| c.content.as_ref()) {
            for part in &content.parts {
                if let Some(t) = &part.text {
                    text.push_str(t);
                }
            }
        }
        text
    }

    /// Base64 audio payload of the first candidate, if any.
    fn audio_data(&self) -> Option<String> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| {
                content
                    .parts
                    .iter()
                    .find_map(|part| part.inline_data.as_ref())
            })
            .map(|inline| inline.data.clone())
            .filter(|data| !data.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_defaults() {
        let client = GeminiClient::new(Some("key".into()), None);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.reply_model, DEFAULT_REPLY_MODEL);
        assert_eq!(client.tts_model, DEFAULT_TTS_MODEL);
        assert!(client.has_api_key());
    }

    #[test]
    fn test_empty_api_key_is_missing() {
        let client = GeminiClient::new(Some(String::new()), None);
        assert!(!client.has_api_key());
    }

    #[tokio::test]
    async fn test_reply_without_key_fails_before_network() {
        // Unroutable base URL proves no request is attempted.
        let client = GeminiClient::new(None, Some("http://127.0.0.1:1"));
        let err = client.generate_reply("persona", "hi").await.unwrap_err();
        assert!(matches!(err, ReplyError::ConfigMissing));
    }

    #[tokio::test]
    async fn test_speech_without_key_is_none() {
        let client = GeminiClient::new(None, Some("http://127.0.0.1:1"));
        assert_eq!(client.synthesize_speech("hi", VoiceId::Kore).await, None);
    }

    #[test]
    fn test_request_serialization() {
        let body = GenerateContentRequest {
            contents: vec![json!({ "role": "user", "parts": [{ "text": "hi" }] })],
            system_instruction: Some(json!({ "parts": [{ "text": "persona" }] })),
            generation_config: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "persona");
        assert!(value.get("generationConfig").is_none());
    }

    #[test]
    fn test_reply_text_extraction() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.reply_text(), "Hello there");
        assert_eq!(parsed.audio_data(), None);
    }

    #[test]
    fn test_audio_data_extraction() {
        let json = r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"audio/pcm","data":"AAEC"}}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.audio_data().as_deref(), Some("AAEC"));
    }

    #[test]
    fn test_empty_candidates_degrade() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.reply_text(), "");
        assert_eq!(parsed.audio_data(), None);
    }
}
