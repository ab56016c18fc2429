//! AI-assisted event drafting.
//!
//! A prompt goes to a generative model constrained to answer with a JSON
//! array of `{title, cardTitle, cardSubtitle, cardDetailedText}` objects.
//! Drafts are always new events; callers feed them to
//! [`crate::reconcile::create_all`]. There is no retry or rate limiting.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use chronify_types::api::DraftedEvent;

use crate::config::GeminiConfig;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("event drafting is not configured")]
    NotConfigured,
    #[error("generation request failed: {0}")]
    RequestFailed(String),
    #[error("model returned no usable text")]
    NoContent,
    #[error("model output is not a JSON event array: {0}")]
    Parse(String),
    #[error("model returned no events")]
    Empty,
    #[error("drafted event {index} is missing a {field}")]
    Incomplete { index: usize, field: &'static str },
}

/// The generative collaborator.
#[async_trait::async_trait]
pub trait EventDrafter: Send + Sync {
    async fn draft(&self, prompt: &str) -> Result<Vec<DraftedEvent>, DraftError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Parse and check raw model output.
pub fn parse_drafts(text: &str) -> Result<Vec<DraftedEvent>, DraftError> {
    let drafts: Vec<DraftedEvent> =
        serde_json::from_str(text.trim()).map_err(|e| DraftError::Parse(e.to_string()))?;

    if drafts.is_empty() {
        return Err(DraftError::Empty);
    }
    for (index, d) in drafts.iter().enumerate() {
        if d.title.trim().is_empty() {
            return Err(DraftError::Incomplete { index, field: "title" });
        }
        if d.card_title.trim().is_empty() {
            return Err(DraftError::Incomplete { index, field: "cardTitle" });
        }
    }
    Ok(drafts)
}

/// JSON schema the model's answer must follow.
pub fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "title": {
                    "type": "STRING",
                    "description": "The main date or time marker for the event, like 'January 2022', 'Week 1', 'Month 2-3' etc."
                },
                "cardTitle": {
                    "type": "STRING",
                    "description": "A short, concise title for the timeline card."
                },
                "cardSubtitle": {
                    "type": "STRING",
                    "description": "A brief, one-sentence subtitle for the event."
                },
                "cardDetailedText": {
                    "type": "STRING",
                    "description": "A detailed, paragraph-length description of the event that occurred."
                }
            },
            "required": ["title", "cardTitle"],
            "propertyOrdering": ["title", "cardTitle", "cardSubtitle", "cardDetailedText"]
        }
    })
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

pub struct GeminiDrafter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiDrafter {
    pub fn from_config(config: &GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .build()
            .unwrap_or_default();

        info!("Event drafting enabled with model {}", config.model);
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Option<String> {
        let parts = self.candidates.into_iter().next()?.content?.parts;
        let text: String = parts.into_iter().filter_map(|p| p.text).collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[async_trait::async_trait]
impl EventDrafter for GeminiDrafter {
    async fn draft(&self, prompt: &str) -> Result<Vec<DraftedEvent>, DraftError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DraftError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DraftError::RequestFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| DraftError::Parse(e.to_string()))?;
        let text = parsed.into_text().ok_or(DraftError::NoContent)?;
        debug!("Model {} answered with {} bytes", self.model, text.len());

        parse_drafts(&text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_array() {
        let text = r#"
            [
              {"title": "1957", "cardTitle": "Sputnik", "cardSubtitle": "First satellite",
               "cardDetailedText": "The USSR launches Sputnik 1."},
              {"title": "1969", "cardTitle": "Apollo 11"}
            ]
        "#;
        let drafts = parse_drafts(text).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].card_subtitle.as_deref(), Some("First satellite"));
        assert_eq!(drafts[1].card_detailed_text, None);
    }

    #[test]
    fn rejects_non_array_output() {
        assert!(matches!(parse_drafts("Sure! Here are your events"), Err(DraftError::Parse(_))));
        assert!(matches!(parse_drafts(r#"{"title": "x"}"#), Err(DraftError::Parse(_))));
    }

    #[test]
    fn rejects_empty_and_incomplete_drafts() {
        assert!(matches!(parse_drafts("[]"), Err(DraftError::Empty)));
        assert!(matches!(
            parse_drafts(r#"[{"title": "1969", "cardTitle": ""}]"#),
            Err(DraftError::Incomplete { index: 0, field: "cardTitle" })
        ));
    }

    #[test]
    fn extracts_text_from_first_candidate() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"title\":"},{"text":"\"a\"}]"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.into_text().as_deref(), Some(r#"[{"title":"a"}]"#));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.into_text().is_none());
    }

    #[test]
    fn schema_lists_every_field() {
        let schema = response_schema();
        let props = schema["items"]["properties"].as_object().unwrap();
        for key in ["title", "cardTitle", "cardSubtitle", "cardDetailedText"] {
            assert!(props.contains_key(key), "missing {key}");
        }
    }
}
