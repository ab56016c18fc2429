use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::User;

// -- JWT Claims --

/// Bearer token claims. Issued by login, checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

// Missing fields decode as empty strings so the handlers can answer with
// their own "required" message instead of a decode failure.

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

// -- Timelines --

#[derive(Debug, Deserialize)]
pub struct TimelineRequest {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TimelineSearchQuery {
    pub title: Option<String>,
}

// -- Events --

/// One item of a reconciliation batch.
///
/// `id` is lenient: anything that is not a well-formed, non-nil UUID string
/// (absent, null, a number, garbage text) decodes to `None`, which marks the
/// item as new. Any `timeline_id` in the payload is ignored; the path
/// parameter decides which timeline the batch belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertEventRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub card_title: String,
    pub card_subtitle: Option<String>,
    pub card_detailed_text: Option<String>,
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.trim().parse::<Uuid>().ok())
        .filter(|id| !id.is_nil()))
}

#[derive(Debug, Deserialize)]
pub struct AiEventRequest {
    #[serde(default)]
    pub prompt: String,
}

/// An event as produced by the generative collaborator. The model is asked
/// for camelCase keys; snake_case is accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftedEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "cardTitle", alias = "card_title")]
    pub card_title: String,
    #[serde(default, rename = "cardSubtitle", alias = "card_subtitle")]
    pub card_subtitle: Option<String>,
    #[serde(default, rename = "cardDetailedText", alias = "card_detailed_text")]
    pub card_detailed_text: Option<String>,
}

impl From<DraftedEvent> for UpsertEventRequest {
    fn from(d: DraftedEvent) -> Self {
        Self {
            id: None,
            title: d.title,
            card_title: d.card_title,
            card_subtitle: d.card_subtitle,
            card_detailed_text: d.card_detailed_text,
        }
    }
}
