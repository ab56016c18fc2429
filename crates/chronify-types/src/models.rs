use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of an account. The password hash never leaves the DB layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single entry on a timeline. `title` is the date/period marker,
/// the `card_*` fields are the display text shown next to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timeline_id: Uuid,
    pub title: String,
    pub card_title: String,
    pub card_subtitle: Option<String>,
    pub card_detailed_text: Option<String>,
    pub created_at: DateTime<Utc>,
}
