/// Database row types that map directly to SQLite rows.
/// Distinct from chronify-types API models to keep the DB layer independent.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct TimelineRow {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    pub id: String,
    pub timeline_id: String,
    pub title: String,
    pub card_title: String,
    pub card_subtitle: Option<String>,
    pub card_detailed_text: Option<String>,
    pub created_at: String,
}

/// Column values for one event insert or update. The owning timeline is
/// passed separately so a batch can only ever touch one timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInput {
    pub id: String,
    pub title: String,
    pub card_title: String,
    pub card_subtitle: Option<String>,
    pub card_detailed_text: Option<String>,
}

/// Result of one statement inside a bulk update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// No event with that id on the target timeline.
    NotFound,
    Failed(String),
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Per-item outcomes of a bulk update, in input order.
/// `committed` is true only when every item was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkUpdateReport {
    pub outcomes: Vec<UpdateOutcome>,
    pub committed: bool,
}
