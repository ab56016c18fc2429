//! Event batch reconciliation.
//!
//! A batch mixes new events (no usable id) and edits to existing ones. It is
//! split into a create set and an update set, the create set is inserted in
//! one call, the update set is applied in one call, and the timeline's full
//! event list is read back so the caller never has to work out which of its
//! items landed.
//!
//! Both store calls are all-or-nothing on their own. They are not wrapped in
//! a common transaction: creates committed before a rejected update set stay.

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use chronify_db::Database;
use chronify_db::models::{BulkUpdateReport, EventInput, EventRow, UpdateOutcome};
use chronify_types::api::UpsertEventRequest;

/// The storage calls reconciliation needs.
pub trait EventStore {
    fn bulk_create_events(&self, timeline_id: &str, events: &[EventInput]) -> anyhow::Result<usize>;
    fn bulk_update_events(&self, timeline_id: &str, events: &[EventInput]) -> anyhow::Result<BulkUpdateReport>;
    fn list_events(&self, timeline_id: &str) -> anyhow::Result<Vec<EventRow>>;
}

impl EventStore for Database {
    fn bulk_create_events(&self, timeline_id: &str, events: &[EventInput]) -> anyhow::Result<usize> {
        Database::bulk_create_events(self, timeline_id, events)
    }

    fn bulk_update_events(&self, timeline_id: &str, events: &[EventInput]) -> anyhow::Result<BulkUpdateReport> {
        Database::bulk_update_events(self, timeline_id, events)
    }

    fn list_events(&self, timeline_id: &str) -> anyhow::Result<Vec<EventRow>> {
        Database::list_events(self, timeline_id)
    }
}

/// A batch split by intent. Relative order inside each half is the batch order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partition {
    pub creates: Vec<EventInput>,
    pub updates: Vec<EventInput>,
    /// Batch index of each entry in `updates`, for failure reports.
    pub update_positions: Vec<usize>,
}

#[derive(Debug)]
pub struct Reconciled {
    pub created: usize,
    pub updated: usize,
    /// Every event of the timeline after the mutation, in creation order.
    pub events: Vec<EventRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NotFound,
    Failed,
}

/// One update that did not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub index: usize,
    pub id: Uuid,
    pub reason: FailureReason,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("No events provided")]
    EmptyBatch,

    #[error("Event at index {index} is missing a {field}")]
    MissingField { index: usize, field: &'static str },

    /// The update set was rolled back. `events` is the timeline as it stands
    /// afterwards, if it could be read.
    #[error("Failed to update one or more events")]
    UpdateRejected {
        failures: Vec<ItemFailure>,
        events: Option<Vec<EventRow>>,
    },

    #[error("{message}")]
    Storage {
        message: &'static str,
        cause: anyhow::Error,
    },
}

/// Reject a batch before any storage access.
pub fn validate(batch: &[UpsertEventRequest]) -> Result<(), ReconcileError> {
    if batch.is_empty() {
        return Err(ReconcileError::EmptyBatch);
    }
    for (index, item) in batch.iter().enumerate() {
        if item.title.trim().is_empty() {
            return Err(ReconcileError::MissingField { index, field: "title" });
        }
        if item.card_title.trim().is_empty() {
            return Err(ReconcileError::MissingField { index, field: "card_title" });
        }
    }
    Ok(())
}

/// Split a batch into creates and updates. Items without a usable id become
/// creates and get a fresh id here.
pub fn partition(batch: Vec<UpsertEventRequest>) -> Partition {
    let mut out = Partition::default();
    for (position, item) in batch.into_iter().enumerate() {
        let existing = item.id;
        let input = EventInput {
            id: existing.unwrap_or_else(Uuid::new_v4).to_string(),
            title: item.title,
            card_title: item.card_title,
            card_subtitle: item.card_subtitle,
            card_detailed_text: item.card_detailed_text,
        };
        match existing {
            Some(_) => {
                out.updates.push(input);
                out.update_positions.push(position);
            }
            None => out.creates.push(input),
        }
    }
    out
}

/// Validate, split and apply a batch against `timeline_id`.
pub fn reconcile<S>(store: &S, timeline_id: Uuid, batch: Vec<UpsertEventRequest>) -> Result<Reconciled, ReconcileError>
where
    S: EventStore + ?Sized,
{
    validate(&batch)?;
    execute(store, timeline_id, partition(batch))
}

/// Insert a batch that is new by construction (AI drafts). Any ids the items
/// carry are dropped, so nothing here can reach the update path.
pub fn create_all<S>(store: &S, timeline_id: Uuid, batch: Vec<UpsertEventRequest>) -> Result<Reconciled, ReconcileError>
where
    S: EventStore + ?Sized,
{
    let batch: Vec<UpsertEventRequest> = batch
        .into_iter()
        .map(|item| UpsertEventRequest { id: None, ..item })
        .collect();
    reconcile(store, timeline_id, batch)
}

fn execute<S>(store: &S, timeline_id: Uuid, partition: Partition) -> Result<Reconciled, ReconcileError>
where
    S: EventStore + ?Sized,
{
    let tid = timeline_id.to_string();
    let Partition { creates, updates, update_positions } = partition;

    let mut created = 0;
    if !creates.is_empty() {
        created = store
            .bulk_create_events(&tid, &creates)
            .map_err(|cause| ReconcileError::Storage { message: "Failed to create events", cause })?;
    }

    let mut updated = 0;
    if !updates.is_empty() {
        let report = store
            .bulk_update_events(&tid, &updates)
            .map_err(|cause| ReconcileError::Storage { message: "Failed to update events", cause })?;

        if !report.committed {
            let failures = collect_failures(&updates, &update_positions, &report.outcomes);
            warn!(
                "Update set for timeline {} rolled back: {} of {} items failed",
                timeline_id,
                failures.len(),
                updates.len()
            );
            let events = match store.list_events(&tid) {
                Ok(rows) => Some(rows),
                Err(e) => {
                    warn!("Re-read after rejected update failed: {}", e);
                    None
                }
            };
            return Err(ReconcileError::UpdateRejected { failures, events });
        }
        updated = updates.len();
    }

    let events = store
        .list_events(&tid)
        .map_err(|cause| ReconcileError::Storage { message: "Failed to retrieve events", cause })?;

    debug!(
        "Reconciled timeline {}: {} created, {} updated, {} total",
        timeline_id,
        created,
        updated,
        events.len()
    );
    Ok(Reconciled { created, updated, events })
}

fn collect_failures(updates: &[EventInput], positions: &[usize], outcomes: &[UpdateOutcome]) -> Vec<ItemFailure> {
    updates
        .iter()
        .zip(positions)
        .zip(outcomes)
        .filter_map(|((input, &index), outcome)| {
            let reason = match outcome {
                UpdateOutcome::Applied => return None,
                UpdateOutcome::NotFound => FailureReason::NotFound,
                UpdateOutcome::Failed(_) => FailureReason::Failed,
            };
            Some(ItemFailure {
                index,
                id: input.id.parse().unwrap_or_default(),
                reason,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Create(usize),
        Update(usize),
        List,
    }

    /// In-memory store that records every call it receives.
    #[derive(Default)]
    struct RecordingStore {
        rows: Mutex<Vec<EventRow>>,
        calls: Mutex<Vec<Call>>,
        fail_create: bool,
        fail_update_title: Option<&'static str>,
    }

    impl RecordingStore {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn seed(&self, timeline_id: Uuid, title: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.rows.lock().unwrap().push(EventRow {
                id: id.to_string(),
                timeline_id: timeline_id.to_string(),
                title: title.to_string(),
                card_title: "card".into(),
                card_subtitle: None,
                card_detailed_text: None,
                created_at: "2026-01-01T00:00:00.000Z".into(),
            });
            id
        }
    }

    impl EventStore for RecordingStore {
        fn bulk_create_events(&self, timeline_id: &str, events: &[EventInput]) -> anyhow::Result<usize> {
            self.calls.lock().unwrap().push(Call::Create(events.len()));
            if self.fail_create {
                anyhow::bail!("disk full");
            }
            let mut rows = self.rows.lock().unwrap();
            for e in events {
                rows.push(EventRow {
                    id: e.id.clone(),
                    timeline_id: timeline_id.to_string(),
                    title: e.title.clone(),
                    card_title: e.card_title.clone(),
                    card_subtitle: e.card_subtitle.clone(),
                    card_detailed_text: e.card_detailed_text.clone(),
                    created_at: "2026-01-02T00:00:00.000Z".into(),
                });
            }
            Ok(events.len())
        }

        fn bulk_update_events(&self, timeline_id: &str, events: &[EventInput]) -> anyhow::Result<BulkUpdateReport> {
            self.calls.lock().unwrap().push(Call::Update(events.len()));
            let mut rows = self.rows.lock().unwrap();
            let outcomes: Vec<UpdateOutcome> = events
                .iter()
                .map(|e| {
                    if self.fail_update_title == Some(e.title.as_str()) {
                        UpdateOutcome::Failed("constraint failed".into())
                    } else if rows.iter().any(|r| r.id == e.id && r.timeline_id == timeline_id) {
                        UpdateOutcome::Applied
                    } else {
                        UpdateOutcome::NotFound
                    }
                })
                .collect();
            let committed = outcomes.iter().all(UpdateOutcome::is_applied);
            if committed {
                for e in events {
                    if let Some(row) = rows.iter_mut().find(|r| r.id == e.id) {
                        row.title = e.title.clone();
                        row.card_title = e.card_title.clone();
                    }
                }
            }
            Ok(BulkUpdateReport { outcomes, committed })
        }

        fn list_events(&self, timeline_id: &str) -> anyhow::Result<Vec<EventRow>> {
            self.calls.lock().unwrap().push(Call::List);
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.timeline_id == timeline_id)
                .cloned()
                .collect())
        }
    }

    fn item(id: Option<Uuid>, title: &str) -> UpsertEventRequest {
        UpsertEventRequest {
            id,
            title: title.to_string(),
            card_title: format!("{title} card"),
            card_subtitle: None,
            card_detailed_text: None,
        }
    }

    #[test]
    fn empty_batch_touches_no_storage() {
        let store = RecordingStore::default();
        let err = reconcile(&store, Uuid::new_v4(), vec![]).unwrap_err();
        assert!(matches!(err, ReconcileError::EmptyBatch));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn missing_card_title_touches_no_storage() {
        let store = RecordingStore::default();
        let mut bad = item(None, "B");
        bad.card_title = "  ".into();
        let err = reconcile(&store, Uuid::new_v4(), vec![item(None, "A"), bad]).unwrap_err();
        assert!(matches!(err, ReconcileError::MissingField { index: 1, field: "card_title" }));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn partition_is_total_and_order_preserving() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let batch = vec![
            item(None, "n1"),
            item(Some(a), "u1"),
            item(None, "n2"),
            item(Some(b), "u2"),
            item(None, "n3"),
        ];
        let p = partition(batch);

        let creates: Vec<&str> = p.creates.iter().map(|e| e.title.as_str()).collect();
        let updates: Vec<&str> = p.updates.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(creates, vec!["n1", "n2", "n3"]);
        assert_eq!(updates, vec!["u1", "u2"]);
        assert_eq!(p.update_positions, vec![1, 3]);
        assert_eq!(p.updates[0].id, a.to_string());
        assert_eq!(p.updates[1].id, b.to_string());
    }

    #[test]
    fn creates_get_fresh_distinct_ids() {
        let p = partition(vec![item(None, "a"), item(None, "b")]);
        assert_ne!(p.creates[0].id, p.creates[1].id);
        assert!(p.creates.iter().all(|e| e.id.parse::<Uuid>().is_ok()));
    }

    #[test]
    fn mixed_batch_creates_updates_and_rereads() {
        let store = RecordingStore::default();
        let timeline = Uuid::new_v4();
        let existing = store.seed(timeline, "B");

        let out = reconcile(&store, timeline, vec![item(None, "A"), item(Some(existing), "B-renamed")]).unwrap();

        assert_eq!(store.calls(), vec![Call::Create(1), Call::Update(1), Call::List]);
        assert_eq!((out.created, out.updated), (1, 1));
        assert_eq!(out.events.len(), 2);
        let renamed = out.events.iter().find(|e| e.id == existing.to_string()).unwrap();
        assert_eq!(renamed.title, "B-renamed");
        let created = out.events.iter().find(|e| e.title == "A").unwrap();
        assert_ne!(created.id, existing.to_string());
    }

    #[test]
    fn creates_are_stamped_with_target_timeline() {
        let store = RecordingStore::default();
        let timeline = Uuid::new_v4();
        reconcile(&store, timeline, vec![item(None, "A")]).unwrap();
        assert!(store.rows.lock().unwrap().iter().all(|r| r.timeline_id == timeline.to_string()));
    }

    #[test]
    fn failed_create_skips_updates() {
        let store = RecordingStore {
            fail_create: true,
            ..Default::default()
        };
        let timeline = Uuid::new_v4();
        let existing = store.seed(timeline, "B");

        let err = reconcile(&store, timeline, vec![item(None, "A"), item(Some(existing), "B2")]).unwrap_err();

        assert!(matches!(err, ReconcileError::Storage { message: "Failed to create events", .. }));
        assert_eq!(store.calls(), vec![Call::Create(1)]);
    }

    #[test]
    fn update_only_batch_returns_full_timeline() {
        let store = RecordingStore::default();
        let timeline = Uuid::new_v4();
        let a = store.seed(timeline, "A");
        store.seed(timeline, "B");
        store.seed(Uuid::new_v4(), "elsewhere");

        let out = reconcile(&store, timeline, vec![item(Some(a), "A2")]).unwrap();

        assert_eq!(store.calls(), vec![Call::Update(1), Call::List]);
        assert_eq!(out.events.len(), 2);
    }

    #[test]
    fn rejected_update_reports_batch_positions() {
        let store = RecordingStore::default();
        let timeline = Uuid::new_v4();
        let a = store.seed(timeline, "A");
        let ghost = Uuid::new_v4();

        let err = reconcile(
            &store,
            timeline,
            vec![item(Some(a), "A2"), item(None, "new"), item(Some(ghost), "G")],
        )
        .unwrap_err();

        let ReconcileError::UpdateRejected { failures, events } = err else {
            panic!("expected UpdateRejected");
        };
        assert_eq!(
            failures,
            vec![ItemFailure { index: 2, id: ghost, reason: FailureReason::NotFound }]
        );
        let events = events.unwrap();
        // the create committed, the update set did not
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| e.title == "A"));
        assert!(events.iter().any(|e| e.title == "new"));
    }

    #[test]
    fn failed_update_statement_rejects_the_whole_set() {
        let store = RecordingStore { fail_update_title: Some("bad"), ..Default::default() };
        let timeline = Uuid::new_v4();
        let a = store.seed(timeline, "A");
        let b = store.seed(timeline, "B");

        let err = reconcile(&store, timeline, vec![item(Some(a), "A2"), item(Some(b), "bad")]).unwrap_err();

        let ReconcileError::UpdateRejected { failures, events } = err else {
            panic!("expected UpdateRejected");
        };
        assert_eq!(failures, vec![ItemFailure { index: 1, id: b, reason: FailureReason::Failed }]);
        let titles: Vec<String> = events.clone().unwrap().into_iter().map(|e| e.title).collect();
        assert_eq!(titles, vec!["A", "B"]);

        let api: crate::error::ApiError = ReconcileError::UpdateRejected { failures, events }.into();
        assert_eq!(api.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn create_all_never_updates() {
        let store = RecordingStore::default();
        let timeline = Uuid::new_v4();
        let existing = store.seed(timeline, "B");

        let out = create_all(&store, timeline, vec![item(Some(existing), "copy")]).unwrap();

        assert_eq!(store.calls(), vec![Call::Create(1), Call::List]);
        assert_eq!(out.created, 1);
        assert_eq!(out.events.len(), 2);
    }
}
