use crate::Database;
use crate::models::{BulkUpdateReport, EventInput, EventRow, TimelineRow, UpdateOutcome, UserRow};
use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::{debug, warn};

const TIMELINE_COLUMNS: &str = "id, user_id, title, description, created_at";
const EVENT_COLUMNS: &str =
    "id, timeline_id, title, card_title, card_subtitle, card_detailed_text, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                (id, username, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, email, password_hash, created_at FROM users WHERE email = ?1",
                [email],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        password_hash: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Timelines --

    pub fn create_timeline(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<TimelineRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO timelines (id, user_id, title, description) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, user_id, title, description],
            )?;
            query_timeline(conn, id, user_id)?
                .ok_or_else(|| anyhow::anyhow!("Timeline {} vanished after insert", id))
        })
    }

    pub fn list_timelines(&self, user_id: &str) -> Result<Vec<TimelineRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TIMELINE_COLUMNS} FROM timelines WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], timeline_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Fetch a timeline only if it belongs to `user_id`.
    pub fn get_timeline(&self, id: &str, user_id: &str) -> Result<Option<TimelineRow>> {
        self.with_conn(|conn| query_timeline(conn, id, user_id))
    }

    /// Case-insensitive substring match on title, limited to one user's timelines.
    pub fn search_timelines(&self, user_id: &str, title: &str) -> Result<Vec<TimelineRow>> {
        let pattern = format!("%{}%", escape_like(title));
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {TIMELINE_COLUMNS} FROM timelines
                 WHERE user_id = ?1 AND title LIKE ?2 ESCAPE '\\'
                 ORDER BY created_at DESC, rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id, pattern.as_str()], timeline_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns `None` when no timeline with that id belongs to `user_id`.
    pub fn update_timeline(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        description: Option<&str>,
    ) -> Result<Option<TimelineRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE timelines SET title = ?1, description = ?2 WHERE id = ?3 AND user_id = ?4",
                rusqlite::params![title, description, id, user_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_timeline(conn, id, user_id)
        })
    }

    /// Returns whether a row was deleted. Events go with it (ON DELETE CASCADE).
    pub fn delete_timeline(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM timelines WHERE id = ?1 AND user_id = ?2",
                [id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Events --

    /// All events of a timeline in creation order.
    pub fn list_events(&self, timeline_id: &str) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| query_events(conn, timeline_id))
    }

    /// Insert every event in one transaction. Either all rows land or none do.
    pub fn bulk_create_events(&self, timeline_id: &str, events: &[EventInput]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO events (id, timeline_id, title, card_title, card_subtitle, card_detailed_text)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for e in events {
                    stmt.execute(rusqlite::params![
                        e.id,
                        timeline_id,
                        e.title,
                        e.card_title,
                        e.card_subtitle,
                        e.card_detailed_text,
                    ])?;
                }
            }
            tx.commit()?;
            debug!("Inserted {} events into timeline {}", events.len(), timeline_id);
            Ok(events.len())
        })
    }

    /// Apply every update in one transaction and report each item's outcome.
    ///
    /// Every statement is attempted so the report covers the whole batch.
    /// The transaction commits only if all of them applied; otherwise it is
    /// rolled back and nothing in the batch takes effect. Updates are scoped
    /// to `timeline_id`, so an event on another timeline counts as not found.
    pub fn bulk_update_events(&self, timeline_id: &str, events: &[EventInput]) -> Result<BulkUpdateReport> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut outcomes = Vec::with_capacity(events.len());
            {
                let mut stmt = tx.prepare(
                    "UPDATE events
                     SET title = ?1, card_title = ?2, card_subtitle = ?3, card_detailed_text = ?4
                     WHERE id = ?5 AND timeline_id = ?6",
                )?;
                for e in events {
                    let outcome = match stmt.execute(rusqlite::params![
                        e.title,
                        e.card_title,
                        e.card_subtitle,
                        e.card_detailed_text,
                        e.id,
                        timeline_id,
                    ]) {
                        Ok(0) => UpdateOutcome::NotFound,
                        Ok(_) => UpdateOutcome::Applied,
                        Err(err) => {
                            warn!("Update of event {} failed: {}", e.id, err);
                            UpdateOutcome::Failed(err.to_string())
                        }
                    };
                    outcomes.push(outcome);
                }
            }

            let committed = outcomes.iter().all(UpdateOutcome::is_applied);
            if committed {
                tx.commit()?;
            } else {
                tx.rollback()?;
            }
            Ok(BulkUpdateReport { outcomes, committed })
        })
    }

    /// Returns whether the event existed on that timeline.
    pub fn delete_event(&self, id: &str, timeline_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM events WHERE id = ?1 AND timeline_id = ?2",
                [id, timeline_id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_timeline(conn: &Connection, id: &str, user_id: &str) -> Result<Option<TimelineRow>> {
    let sql = format!("SELECT {TIMELINE_COLUMNS} FROM timelines WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, [id, user_id], timeline_from_row).optional()
}

fn query_events(conn: &Connection, timeline_id: &str) -> Result<Vec<EventRow>> {
    // rowid breaks ties between events inserted in the same millisecond
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE timeline_id = ?1 ORDER BY created_at ASC, rowid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([timeline_id], |row| {
            Ok(EventRow {
                id: row.get(0)?,
                timeline_id: row.get(1)?,
                title: row.get(2)?,
                card_title: row.get(3)?,
                card_subtitle: row.get(4)?,
                card_detailed_text: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn timeline_from_row(row: &Row<'_>) -> rusqlite::Result<TimelineRow> {
    Ok(TimelineRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
