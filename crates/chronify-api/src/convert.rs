use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use chronify_db::models::{EventRow, TimelineRow};
use chronify_types::models::{Event, Timeline};

// Rows written by this service always hold canonical ids and RFC 3339
// timestamps. Anything else is logged and replaced with a default rather
// than failing the whole listing.

fn parse_id(raw: &str, what: &str, row_id: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on row '{}': {}", what, raw, row_id, e);
        Uuid::default()
    })
}

fn parse_timestamp(raw: &str, row_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') format, no timezone
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on row '{}': {}", raw, row_id, e);
            DateTime::default()
        })
}

pub fn timeline_from_row(row: TimelineRow) -> Timeline {
    Timeline {
        id: parse_id(&row.id, "id", &row.id),
        user_id: parse_id(&row.user_id, "user_id", &row.id),
        created_at: parse_timestamp(&row.created_at, &row.id),
        title: row.title,
        description: row.description,
    }
}

pub fn timelines_from_rows(rows: Vec<TimelineRow>) -> Vec<Timeline> {
    rows.into_iter().map(timeline_from_row).collect()
}

pub fn event_from_row(row: EventRow) -> Event {
    Event {
        id: parse_id(&row.id, "id", &row.id),
        timeline_id: parse_id(&row.timeline_id, "timeline_id", &row.id),
        created_at: parse_timestamp(&row.created_at, &row.id),
        title: row.title,
        card_title: row.card_title,
        card_subtitle: row.card_subtitle,
        card_detailed_text: row.card_detailed_text,
    }
}

pub fn events_from_rows(rows: Vec<EventRow>) -> Vec<Event> {
    rows.into_iter().map(event_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_timestamp_formats() {
        let millis = parse_timestamp("2026-03-01T10:20:30.123Z", "r");
        assert_eq!(millis.timestamp_subsec_millis(), 123);

        let plain = parse_timestamp("2026-03-01 10:20:30", "r");
        assert_eq!(plain.timestamp(), millis.timestamp());
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        assert_eq!(parse_id("nope", "id", "r"), Uuid::nil());
        assert_eq!(parse_timestamp("yesterday", "r"), DateTime::<Utc>::default());
    }
}
