use rusqlite::ffi;

/// Which UNIQUE constraint a failed write ran into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniqueViolation {
    UserEmail,
    UserUsername,
    TimelineTitle,
    /// Any other unique index, as `table.column`.
    Other(String),
}

/// Classify a storage error as a unique-constraint violation.
///
/// Returns `None` for every other failure. SQLite reports the violated
/// index in the message text ("UNIQUE constraint failed: users.email"),
/// so the column is read from there once the extended code confirms the
/// failure kind.
pub fn unique_violation(err: &anyhow::Error) -> Option<UniqueViolation> {
    let rusqlite::Error::SqliteFailure(code, message) = err.downcast_ref::<rusqlite::Error>()?
    else {
        return None;
    };

    if code.extended_code != ffi::SQLITE_CONSTRAINT_UNIQUE
        && code.extended_code != ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    {
        return None;
    }

    let target = message
        .as_deref()
        .and_then(|m| m.strip_prefix("UNIQUE constraint failed: "))
        .unwrap_or_default()
        .trim();

    Some(match target {
        "users.email" => UniqueViolation::UserEmail,
        "users.username" => UniqueViolation::UserUsername,
        "timelines.title" => UniqueViolation::TimelineTitle,
        other => UniqueViolation::Other(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[test]
    fn classifies_user_columns() {
        let db = Database::open_in_memory().unwrap();
        db.create_user("u1", "alice", "alice@example.com", "hash").unwrap();

        let dup_email = db
            .create_user("u2", "alice2", "alice@example.com", "hash")
            .unwrap_err();
        assert_eq!(unique_violation(&dup_email), Some(UniqueViolation::UserEmail));

        let dup_name = db
            .create_user("u3", "alice", "other@example.com", "hash")
            .unwrap_err();
        assert_eq!(unique_violation(&dup_name), Some(UniqueViolation::UserUsername));
    }

    #[test]
    fn ignores_other_failures() {
        let db = Database::open_in_memory().unwrap();
        // Unknown owner trips the foreign key, not a unique index.
        let err = db.create_timeline("t1", "nobody", "Title", None).unwrap_err();
        assert_eq!(unique_violation(&err), None);

        assert_eq!(unique_violation(&anyhow::anyhow!("plain")), None);
    }
}
