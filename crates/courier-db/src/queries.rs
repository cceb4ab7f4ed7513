use std::time::Duration;

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;

use courier_types::session::{Direction, SessionStatus};

use crate::Database;
use crate::models::{InboundEventRow, MessageRow, SessionRow};

/// Fixed-width UTC timestamp. All columns use this format so string
/// comparison in SQL orders correctly.
fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Database {
    // -- Sessions --

    /// Create the row if absent, otherwise leave status untouched. Used on
    /// credential-update events, which may arrive before any lifecycle
    /// transition.
    pub fn ensure_session(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO sessions (id, status, updated_at) VALUES (?1, 'unknown', ?2)",
                (id, now_utc()),
            )?;
            Ok(())
        })
    }

    /// Persist a lifecycle transition. `phone` only overwrites when Some,
    /// so a later disconnect does not erase the identity resolved earlier.
    pub fn set_session_status(
        &self,
        id: &str,
        status: SessionStatus,
        phone: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, status, phone, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    status = excluded.status,
                    phone = COALESCE(excluded.phone, sessions.phone),
                    updated_at = excluded.updated_at",
                (id, status.as_str(), phone, now_utc()),
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| query_session(conn, id))
    }

    // -- Pairing codes --

    /// Store the latest pairing code, superseding any previous one.
    pub fn put_pairing_code(&self, session_id: &str, code: &str, ttl: Duration) -> Result<()> {
        let expires_at = (Utc::now() + ttl).to_rfc3339_opts(SecondsFormat::Millis, true);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pairing_codes (session_id, code, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET
                    code = excluded.code,
                    expires_at = excluded.expires_at",
                (session_id, code, expires_at),
            )?;
            Ok(())
        })
    }

    /// Live pairing code, if any. Expired rows are dropped on read so a
    /// stale code is never returned even while physically present.
    pub fn get_pairing_code(&self, session_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM pairing_codes WHERE session_id = ?1 AND expires_at <= ?2",
                (session_id, now_utc()),
            )?;
            let code = optional(conn.query_row(
                "SELECT code FROM pairing_codes WHERE session_id = ?1",
                [session_id],
                |row| row.get(0),
            ))?;
            Ok(code)
        })
    }

    pub fn delete_pairing_code(&self, session_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM pairing_codes WHERE session_id = ?1", [session_id])?;
            Ok(())
        })
    }

    // -- Audit log --

    /// Append an audit record. Returns false when a record with the same
    /// protocol message id already exists (redelivered event).
    pub fn insert_message(
        &self,
        session_id: &str,
        direction: Direction,
        chat_id: &str,
        counterparty: Option<&str>,
        body: Option<&str>,
        message_id: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO messages
                    (session_id, direction, chat_id, counterparty, body, message_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    session_id,
                    direction.as_str(),
                    chat_id,
                    counterparty,
                    body,
                    message_id,
                    now_utc(),
                ),
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn messages_for_session(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, session_id))
    }

    // -- Inbound event stream --

    pub fn append_inbound_event(&self, session_id: &str, payload: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO inbound_events (session_id, payload, created_at) VALUES (?1, ?2, ?3)",
                (session_id, payload, now_utc()),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn inbound_events_for_session(&self, session_id: &str) -> Result<Vec<InboundEventRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, session_id, payload, created_at
                 FROM inbound_events WHERE session_id = ?1 ORDER BY seq",
            )?;
            let rows = stmt
                .query_map([session_id], |row| {
                    Ok(InboundEventRow {
                        seq: row.get(0)?,
                        session_id: row.get(1)?,
                        payload: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_session(conn: &Connection, id: &str) -> Result<Option<SessionRow>> {
    let mut stmt =
        conn.prepare("SELECT id, status, phone, updated_at FROM sessions WHERE id = ?1")?;

    let row = stmt.query_row([id], |row| {
        Ok(SessionRow {
            id: row.get(0)?,
            status: row.get(1)?,
            phone: row.get(2)?,
            updated_at: row.get(3)?,
        })
    });

    optional(row)
}

fn query_messages(conn: &Connection, session_id: &str) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, direction, chat_id, counterparty, body, message_id, created_at
         FROM messages WHERE session_id = ?1 ORDER BY id",
    )?;

    let rows = stmt
        .query_map([session_id], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                session_id: row.get(1)?,
                direction: row.get(2)?,
                chat_id: row.get(3)?,
                counterparty: row.get(4)?,
                body: row.get(5)?,
                message_id: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Collapse rusqlite's no-rows error into None; anything else propagates.
fn optional<T>(result: std::result::Result<T, rusqlite::Error>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_upsert_preserves_phone_across_transitions() {
        let db = Database::open_in_memory().unwrap();
        db.set_session_status("s1", SessionStatus::Connected, Some("15551234567"))
            .unwrap();
        db.set_session_status("s1", SessionStatus::Reconnecting, None)
            .unwrap();

        let row = db.get_session("s1").unwrap().unwrap();
        assert_eq!(row.status, "reconnecting");
        assert_eq!(row.phone.as_deref(), Some("15551234567"));
    }

    #[test]
    fn ensure_session_does_not_clobber_status() {
        let db = Database::open_in_memory().unwrap();
        db.set_session_status("s1", SessionStatus::Connected, None)
            .unwrap();
        db.ensure_session("s1").unwrap();

        let row = db.get_session("s1").unwrap().unwrap();
        assert_eq!(row.status, "connected");
    }

    #[test]
    fn missing_session_reads_as_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_session("nope").unwrap().is_none());
    }

    #[test]
    fn pairing_code_superseded_by_later_code() {
        let db = Database::open_in_memory().unwrap();
        db.put_pairing_code("s1", "AAAA", Duration::from_secs(120)).unwrap();
        db.put_pairing_code("s1", "BBBB", Duration::from_secs(120)).unwrap();
        assert_eq!(db.get_pairing_code("s1").unwrap().as_deref(), Some("BBBB"));
    }

    #[test]
    fn expired_pairing_code_is_not_returned() {
        let db = Database::open_in_memory().unwrap();
        db.put_pairing_code("s1", "AAAA", Duration::ZERO).unwrap();
        assert_eq!(db.get_pairing_code("s1").unwrap(), None);
        // Lazy delete removed the row too.
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM pairing_codes", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn deleted_pairing_code_is_gone() {
        let db = Database::open_in_memory().unwrap();
        db.put_pairing_code("s1", "AAAA", Duration::from_secs(120)).unwrap();
        db.delete_pairing_code("s1").unwrap();
        assert_eq!(db.get_pairing_code("s1").unwrap(), None);
    }

    #[test]
    fn duplicate_message_id_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let first = db
            .insert_message("s1", Direction::Inbound, "c1", Some("peer"), Some("hi"), Some("m1"))
            .unwrap();
        let second = db
            .insert_message("s1", Direction::Inbound, "c1", Some("peer"), Some("hi"), Some("m1"))
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(db.messages_for_session("s1").unwrap().len(), 1);
    }

    #[test]
    fn messages_without_id_are_always_accepted() {
        let db = Database::open_in_memory().unwrap();
        db.insert_message("s1", Direction::Inbound, "c1", None, None, None)
            .unwrap();
        db.insert_message("s1", Direction::Inbound, "c1", None, None, None)
            .unwrap();
        assert_eq!(db.messages_for_session("s1").unwrap().len(), 2);
    }

    #[test]
    fn same_message_id_allowed_across_directions() {
        let db = Database::open_in_memory().unwrap();
        assert!(
            db.insert_message("s1", Direction::Inbound, "c1", None, Some("x"), Some("m1"))
                .unwrap()
        );
        assert!(
            db.insert_message("s1", Direction::Outbound, "c1", None, Some("x"), Some("m1"))
                .unwrap()
        );
    }

    #[test]
    fn inbound_events_are_ordered_by_seq() {
        let db = Database::open_in_memory().unwrap();
        let a = db.append_inbound_event("s1", "{\"n\":1}").unwrap();
        let b = db.append_inbound_event("s1", "{\"n\":2}").unwrap();
        assert!(b > a);

        let rows = db.inbound_events_for_session("s1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].payload, "{\"n\":1}");
        assert_eq!(rows[1].payload, "{\"n\":2}");
    }
}
