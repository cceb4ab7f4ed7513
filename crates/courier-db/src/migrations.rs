use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            status      TEXT NOT NULL DEFAULT 'unknown',
            phone       TEXT,
            updated_at  TEXT NOT NULL
        );

        -- Append-only audit log for both directions. Never mutated or
        -- deleted by the relay.
        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id      TEXT NOT NULL,
            direction       TEXT NOT NULL CHECK (direction IN ('inbound', 'outbound')),
            chat_id         TEXT NOT NULL,
            counterparty    TEXT,
            body            TEXT,
            message_id      TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_id, created_at);

        -- Protocol message ids dedupe redelivered events; rows without one
        -- are always accepted.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_dedupe
            ON messages(session_id, direction, message_id)
            WHERE message_id IS NOT NULL;

        -- Ordered stream of inbound events for downstream consumers,
        -- separate from the audit log.
        CREATE TABLE IF NOT EXISTS inbound_events (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id  TEXT NOT NULL,
            payload     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_inbound_events_session
            ON inbound_events(session_id, seq);

        CREATE TABLE IF NOT EXISTS pairing_codes (
            session_id  TEXT PRIMARY KEY,
            code        TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
