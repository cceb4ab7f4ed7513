/// Database row types — these map directly to SQLite rows.
/// Distinct from courier-types API models to keep the DB layer independent.

pub struct SessionRow {
    pub id: String,
    pub status: String,
    pub phone: Option<String>,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub session_id: String,
    pub direction: String,
    pub chat_id: String,
    pub counterparty: Option<String>,
    pub body: Option<String>,
    pub message_id: Option<String>,
    pub created_at: String,
}

pub struct InboundEventRow {
    pub seq: i64,
    pub session_id: String,
    pub payload: String,
    pub created_at: String,
}
