use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// Fixed-width UTC timestamp so text comparison orders correctly.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Store a new session for `account_id`. Only the token hash is kept.
pub fn insert_session(
    conn: &Connection,
    token_hash: &[u8; 32],
    account_id: i64,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, account_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            token_hash.as_slice(),
            account_id,
            timestamp(created_at),
            timestamp(expires_at),
        ],
    )?;
    Ok(())
}

/// Account owning an unexpired session with this token hash.
/// Inactive accounts are never resolved.
pub fn find_session_account(
    conn: &Connection,
    token_hash: &[u8; 32],
    now: DateTime<Utc>,
) -> Result<Option<i64>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT s.account_id FROM sessions s
             JOIN accounts a ON a.id = s.account_id
             WHERE s.token_hash = ?1 AND s.expires_at > ?2 AND a.is_active = 1",
            params![token_hash.as_slice(), timestamp(now)],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn delete_session(conn: &Connection, token_hash: &[u8; 32]) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash.as_slice()],
    )?;
    Ok(changed > 0)
}

/// Remove expired sessions; returns how many were swept.
pub fn delete_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM sessions WHERE expires_at <= ?1",
        params![timestamp(now)],
    )?)
}
