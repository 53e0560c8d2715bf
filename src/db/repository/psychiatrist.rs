use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

use super::{ensure_account_free, expect_changed, Conditions, SqlPredicate};

const PSYCHIATRIST_SELECT: &str = "SELECT ps.id, ps.full_name, ps.phone, ps.district_id, d.name, ps.user_id
     FROM psychiatrists ps JOIN districts d ON d.id = ps.district_id";

fn psychiatrist_from_row(row: &Row) -> rusqlite::Result<Psychiatrist> {
    Ok(Psychiatrist {
        id: row.get(0)?,
        full_name: row.get(1)?,
        phone: row.get(2)?,
        district_id: row.get(3)?,
        district_name: row.get(4)?,
        user_id: row.get(5)?,
    })
}

pub fn insert_psychiatrist(conn: &Connection, input: &PsychiatristInput) -> Result<i64, DatabaseError> {
    ensure_account_free(conn, input.user_id)?;
    conn.execute(
        "INSERT INTO psychiatrists (full_name, phone, district_id, user_id) VALUES (?1, ?2, ?3, ?4)",
        params![input.full_name, input.phone, input.district_id, input.user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_psychiatrists(
    conn: &Connection,
    scope: &SqlPredicate,
    filter: &StaffFilter,
) -> Result<Vec<Psychiatrist>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions
        .and(scope)
        .and_opt("ps.district_id", filter.district_id)
        .and_search(&["ps.full_name"], filter.q.as_deref());
    if let Some(neighborhood_id) = filter.neighborhood_id {
        conditions.and(&SqlPredicate::new(
            "ps.district_id = (SELECT district_id FROM neighborhoods WHERE id = ?)",
            vec![neighborhood_id.into()],
        ));
    }
    let sql = format!("{PSYCHIATRIST_SELECT}{} ORDER BY ps.full_name", conditions.where_clause());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), psychiatrist_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_psychiatrist(
    conn: &Connection,
    id: i64,
    scope: &SqlPredicate,
) -> Result<Option<Psychiatrist>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and_eq("ps.id", id).and(scope);
    let sql = format!("{PSYCHIATRIST_SELECT}{}", conditions.where_clause());
    Ok(conn.query_row(&sql, conditions.params(), psychiatrist_from_row).optional()?)
}

/// Psychiatrist by exact full name inside a district (import matching).
pub fn find_psychiatrist_by_name(
    conn: &Connection,
    district_id: i64,
    full_name: &str,
) -> Result<Option<Psychiatrist>, DatabaseError> {
    let sql = format!(
        "{PSYCHIATRIST_SELECT} WHERE ps.district_id = ?1 AND ps.full_name = ?2 ORDER BY ps.id LIMIT 1"
    );
    Ok(conn
        .query_row(&sql, params![district_id, full_name.trim()], psychiatrist_from_row)
        .optional()?)
}

pub fn update_psychiatrist(
    conn: &Connection,
    id: i64,
    input: &PsychiatristInput,
) -> Result<(), DatabaseError> {
    let current_user: i64 = conn
        .query_row("SELECT user_id FROM psychiatrists WHERE id = ?1", params![id], |row| row.get(0))
        .optional()?
        .ok_or_else(|| DatabaseError::not_found("Psychiatrist", id))?;
    if current_user != input.user_id {
        ensure_account_free(conn, input.user_id)?;
    }
    let changed = conn.execute(
        "UPDATE psychiatrists SET full_name = ?1, phone = ?2, district_id = ?3, user_id = ?4 WHERE id = ?5",
        params![input.full_name, input.phone, input.district_id, input.user_id, id],
    )?;
    expect_changed(changed, "Psychiatrist", id)
}

/// Patients of a removed psychiatrist are kept with no psychiatrist.
pub fn delete_psychiatrist(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM psychiatrists WHERE id = ?1", params![id])?;
    expect_changed(changed, "Psychiatrist", id)
}

pub fn count_psychiatrists(conn: &Connection, scope: &SqlPredicate) -> Result<i64, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and(scope);
    let sql = format!(
        "SELECT COUNT(*) FROM psychiatrists ps JOIN districts d ON d.id = ps.district_id{}",
        conditions.where_clause()
    );
    Ok(conn.query_row(&sql, conditions.params(), |row| row.get(0))?)
}
