use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

use super::{ensure_account_free, expect_changed, Conditions, SqlPredicate};

const INSPECTOR_SELECT: &str = "SELECT i.id, i.full_name, i.phone, i.neighborhood_id, n.name, n.district_id, i.user_id
     FROM inspectors i
     JOIN neighborhoods n ON n.id = i.neighborhood_id
     JOIN districts d ON d.id = n.district_id";

fn inspector_from_row(row: &Row) -> rusqlite::Result<Inspector> {
    Ok(Inspector {
        id: row.get(0)?,
        full_name: row.get(1)?,
        phone: row.get(2)?,
        neighborhood_id: row.get(3)?,
        neighborhood_name: row.get(4)?,
        district_id: row.get(5)?,
        user_id: row.get(6)?,
    })
}

pub fn insert_inspector(conn: &Connection, input: &InspectorInput) -> Result<i64, DatabaseError> {
    ensure_account_free(conn, input.user_id)?;
    conn.execute(
        "INSERT INTO inspectors (full_name, phone, neighborhood_id, user_id) VALUES (?1, ?2, ?3, ?4)",
        params![input.full_name, input.phone, input.neighborhood_id, input.user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_inspectors(
    conn: &Connection,
    scope: &SqlPredicate,
    filter: &StaffFilter,
) -> Result<Vec<Inspector>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions
        .and(scope)
        .and_opt("n.district_id", filter.district_id)
        .and_opt("i.neighborhood_id", filter.neighborhood_id)
        .and_search(&["i.full_name"], filter.q.as_deref());
    let sql = format!("{INSPECTOR_SELECT}{} ORDER BY i.full_name", conditions.where_clause());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), inspector_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_inspector(
    conn: &Connection,
    id: i64,
    scope: &SqlPredicate,
) -> Result<Option<Inspector>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and_eq("i.id", id).and(scope);
    let sql = format!("{INSPECTOR_SELECT}{}", conditions.where_clause());
    Ok(conn.query_row(&sql, conditions.params(), inspector_from_row).optional()?)
}

/// The inspector assigned to a neighborhood, if any.
pub fn find_inspector_by_neighborhood(
    conn: &Connection,
    neighborhood_id: i64,
) -> Result<Option<Inspector>, DatabaseError> {
    let sql = format!("{INSPECTOR_SELECT} WHERE i.neighborhood_id = ?1");
    Ok(conn.query_row(&sql, params![neighborhood_id], inspector_from_row).optional()?)
}

pub fn update_inspector(conn: &Connection, id: i64, input: &InspectorInput) -> Result<(), DatabaseError> {
    let current_user: i64 = conn
        .query_row("SELECT user_id FROM inspectors WHERE id = ?1", params![id], |row| row.get(0))
        .optional()?
        .ok_or_else(|| DatabaseError::not_found("Inspector", id))?;
    if current_user != input.user_id {
        ensure_account_free(conn, input.user_id)?;
    }
    let changed = conn.execute(
        "UPDATE inspectors SET full_name = ?1, phone = ?2, neighborhood_id = ?3, user_id = ?4 WHERE id = ?5",
        params![input.full_name, input.phone, input.neighborhood_id, input.user_id, id],
    )?;
    expect_changed(changed, "Inspector", id)
}

/// Fails with a constraint error while patients are assigned to the inspector.
pub fn delete_inspector(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM inspectors WHERE id = ?1", params![id])?;
    expect_changed(changed, "Inspector", id)
}

pub fn count_inspectors(conn: &Connection, scope: &SqlPredicate) -> Result<i64, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and(scope);
    let sql = format!(
        "SELECT COUNT(*) FROM inspectors i
         JOIN neighborhoods n ON n.id = i.neighborhood_id
         JOIN districts d ON d.id = n.district_id{}",
        conditions.where_clause()
    );
    Ok(conn.query_row(&sql, conditions.params(), |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;

    #[test]
    fn neighborhood_holds_one_inspector() {
        let (conn, seed) = fixtures::seeded();
        let user = fixtures::account(&conn, "second");
        let err = insert_inspector(
            &conn,
            &InspectorInput {
                full_name: "Second".into(),
                phone: None,
                neighborhood_id: seed.hood_a1,
                user_id: user,
            },
        )
        .unwrap_err();
        assert!(err.is_constraint());
    }

    #[test]
    fn filter_by_district_and_name() {
        let (conn, seed) = fixtures::seeded();
        let all = SqlPredicate::always();
        let in_a = list_inspectors(
            &conn,
            &all,
            &StaffFilter { district_id: Some(seed.district_a), ..Default::default() },
        )
        .unwrap();
        assert_eq!(in_a.len(), 2);

        let named = list_inspectors(
            &conn,
            &all,
            &StaffFilter { q: Some("tursun".into()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].id, seed.inspector_b1);
    }

    #[test]
    fn inspector_with_patients_cannot_be_deleted() {
        let (conn, seed) = fixtures::seeded();
        fixtures::patient(&conn, "P", seed.hood_a1, seed.inspector_a1, None, false);
        assert!(delete_inspector(&conn, seed.inspector_a1).unwrap_err().is_constraint());
        delete_inspector(&conn, seed.inspector_b1).unwrap();
    }

    #[test]
    fn finds_inspector_of_neighborhood() {
        let (conn, seed) = fixtures::seeded();
        let found = find_inspector_by_neighborhood(&conn, seed.hood_b1).unwrap().unwrap();
        assert_eq!(found.id, seed.inspector_b1);
        assert_eq!(count_inspectors(&conn, &SqlPredicate::always()).unwrap(), 3);
    }
}
