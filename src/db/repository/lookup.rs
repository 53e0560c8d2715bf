use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::*;

use super::{expect_changed, Conditions};

pub fn insert_lookup(conn: &Connection, kind: LookupKind, name: &str) -> Result<i64, DatabaseError> {
    let sql = format!("INSERT INTO {} (name) VALUES (?1)", kind.table());
    conn.execute(&sql, params![name])?;
    Ok(conn.last_insert_rowid())
}

pub fn list_lookups(
    conn: &Connection,
    kind: LookupKind,
    q: Option<&str>,
) -> Result<Vec<LookupItem>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and_search(&["name"], q);
    let sql = format!(
        "SELECT id, name FROM {}{} ORDER BY name",
        kind.table(),
        conditions.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), |row| {
        Ok(LookupItem { id: row.get(0)?, name: row.get(1)? })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_lookup(conn: &Connection, kind: LookupKind, id: i64) -> Result<Option<LookupItem>, DatabaseError> {
    let sql = format!("SELECT id, name FROM {} WHERE id = ?1", kind.table());
    Ok(conn
        .query_row(&sql, params![id], |row| {
            Ok(LookupItem { id: row.get(0)?, name: row.get(1)? })
        })
        .optional()?)
}

/// Existing entry with this exact name, or a new one.
pub fn get_or_create_lookup(conn: &Connection, kind: LookupKind, name: &str) -> Result<i64, DatabaseError> {
    let sql = format!("SELECT id FROM {} WHERE name = ?1 ORDER BY id LIMIT 1", kind.table());
    match conn.query_row(&sql, params![name], |row| row.get(0)).optional()? {
        Some(id) => Ok(id),
        None => insert_lookup(conn, kind, name),
    }
}

pub fn update_lookup(conn: &Connection, kind: LookupKind, id: i64, name: &str) -> Result<(), DatabaseError> {
    let sql = format!("UPDATE {} SET name = ?1 WHERE id = ?2", kind.table());
    let changed = conn.execute(&sql, params![name, id])?;
    expect_changed(changed, kind.entity_name(), id)
}

/// Patients referencing the entry keep existing with the reference cleared.
pub fn delete_lookup(conn: &Connection, kind: LookupKind, id: i64) -> Result<(), DatabaseError> {
    let sql = format!("DELETE FROM {} WHERE id = ?1", kind.table());
    let changed = conn.execute(&sql, params![id])?;
    expect_changed(changed, kind.entity_name(), id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;

    #[test]
    fn get_or_create_reuses_existing() {
        let (conn, _) = fixtures::seeded();
        let kind = LookupKind::SocialDomesticEnvironment;
        let first = get_or_create_lookup(&conn, kind, "Ижобий").unwrap();
        let second = get_or_create_lookup(&conn, kind, "Ижобий").unwrap();
        assert_eq!(first, second);
        assert_eq!(list_lookups(&conn, kind, None).unwrap().len(), 1);
    }

    #[test]
    fn tables_are_independent() {
        let (conn, _) = fixtures::seeded();
        insert_lookup(&conn, LookupKind::ReasonForSpecialConsideration, "Шизофрения").unwrap();
        assert!(list_lookups(&conn, LookupKind::SocialDomesticEnvironment, None).unwrap().is_empty());
    }

    #[test]
    fn deleting_lookup_clears_patient_reference() {
        let (conn, seed) = fixtures::seeded();
        let kind = LookupKind::ReasonForSpecialConsideration;
        let reason = insert_lookup(&conn, kind, "Эпилепсия").unwrap();
        let patient = fixtures::patient(&conn, "P", seed.hood_a1, seed.inspector_a1, None, false);
        conn.execute(
            "UPDATE patients SET reason_for_special_consideration_id = ?1 WHERE id = ?2",
            params![reason, patient],
        )
        .unwrap();

        delete_lookup(&conn, kind, reason).unwrap();

        let link: Option<i64> = conn
            .query_row(
                "SELECT reason_for_special_consideration_id FROM patients WHERE id = ?1",
                params![patient],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(link, None);
    }

    #[test]
    fn search_is_case_insensitive_for_cyrillic() {
        let (conn, _) = fixtures::seeded();
        let kind = LookupKind::ReasonForSpecialConsideration;
        insert_lookup(&conn, kind, "Шизофрения").unwrap();
        assert_eq!(list_lookups(&conn, kind, Some("шизо")).unwrap().len(), 1);
    }
}
