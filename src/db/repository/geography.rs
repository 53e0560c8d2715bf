use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

use super::{ensure_account_free, expect_changed, Conditions, SqlPredicate};

// ═══════════════════════════════════════════
// Regions (alias r)
// ═══════════════════════════════════════════

pub fn insert_region(conn: &Connection, input: &RegionInput) -> Result<i64, DatabaseError> {
    conn.execute("INSERT INTO regions (name) VALUES (?1)", params![input.name])?;
    Ok(conn.last_insert_rowid())
}

pub fn list_regions(conn: &Connection, scope: &SqlPredicate) -> Result<Vec<Region>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and(scope);
    let sql = format!(
        "SELECT r.id, r.name FROM regions r{} ORDER BY r.name",
        conditions.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), |row| {
        Ok(Region { id: row.get(0)?, name: row.get(1)? })
    })?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_region(
    conn: &Connection,
    id: i64,
    scope: &SqlPredicate,
) -> Result<Option<Region>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and_eq("r.id", id).and(scope);
    let sql = format!("SELECT r.id, r.name FROM regions r{}", conditions.where_clause());
    Ok(conn
        .query_row(&sql, conditions.params(), |row| {
            Ok(Region { id: row.get(0)?, name: row.get(1)? })
        })
        .optional()?)
}

pub fn update_region(conn: &Connection, id: i64, input: &RegionInput) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE regions SET name = ?1 WHERE id = ?2",
        params![input.name, id],
    )?;
    expect_changed(changed, "Region", id)
}

pub fn delete_region(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM regions WHERE id = ?1", params![id])?;
    expect_changed(changed, "Region", id)
}

// ═══════════════════════════════════════════
// Districts (alias d)
// ═══════════════════════════════════════════

const DISTRICT_SELECT: &str = "SELECT d.id, d.name, d.region_id, r.name
     FROM districts d JOIN regions r ON r.id = d.region_id";

fn district_from_row(row: &Row) -> rusqlite::Result<District> {
    Ok(District {
        id: row.get(0)?,
        name: row.get(1)?,
        region_id: row.get(2)?,
        region_name: row.get(3)?,
    })
}

pub fn insert_district(conn: &Connection, input: &DistrictInput) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO districts (name, region_id) VALUES (?1, ?2)",
        params![input.name, input.region_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_districts(
    conn: &Connection,
    scope: &SqlPredicate,
    region_id: Option<i64>,
) -> Result<Vec<District>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and(scope).and_opt("d.region_id", region_id);
    let sql = format!("{DISTRICT_SELECT}{} ORDER BY d.name", conditions.where_clause());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), district_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_district(
    conn: &Connection,
    id: i64,
    scope: &SqlPredicate,
) -> Result<Option<District>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and_eq("d.id", id).and(scope);
    let sql = format!("{DISTRICT_SELECT}{}", conditions.where_clause());
    Ok(conn.query_row(&sql, conditions.params(), district_from_row).optional()?)
}

/// District by exact name (import matching).
pub fn find_district_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<District>, DatabaseError> {
    let sql = format!("{DISTRICT_SELECT} WHERE d.name = ?1 ORDER BY d.id LIMIT 1");
    Ok(conn.query_row(&sql, params![name.trim()], district_from_row).optional()?)
}

pub fn update_district(conn: &Connection, id: i64, input: &DistrictInput) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE districts SET name = ?1, region_id = ?2 WHERE id = ?3",
        params![input.name, input.region_id, id],
    )?;
    expect_changed(changed, "District", id)
}

pub fn delete_district(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM districts WHERE id = ?1", params![id])?;
    expect_changed(changed, "District", id)
}

// ═══════════════════════════════════════════
// Neighborhoods (alias n)
// ═══════════════════════════════════════════

const NEIGHBORHOOD_SELECT: &str = "SELECT n.id, n.name, n.district_id, d.name, n.user_id
     FROM neighborhoods n JOIN districts d ON d.id = n.district_id";

fn neighborhood_from_row(row: &Row) -> rusqlite::Result<Neighborhood> {
    Ok(Neighborhood {
        id: row.get(0)?,
        name: row.get(1)?,
        district_id: row.get(2)?,
        district_name: row.get(3)?,
        user_id: row.get(4)?,
    })
}

/// Insert a neighborhood. A linked officer account must not hold another role.
pub fn insert_neighborhood(conn: &Connection, input: &NeighborhoodInput) -> Result<i64, DatabaseError> {
    if let Some(user_id) = input.user_id {
        ensure_account_free(conn, user_id)?;
    }
    conn.execute(
        "INSERT INTO neighborhoods (name, district_id, user_id) VALUES (?1, ?2, ?3)",
        params![input.name, input.district_id, input.user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_neighborhoods(
    conn: &Connection,
    scope: &SqlPredicate,
    district_id: Option<i64>,
    q: Option<&str>,
) -> Result<Vec<Neighborhood>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions
        .and(scope)
        .and_opt("n.district_id", district_id)
        .and_search(&["n.name"], q);
    let sql = format!(
        "{NEIGHBORHOOD_SELECT}{} ORDER BY d.name, n.name",
        conditions.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), neighborhood_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_neighborhood(
    conn: &Connection,
    id: i64,
    scope: &SqlPredicate,
) -> Result<Option<Neighborhood>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and_eq("n.id", id).and(scope);
    let sql = format!("{NEIGHBORHOOD_SELECT}{}", conditions.where_clause());
    Ok(conn.query_row(&sql, conditions.params(), neighborhood_from_row).optional()?)
}

/// Neighborhood by name inside a district (import matching).
pub fn find_neighborhood_by_name(
    conn: &Connection,
    district_id: i64,
    name: &str,
) -> Result<Option<Neighborhood>, DatabaseError> {
    let sql = format!(
        "{NEIGHBORHOOD_SELECT} WHERE n.district_id = ?1 AND n.name = ?2 ORDER BY n.id LIMIT 1"
    );
    Ok(conn
        .query_row(&sql, params![district_id, name.trim()], neighborhood_from_row)
        .optional()?)
}

pub fn update_neighborhood(
    conn: &Connection,
    id: i64,
    input: &NeighborhoodInput,
) -> Result<(), DatabaseError> {
    let current: Option<Option<i64>> = conn
        .query_row(
            "SELECT user_id FROM neighborhoods WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    let current_user = current.ok_or_else(|| DatabaseError::not_found("Neighborhood", id))?;
    if let Some(user_id) = input.user_id {
        if current_user != Some(user_id) {
            ensure_account_free(conn, user_id)?;
        }
    }
    let changed = conn.execute(
        "UPDATE neighborhoods SET name = ?1, district_id = ?2, user_id = ?3 WHERE id = ?4",
        params![input.name, input.district_id, input.user_id, id],
    )?;
    expect_changed(changed, "Neighborhood", id)
}

pub fn delete_neighborhood(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM neighborhoods WHERE id = ?1", params![id])?;
    expect_changed(changed, "Neighborhood", id)
}
