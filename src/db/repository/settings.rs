use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

use super::expect_changed;

pub const KEY_PSYCHIATRIC_APPOINTMENT_DAYS: &str = "last_psychiatric_appointment_days";
pub const KEY_HOME_VISIT_DAYS: &str = "last_home_visit_by_doctor_days";
pub const KEY_HOSPITALIZATION_TO_DAYS: &str = "last_hospitalization_to_days";

fn settings_from_row(row: &Row) -> rusqlite::Result<SettingsKey> {
    Ok(SettingsKey {
        id: row.get(0)?,
        name: row.get(1)?,
        key: row.get(2)?,
        value: row.get(3)?,
    })
}

pub fn insert_setting(conn: &Connection, input: &SettingsInput) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO settings_keys (name, key, value) VALUES (?1, ?2, ?3)",
        params![input.name, input.key, input.value],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_settings(conn: &Connection) -> Result<Vec<SettingsKey>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name, key, value FROM settings_keys ORDER BY key")?;
    let rows = stmt.query_map([], settings_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_setting(conn: &Connection, id: i64) -> Result<Option<SettingsKey>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, name, key, value FROM settings_keys WHERE id = ?1",
            params![id],
            settings_from_row,
        )
        .optional()?)
}

pub fn get_setting_by_key(conn: &Connection, key: &str) -> Result<Option<SettingsKey>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, name, key, value FROM settings_keys WHERE key = ?1",
            params![key],
            settings_from_row,
        )
        .optional()?)
}

pub fn update_setting(conn: &Connection, id: i64, input: &SettingsInput) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE settings_keys SET name = ?1, key = ?2, value = ?3 WHERE id = ?4",
        params![input.name, input.key, input.value, id],
    )?;
    expect_changed(changed, "SettingsKey", id)
}

pub fn delete_setting(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM settings_keys WHERE id = ?1", params![id])?;
    expect_changed(changed, "SettingsKey", id)
}

/// Value under `key`, inserting `default` under `name` when missing.
pub fn get_or_create_setting(
    conn: &Connection,
    key: &str,
    name: &str,
    default: &str,
) -> Result<String, DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO settings_keys (name, key, value) VALUES (?1, ?2, ?3)",
        params![name, key, default],
    )?;
    Ok(conn.query_row(
        "SELECT value FROM settings_keys WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )?)
}

/// Examination thresholds, seeding defaults on first read. A stored value
/// that is not a number falls back to the default.
pub fn get_examination_limits(conn: &Connection) -> Result<ExaminationLimits, DatabaseError> {
    let defaults = ExaminationLimits::default();
    let read = |key: &str, name: &str, default: i64| -> Result<i64, DatabaseError> {
        let raw = get_or_create_setting(conn, key, name, &default.to_string())?;
        Ok(match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Non-numeric examination limit, using default");
                default
            }
        })
    };
    Ok(ExaminationLimits {
        last_psychiatric_appointment_days: read(
            KEY_PSYCHIATRIC_APPOINTMENT_DAYS,
            "Охирги психиатр қабулидан ўтган кунлар",
            defaults.last_psychiatric_appointment_days,
        )?,
        last_home_visit_by_doctor_days: read(
            KEY_HOME_VISIT_DAYS,
            "Охирги уйдаги кўрикдан ўтган кунлар",
            defaults.last_home_visit_by_doctor_days,
        )?,
        last_hospitalization_to_days: read(
            KEY_HOSPITALIZATION_TO_DAYS,
            "Охирги госпитализациядан ўтган кунлар",
            defaults.last_hospitalization_to_days,
        )?,
    })
}
