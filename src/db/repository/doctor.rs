use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

use super::{expect_changed, Conditions, SqlPredicate};

const DOCTOR_SELECT: &str = "SELECT doc.id, doc.full_name, doc.phone, doc.brigade_number, doc.polyclinic_name,
            doc.birth_date, doc.neighborhood_id, n.name
     FROM doctors doc
     JOIN neighborhoods n ON n.id = doc.neighborhood_id
     JOIN districts d ON d.id = n.district_id";

fn doctor_from_row(row: &Row) -> rusqlite::Result<Doctor> {
    Ok(Doctor {
        id: row.get(0)?,
        full_name: row.get(1)?,
        phone: row.get(2)?,
        brigade_number: row.get(3)?,
        polyclinic_name: row.get(4)?,
        birth_date: row.get(5)?,
        neighborhood_id: row.get(6)?,
        neighborhood_name: row.get(7)?,
    })
}

pub fn insert_doctor(conn: &Connection, input: &DoctorInput) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO doctors (full_name, phone, brigade_number, polyclinic_name, birth_date, neighborhood_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            input.full_name,
            input.phone,
            input.brigade_number,
            input.polyclinic_name,
            input.birth_date,
            input.neighborhood_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_doctors(
    conn: &Connection,
    scope: &SqlPredicate,
    filter: &StaffFilter,
) -> Result<Vec<Doctor>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions
        .and(scope)
        .and_opt("n.district_id", filter.district_id)
        .and_opt("doc.neighborhood_id", filter.neighborhood_id)
        .and_search(&["doc.full_name", "doc.polyclinic_name"], filter.q.as_deref());
    let sql = format!("{DOCTOR_SELECT}{} ORDER BY doc.full_name", conditions.where_clause());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), doctor_from_row)?;
    rows.map(|r| r.map_err(DatabaseError::from)).collect()
}

pub fn get_doctor(
    conn: &Connection,
    id: i64,
    scope: &SqlPredicate,
) -> Result<Option<Doctor>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and_eq("doc.id", id).and(scope);
    let sql = format!("{DOCTOR_SELECT}{}", conditions.where_clause());
    Ok(conn.query_row(&sql, conditions.params(), doctor_from_row).optional()?)
}

pub fn update_doctor(conn: &Connection, id: i64, input: &DoctorInput) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE doctors SET full_name = ?1, phone = ?2, brigade_number = ?3, polyclinic_name = ?4,
         birth_date = ?5, neighborhood_id = ?6 WHERE id = ?7",
        params![
            input.full_name,
            input.phone,
            input.brigade_number,
            input.polyclinic_name,
            input.birth_date,
            input.neighborhood_id,
            id,
        ],
    )?;
    expect_changed(changed, "Doctor", id)
}

pub fn delete_doctor(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM doctors WHERE id = ?1", params![id])?;
    expect_changed(changed, "Doctor", id)
}

pub fn count_doctors(conn: &Connection, scope: &SqlPredicate) -> Result<i64, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and(scope);
    let sql = format!(
        "SELECT COUNT(*) FROM doctors doc
         JOIN neighborhoods n ON n.id = doc.neighborhood_id
         JOIN districts d ON d.id = n.district_id{}",
        conditions.where_clause()
    );
    Ok(conn.query_row(&sql, conditions.params(), |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use chrono::NaiveDate;

    fn doctor(hood: i64, name: &str) -> DoctorInput {
        DoctorInput {
            full_name: name.into(),
            phone: Some("+998901234567".into()),
            brigade_number: Some("3".into()),
            polyclinic_name: Some("2-son oilaviy poliklinika".into()),
            birth_date: NaiveDate::from_ymd_opt(1980, 4, 12),
            neighborhood_id: hood,
        }
    }

    #[test]
    fn insert_and_get_round_trips_birth_date() {
        let (conn, seed) = fixtures::seeded();
        let id = insert_doctor(&conn, &doctor(seed.hood_a1, "Karimova Lola")).unwrap();
        let got = get_doctor(&conn, id, &SqlPredicate::always()).unwrap().unwrap();
        assert_eq!(got.birth_date, NaiveDate::from_ymd_opt(1980, 4, 12));
        assert_eq!(got.neighborhood_name, "Navbahor");
    }

    #[test]
    fn scoped_listing_and_count() {
        let (conn, seed) = fixtures::seeded();
        insert_doctor(&conn, &doctor(seed.hood_a1, "A")).unwrap();
        insert_doctor(&conn, &doctor(seed.hood_b1, "B")).unwrap();

        let scope = SqlPredicate::eq("n.district_id", seed.district_b);
        let listed = list_doctors(&conn, &scope, &StaffFilter::default()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].full_name, "B");
        assert_eq!(count_doctors(&conn, &scope).unwrap(), 1);
    }

    #[test]
    fn update_missing_doctor_is_not_found() {
        let (conn, seed) = fixtures::seeded();
        let err = update_doctor(&conn, 404, &doctor(seed.hood_a1, "X")).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
