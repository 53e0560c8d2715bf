use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::config::DEFAULT_EXAMINATION_INTERVAL_DAYS;
use crate::db::DatabaseError;
use crate::models::*;

use super::{expect_changed, parse_opt_enum, Conditions, SqlPredicate};

const PATIENT_SELECT: &str = "SELECT p.id, p.full_name, p.pinfl, p.birth_date, p.is_aggressive, p.is_convicted,
            p.is_abroad_long_term, p.max_examination_interval, p.neighborhood_id, p.inspector_id,
            p.psychiatrist_id, p.address,
            p.last_psychiatric_appointment_date, p.last_home_visit_by_doctor_date,
            p.last_hospitalization_from, p.last_hospitalization_to,
            p.last_psychiatric_appointment_file, p.last_home_visit_by_doctor_file,
            p.last_hospitalization_from_file, p.last_hospitalization_to_file,
            p.reason, p.receiving_supportive_therapy, p.reason_for_special_consideration_id,
            p.description_for_special_consideration, p.social_domestic_environment_id,
            p.alcohol_and_drug_use, p.where_is_now, p.description_where_is_now,
            n.name, n.district_id, d.name, d.region_id, i.full_name, ps.full_name, rs.name, se.name
     FROM patients p
     JOIN neighborhoods n ON n.id = p.neighborhood_id
     JOIN districts d ON d.id = n.district_id
     JOIN inspectors i ON i.id = p.inspector_id
     LEFT JOIN psychiatrists ps ON ps.id = p.psychiatrist_id
     LEFT JOIN reasons_for_special_consideration rs ON rs.id = p.reason_for_special_consideration_id
     LEFT JOIN social_domestic_environments se ON se.id = p.social_domestic_environment_id";

fn patient_from_row(row: &Row) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: row.get(0)?,
        full_name: row.get(1)?,
        pinfl: row.get(2)?,
        birth_date: row.get(3)?,
        is_aggressive: row.get(4)?,
        is_convicted: row.get(5)?,
        is_abroad_long_term: row.get(6)?,
        max_examination_interval: row.get(7)?,
        neighborhood_id: row.get(8)?,
        inspector_id: row.get(9)?,
        psychiatrist_id: row.get(10)?,
        address: row.get(11)?,
        dates: EventDates {
            last_psychiatric_appointment_date: row.get(12)?,
            last_home_visit_by_doctor_date: row.get(13)?,
            last_hospitalization_from: row.get(14)?,
            last_hospitalization_to: row.get(15)?,
        },
        files: EventFiles {
            last_psychiatric_appointment_file: row.get(16)?,
            last_home_visit_by_doctor_file: row.get(17)?,
            last_hospitalization_from_file: row.get(18)?,
            last_hospitalization_to_file: row.get(19)?,
        },
        reason: row.get(20)?,
        receiving_supportive_therapy: parse_opt_enum(row.get(21)?)?,
        reason_for_special_consideration_id: row.get(22)?,
        description_for_special_consideration: row.get(23)?,
        social_domestic_environment_id: row.get(24)?,
        alcohol_and_drug_use: parse_opt_enum(row.get(25)?)?,
        where_is_now: parse_opt_enum(row.get(26)?)?,
        description_where_is_now: row.get(27)?,
        relations: PatientRelations {
            neighborhood_name: row.get(28)?,
            district_id: row.get(29)?,
            district_name: row.get(30)?,
            region_id: row.get(31)?,
            inspector_name: row.get(32)?,
            psychiatrist_name: row.get(33)?,
            reason_for_special_consideration_name: row.get(34)?,
            social_domestic_environment_name: row.get(35)?,
        },
    })
}

/// Insert a patient row as given. Save rules (date stamping, interval
/// clamp) are applied by the caller.
pub fn insert_patient(
    conn: &Connection,
    input: &PatientInput,
    files: &EventFiles,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patients (full_name, pinfl, birth_date, is_aggressive, is_convicted,
         is_abroad_long_term, max_examination_interval, neighborhood_id, inspector_id, psychiatrist_id,
         address, last_psychiatric_appointment_date, last_psychiatric_appointment_file,
         last_home_visit_by_doctor_date, last_home_visit_by_doctor_file,
         last_hospitalization_from, last_hospitalization_from_file,
         last_hospitalization_to, last_hospitalization_to_file,
         reason, receiving_supportive_therapy, reason_for_special_consideration_id,
         description_for_special_consideration, social_domestic_environment_id,
         alcohol_and_drug_use, where_is_now, description_where_is_now)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18,
                 ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)",
        params![
            input.full_name,
            input.pinfl,
            input.birth_date,
            input.is_aggressive,
            input.is_convicted,
            input.is_abroad_long_term,
            input.max_examination_interval.unwrap_or(DEFAULT_EXAMINATION_INTERVAL_DAYS),
            input.neighborhood_id,
            input.inspector_id,
            input.psychiatrist_id,
            input.address,
            input.dates.last_psychiatric_appointment_date,
            files.last_psychiatric_appointment_file,
            input.dates.last_home_visit_by_doctor_date,
            files.last_home_visit_by_doctor_file,
            input.dates.last_hospitalization_from,
            files.last_hospitalization_from_file,
            input.dates.last_hospitalization_to,
            files.last_hospitalization_to_file,
            input.reason,
            input.receiving_supportive_therapy.map(|v| v.as_str()),
            input.reason_for_special_consideration_id,
            input.description_for_special_consideration,
            input.social_domestic_environment_id,
            input.alcohol_and_drug_use.map(|v| v.as_str()),
            input.where_is_now.map(|v| v.as_str()),
            input.description_where_is_now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_patient(
    conn: &Connection,
    id: i64,
    input: &PatientInput,
    files: &EventFiles,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET full_name = ?1, pinfl = ?2, birth_date = ?3, is_aggressive = ?4,
         is_convicted = ?5, is_abroad_long_term = ?6, max_examination_interval = ?7,
         neighborhood_id = ?8, inspector_id = ?9, psychiatrist_id = ?10, address = ?11,
         last_psychiatric_appointment_date = ?12, last_psychiatric_appointment_file = ?13,
         last_home_visit_by_doctor_date = ?14, last_home_visit_by_doctor_file = ?15,
         last_hospitalization_from = ?16, last_hospitalization_from_file = ?17,
         last_hospitalization_to = ?18, last_hospitalization_to_file = ?19,
         reason = ?20, receiving_supportive_therapy = ?21, reason_for_special_consideration_id = ?22,
         description_for_special_consideration = ?23, social_domestic_environment_id = ?24,
         alcohol_and_drug_use = ?25, where_is_now = ?26, description_where_is_now = ?27
         WHERE id = ?28",
        params![
            input.full_name,
            input.pinfl,
            input.birth_date,
            input.is_aggressive,
            input.is_convicted,
            input.is_abroad_long_term,
            input.max_examination_interval.unwrap_or(DEFAULT_EXAMINATION_INTERVAL_DAYS),
            input.neighborhood_id,
            input.inspector_id,
            input.psychiatrist_id,
            input.address,
            input.dates.last_psychiatric_appointment_date,
            files.last_psychiatric_appointment_file,
            input.dates.last_home_visit_by_doctor_date,
            files.last_home_visit_by_doctor_file,
            input.dates.last_hospitalization_from,
            files.last_hospitalization_from_file,
            input.dates.last_hospitalization_to,
            files.last_hospitalization_to_file,
            input.reason,
            input.receiving_supportive_therapy.map(|v| v.as_str()),
            input.reason_for_special_consideration_id,
            input.description_for_special_consideration,
            input.social_domestic_environment_id,
            input.alcohol_and_drug_use.map(|v| v.as_str()),
            input.where_is_now.map(|v| v.as_str()),
            input.description_where_is_now,
            id,
        ],
    )?;
    expect_changed(changed, "Patient", id)
}

pub fn get_patient(
    conn: &Connection,
    id: i64,
    scope: &SqlPredicate,
) -> Result<Option<Patient>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions.and_eq("p.id", id).and(scope);
    let sql = format!("{PATIENT_SELECT}{}", conditions.where_clause());
    conn.query_row(&sql, conditions.params(), |row| Ok(patient_from_row(row)))
        .optional()?
        .transpose()
}

/// Scoped roster ordered by name. `filter.is_overdue` is not applied here.
pub fn list_patients(
    conn: &Connection,
    scope: &SqlPredicate,
    filter: &PatientFilter,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut conditions = Conditions::new();
    conditions
        .and(scope)
        .and_opt("n.district_id", filter.district_id)
        .and_opt("p.neighborhood_id", filter.neighborhood_id)
        .and_opt("p.psychiatrist_id", filter.psychiatrist_id)
        .and_opt("p.inspector_id", filter.inspector_id)
        .and_opt("p.is_aggressive", filter.is_aggressive)
        .and_opt("p.is_convicted", filter.is_convicted)
        .and_opt("p.is_abroad_long_term", filter.is_abroad_long_term)
        .and_search(&["p.full_name", "p.pinfl", "p.address"], filter.q.as_deref());
    let sql = format!(
        "{PATIENT_SELECT}{} ORDER BY p.full_name, p.id",
        conditions.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(conditions.params(), |row| Ok(patient_from_row(row)))?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(row??);
    }
    Ok(patients)
}

pub fn delete_patient(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
    expect_changed(changed, "Patient", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures;
    use chrono::NaiveDate;

    fn input(seed: &fixtures::Seed) -> PatientInput {
        PatientInput {
            full_name: "Ergashev Sardor".into(),
            pinfl: "31507850123456".into(),
            birth_date: NaiveDate::from_ymd_opt(1985, 7, 15),
            neighborhood_id: seed.hood_a1,
            inspector_id: seed.inspector_a1,
            psychiatrist_id: Some(seed.psychiatrist_a),
            receiving_supportive_therapy: Some(SupportiveTherapy::RarelyReceiving),
            where_is_now: Some(WhereIsNow::AtHome),
            ..Default::default()
        }
    }

    #[test]
    fn insert_and_get_with_relations() {
        let (conn, seed) = fixtures::seeded();
        let files = EventFiles {
            last_home_visit_by_doctor_file: Some("uploads/home_visit_by_doctor/1/20250101/a.pdf".into()),
            ..Default::default()
        };
        let id = insert_patient(&conn, &input(&seed), &files).unwrap();

        let p = get_patient(&conn, id, &SqlPredicate::always()).unwrap().unwrap();
        assert_eq!(p.max_examination_interval, 30);
        assert_eq!(p.receiving_supportive_therapy, Some(SupportiveTherapy::RarelyReceiving));
        assert_eq!(p.files, files);
        assert_eq!(p.relations.district_id, seed.district_a);
        assert_eq!(p.relations.inspector_name, "Aliyev Bobur");
        assert_eq!(p.relations.psychiatrist_name.as_deref(), Some("Rahimova Dilnoza"));
        assert_eq!(p.relations.reason_for_special_consideration_name, None);
    }

    #[test]
    fn list_filters_compose_with_scope() {
        let (conn, seed) = fixtures::seeded();
        fixtures::patient(&conn, "A1", seed.hood_a1, seed.inspector_a1, None, true);
        fixtures::patient(&conn, "A2", seed.hood_a2, seed.inspector_a2, None, false);
        fixtures::patient(&conn, "B1", seed.hood_b1, seed.inspector_b1, None, true);

        let district_a = SqlPredicate::eq("n.district_id", seed.district_a);
        let aggressive = PatientFilter { is_aggressive: Some(true), ..Default::default() };
        let found = list_patients(&conn, &district_a, &aggressive).unwrap();
        assert_eq!(found.iter().map(|p| p.full_name.as_str()).collect::<Vec<_>>(), vec!["A1"]);

        let all = list_patients(&conn, &SqlPredicate::always(), &PatientFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn out_of_scope_patient_is_none() {
        let (conn, seed) = fixtures::seeded();
        let id = fixtures::patient(&conn, "B", seed.hood_b1, seed.inspector_b1, None, false);
        let district_a = SqlPredicate::eq("n.district_id", seed.district_a);
        assert!(get_patient(&conn, id, &district_a).unwrap().is_none());
    }

    #[test]
    fn update_replaces_fields() {
        let (conn, seed) = fixtures::seeded();
        let id = insert_patient(&conn, &input(&seed), &EventFiles::default()).unwrap();
        let mut changed = input(&seed);
        changed.where_is_now = Some(WhereIsNow::InHospital);
        changed.psychiatrist_id = None;
        changed.max_examination_interval = Some(14);
        update_patient(&conn, id, &changed, &EventFiles::default()).unwrap();

        let p = get_patient(&conn, id, &SqlPredicate::always()).unwrap().unwrap();
        assert_eq!(p.where_is_now, Some(WhereIsNow::InHospital));
        assert_eq!(p.psychiatrist_id, None);
        assert_eq!(p.max_examination_interval, 14);
    }

    #[test]
    fn unknown_neighborhood_is_constraint_error() {
        let (conn, seed) = fixtures::seeded();
        let mut bad = input(&seed);
        bad.neighborhood_id = 999;
        assert!(insert_patient(&conn, &bad, &EventFiles::default()).unwrap_err().is_constraint());
    }
}
