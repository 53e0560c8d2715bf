//! Patient save rules, roster listing and the per-role field policy.
//!
//! Save rules applied on every write:
//! - a newly attached evidentiary file stamps its event date to today;
//! - an aggressive patient's interval is capped at 30 days (absent counts
//!   as uncapped);
//! - required text and length limits are enforced.

use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::authorization::{scope_predicate, Role, ScopeTarget};
use crate::config::{AGGRESSIVE_MAX_INTERVAL_DAYS, MAX_EXAMINATION_INTERVAL_DAYS};
use crate::db::repository::{self, get_inspector, get_neighborhood, get_psychiatrist};
use crate::db::DatabaseError;
use crate::examination::{evaluate, ExaminationStatus};
use crate::models::*;
use crate::uploads::{discard_upload, store_upload, UploadError};
use crate::validation::{max_chars, require_text, ValidationError};

const FULL_NAME_MAX: usize = 100;
const PINFL_MAX: usize = 14;
const ADDRESS_MAX: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("Patient not found: {0}")]
    NotFound(i64),
    #[error("Not allowed: {0}")]
    Forbidden(String),
}

/// A patient with its computed examination status.
#[derive(Debug, Clone, Serialize)]
pub struct PatientCard {
    #[serde(flatten)]
    pub patient: Patient,
    #[serde(flatten)]
    pub status: ExaminationStatus,
    pub days_left: Option<i64>,
    pub urgency: Option<Urgency>,
}

impl PatientCard {
    pub fn new(patient: Patient, today: NaiveDate) -> Self {
        let status = evaluate(&patient.dates, patient.max_examination_interval, today);
        Self {
            days_left: status.days_left(today),
            urgency: status.urgency(today),
            patient,
            status,
        }
    }
}

/// Scoped choices for the roster filter controls.
#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub districts: Vec<District>,
    pub neighborhoods: Vec<Neighborhood>,
    pub psychiatrists: Vec<Psychiatrist>,
    pub inspectors: Vec<Inspector>,
}

// ═══════════════════════════════════════════════════════════
// Save rules
// ═══════════════════════════════════════════════════════════

/// Cap the interval of aggressive patients.
pub fn clamp_interval(input: &mut PatientInput) {
    if input.is_aggressive {
        match input.max_examination_interval {
            Some(days) if days <= AGGRESSIVE_MAX_INTERVAL_DAYS => {}
            _ => input.max_examination_interval = Some(AGGRESSIVE_MAX_INTERVAL_DAYS),
        }
    }
}

/// Stamp today's date on every event whose stored file changed to a new one.
pub fn stamp_new_files(previous: &EventFiles, next: &EventFiles, dates: &mut EventDates, today: NaiveDate) {
    for &event in TrackedEvent::ALL {
        let new_file = next.get(event);
        if new_file.is_some() && new_file != previous.get(event) {
            dates.set(event, Some(today));
        }
    }
}

pub fn validate(input: &PatientInput) -> Result<(), ValidationError> {
    require_text("full_name", &input.full_name, FULL_NAME_MAX)?;
    require_text("pinfl", &input.pinfl, PINFL_MAX)?;
    max_chars("address", input.address.as_deref(), ADDRESS_MAX)?;
    if let Some(days) = input.max_examination_interval {
        if days < 1 {
            return Err(ValidationError::TooSmall { field: "max_examination_interval", min: 1 });
        }
        if days > MAX_EXAMINATION_INTERVAL_DAYS {
            return Err(ValidationError::TooLarge {
                field: "max_examination_interval",
                max: i64::from(MAX_EXAMINATION_INTERVAL_DAYS),
            });
        }
    }
    Ok(())
}

fn prepare(mut input: PatientInput) -> Result<PatientInput, ValidationError> {
    input.full_name = input.full_name.trim().to_string();
    input.pinfl = input.pinfl.trim().to_string();
    validate(&input)?;
    clamp_interval(&mut input);
    Ok(input)
}

/// The target neighborhood must be visible to the caller.
fn ensure_neighborhood_in_scope(conn: &Connection, role: &Role, neighborhood_id: i64) -> Result<(), PatientError> {
    let scope = scope_predicate(role, ScopeTarget::Neighborhood);
    if get_neighborhood(conn, neighborhood_id, &scope)?.is_none() {
        return Err(PatientError::Forbidden(format!(
            "neighborhood {neighborhood_id} is outside your area"
        )));
    }
    Ok(())
}

/// The inspector must be visible to the caller and serve the patient's
/// neighborhood.
fn ensure_inspector_in_scope(conn: &Connection, role: &Role, input: &PatientInput) -> Result<(), PatientError> {
    let scope = scope_predicate(role, ScopeTarget::Inspector);
    let inspector = get_inspector(conn, input.inspector_id, &scope)?.ok_or_else(|| {
        PatientError::Forbidden(format!("inspector {} is outside your area", input.inspector_id))
    })?;
    if inspector.neighborhood_id != input.neighborhood_id {
        return Err(ValidationError::Invalid(format!(
            "inspector {} does not serve neighborhood {}",
            inspector.id, input.neighborhood_id
        ))
        .into());
    }
    Ok(())
}

fn ensure_psychiatrist_in_scope(
    conn: &Connection,
    role: &Role,
    psychiatrist_id: Option<i64>,
) -> Result<(), PatientError> {
    let Some(id) = psychiatrist_id else {
        return Ok(());
    };
    let scope = scope_predicate(role, ScopeTarget::Psychiatrist);
    if get_psychiatrist(conn, id, &scope)?.is_none() {
        return Err(PatientError::Forbidden(format!("psychiatrist {id} is outside your area")));
    }
    Ok(())
}

fn ensure_admin(role: &Role, action: &str) -> Result<(), PatientError> {
    if role.is_admin_tier() {
        Ok(())
    } else {
        Err(PatientError::Forbidden(format!("{} may not {action}", role.kind())))
    }
}

// ═══════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════

fn load(conn: &Connection, role: &Role, id: i64) -> Result<Patient, PatientError> {
    let scope = scope_predicate(role, ScopeTarget::Patient);
    repository::get_patient(conn, id, &scope)?.ok_or(PatientError::NotFound(id))
}

pub fn get_card(conn: &Connection, role: &Role, id: i64, today: NaiveDate) -> Result<PatientCard, PatientError> {
    Ok(PatientCard::new(load(conn, role, id)?, today))
}

/// Scoped roster with examination status; `is_overdue` filters on the
/// computed status.
pub fn list_roster(
    conn: &Connection,
    role: &Role,
    filter: &PatientFilter,
    today: NaiveDate,
) -> Result<Vec<PatientCard>, DatabaseError> {
    let scope = scope_predicate(role, ScopeTarget::Patient);
    let cards = repository::list_patients(conn, &scope, filter)?
        .into_iter()
        .map(|p| PatientCard::new(p, today))
        .filter(|card| filter.is_overdue.map_or(true, |want| card.status.is_overdue == want))
        .collect();
    Ok(cards)
}

pub fn create_patient(conn: &Connection, role: &Role, input: PatientInput) -> Result<i64, PatientError> {
    ensure_admin(role, "create patients")?;
    ensure_neighborhood_in_scope(conn, role, input.neighborhood_id)?;
    ensure_inspector_in_scope(conn, role, &input)?;
    ensure_psychiatrist_in_scope(conn, role, input.psychiatrist_id)?;
    let input = prepare(input)?;
    let id = repository::insert_patient(conn, &input, &EventFiles::default())?;
    tracing::info!(patient_id = id, neighborhood_id = input.neighborhood_id, "Patient created");
    Ok(id)
}

/// Apply an edit. Changing a field outside the role's policy is refused.
pub fn update_patient(conn: &Connection, role: &Role, id: i64, input: PatientInput) -> Result<(), PatientError> {
    let current = load(conn, role, id)?;
    let changed = input.changed_fields(&PatientInput::from(&current));
    if let Some(field) = changed.iter().find(|f| !role.can_edit(**f)) {
        return Err(PatientError::Forbidden(format!(
            "{} may not change {}",
            role.kind(),
            field.as_str()
        )));
    }
    if changed.contains(&PatientField::Neighborhood) {
        ensure_neighborhood_in_scope(conn, role, input.neighborhood_id)?;
    }
    if changed.contains(&PatientField::Neighborhood) || changed.contains(&PatientField::Inspector) {
        ensure_inspector_in_scope(conn, role, &input)?;
    }
    if changed.contains(&PatientField::Psychiatrist) {
        ensure_psychiatrist_in_scope(conn, role, input.psychiatrist_id)?;
    }

    let mut input = prepare(input)?;
    if input.max_examination_interval.is_none() {
        input.max_examination_interval = Some(current.max_examination_interval);
        clamp_interval(&mut input);
    }
    repository::update_patient(conn, id, &input, &current.files)?;
    tracing::info!(patient_id = id, changed = changed.len(), "Patient updated");
    Ok(())
}

/// Store an evidentiary file for `event` and stamp its date.
#[allow(clippy::too_many_arguments)]
pub fn attach_file(
    conn: &Connection,
    role: &Role,
    media_root: &Path,
    id: i64,
    event: TrackedEvent,
    filename: &str,
    bytes: &[u8],
    today: NaiveDate,
) -> Result<PatientCard, PatientError> {
    let current = load(conn, role, id)?;
    if !role.can_edit(event.file_field()) {
        return Err(PatientError::Forbidden(format!(
            "{} may not upload {}",
            role.kind(),
            event.file_column()
        )));
    }

    let path = store_upload(media_root, event, id, filename, bytes, today)?;
    let mut files = current.files.clone();
    files.set(event, Some(path.clone()));

    let mut input = PatientInput::from(&current);
    stamp_new_files(&current.files, &files, &mut input.dates, today);
    clamp_interval(&mut input);
    if let Err(e) = repository::update_patient(conn, id, &input, &files) {
        discard_upload(media_root, &path);
        return Err(e.into());
    }

    get_card(conn, role, id, today)
}

pub fn delete_patient(conn: &Connection, role: &Role, id: i64) -> Result<(), PatientError> {
    ensure_admin(role, "delete patients")?;
    load(conn, role, id)?;
    repository::delete_patient(conn, id)?;
    tracing::info!(patient_id = id, "Patient deleted");
    Ok(())
}

pub fn filter_options(conn: &Connection, role: &Role) -> Result<FilterOptions, DatabaseError> {
    let staff = StaffFilter::default();
    Ok(FilterOptions {
        districts: repository::list_districts(conn, &scope_predicate(role, ScopeTarget::District), None)?,
        neighborhoods: repository::list_neighborhoods(
            conn,
            &scope_predicate(role, ScopeTarget::Neighborhood),
            None,
            None,
        )?,
        psychiatrists: repository::list_psychiatrists(
            conn,
            &scope_predicate(role, ScopeTarget::Psychiatrist),
            &staff,
        )?,
        inspectors: repository::list_inspectors(conn, &scope_predicate(role, ScopeTarget::Inspector), &staff)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::resolve_role;
    use crate::db::repository::fixtures;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn input(seed: &fixtures::Seed) -> PatientInput {
        PatientInput {
            full_name: "Ergashev Sardor".into(),
            pinfl: "31507850123456".into(),
            neighborhood_id: seed.hood_a1,
            inspector_id: seed.inspector_a1,
            ..Default::default()
        }
    }

    #[test]
    fn aggressive_interval_is_clamped() {
        let mut i = PatientInput { is_aggressive: true, ..Default::default() };
        clamp_interval(&mut i);
        assert_eq!(i.max_examination_interval, Some(30));

        i.max_examination_interval = Some(90);
        clamp_interval(&mut i);
        assert_eq!(i.max_examination_interval, Some(30));

        i.max_examination_interval = Some(14);
        clamp_interval(&mut i);
        assert_eq!(i.max_examination_interval, Some(14));

        let mut calm = PatientInput { max_examination_interval: Some(90), ..Default::default() };
        clamp_interval(&mut calm);
        assert_eq!(calm.max_examination_interval, Some(90));
    }

    #[test]
    fn new_file_stamps_date_and_same_file_does_not() {
        let today = day(2025, 3, 3);
        let old_visit = NaiveDate::from_ymd_opt(2025, 1, 1);
        let previous = EventFiles {
            last_home_visit_by_doctor_file: Some("uploads/a.pdf".into()),
            ..Default::default()
        };
        let mut dates = EventDates { last_home_visit_by_doctor_date: old_visit, ..Default::default() };

        stamp_new_files(&previous, &previous.clone(), &mut dates, today);
        assert_eq!(dates.last_home_visit_by_doctor_date, old_visit);

        let mut next = previous.clone();
        next.set(TrackedEvent::HomeVisit, Some("uploads/b.pdf".into()));
        next.set(TrackedEvent::HospitalizationTo, Some("uploads/c.pdf".into()));
        stamp_new_files(&previous, &next, &mut dates, today);
        assert_eq!(dates.last_home_visit_by_doctor_date, Some(today));
        assert_eq!(dates.last_hospitalization_to, Some(today));
        assert_eq!(dates.last_psychiatric_appointment_date, None);
    }

    #[test]
    fn validation_rejects_bad_input() {
        let mut i = PatientInput { full_name: "A".into(), pinfl: "123456789012345".into(), ..Default::default() };
        assert_eq!(validate(&i), Err(ValidationError::TooLong { field: "pinfl", max: 14 }));
        i.pinfl = "1".into();
        i.max_examination_interval = Some(0);
        assert!(matches!(validate(&i), Err(ValidationError::TooSmall { .. })));
        i.max_examination_interval = Some(3650);
        assert_eq!(validate(&i), Ok(()));
        i.max_examination_interval = Some(3651);
        assert_eq!(
            validate(&i),
            Err(ValidationError::TooLarge { field: "max_examination_interval", max: 3650 })
        );
    }

    #[test]
    fn admin_creates_with_defaults_and_clamp() {
        let (conn, seed) = fixtures::seeded();
        let role = resolve_role(&conn, seed.district_admin_account).unwrap();
        let mut i = input(&seed);
        i.is_aggressive = true;
        i.max_examination_interval = Some(60);
        let id = create_patient(&conn, &role, i).unwrap();

        let card = get_card(&conn, &role, id, day(2025, 1, 1)).unwrap();
        assert_eq!(card.patient.max_examination_interval, 30);
        assert!(card.status.is_overdue);
    }

    #[test]
    fn district_admin_cannot_create_outside_district() {
        let (conn, seed) = fixtures::seeded();
        let role = resolve_role(&conn, seed.district_admin_account).unwrap();
        let mut i = input(&seed);
        i.neighborhood_id = seed.hood_b1;
        i.inspector_id = seed.inspector_b1;
        assert!(matches!(create_patient(&conn, &role, i), Err(PatientError::Forbidden(_))));
    }

    #[test]
    fn inspector_cannot_create() {
        let (conn, seed) = fixtures::seeded();
        let role = resolve_role(&conn, seed.inspector_a1_account).unwrap();
        assert!(matches!(create_patient(&conn, &role, input(&seed)), Err(PatientError::Forbidden(_))));
    }

    #[test]
    fn inspector_edits_only_permitted_fields() {
        let (conn, seed) = fixtures::seeded();
        let id = create_patient(&conn, &Role::Unrestricted, input(&seed)).unwrap();
        let role = resolve_role(&conn, seed.inspector_a1_account).unwrap();
        let current = PatientInput::from(&get_card(&conn, &role, id, day(2025, 1, 1)).unwrap().patient);

        let mut ok = current.clone();
        ok.where_is_now = Some(WhereIsNow::OutOfTheArea);
        ok.is_convicted = true;
        update_patient(&conn, &role, id, ok).unwrap();

        let mut bad = current;
        bad.full_name = "Renamed".into();
        let err = update_patient(&conn, &role, id, bad).unwrap_err();
        assert!(matches!(err, PatientError::Forbidden(msg) if msg.contains("full_name")));
    }

    #[test]
    fn out_of_scope_patient_is_not_found() {
        let (conn, seed) = fixtures::seeded();
        let id = fixtures::patient(&conn, "B", seed.hood_b1, seed.inspector_b1, None, false);
        let role = resolve_role(&conn, seed.district_admin_account).unwrap();
        assert!(matches!(get_card(&conn, &role, id, day(2025, 1, 1)), Err(PatientError::NotFound(_))));
        assert!(matches!(delete_patient(&conn, &role, id), Err(PatientError::NotFound(_))));
    }

    #[test]
    fn officer_upload_stamps_home_visit() {
        let (conn, seed) = fixtures::seeded();
        let media = tempfile::tempdir().unwrap();
        let id = create_patient(&conn, &Role::Unrestricted, input(&seed)).unwrap();
        let officer = resolve_role(&conn, seed.officer_a1_account).unwrap();
        let today = day(2025, 4, 2);

        let card = attach_file(&conn, &officer, media.path(), id, TrackedEvent::HomeVisit, "v.pdf", b"%PDF", today)
            .unwrap();
        assert_eq!(card.patient.dates.last_home_visit_by_doctor_date, Some(today));
        assert_eq!(
            card.patient.files.last_home_visit_by_doctor_file.as_deref(),
            Some("uploads/home_visit_by_doctor/1/20250402/v.pdf")
        );
        assert!(!card.status.is_overdue);

        let err = attach_file(
            &conn,
            &officer,
            media.path(),
            id,
            TrackedEvent::PsychiatricAppointment,
            "a.pdf",
            b"%PDF",
            today,
        )
        .unwrap_err();
        assert!(matches!(err, PatientError::Forbidden(_)));
    }

    #[test]
    fn roster_filters_by_computed_overdue() {
        let (conn, seed) = fixtures::seeded();
        let today = day(2025, 5, 1);
        let mut seen = input(&seed);
        seen.full_name = "Seen".into();
        seen.dates.last_psychiatric_appointment_date = Some(day(2025, 4, 20));
        create_patient(&conn, &Role::Unrestricted, seen).unwrap();
        let mut unseen = input(&seed);
        unseen.full_name = "Unseen".into();
        create_patient(&conn, &Role::Unrestricted, unseen).unwrap();

        let overdue = PatientFilter { is_overdue: Some(true), ..Default::default() };
        let names: Vec<_> = list_roster(&conn, &Role::Unrestricted, &overdue, today)
            .unwrap()
            .into_iter()
            .map(|c| c.patient.full_name)
            .collect();
        assert_eq!(names, vec!["Unseen"]);

        let all = list_roster(&conn, &Role::Unrestricted, &PatientFilter::default(), today).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn oversized_interval_is_rejected_on_create() {
        let (conn, seed) = fixtures::seeded();
        let mut i = input(&seed);
        i.max_examination_interval = Some(i32::MAX);
        let err = create_patient(&conn, &Role::Unrestricted, i).unwrap_err();
        assert!(matches!(err, PatientError::Validation(ValidationError::TooLarge { .. })));
    }

    #[test]
    fn stored_oversized_interval_lists_as_overdue() {
        let (conn, seed) = fixtures::seeded();
        let id = fixtures::patient(&conn, "Legacy", seed.hood_a1, seed.inspector_a1, None, false);
        conn.execute(
            "UPDATE patients SET max_examination_interval = ?1, last_home_visit_by_doctor_date = '2025-01-01'
             WHERE id = ?2",
            rusqlite::params![i32::MAX, id],
        )
        .unwrap();

        let cards = list_roster(&conn, &Role::Unrestricted, &PatientFilter::default(), day(2025, 2, 1)).unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].status.deadline, None);
        assert!(cards[0].status.is_overdue);
    }

    #[test]
    fn district_admin_cannot_assign_staff_from_another_district() {
        let (conn, seed) = fixtures::seeded();
        let role = resolve_role(&conn, seed.district_admin_account).unwrap();

        let mut foreign_inspector = input(&seed);
        foreign_inspector.inspector_id = seed.inspector_b1;
        let err = create_patient(&conn, &role, foreign_inspector).unwrap_err();
        assert!(matches!(err, PatientError::Forbidden(msg) if msg.contains("inspector")));

        let mut foreign_psychiatrist = input(&seed);
        foreign_psychiatrist.psychiatrist_id = Some(seed.psychiatrist_b);
        let err = create_patient(&conn, &role, foreign_psychiatrist).unwrap_err();
        assert!(matches!(err, PatientError::Forbidden(msg) if msg.contains("psychiatrist")));

        let b_inspector = resolve_role(&conn, seed.inspector_b1_account).unwrap();
        let roster = list_roster(&conn, &b_inspector, &PatientFilter::default(), day(2025, 1, 1)).unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn inspector_must_serve_the_patient_neighborhood() {
        let (conn, seed) = fixtures::seeded();
        let mut i = input(&seed);
        i.inspector_id = seed.inspector_a2;
        let err = create_patient(&conn, &Role::Unrestricted, i).unwrap_err();
        assert!(matches!(err, PatientError::Validation(ValidationError::Invalid(_))));
    }

    #[test]
    fn update_cannot_move_staff_out_of_scope() {
        let (conn, seed) = fixtures::seeded();
        let role = resolve_role(&conn, seed.district_admin_account).unwrap();
        let mut i = input(&seed);
        i.psychiatrist_id = Some(seed.psychiatrist_a);
        let id = create_patient(&conn, &role, i).unwrap();
        let current = PatientInput::from(&get_card(&conn, &role, id, day(2025, 1, 1)).unwrap().patient);

        let mut to_b = current.clone();
        to_b.inspector_id = seed.inspector_b1;
        assert!(matches!(update_patient(&conn, &role, id, to_b), Err(PatientError::Forbidden(_))));

        let mut to_b = current.clone();
        to_b.psychiatrist_id = Some(seed.psychiatrist_b);
        assert!(matches!(update_patient(&conn, &role, id, to_b), Err(PatientError::Forbidden(_))));

        let mut moved = current;
        moved.neighborhood_id = seed.hood_a2;
        moved.inspector_id = seed.inspector_a2;
        update_patient(&conn, &role, id, moved).unwrap();
        let card = get_card(&conn, &role, id, day(2025, 1, 1)).unwrap();
        assert_eq!(card.patient.inspector_id, seed.inspector_a2);
        assert_eq!(card.patient.psychiatrist_id, Some(seed.psychiatrist_a));
    }

    #[test]
    fn failed_save_removes_the_stored_upload() {
        let (conn, seed) = fixtures::seeded();
        let media = tempfile::tempdir().unwrap();
        let id = create_patient(&conn, &Role::Unrestricted, input(&seed)).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER patients_locked BEFORE UPDATE ON patients
             BEGIN SELECT RAISE(ABORT, 'patients are locked'); END;",
        )
        .unwrap();

        let today = day(2025, 4, 2);
        let err = attach_file(
            &conn,
            &Role::Unrestricted,
            media.path(),
            id,
            TrackedEvent::HomeVisit,
            "v.pdf",
            b"%PDF",
            today,
        )
        .unwrap_err();
        assert!(matches!(err, PatientError::Database(_)));
        assert!(!media.path().join(format!("uploads/home_visit_by_doctor/{id}/20250402/v.pdf")).exists());
    }

    #[test]
    fn filter_options_follow_scope() {
        let (conn, seed) = fixtures::seeded();
        let role = resolve_role(&conn, seed.district_admin_account).unwrap();
        let options = filter_options(&conn, &role).unwrap();
        assert_eq!(options.districts.len(), 1);
        assert_eq!(options.neighborhoods.len(), 2);
        assert_eq!(options.psychiatrists.len(), 1);
        assert_eq!(options.inspectors.len(), 2);
    }
}
