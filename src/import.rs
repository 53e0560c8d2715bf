//! Bulk import of legacy spreadsheets and the district/neighborhood list.
//!
//! Each import runs inside a single transaction. Any row that cannot be
//! matched aborts the whole import; `dry_run` validates every row and then
//! rolls back.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::NaiveDate;
use regex::Regex;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::credentials::{generate_token, hash_password, CredentialsError};
use crate::db::repository::*;
use crate::db::DatabaseError;
use crate::models::*;
use crate::patients::clamp_interval;
use crate::validation::{max_chars, ValidationError};

/// First data row (0-based) of the patient roster; rows above are headers.
const PATIENT_FIRST_ROW: u32 = 3;
/// The doctor list has no header rows.
const DOCTOR_FIRST_ROW: u32 = 0;

const CREATED_PSYCHIATRIST_PREFIX: &str = "psixiatr";
const DOCTOR_PHONE_MAX: usize = 13;

static PHONE_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s.,\-]").unwrap());

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Cannot read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook has no worksheets")]
    EmptyWorkbook,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Row {row}: unknown district '{name}'")]
    UnknownDistrict { row: u32, name: String },

    #[error("Row {row}: no neighborhood '{name}' in district '{district}'")]
    UnknownNeighborhood { row: u32, district: String, name: String },

    #[error("Row {row}: neighborhood '{neighborhood}' has no inspector")]
    MissingInspector { row: u32, neighborhood: String },

    #[error("Row {row}, column {column}: cannot read date '{value}'")]
    InvalidDate { row: u32, column: u32, value: String },

    #[error("Row {row}: {source}")]
    Validation { row: u32, source: ValidationError },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Mark every imported patient as aggressive.
    pub aggressive: bool,
    /// Validate and insert, then roll back.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Usernames of accounts created for unknown psychiatrists. They get
    /// a random password and must be reset by an administrator.
    pub created_accounts: Vec<String>,
    pub dry_run: bool,
}

// ═══════════════════════════════════════════
// Cell access
// ═══════════════════════════════════════════

/// One spreadsheet row, addressed by absolute column index.
struct SheetRow<'a> {
    range: &'a Range<Data>,
    row: u32,
}

impl SheetRow<'_> {
    /// 1-based row number as shown in a spreadsheet program.
    fn number(&self) -> u32 {
        self.row + 1
    }

    fn cell(&self, col: u32) -> Option<&Data> {
        self.range
            .get_value((self.row, col))
            .filter(|d| !matches!(d, Data::Empty))
    }

    /// Trimmed text. Whole floats (IDs typed as numbers) lose the `.0`.
    fn text(&self, col: u32) -> Option<String> {
        let text = match self.cell(col)? {
            Data::String(s) => s.trim().to_string(),
            Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
            Data::Int(i) => i.to_string(),
            other => other.to_string().trim().to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    /// Excel date cell or `dd.mm.yyyy` text.
    fn date(&self, col: u32) -> Result<Option<NaiveDate>, ImportError> {
        let invalid = |value: String| ImportError::InvalidDate { row: self.number(), column: col, value };
        match self.cell(col) {
            None => Ok(None),
            Some(Data::String(s)) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                NaiveDate::parse_from_str(s, "%d.%m.%Y")
                    .map(Some)
                    .map_err(|_| invalid(s.to_string()))
            }
            Some(other) => other.as_date().map(Some).ok_or_else(|| invalid(other.to_string())),
        }
    }
}

/// Rows from `first` until the first row whose name column is blank.
fn data_rows(range: &Range<Data>, first: u32, name_col: u32) -> impl Iterator<Item = SheetRow<'_>> {
    let last = range.end().map_or(0, |(row, _)| row + 1);
    (first..last)
        .map(move |row| SheetRow { range, row })
        .take_while(move |r| r.text(name_col).is_some())
}

fn first_sheet(path: &Path) -> Result<Range<Data>, ImportError> {
    let mut workbook = open_workbook_auto(path)?;
    workbook.worksheet_range_at(0).ok_or(ImportError::EmptyWorkbook)?.map_err(ImportError::from)
}

// ═══════════════════════════════════════════
// Legacy value mapping
// ═══════════════════════════════════════════

fn therapy_from_label(label: &str) -> SupportiveTherapy {
    match label {
        "Мунтазам олаяпти" | "Мунтазам оляпти" => SupportiveTherapy::RegularlyReceiving,
        "Камдан кам олаяпти" => SupportiveTherapy::RarelyReceiving,
        "Олмаяпти" => SupportiveTherapy::NotReceiving,
        _ => SupportiveTherapy::QuicklyReceiving,
    }
}

fn substance_use_from_label(label: &str) -> SubstanceUse {
    match label {
        "Истеъмол қилмайди" => SubstanceUse::NotConsume,
        _ => SubstanceUse::Alcohol,
    }
}

fn where_is_now_from_label(label: &str) -> WhereIsNow {
    match label {
        "Уйда" => WhereIsNow::AtHome,
        "Шифохонада" => WhereIsNow::InHospital,
        "Ҳудудидан чиқиб кетган" => WhereIsNow::OutOfTheArea,
        _ => WhereIsNow::AddressUnknown,
    }
}

/// Strip spaces, dots, commas and dashes.
pub fn normalize_phone(raw: &str) -> String {
    PHONE_SEPARATORS.replace_all(raw, "").into_owned()
}

// ═══════════════════════════════════════════
// Patients
// ═══════════════════════════════════════════

/// Import the legacy patient roster.
///
/// Columns (0-based): 1 name, 2 PINFL, 3 birth date, 4 district,
/// 5 neighborhood, 6 address, 7 special-consideration reason, 8 last
/// appointment, 9 last home visit, 10 reason not seen, 11 therapy,
/// 12 social environment, 13 substance use, 14/15 hospitalization
/// from/to, 16 whereabouts, 17 whereabouts note, 18 psychiatrist.
pub fn import_patients(conn: &Connection, path: &Path, options: ImportOptions) -> Result<ImportReport, ImportError> {
    let range = first_sheet(path)?;
    import_patient_rows(conn, &range, options)
}

pub(crate) fn import_patient_rows(
    conn: &Connection,
    range: &Range<Data>,
    options: ImportOptions,
) -> Result<ImportReport, ImportError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let mut report = ImportReport { dry_run: options.dry_run, ..Default::default() };

    for row in data_rows(range, PATIENT_FIRST_ROW, 1) {
        let input = patient_from_row(&tx, &row, options, &mut report)?;
        insert_patient(&tx, &input, &EventFiles::default())?;
        report.imported += 1;
    }

    finish(tx, options.dry_run)?;
    tracing::info!(
        imported = report.imported,
        created_accounts = report.created_accounts.len(),
        dry_run = options.dry_run,
        "Patient import finished"
    );
    Ok(report)
}

fn patient_from_row(
    conn: &Connection,
    row: &SheetRow,
    options: ImportOptions,
    report: &mut ImportReport,
) -> Result<PatientInput, ImportError> {
    let full_name = row.text(1).unwrap_or_default();

    let district_name = row.text(4).unwrap_or_default();
    let district = find_district_by_name(conn, &district_name)?.ok_or_else(|| {
        ImportError::UnknownDistrict { row: row.number(), name: district_name.clone() }
    })?;

    let neighborhood_name = row.text(5).unwrap_or_default();
    let neighborhood = find_neighborhood_by_name(conn, district.id, &neighborhood_name)?.ok_or_else(|| {
        ImportError::UnknownNeighborhood {
            row: row.number(),
            district: district.name.clone(),
            name: neighborhood_name.clone(),
        }
    })?;

    let inspector = find_inspector_by_neighborhood(conn, neighborhood.id)?.ok_or_else(|| {
        ImportError::MissingInspector { row: row.number(), neighborhood: neighborhood.display_name() }
    })?;

    let psychiatrist_id = match row.text(18) {
        Some(name) => Some(psychiatrist_for(conn, district.id, &name, report)?),
        None => None,
    };

    let lookup = |col: u32, kind: LookupKind| -> Result<Option<i64>, DatabaseError> {
        row.text(col).map(|name| get_or_create_lookup(conn, kind, &name)).transpose()
    };

    let mut input = PatientInput {
        full_name,
        pinfl: row.text(2).unwrap_or_default(),
        birth_date: row.date(3)?,
        is_aggressive: options.aggressive,
        neighborhood_id: neighborhood.id,
        inspector_id: inspector.id,
        psychiatrist_id,
        address: row.text(6),
        dates: EventDates {
            last_psychiatric_appointment_date: row.date(8)?,
            last_home_visit_by_doctor_date: row.date(9)?,
            last_hospitalization_from: row.date(14)?,
            last_hospitalization_to: row.date(15)?,
        },
        reason: row.text(10),
        receiving_supportive_therapy: row.text(11).as_deref().map(therapy_from_label),
        reason_for_special_consideration_id: lookup(7, LookupKind::ReasonForSpecialConsideration)?,
        social_domestic_environment_id: lookup(12, LookupKind::SocialDomesticEnvironment)?,
        alcohol_and_drug_use: row.text(13).as_deref().map(substance_use_from_label),
        where_is_now: row.text(16).as_deref().map(where_is_now_from_label),
        description_where_is_now: row.text(17),
        ..Default::default()
    };
    clamp_interval(&mut input);
    crate::patients::validate(&input).map_err(|source| ImportError::Validation { row: row.number(), source })?;
    Ok(input)
}

/// Existing psychiatrist of the district by exact name, or a new one with
/// a fresh `psixiatr<n>` account.
fn psychiatrist_for(
    conn: &Connection,
    district_id: i64,
    full_name: &str,
    report: &mut ImportReport,
) -> Result<i64, ImportError> {
    if let Some(existing) = find_psychiatrist_by_name(conn, district_id, full_name)? {
        return Ok(existing.id);
    }
    let username = next_free_username(conn, CREATED_PSYCHIATRIST_PREFIX)?;
    let password_hash = hash_password(&generate_token())?;
    let user_id = insert_account(conn, &username, &password_hash, Some(full_name), None)?;
    let id = insert_psychiatrist(
        conn,
        &PsychiatristInput {
            full_name: full_name.to_string(),
            phone: None,
            district_id,
            user_id,
        },
    )?;
    tracing::info!(username = %username, district_id, "Created psychiatrist account during import");
    report.created_accounts.push(username);
    Ok(id)
}

// ═══════════════════════════════════════════
// Doctors
// ═══════════════════════════════════════════

/// Import family doctors of one district.
///
/// Columns (0-based): 1 name, 2 birth date, 3 phone, 4 brigade number
/// (merged vertically, so blanks repeat the value above), 5 polyclinic,
/// 6 neighborhood name.
pub fn import_doctors(
    conn: &Connection,
    path: &Path,
    district_id: i64,
    dry_run: bool,
) -> Result<ImportReport, ImportError> {
    let range = first_sheet(path)?;
    import_doctor_rows(conn, &range, district_id, dry_run)
}

pub(crate) fn import_doctor_rows(
    conn: &Connection,
    range: &Range<Data>,
    district_id: i64,
    dry_run: bool,
) -> Result<ImportReport, ImportError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    let district = get_district(&tx, district_id, &SqlPredicate::always())?
        .ok_or_else(|| DatabaseError::not_found("District", district_id))?;
    let mut report = ImportReport { dry_run, ..Default::default() };
    let mut brigade: Option<String> = None;

    for row in data_rows(range, DOCTOR_FIRST_ROW, 1) {
        if let Some(value) = row.text(4) {
            brigade = Some(value);
        }
        let neighborhood_name = row.text(6).unwrap_or_default();
        let neighborhood = find_neighborhood_by_name(&tx, district.id, &neighborhood_name)?.ok_or_else(|| {
            ImportError::UnknownNeighborhood {
                row: row.number(),
                district: district.name.clone(),
                name: neighborhood_name.clone(),
            }
        })?;
        let phone = row.text(3).map(|p| normalize_phone(&p)).filter(|p| !p.is_empty());
        max_chars("phone", phone.as_deref(), DOCTOR_PHONE_MAX)
            .map_err(|source| ImportError::Validation { row: row.number(), source })?;

        insert_doctor(
            &tx,
            &DoctorInput {
                full_name: row.text(1).unwrap_or_default(),
                phone,
                brigade_number: brigade.clone(),
                polyclinic_name: row.text(5),
                birth_date: row.date(2)?,
                neighborhood_id: neighborhood.id,
            },
        )?;
        report.imported += 1;
    }

    finish(tx, dry_run)?;
    tracing::info!(district_id, imported = report.imported, dry_run, "Doctor import finished");
    Ok(report)
}

// ═══════════════════════════════════════════
// Districts
// ═══════════════════════════════════════════

/// Load `{"<district>": ["<neighborhood>", ...]}` into a region.
/// Existing districts and neighborhoods are matched by name, so the load
/// can be repeated.
pub fn load_districts(
    conn: &Connection,
    path: &Path,
    region_id: i64,
    dry_run: bool,
) -> Result<ImportReport, ImportError> {
    let raw = std::fs::read_to_string(path)?;
    let data: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)?;
    load_district_map(conn, &data, region_id, dry_run)
}

pub(crate) fn load_district_map(
    conn: &Connection,
    data: &BTreeMap<String, Vec<String>>,
    region_id: i64,
    dry_run: bool,
) -> Result<ImportReport, ImportError> {
    let tx = conn.unchecked_transaction().map_err(DatabaseError::from)?;
    get_region(&tx, region_id, &SqlPredicate::always())?
        .ok_or_else(|| DatabaseError::not_found("Region", region_id))?;
    let mut report = ImportReport { dry_run, ..Default::default() };

    for (district_name, neighborhoods) in data {
        let district_name = district_name.trim();
        let district_id = match find_district_by_name(&tx, district_name)? {
            Some(d) if d.region_id == region_id => d.id,
            _ => {
                report.imported += 1;
                insert_district(&tx, &DistrictInput { name: district_name.to_string(), region_id })?
            }
        };
        for name in neighborhoods {
            let name = name.trim();
            if name.is_empty() || find_neighborhood_by_name(&tx, district_id, name)?.is_some() {
                continue;
            }
            insert_neighborhood(
                &tx,
                &NeighborhoodInput { name: name.to_string(), district_id, user_id: None },
            )?;
            report.imported += 1;
        }
    }

    finish(tx, dry_run)?;
    tracing::info!(region_id, created = report.imported, dry_run, "District list loaded");
    Ok(report)
}

fn finish(tx: rusqlite::Transaction<'_>, dry_run: bool) -> Result<(), DatabaseError> {
    if dry_run {
        tx.rollback()?;
    } else {
        tx.commit()?;
    }
    Ok(())
}
