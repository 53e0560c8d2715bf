//! Aggregates over the role-scoped roster: monitoring tables, district
//! statistics and the dashboard.
//!
//! Every count is derived from the examination status of each patient the
//! caller can see; grouping happens here rather than in SQL so the overdue
//! rule lives in one place.

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::authorization::{scope_predicate, Role, ScopeTarget};
use crate::db::repository::{
    self, count_doctors, count_inspectors, count_psychiatrists, get_district, SqlPredicate,
};
use crate::db::DatabaseError;
use crate::models::*;
use crate::patients::{list_roster, PatientCard};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Patient counts for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatientCounts {
    pub total_patients: i64,
    pub aggressive: i64,
    pub convicted: i64,
    pub abroad: i64,
    pub late: i64,
    pub on_time: i64,
    pub aggressive_late: i64,
    pub aggressive_on_time: i64,
}

impl PatientCounts {
    pub fn add(&mut self, card: &PatientCard) {
        let p = &card.patient;
        let late = card.status.is_overdue;
        self.total_patients += 1;
        self.aggressive += i64::from(p.is_aggressive);
        self.convicted += i64::from(p.is_convicted);
        self.abroad += i64::from(p.is_abroad_long_term);
        self.late += i64::from(late);
        self.on_time += i64::from(!late);
        self.aggressive_late += i64::from(p.is_aggressive && late);
        self.aggressive_on_time += i64::from(p.is_aggressive && !late);
    }

    pub fn merge(&mut self, other: &PatientCounts) {
        self.total_patients += other.total_patients;
        self.aggressive += other.aggressive;
        self.convicted += other.convicted;
        self.abroad += other.abroad;
        self.late += other.late;
        self.on_time += other.on_time;
        self.aggressive_late += other.aggressive_late;
        self.aggressive_on_time += other.aggressive_on_time;
    }
}

/// One monitoring table row. `total_neighborhoods` is set on district rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringRow {
    pub id: i64,
    pub name: String,
    pub total_neighborhoods: Option<i64>,
    #[serde(flatten)]
    pub counts: PatientCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringTable {
    pub rows: Vec<MonitoringRow>,
    pub total_neighborhoods: Option<i64>,
    pub totals: PatientCounts,
}

impl MonitoringTable {
    fn from_rows(rows: Vec<MonitoringRow>) -> Self {
        let mut totals = PatientCounts::default();
        let mut total_neighborhoods = None;
        for row in &rows {
            totals.merge(&row.counts);
            if let Some(n) = row.total_neighborhoods {
                *total_neighborhoods.get_or_insert(0) += n;
            }
        }
        Self { rows, total_neighborhoods, totals }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistrictTotal {
    pub id: i64,
    pub name: String,
    pub total: i64,
}

/// Parallel per-label series for charts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub on_time: Vec<i64>,
    pub late: Vec<i64>,
    pub aggressive_on_time: Vec<i64>,
    pub aggressive_late: Vec<i64>,
    pub patients_list: Vec<i64>,
    pub aggressive_patients_list: Vec<i64>,
}

impl ChartSeries {
    fn from_rows(rows: &[MonitoringRow]) -> Self {
        let mut series = ChartSeries::default();
        for row in rows {
            series.labels.push(row.name.clone());
            series.on_time.push(row.counts.on_time);
            series.late.push(row.counts.late);
            series.aggressive_on_time.push(row.counts.aggressive_on_time);
            series.aggressive_late.push(row.counts.aggressive_late);
            series.patients_list.push(row.counts.total_patients);
            series.aggressive_patients_list.push(row.counts.aggressive);
        }
        series
    }
}

/// Neighborhood breakdown of one district.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodStats {
    #[serde(flatten)]
    pub series: ChartSeries,
    pub total_patient: i64,
    pub total_neighborhood: i64,
    pub total_doctor: i64,
    pub total_psychiatrist: i64,
    pub total_inspector: i64,
    pub total_aggressive_patient: i64,
    pub total_on_time_patient: i64,
    pub total_late_patient: i64,
    pub total_on_time_aggressive_patient: i64,
    pub total_late_aggressive_patient: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub total_patients: i64,
    pub total_doctors: i64,
    pub total_psychiatrists: i64,
    pub total_inspectors: i64,
    pub total_neighborhoods: i64,
    pub late: i64,
    pub on_time: i64,
    pub aggressive: i64,
    pub aggressive_late: i64,
    pub aggressive_on_time: i64,
    pub districts: ChartSeries,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

fn counts_by<F>(cards: &[PatientCard], key: F) -> HashMap<i64, PatientCounts>
where
    F: Fn(&PatientCard) -> i64,
{
    let mut groups: HashMap<i64, PatientCounts> = HashMap::new();
    for card in cards {
        groups.entry(key(card)).or_default().add(card);
    }
    groups
}

/// One row per visible district plus totals.
pub fn district_monitoring(conn: &Connection, role: &Role, today: NaiveDate) -> Result<MonitoringTable, DatabaseError> {
    let districts = repository::list_districts(conn, &scope_predicate(role, ScopeTarget::District), None)?;
    let neighborhoods =
        repository::list_neighborhoods(conn, &scope_predicate(role, ScopeTarget::Neighborhood), None, None)?;
    let cards = list_roster(conn, role, &PatientFilter::default(), today)?;

    let counts = counts_by(&cards, |c| c.patient.relations.district_id);
    let mut hood_counts: HashMap<i64, i64> = HashMap::new();
    for hood in &neighborhoods {
        *hood_counts.entry(hood.district_id).or_default() += 1;
    }

    let rows = districts
        .into_iter()
        .map(|d| MonitoringRow {
            total_neighborhoods: Some(hood_counts.get(&d.id).copied().unwrap_or(0)),
            counts: counts.get(&d.id).copied().unwrap_or_default(),
            id: d.id,
            name: d.name,
        })
        .collect();
    Ok(MonitoringTable::from_rows(rows))
}

/// One row per neighborhood of a visible district; `None` if the district
/// is outside the caller's scope.
pub fn neighborhood_monitoring(
    conn: &Connection,
    role: &Role,
    district_id: i64,
    today: NaiveDate,
) -> Result<Option<MonitoringTable>, DatabaseError> {
    let Some(rows) = neighborhood_rows(conn, role, district_id, today)? else {
        return Ok(None);
    };
    Ok(Some(MonitoringTable::from_rows(rows)))
}

fn neighborhood_rows(
    conn: &Connection,
    role: &Role,
    district_id: i64,
    today: NaiveDate,
) -> Result<Option<Vec<MonitoringRow>>, DatabaseError> {
    if get_district(conn, district_id, &scope_predicate(role, ScopeTarget::District))?.is_none() {
        return Ok(None);
    }
    let neighborhoods = repository::list_neighborhoods(
        conn,
        &scope_predicate(role, ScopeTarget::Neighborhood),
        Some(district_id),
        None,
    )?;
    let filter = PatientFilter { district_id: Some(district_id), ..Default::default() };
    let cards = list_roster(conn, role, &filter, today)?;
    let counts = counts_by(&cards, |c| c.patient.neighborhood_id);

    Ok(Some(
        neighborhoods
            .into_iter()
            .map(|n| MonitoringRow {
                total_neighborhoods: None,
                counts: counts.get(&n.id).copied().unwrap_or_default(),
                id: n.id,
                name: n.name,
            })
            .collect(),
    ))
}

/// Patient count per visible district.
pub fn district_patient_stats(conn: &Connection, role: &Role) -> Result<Vec<DistrictTotal>, DatabaseError> {
    let districts = repository::list_districts(conn, &scope_predicate(role, ScopeTarget::District), None)?;
    let patients = repository::list_patients(
        conn,
        &scope_predicate(role, ScopeTarget::Patient),
        &PatientFilter::default(),
    )?;
    let mut totals: HashMap<i64, i64> = HashMap::new();
    for p in &patients {
        *totals.entry(p.relations.district_id).or_default() += 1;
    }
    Ok(districts
        .into_iter()
        .map(|d| DistrictTotal { total: totals.get(&d.id).copied().unwrap_or(0), id: d.id, name: d.name })
        .collect())
}

pub fn neighborhood_patient_stats(
    conn: &Connection,
    role: &Role,
    district_id: i64,
    today: NaiveDate,
) -> Result<Option<NeighborhoodStats>, DatabaseError> {
    let Some(rows) = neighborhood_rows(conn, role, district_id, today)? else {
        return Ok(None);
    };
    let mut totals = PatientCounts::default();
    for row in &rows {
        totals.merge(&row.counts);
    }

    let in_district = |column: &str| SqlPredicate::eq(column, district_id);
    let total_doctor = count_doctors(conn, &scope_predicate(role, ScopeTarget::Doctor).and(in_district("n.district_id")))?;
    let total_inspector =
        count_inspectors(conn, &scope_predicate(role, ScopeTarget::Inspector).and(in_district("n.district_id")))?;
    let total_psychiatrist = count_psychiatrists(
        conn,
        &scope_predicate(role, ScopeTarget::Psychiatrist).and(in_district("ps.district_id")),
    )?;

    Ok(Some(NeighborhoodStats {
        series: ChartSeries::from_rows(&rows),
        total_patient: totals.total_patients,
        total_neighborhood: rows.len() as i64,
        total_doctor,
        total_psychiatrist,
        total_inspector,
        total_aggressive_patient: totals.aggressive,
        total_on_time_patient: totals.on_time,
        total_late_patient: totals.late,
        total_on_time_aggressive_patient: totals.aggressive_on_time,
        total_late_aggressive_patient: totals.aggressive_late,
    }))
}

pub fn dashboard(conn: &Connection, role: &Role, today: NaiveDate) -> Result<Dashboard, DatabaseError> {
    let table = district_monitoring(conn, role, today)?;
    let totals = table.totals;
    Ok(Dashboard {
        total_patients: totals.total_patients,
        total_doctors: count_doctors(conn, &scope_predicate(role, ScopeTarget::Doctor))?,
        total_psychiatrists: count_psychiatrists(conn, &scope_predicate(role, ScopeTarget::Psychiatrist))?,
        total_inspectors: count_inspectors(conn, &scope_predicate(role, ScopeTarget::Inspector))?,
        total_neighborhoods: table.total_neighborhoods.unwrap_or(0),
        late: totals.late,
        on_time: totals.on_time,
        aggressive: totals.aggressive,
        aggressive_late: totals.aggressive_late,
        aggressive_on_time: totals.aggressive_on_time,
        districts: ChartSeries::from_rows(&table.rows),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
