use serde::Deserialize;

/// Roster filters. `is_overdue` is applied after the deadline computation.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PatientFilter {
    pub district_id: Option<i64>,
    pub neighborhood_id: Option<i64>,
    pub psychiatrist_id: Option<i64>,
    pub inspector_id: Option<i64>,
    pub is_aggressive: Option<bool>,
    pub is_convicted: Option<bool>,
    pub is_abroad_long_term: Option<bool>,
    pub is_overdue: Option<bool>,
    /// Case-insensitive match on name, PINFL or address.
    pub q: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct StaffFilter {
    pub district_id: Option<i64>,
    pub neighborhood_id: Option<i64>,
    pub q: Option<String>,
}
