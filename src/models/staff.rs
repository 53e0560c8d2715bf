use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inspector {
    pub id: i64,
    pub full_name: String,
    pub phone: Option<String>,
    pub neighborhood_id: i64,
    pub neighborhood_name: String,
    pub district_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InspectorInput {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub neighborhood_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Psychiatrist {
    pub id: i64,
    pub full_name: String,
    pub phone: Option<String>,
    pub district_id: i64,
    pub district_name: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PsychiatristInput {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub district_id: i64,
    pub user_id: i64,
}

/// Primary-care doctor attached to a neighborhood. Has no login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub full_name: String,
    pub phone: Option<String>,
    pub brigade_number: Option<String>,
    pub polyclinic_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub neighborhood_id: i64,
    pub neighborhood_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorInput {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub brigade_number: Option<String>,
    #[serde(default)]
    pub polyclinic_name: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub neighborhood_id: i64,
}
