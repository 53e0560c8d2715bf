use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsKey {
    pub id: i64,
    pub name: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsInput {
    pub name: String,
    pub key: String,
    pub value: String,
}

/// Examination thresholds (days), seeded on first read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExaminationLimits {
    pub last_psychiatric_appointment_days: i64,
    pub last_home_visit_by_doctor_days: i64,
    pub last_hospitalization_to_days: i64,
}

impl Default for ExaminationLimits {
    fn default() -> Self {
        Self {
            last_psychiatric_appointment_days: 30,
            last_home_visit_by_doctor_days: 30,
            last_hospitalization_to_days: 180,
        }
    }
}
