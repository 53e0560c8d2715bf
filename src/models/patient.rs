use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{PatientField, SubstanceUse, SupportiveTherapy, TrackedEvent, WhereIsNow};

/// Dates of the four tracked events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDates {
    #[serde(default)]
    pub last_psychiatric_appointment_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_home_visit_by_doctor_date: Option<NaiveDate>,
    #[serde(default)]
    pub last_hospitalization_from: Option<NaiveDate>,
    #[serde(default)]
    pub last_hospitalization_to: Option<NaiveDate>,
}

impl EventDates {
    pub fn get(&self, event: TrackedEvent) -> Option<NaiveDate> {
        match event {
            TrackedEvent::PsychiatricAppointment => self.last_psychiatric_appointment_date,
            TrackedEvent::HomeVisit => self.last_home_visit_by_doctor_date,
            TrackedEvent::HospitalizationFrom => self.last_hospitalization_from,
            TrackedEvent::HospitalizationTo => self.last_hospitalization_to,
        }
    }

    pub fn set(&mut self, event: TrackedEvent, date: Option<NaiveDate>) {
        match event {
            TrackedEvent::PsychiatricAppointment => self.last_psychiatric_appointment_date = date,
            TrackedEvent::HomeVisit => self.last_home_visit_by_doctor_date = date,
            TrackedEvent::HospitalizationFrom => self.last_hospitalization_from = date,
            TrackedEvent::HospitalizationTo => self.last_hospitalization_to = date,
        }
    }
}

/// Stored evidentiary file paths (relative to the media root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFiles {
    pub last_psychiatric_appointment_file: Option<String>,
    pub last_home_visit_by_doctor_file: Option<String>,
    pub last_hospitalization_from_file: Option<String>,
    pub last_hospitalization_to_file: Option<String>,
}

impl EventFiles {
    pub fn get(&self, event: TrackedEvent) -> Option<&str> {
        match event {
            TrackedEvent::PsychiatricAppointment => self.last_psychiatric_appointment_file.as_deref(),
            TrackedEvent::HomeVisit => self.last_home_visit_by_doctor_file.as_deref(),
            TrackedEvent::HospitalizationFrom => self.last_hospitalization_from_file.as_deref(),
            TrackedEvent::HospitalizationTo => self.last_hospitalization_to_file.as_deref(),
        }
    }

    pub fn set(&mut self, event: TrackedEvent, path: Option<String>) {
        let slot = match event {
            TrackedEvent::PsychiatricAppointment => &mut self.last_psychiatric_appointment_file,
            TrackedEvent::HomeVisit => &mut self.last_home_visit_by_doctor_file,
            TrackedEvent::HospitalizationFrom => &mut self.last_hospitalization_from_file,
            TrackedEvent::HospitalizationTo => &mut self.last_hospitalization_to_file,
        };
        *slot = path;
    }
}

/// Display names joined from related tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRelations {
    pub neighborhood_name: String,
    pub district_id: i64,
    pub district_name: String,
    pub region_id: i64,
    pub inspector_name: String,
    pub psychiatrist_name: Option<String>,
    pub reason_for_special_consideration_name: Option<String>,
    pub social_domestic_environment_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub full_name: String,
    pub pinfl: String,
    pub birth_date: Option<NaiveDate>,
    pub is_aggressive: bool,
    pub is_convicted: bool,
    pub is_abroad_long_term: bool,
    pub max_examination_interval: i32,
    pub neighborhood_id: i64,
    pub inspector_id: i64,
    pub psychiatrist_id: Option<i64>,
    pub address: Option<String>,
    #[serde(flatten)]
    pub dates: EventDates,
    #[serde(flatten)]
    pub files: EventFiles,
    pub reason: Option<String>,
    pub receiving_supportive_therapy: Option<SupportiveTherapy>,
    pub reason_for_special_consideration_id: Option<i64>,
    pub description_for_special_consideration: Option<String>,
    pub social_domestic_environment_id: Option<i64>,
    pub alcohol_and_drug_use: Option<SubstanceUse>,
    pub where_is_now: Option<WhereIsNow>,
    pub description_where_is_now: Option<String>,
    #[serde(flatten)]
    pub relations: PatientRelations,
}

/// Writable patient fields. Evidentiary files are attached separately.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    pub full_name: String,
    pub pinfl: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_aggressive: bool,
    #[serde(default)]
    pub is_convicted: bool,
    #[serde(default)]
    pub is_abroad_long_term: bool,
    #[serde(default)]
    pub max_examination_interval: Option<i32>,
    pub neighborhood_id: i64,
    pub inspector_id: i64,
    #[serde(default)]
    pub psychiatrist_id: Option<i64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(flatten)]
    pub dates: EventDates,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub receiving_supportive_therapy: Option<SupportiveTherapy>,
    #[serde(default)]
    pub reason_for_special_consideration_id: Option<i64>,
    #[serde(default)]
    pub description_for_special_consideration: Option<String>,
    #[serde(default)]
    pub social_domestic_environment_id: Option<i64>,
    #[serde(default)]
    pub alcohol_and_drug_use: Option<SubstanceUse>,
    #[serde(default)]
    pub where_is_now: Option<WhereIsNow>,
    #[serde(default)]
    pub description_where_is_now: Option<String>,
}

impl From<&Patient> for PatientInput {
    fn from(p: &Patient) -> Self {
        Self {
            full_name: p.full_name.clone(),
            pinfl: p.pinfl.clone(),
            birth_date: p.birth_date,
            is_aggressive: p.is_aggressive,
            is_convicted: p.is_convicted,
            is_abroad_long_term: p.is_abroad_long_term,
            max_examination_interval: Some(p.max_examination_interval),
            neighborhood_id: p.neighborhood_id,
            inspector_id: p.inspector_id,
            psychiatrist_id: p.psychiatrist_id,
            address: p.address.clone(),
            dates: p.dates,
            reason: p.reason.clone(),
            receiving_supportive_therapy: p.receiving_supportive_therapy,
            reason_for_special_consideration_id: p.reason_for_special_consideration_id,
            description_for_special_consideration: p.description_for_special_consideration.clone(),
            social_domestic_environment_id: p.social_domestic_environment_id,
            alcohol_and_drug_use: p.alcohol_and_drug_use,
            where_is_now: p.where_is_now,
            description_where_is_now: p.description_where_is_now.clone(),
        }
    }
}

impl PatientInput {
    /// Fields whose value differs from `current`.
    pub fn changed_fields(&self, current: &PatientInput) -> Vec<PatientField> {
        let mut changed = Vec::new();
        let mut check = |differs: bool, field: PatientField| {
            if differs {
                changed.push(field);
            }
        };
        check(self.full_name != current.full_name, PatientField::FullName);
        check(self.pinfl != current.pinfl, PatientField::Pinfl);
        check(self.birth_date != current.birth_date, PatientField::BirthDate);
        check(self.is_aggressive != current.is_aggressive, PatientField::IsAggressive);
        check(self.is_convicted != current.is_convicted, PatientField::IsConvicted);
        check(self.is_abroad_long_term != current.is_abroad_long_term, PatientField::IsAbroadLongTerm);
        check(
            self.max_examination_interval.is_some()
                && self.max_examination_interval != current.max_examination_interval,
            PatientField::MaxExaminationInterval,
        );
        check(self.neighborhood_id != current.neighborhood_id, PatientField::Neighborhood);
        check(self.inspector_id != current.inspector_id, PatientField::Inspector);
        check(self.psychiatrist_id != current.psychiatrist_id, PatientField::Psychiatrist);
        check(self.address != current.address, PatientField::Address);
        check(
            self.dates.last_psychiatric_appointment_date != current.dates.last_psychiatric_appointment_date,
            PatientField::PsychiatricAppointmentDate,
        );
        check(
            self.dates.last_home_visit_by_doctor_date != current.dates.last_home_visit_by_doctor_date,
            PatientField::HomeVisitDate,
        );
        check(
            self.dates.last_hospitalization_from != current.dates.last_hospitalization_from,
            PatientField::HospitalizationFrom,
        );
        check(
            self.dates.last_hospitalization_to != current.dates.last_hospitalization_to,
            PatientField::HospitalizationTo,
        );
        check(self.reason != current.reason, PatientField::Reason);
        check(
            self.receiving_supportive_therapy != current.receiving_supportive_therapy,
            PatientField::SupportiveTherapy,
        );
        check(
            self.reason_for_special_consideration_id != current.reason_for_special_consideration_id,
            PatientField::ReasonForSpecialConsideration,
        );
        check(
            self.description_for_special_consideration != current.description_for_special_consideration,
            PatientField::DescriptionForSpecialConsideration,
        );
        check(
            self.social_domestic_environment_id != current.social_domestic_environment_id,
            PatientField::SocialDomesticEnvironment,
        );
        check(self.alcohol_and_drug_use != current.alcohol_and_drug_use, PatientField::SubstanceUse);
        check(self.where_is_now != current.where_is_now, PatientField::WhereIsNow);
        check(
            self.description_where_is_now != current.description_where_is_now,
            PatientField::DescriptionWhereIsNow,
        );
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PatientInput {
        PatientInput {
            full_name: "Karimov Anvar".into(),
            pinfl: "12345678901234".into(),
            neighborhood_id: 1,
            inspector_id: 1,
            max_examination_interval: Some(30),
            ..Default::default()
        }
    }

    #[test]
    fn unchanged_input_has_no_changed_fields() {
        assert!(input().changed_fields(&input()).is_empty());
    }

    #[test]
    fn changed_fields_lists_each_difference() {
        let current = input();
        let mut next = input();
        next.where_is_now = Some(WhereIsNow::InHospital);
        next.dates.last_hospitalization_to = NaiveDate::from_ymd_opt(2025, 1, 2);

        let changed = next.changed_fields(&current);
        assert_eq!(changed, vec![PatientField::HospitalizationTo, PatientField::WhereIsNow]);
    }

    #[test]
    fn omitted_interval_is_not_a_change() {
        let current = input();
        let mut next = input();
        next.max_examination_interval = None;
        assert!(next.changed_fields(&current).is_empty());
    }

    #[test]
    fn event_dates_get_set_by_event() {
        let mut dates = EventDates::default();
        let d = NaiveDate::from_ymd_opt(2024, 5, 1);
        dates.set(TrackedEvent::HomeVisit, d);
        assert_eq!(dates.get(TrackedEvent::HomeVisit), d);
        assert_eq!(dates.last_home_visit_by_doctor_date, d);
        assert_eq!(dates.get(TrackedEvent::PsychiatricAppointment), None);
    }

    #[test]
    fn input_deserializes_flattened_dates() {
        let json = serde_json::json!({
            "full_name": "A",
            "pinfl": "1",
            "neighborhood_id": 2,
            "inspector_id": 3,
            "last_hospitalization_from": "2024-03-01",
            "where_is_now": "in_hospital"
        });
        let parsed: PatientInput = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.dates.last_hospitalization_from, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(parsed.where_is_now, Some(WhereIsNow::InHospital));
        assert!(!parsed.is_aggressive);
    }
}
