use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + label + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal : $label:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Localized display label used in reports.
            pub fn label(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(SupportiveTherapy {
    RegularlyReceiving => "regularly_receiving" : "Мунтазам олаяпти",
    NotReceiving => "not_receiving" : "Олмаяпти",
    QuicklyReceiving => "quickly_receiving" : "Тез-тез олаяпти",
    RarelyReceiving => "rarely_receiving" : "Камдан кам олаяпти",
});

str_enum!(SubstanceUse {
    AlcoholAndDrug => "alcohol_and_drug" : "Алкоголь ва гиёҳванд моддалар",
    Alcohol => "alcohol" : "Алкоголь",
    Drug => "drug" : "Гиёҳванд моддалар",
    NotConsume => "not_consume" : "Истеъмол қилмайди",
});

str_enum!(WhereIsNow {
    AtHome => "at_home" : "Уйда",
    InHospital => "in_hospital" : "Шифохонада",
    OutOfTheArea => "out_of_the_area" : "Ҳудудидан чиқиб кетган",
    AddressUnknown => "address_unknown" : "Манзили номаълум",
});

str_enum!(TrackedEvent {
    PsychiatricAppointment => "psychiatric_appointment" : "Психиатр қабули",
    HomeVisit => "home_visit" : "Уйдаги кўрик",
    HospitalizationFrom => "hospitalization_from" : "Госпитализация боши",
    HospitalizationTo => "hospitalization_to" : "Госпитализация охири",
});

str_enum!(Urgency {
    Critical => "critical" : "Шошилинч",
    Warning => "warning" : "Огоҳлантириш",
    Ok => "ok" : "Меъёрда",
});

str_enum!(PatientField {
    FullName => "full_name" : "Ф.И.Ш.",
    Pinfl => "pinfl" : "ПИНФЛ",
    BirthDate => "birth_date" : "Туғилган сана",
    IsAggressive => "is_aggressive" : "Аҳоли учун хавф туғдираяптими",
    IsConvicted => "is_convicted" : "Муқаддам судланганми",
    IsAbroadLongTerm => "is_abroad_long_term" : "Узоқ муддатга кетганми",
    MaxExaminationInterval => "max_examination_interval" : "Текширув оралиғи",
    Neighborhood => "neighborhood" : "Маҳалла",
    Inspector => "inspector" : "Ички ишлар ходими",
    Psychiatrist => "psychiatrist" : "Психиатр",
    Address => "address" : "Манзили",
    PsychiatricAppointmentDate => "last_psychiatric_appointment_date" : "Охирги психиатр қабули",
    PsychiatricAppointmentFile => "last_psychiatric_appointment_file" : "Психиатр қабули файли",
    HomeVisitDate => "last_home_visit_by_doctor_date" : "Охирги уйдаги кўрик",
    HomeVisitFile => "last_home_visit_by_doctor_file" : "Уйдаги кўрик файли",
    HospitalizationFrom => "last_hospitalization_from" : "Госпитализация боши",
    HospitalizationFromFile => "last_hospitalization_from_file" : "Госпитализация боши файли",
    HospitalizationTo => "last_hospitalization_to" : "Госпитализация охири",
    HospitalizationToFile => "last_hospitalization_to_file" : "Госпитализация охири файли",
    Reason => "reason" : "Кўрилмаганлик сабаби",
    SupportiveTherapy => "receiving_supportive_therapy" : "Кувватловчи терапия",
    ReasonForSpecialConsideration => "reason_for_special_consideration" : "Махсус ҳисобга олиш сабаби",
    DescriptionForSpecialConsideration => "description_for_special_consideration" : "Махсус ҳисобга олиш изоҳи",
    SocialDomesticEnvironment => "social_domestic_environment" : "Ижтимоий-маиший муҳит",
    SubstanceUse => "alcohol_and_drug_use" : "Алкоголь, наркотик истеъмоли",
    WhereIsNow => "where_is_now" : "Ҳозир қаерда",
    DescriptionWhereIsNow => "description_where_is_now" : "Ҳозир қаерда изоҳ",
});

impl TrackedEvent {
    /// Patient field holding this event's evidentiary file.
    pub fn file_field(&self) -> PatientField {
        match self {
            Self::PsychiatricAppointment => PatientField::PsychiatricAppointmentFile,
            Self::HomeVisit => PatientField::HomeVisitFile,
            Self::HospitalizationFrom => PatientField::HospitalizationFromFile,
            Self::HospitalizationTo => PatientField::HospitalizationToFile,
        }
    }

    /// Directory under `<media>/uploads/` holding this event's files.
    pub fn upload_dir(&self) -> &'static str {
        match self {
            Self::PsychiatricAppointment => "psychiatric_appointment_file",
            Self::HomeVisit => "home_visit_by_doctor",
            Self::HospitalizationFrom => "last_hospitalization_from",
            Self::HospitalizationTo => "last_hospitalization_to",
        }
    }

    /// Patient column holding the event's stored file path.
    pub fn file_column(&self) -> &'static str {
        match self {
            Self::PsychiatricAppointment => "last_psychiatric_appointment_file",
            Self::HomeVisit => "last_home_visit_by_doctor_file",
            Self::HospitalizationFrom => "last_hospitalization_from_file",
            Self::HospitalizationTo => "last_hospitalization_to_file",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn as_str_and_from_str_agree() {
        for v in WhereIsNow::ALL {
            assert_eq!(WhereIsNow::from_str(v.as_str()).unwrap(), *v);
        }
        for v in SupportiveTherapy::ALL {
            assert_eq!(SupportiveTherapy::from_str(v.as_str()).unwrap(), *v);
        }
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = SubstanceUse::from_str("tobacco").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_stored_strings() {
        let json = serde_json::to_string(&TrackedEvent::HospitalizationFrom).unwrap();
        assert_eq!(json, "\"hospitalization_from\"");
        let back: SubstanceUse = serde_json::from_str("\"alcohol_and_drug\"").unwrap();
        assert_eq!(back, SubstanceUse::AlcoholAndDrug);
    }

    #[test]
    fn upload_dirs_match_storage_layout() {
        assert_eq!(TrackedEvent::PsychiatricAppointment.upload_dir(), "psychiatric_appointment_file");
        assert_eq!(TrackedEvent::HomeVisit.upload_dir(), "home_visit_by_doctor");
        assert_eq!(TrackedEvent::HospitalizationTo.upload_dir(), "last_hospitalization_to");
    }
}
