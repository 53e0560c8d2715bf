use serde::{Deserialize, Serialize};

/// The two named lookup tables patients reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    ReasonForSpecialConsideration,
    SocialDomesticEnvironment,
}

impl LookupKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::ReasonForSpecialConsideration => "reasons_for_special_consideration",
            Self::SocialDomesticEnvironment => "social_domestic_environments",
        }
    }

    pub fn entity_name(&self) -> &'static str {
        match self {
            Self::ReasonForSpecialConsideration => "ReasonForSpecialConsideration",
            Self::SocialDomesticEnvironment => "SocialDomesticEnvironment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupItem {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LookupInput {
    pub name: String,
}
