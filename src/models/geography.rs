use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct District {
    pub id: i64,
    pub name: String,
    pub region_id: i64,
    pub region_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub id: i64,
    pub name: String,
    pub district_id: i64,
    pub district_name: String,
    /// Officer account linked to this neighborhood, if any.
    pub user_id: Option<i64>,
}

impl Neighborhood {
    /// `"<name> (<district>)"`, as shown in pickers.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.district_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionInput {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistrictInput {
    pub name: String,
    pub region_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NeighborhoodInput {
    pub name: String,
    pub district_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
}
