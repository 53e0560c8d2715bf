//! Role resolution and the shared role-scoped visibility predicate.
//!
//! An account's role is derived from which single role record links to it,
//! checked in order: inspector, neighborhood officer, psychiatrist,
//! district admin, region admin. No link means unrestricted access.
//!
//! `scope_predicate` is the only place the role × target table lives.
//! Every list, detail, statistics and export query composes its output.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::repository::{
    assign_district_admin, assign_neighborhood_officer, assign_region_admin, clear_admin_links, find_role_link,
    RoleLink, SqlPredicate,
};
use crate::db::DatabaseError;
use crate::models::PatientField;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The acting account's role with its hierarchy coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    Inspector { inspector_id: i64, neighborhood_id: i64, district_id: i64, region_id: i64 },
    NeighborhoodOfficer { neighborhood_id: i64, district_id: i64, region_id: i64 },
    Psychiatrist { psychiatrist_id: i64, district_id: i64, region_id: i64 },
    DistrictAdmin { district_id: i64, region_id: i64 },
    RegionAdmin { region_id: i64 },
    Unrestricted,
}

impl From<Option<RoleLink>> for Role {
    fn from(link: Option<RoleLink>) -> Self {
        match link {
            Some(RoleLink::Inspector { inspector_id, neighborhood_id, district_id, region_id }) => {
                Role::Inspector { inspector_id, neighborhood_id, district_id, region_id }
            }
            Some(RoleLink::NeighborhoodOfficer { neighborhood_id, district_id, region_id }) => {
                Role::NeighborhoodOfficer { neighborhood_id, district_id, region_id }
            }
            Some(RoleLink::Psychiatrist { psychiatrist_id, district_id, region_id }) => {
                Role::Psychiatrist { psychiatrist_id, district_id, region_id }
            }
            Some(RoleLink::DistrictAdmin { district_id, region_id }) => {
                Role::DistrictAdmin { district_id, region_id }
            }
            Some(RoleLink::RegionAdmin { region_id }) => Role::RegionAdmin { region_id },
            None => Role::Unrestricted,
        }
    }
}

/// Which table a scoped query starts from. Each target's queries expose
/// the fixed aliases listed next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeTarget {
    /// `p`, `n`, `d`
    Patient,
    /// `doc`, `n`, `d`
    Doctor,
    /// `i`, `n`, `d`
    Inspector,
    /// `n`, `d`
    Neighborhood,
    /// `d`, `r`
    District,
    /// `ps`, `d`
    Psychiatrist,
    /// `r`
    Region,
}

const INSPECTOR_FIELDS: &[PatientField] = &[
    PatientField::IsConvicted,
    PatientField::IsAbroadLongTerm,
    PatientField::WhereIsNow,
    PatientField::DescriptionWhereIsNow,
    PatientField::SocialDomesticEnvironment,
];

const OFFICER_FIELDS: &[PatientField] = &[
    PatientField::Reason,
    PatientField::SupportiveTherapy,
    PatientField::SubstanceUse,
    PatientField::HomeVisitFile,
    PatientField::HospitalizationFromFile,
    PatientField::HospitalizationToFile,
];

const PSYCHIATRIST_FIELDS: &[PatientField] = &[PatientField::PsychiatricAppointmentFile];

impl Role {
    pub fn kind(&self) -> &'static str {
        match self {
            Role::Inspector { .. } => "inspector",
            Role::NeighborhoodOfficer { .. } => "neighborhood_officer",
            Role::Psychiatrist { .. } => "psychiatrist",
            Role::DistrictAdmin { .. } => "district_admin",
            Role::RegionAdmin { .. } => "region_admin",
            Role::Unrestricted => "unrestricted",
        }
    }

    /// Roles that may create/delete records and view monitoring.
    pub fn is_admin_tier(&self) -> bool {
        matches!(
            self,
            Role::Unrestricted | Role::DistrictAdmin { .. } | Role::RegionAdmin { .. }
        )
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Role::Unrestricted)
    }

    /// Patient fields this role may write.
    pub fn editable_patient_fields(&self) -> &'static [PatientField] {
        match self {
            Role::Inspector { .. } => INSPECTOR_FIELDS,
            Role::NeighborhoodOfficer { .. } => OFFICER_FIELDS,
            Role::Psychiatrist { .. } => PSYCHIATRIST_FIELDS,
            Role::DistrictAdmin { .. } | Role::RegionAdmin { .. } | Role::Unrestricted => {
                PatientField::ALL
            }
        }
    }

    pub fn can_edit(&self, field: PatientField) -> bool {
        self.editable_patient_fields().contains(&field)
    }
}

// ═══════════════════════════════════════════════════════════
// Resolution
// ═══════════════════════════════════════════════════════════

/// Resolve the role of `account_id` from its role links.
pub fn resolve_role(conn: &Connection, account_id: i64) -> Result<Role, DatabaseError> {
    Ok(Role::from(find_role_link(conn, account_id)?))
}

/// Administrative role to give an account. Inspector and psychiatrist
/// roles come from creating the staff record instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RoleAssignment {
    DistrictAdmin { district_id: i64 },
    RegionAdmin { region_id: i64 },
    NeighborhoodOfficer { neighborhood_id: i64 },
    /// Drop admin and officer links; the account becomes unrestricted
    /// unless it is a staff member.
    None,
}

/// Replace the account's admin/officer link in one transaction. Staff
/// accounts are refused by the exclusivity check.
pub fn assign_role(conn: &Connection, account_id: i64, assignment: RoleAssignment) -> Result<Role, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    clear_admin_links(&tx, account_id)?;
    match assignment {
        RoleAssignment::DistrictAdmin { district_id } => assign_district_admin(&tx, account_id, district_id)?,
        RoleAssignment::RegionAdmin { region_id } => assign_region_admin(&tx, account_id, region_id)?,
        RoleAssignment::NeighborhoodOfficer { neighborhood_id } => {
            assign_neighborhood_officer(&tx, account_id, neighborhood_id)?
        }
        RoleAssignment::None => {}
    }
    let role = resolve_role(&tx, account_id)?;
    tx.commit()?;
    tracing::info!(account_id, role = role.kind(), "Role assigned");
    Ok(role)
}

// ═══════════════════════════════════════════════════════════
// Scope predicate
// ═══════════════════════════════════════════════════════════

/// SQL fragment restricting `target` rows to what `role` may see.
pub fn scope_predicate(role: &Role, target: ScopeTarget) -> SqlPredicate {
    use ScopeTarget as T;

    match *role {
        Role::Unrestricted => SqlPredicate::always(),

        Role::Inspector { inspector_id, neighborhood_id, district_id, region_id } => match target {
            T::Patient => SqlPredicate::eq("p.inspector_id", inspector_id),
            T::Doctor => SqlPredicate::eq("doc.neighborhood_id", neighborhood_id),
            T::Inspector => SqlPredicate::eq("i.id", inspector_id),
            T::Neighborhood => SqlPredicate::eq("n.id", neighborhood_id),
            T::District => SqlPredicate::eq("d.id", district_id),
            T::Psychiatrist => SqlPredicate::eq("ps.district_id", district_id),
            T::Region => SqlPredicate::eq("r.id", region_id),
        },

        Role::NeighborhoodOfficer { neighborhood_id, district_id, region_id } => match target {
            T::Patient => SqlPredicate::eq("p.neighborhood_id", neighborhood_id),
            T::Doctor => SqlPredicate::eq("doc.neighborhood_id", neighborhood_id),
            T::Inspector => SqlPredicate::eq("i.neighborhood_id", neighborhood_id),
            T::Neighborhood => SqlPredicate::eq("n.id", neighborhood_id),
            T::District => SqlPredicate::eq("d.id", district_id),
            T::Psychiatrist => SqlPredicate::eq("ps.district_id", district_id),
            T::Region => SqlPredicate::eq("r.id", region_id),
        },

        Role::Psychiatrist { psychiatrist_id, district_id, region_id } => match target {
            T::Patient => SqlPredicate::eq("p.psychiatrist_id", psychiatrist_id),
            T::Doctor | T::Inspector | T::Neighborhood => SqlPredicate::eq("n.district_id", district_id),
            T::District => SqlPredicate::eq("d.id", district_id),
            T::Psychiatrist => SqlPredicate::eq("ps.id", psychiatrist_id),
            T::Region => SqlPredicate::eq("r.id", region_id),
        },

        Role::DistrictAdmin { district_id, region_id } => match target {
            T::Patient | T::Doctor | T::Inspector | T::Neighborhood => {
                SqlPredicate::eq("n.district_id", district_id)
            }
            T::District => SqlPredicate::eq("d.id", district_id),
            T::Psychiatrist => SqlPredicate::eq("ps.district_id", district_id),
            T::Region => SqlPredicate::eq("r.id", region_id),
        },

        Role::RegionAdmin { region_id } => match target {
            T::Region => SqlPredicate::eq("r.id", region_id),
            _ => SqlPredicate::eq("d.region_id", region_id),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{
        fixtures, get_patient, list_districts, list_doctors, list_inspectors, list_neighborhoods, list_patients,
        list_psychiatrists, list_regions, insert_doctor,
    };
    use crate::models::{DoctorInput, PatientFilter, StaffFilter};

    fn patient_names(conn: &Connection, role: &Role) -> Vec<String> {
        let scope = scope_predicate(role, ScopeTarget::Patient);
        list_patients(conn, &scope, &PatientFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| p.full_name)
            .collect()
    }

    fn populate(conn: &Connection, seed: &fixtures::Seed) {
        fixtures::patient(conn, "a1-own", seed.hood_a1, seed.inspector_a1, Some(seed.psychiatrist_a), false);
        fixtures::patient(conn, "a2-other", seed.hood_a2, seed.inspector_a2, Some(seed.psychiatrist_a), true);
        fixtures::patient(conn, "a2-nopsy", seed.hood_a2, seed.inspector_a2, None, false);
        fixtures::patient(conn, "b1", seed.hood_b1, seed.inspector_b1, Some(seed.psychiatrist_b), false);
    }

    #[test]
    fn role_resolution_follows_links() {
        let (conn, seed) = fixtures::seeded();
        assert!(matches!(
            resolve_role(&conn, seed.inspector_a1_account).unwrap(),
            Role::Inspector { inspector_id, .. } if inspector_id == seed.inspector_a1
        ));
        assert_eq!(
            resolve_role(&conn, seed.district_admin_account).unwrap(),
            Role::DistrictAdmin { district_id: seed.district_a, region_id: seed.region }
        );
        assert_eq!(resolve_role(&conn, seed.superuser_account).unwrap(), Role::Unrestricted);
    }

    #[test]
    fn inspector_sees_only_own_patients() {
        let (conn, seed) = fixtures::seeded();
        populate(&conn, &seed);
        let role = resolve_role(&conn, seed.inspector_a1_account).unwrap();
        assert_eq!(patient_names(&conn, &role), vec!["a1-own"]);
    }

    #[test]
    fn officer_sees_neighborhood_patients() {
        let (conn, seed) = fixtures::seeded();
        populate(&conn, &seed);
        let role = resolve_role(&conn, seed.officer_a1_account).unwrap();
        assert_eq!(patient_names(&conn, &role), vec!["a1-own"]);
    }

    #[test]
    fn psychiatrist_sees_assigned_patients() {
        let (conn, seed) = fixtures::seeded();
        populate(&conn, &seed);
        let role = resolve_role(&conn, seed.psychiatrist_a_account).unwrap();
        assert_eq!(patient_names(&conn, &role), vec!["a1-own", "a2-other"]);
    }

    #[test]
    fn district_admin_sees_union_of_district_neighborhoods() {
        let (conn, seed) = fixtures::seeded();
        populate(&conn, &seed);
        let role = resolve_role(&conn, seed.district_admin_account).unwrap();
        assert_eq!(patient_names(&conn, &role), vec!["a1-own", "a2-nopsy", "a2-other"]);
    }

    #[test]
    fn region_admin_and_unrestricted_see_everything_here() {
        let (conn, seed) = fixtures::seeded();
        populate(&conn, &seed);
        let region = resolve_role(&conn, seed.region_admin_account).unwrap();
        assert_eq!(patient_names(&conn, &region).len(), 4);
        assert_eq!(patient_names(&conn, &Role::Unrestricted).len(), 4);

        let other_region = Role::RegionAdmin { region_id: seed.region + 100 };
        assert!(patient_names(&conn, &other_region).is_empty());
    }

    #[test]
    fn region_admin_is_confined_to_own_region() {
        let (conn, seed) = fixtures::seeded();
        populate(&conn, &seed);
        let other = fixtures::other_region(&conn);
        let role = resolve_role(&conn, seed.region_admin_account).unwrap();

        let names = patient_names(&conn, &role);
        assert_eq!(names.len(), 4);
        assert!(!names.contains(&"c1".to_string()));
        assert_eq!(patient_names(&conn, &Role::Unrestricted).len(), 5);

        let scope = scope_predicate(&role, ScopeTarget::Patient);
        assert!(get_patient(&conn, other.patient, &scope).unwrap().is_none());
        let districts = list_districts(&conn, &scope_predicate(&role, ScopeTarget::District), None).unwrap();
        assert!(districts.iter().all(|d| d.id != other.district));
        assert_eq!(districts.len(), 2);
        let hoods = list_neighborhoods(&conn, &scope_predicate(&role, ScopeTarget::Neighborhood), None, None).unwrap();
        assert!(hoods.iter().all(|n| n.id != other.hood));
        let inspectors =
            list_inspectors(&conn, &scope_predicate(&role, ScopeTarget::Inspector), &StaffFilter::default()).unwrap();
        assert!(inspectors.iter().all(|i| i.id != other.inspector));

        let other_admin = Role::RegionAdmin { region_id: other.region };
        assert_eq!(patient_names(&conn, &other_admin), vec!["c1"]);
    }

    #[test]
    fn every_target_predicate_binds_against_its_query() {
        let (conn, seed) = fixtures::seeded();
        insert_doctor(
            &conn,
            &DoctorInput { full_name: "Doc".into(), neighborhood_id: seed.hood_a1, ..Default::default() },
        )
        .unwrap();
        let roles = [
            resolve_role(&conn, seed.inspector_a1_account).unwrap(),
            resolve_role(&conn, seed.officer_a1_account).unwrap(),
            resolve_role(&conn, seed.psychiatrist_a_account).unwrap(),
            resolve_role(&conn, seed.district_admin_account).unwrap(),
            resolve_role(&conn, seed.region_admin_account).unwrap(),
            Role::Unrestricted,
        ];
        let staff = StaffFilter::default();
        for role in &roles {
            assert_eq!(list_doctors(&conn, &scope_predicate(role, ScopeTarget::Doctor), &staff).unwrap().len(), 1);
            assert!(!list_inspectors(&conn, &scope_predicate(role, ScopeTarget::Inspector), &staff)
                .unwrap()
                .is_empty());
            assert!(!list_neighborhoods(&conn, &scope_predicate(role, ScopeTarget::Neighborhood), None, None)
                .unwrap()
                .is_empty());
            assert!(!list_districts(&conn, &scope_predicate(role, ScopeTarget::District), None)
                .unwrap()
                .is_empty());
            assert!(!list_psychiatrists(&conn, &scope_predicate(role, ScopeTarget::Psychiatrist), &staff)
                .unwrap()
                .is_empty());
            assert_eq!(list_regions(&conn, &scope_predicate(role, ScopeTarget::Region)).unwrap().len(), 1);
        }
    }

    #[test]
    fn psychiatrist_sees_district_staff_but_only_self_as_psychiatrist() {
        let (conn, seed) = fixtures::seeded();
        let role = resolve_role(&conn, seed.psychiatrist_a_account).unwrap();
        let staff = StaffFilter::default();
        let inspectors = list_inspectors(&conn, &scope_predicate(&role, ScopeTarget::Inspector), &staff).unwrap();
        assert_eq!(inspectors.len(), 2);
        let psychiatrists =
            list_psychiatrists(&conn, &scope_predicate(&role, ScopeTarget::Psychiatrist), &staff).unwrap();
        assert_eq!(psychiatrists.len(), 1);
        assert_eq!(psychiatrists[0].id, seed.psychiatrist_a);
    }

    #[test]
    fn field_policy_per_role() {
        let inspector = Role::Inspector { inspector_id: 1, neighborhood_id: 1, district_id: 1, region_id: 1 };
        assert!(inspector.can_edit(PatientField::WhereIsNow));
        assert!(!inspector.can_edit(PatientField::FullName));

        let officer = Role::NeighborhoodOfficer { neighborhood_id: 1, district_id: 1, region_id: 1 };
        assert!(officer.can_edit(PatientField::HomeVisitFile));
        assert!(!officer.can_edit(PatientField::HomeVisitDate));

        let psychiatrist = Role::Psychiatrist { psychiatrist_id: 1, district_id: 1, region_id: 1 };
        assert_eq!(psychiatrist.editable_patient_fields(), &[PatientField::PsychiatricAppointmentFile]);

        assert!(Role::DistrictAdmin { district_id: 1, region_id: 1 }.can_edit(PatientField::Pinfl));
        assert!(Role::Unrestricted.is_admin_tier());
        assert!(!officer.is_admin_tier());
    }

    #[test]
    fn role_serializes_with_tag() {
        let json = serde_json::to_value(Role::RegionAdmin { region_id: 4 }).unwrap();
        assert_eq!(json, serde_json::json!({"role": "region_admin", "region_id": 4}));
    }

    #[test]
    fn assignment_replaces_previous_admin_link() {
        let (conn, seed) = fixtures::seeded();
        let role = assign_role(
            &conn,
            seed.district_admin_account,
            RoleAssignment::RegionAdmin { region_id: seed.region },
        )
        .unwrap();
        assert_eq!(role, Role::RegionAdmin { region_id: seed.region });

        let cleared = assign_role(&conn, seed.district_admin_account, RoleAssignment::None).unwrap();
        assert_eq!(cleared, Role::Unrestricted);
    }

    #[test]
    fn staff_accounts_cannot_take_admin_roles() {
        let (conn, seed) = fixtures::seeded();
        let err = assign_role(
            &conn,
            seed.inspector_a1_account,
            RoleAssignment::DistrictAdmin { district_id: seed.district_a },
        )
        .unwrap_err();
        assert!(err.is_constraint());
        assert!(matches!(
            resolve_role(&conn, seed.inspector_a1_account).unwrap(),
            Role::Inspector { .. }
        ));
    }

    #[test]
    fn assignment_parses_from_tagged_json() {
        let parsed: RoleAssignment =
            serde_json::from_value(serde_json::json!({"role": "neighborhood_officer", "neighborhood_id": 7})).unwrap();
        assert_eq!(parsed, RoleAssignment::NeighborhoodOfficer { neighborhood_id: 7 });
    }
}
