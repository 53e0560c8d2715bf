//! Typeahead lookups for staff pickers.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::authorization::{scope_predicate, Role, ScopeTarget};
use crate::db::repository::{list_inspectors, list_psychiatrists};
use crate::db::DatabaseError;
use crate::models::StaffFilter;

pub const MAX_SUGGESTIONS: usize = 20;

/// Query string: forwarded parent selections plus the typed term.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AutocompleteQuery {
    pub neighborhood: Option<i64>,
    pub district: Option<i64>,
    pub q: Option<String>,
}

impl AutocompleteQuery {
    fn filter(&self) -> StaffFilter {
        StaffFilter {
            district_id: self.district,
            neighborhood_id: self.neighborhood,
            q: self.q.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub id: i64,
    pub text: String,
}

/// Psychiatrists, restricted to the forwarded neighborhood's district.
pub fn psychiatrists(conn: &Connection, role: &Role, query: &AutocompleteQuery) -> Result<Vec<Suggestion>, DatabaseError> {
    let scope = scope_predicate(role, ScopeTarget::Psychiatrist);
    Ok(list_psychiatrists(conn, &scope, &query.filter())?
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|p| Suggestion { id: p.id, text: p.full_name })
        .collect())
}

/// Inspectors of the forwarded neighborhood or district.
pub fn inspectors(conn: &Connection, role: &Role, query: &AutocompleteQuery) -> Result<Vec<Suggestion>, DatabaseError> {
    let scope = scope_predicate(role, ScopeTarget::Inspector);
    Ok(list_inspectors(conn, &scope, &query.filter())?
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|i| Suggestion { id: i.id, text: i.full_name })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::resolve_role;
    use crate::db::repository::fixtures;

    #[test]
    fn psychiatrist_lookup_follows_forwarded_neighborhood() {
        let (conn, seed) = fixtures::seeded();
        let query = AutocompleteQuery { neighborhood: Some(seed.hood_b1), ..Default::default() };
        let found = psychiatrists(&conn, &Role::Unrestricted, &query).unwrap();
        assert_eq!(found, vec![Suggestion { id: seed.psychiatrist_b, text: "Qodirov Sanjar".into() }]);
    }

    #[test]
    fn psychiatrist_lookup_matches_case_insensitively() {
        let (conn, _) = fixtures::seeded();
        let query = AutocompleteQuery { q: Some("RAHIM".into()), ..Default::default() };
        let found = psychiatrists(&conn, &Role::Unrestricted, &query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "Rahimova Dilnoza");
    }

    #[test]
    fn inspector_lookup_by_district_respects_scope() {
        let (conn, seed) = fixtures::seeded();
        let query = AutocompleteQuery { district: Some(seed.district_a), ..Default::default() };
        assert_eq!(inspectors(&conn, &Role::Unrestricted, &query).unwrap().len(), 2);

        let officer = resolve_role(&conn, seed.officer_a1_account).unwrap();
        let found = inspectors(&conn, &officer, &query).unwrap();
        assert_eq!(found, vec![Suggestion { id: seed.inspector_a1, text: "Aliyev Bobur".into() }]);
    }

    #[test]
    fn suggestions_are_capped() {
        let (conn, seed) = fixtures::seeded();
        for n in 0..25 {
            let account = fixtures::account(&conn, &format!("ps_extra{n}"));
            conn.execute(
                "INSERT INTO psychiatrists (full_name, district_id, user_id) VALUES (?1, ?2, ?3)",
                rusqlite::params![format!("Extra {n:02}"), seed.district_a, account],
            )
            .unwrap();
        }
        let found = psychiatrists(&conn, &Role::Unrestricted, &AutocompleteQuery::default()).unwrap();
        assert_eq!(found.len(), MAX_SUGGESTIONS);
    }
}
