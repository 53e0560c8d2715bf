//! Repository layer: entity-scoped database operations.
//!
//! Every list query takes a `SqlPredicate` (usually the caller's scope)
//! and composes it into the WHERE clause. Queries use fixed table
//! aliases so predicates can be shared: `p` patients, `n` neighborhoods,
//! `d` districts, `i` inspectors, `ps` psychiatrists, `doc` doctors.

mod account;
mod doctor;
mod geography;
mod inspector;
mod lookup;
mod patient;
mod psychiatrist;
mod role;
mod session;
mod settings;

use std::str::FromStr;

use rusqlite::types::Value;

use super::DatabaseError;

pub use account::*;
pub use doctor::*;
pub use geography::*;
pub use inspector::*;
pub use lookup::*;
pub use patient::*;
pub use psychiatrist::*;
pub use role::*;
pub use session::*;
pub use settings::*;

/// A SQL boolean fragment with anonymous (`?`) bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlPredicate {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self { sql: sql.into(), params }
    }

    /// Matches every row.
    pub fn always() -> Self {
        Self::new("1 = 1", Vec::new())
    }

    /// `column = ?`
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(format!("{column} = ?"), vec![value.into()])
    }

    /// Conjunction of both fragments.
    pub fn and(mut self, other: SqlPredicate) -> Self {
        self.sql = format!("({}) AND ({})", self.sql, other.sql);
        self.params.extend(other.params);
        self
    }
}

/// AND-joined WHERE clause builder.
#[derive(Debug, Default)]
pub struct Conditions {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(&mut self, predicate: &SqlPredicate) -> &mut Self {
        self.clauses.push(format!("({})", predicate.sql));
        self.params.extend(predicate.params.iter().cloned());
        self
    }

    pub fn and_eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.and(&SqlPredicate::eq(column, value))
    }

    /// Adds `column = ?` only when `value` is present.
    pub fn and_opt<V: Into<Value>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.and_eq(column, v);
        }
        self
    }

    /// Case-insensitive substring match on any of `columns`.
    pub fn and_search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        let pattern = format!("%{}%", term.to_lowercase());
        let sql = columns
            .iter()
            .map(|c| format!("casefold({c}) LIKE ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let params = columns.iter().map(|_| Value::Text(pattern.clone())).collect();
        self.and(&SqlPredicate::new(sql, params))
    }

    /// ` WHERE ...` or an empty string.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> rusqlite::ParamsFromIter<std::slice::Iter<'_, Value>> {
        rusqlite::params_from_iter(self.params.iter())
    }
}

/// Parse an optional stored enum string.
pub(crate) fn parse_opt_enum<T>(value: Option<String>) -> Result<Option<T>, DatabaseError>
where
    T: FromStr<Err = DatabaseError>,
{
    value.as_deref().map(T::from_str).transpose()
}

/// Map a changed-row count of zero to `NotFound`.
pub(crate) fn expect_changed(changed: usize, entity: &str, id: i64) -> Result<(), DatabaseError> {
    if changed == 0 {
        Err(DatabaseError::not_found(entity, id))
    } else {
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_conditions_have_no_where_clause() {
        let c = Conditions::new();
        assert_eq!(c.where_clause(), "");
    }

    #[test]
    fn conditions_join_with_and_and_keep_param_order() {
        let mut c = Conditions::new();
        c.and_eq("p.neighborhood_id", 4i64)
            .and_opt::<i64>("p.inspector_id", None)
            .and_opt("p.is_aggressive", Some(true));
        assert_eq!(
            c.where_clause(),
            " WHERE (p.neighborhood_id = ?) AND (p.is_aggressive = ?)"
        );
        assert_eq!(c.params, vec![Value::Integer(4), Value::Integer(1)]);
    }

    #[test]
    fn search_matches_any_column_lowercased() {
        let mut c = Conditions::new();
        c.and_search(&["p.full_name", "p.pinfl"], Some("  ALI "));
        assert_eq!(
            c.where_clause(),
            " WHERE (casefold(p.full_name) LIKE ? OR casefold(p.pinfl) LIKE ?)"
        );
        assert_eq!(c.params[0], Value::Text("%ali%".into()));
    }

    #[test]
    fn predicates_conjoin_with_params_in_order() {
        let p = SqlPredicate::eq("n.district_id", 2i64).and(SqlPredicate::eq("p.is_aggressive", true));
        assert_eq!(p.sql, "(n.district_id = ?) AND (p.is_aggressive = ?)");
        assert_eq!(p.params, vec![Value::Integer(2), Value::Integer(1)]);
    }

    #[test]
    fn blank_search_is_ignored() {
        let mut c = Conditions::new();
        c.and_search(&["p.full_name"], Some("   "));
        assert!(c.where_clause().is_empty());
    }
}
