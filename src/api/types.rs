//! Shared types for the API layer.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::authorization::Role;
use crate::config::AppConfig;
use crate::db::sqlite::open_database;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all routes and middleware. Each request opens its
/// own connection.
#[derive(Clone)]
pub struct ApiContext {
    pub db_path: Arc<PathBuf>,
    pub media_dir: Arc<PathBuf>,
}

impl ApiContext {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db_path: Arc::new(config.db_path.clone()),
            media_dir: Arc::new(config.media_dir.clone()),
        }
    }

    pub fn open_db(&self) -> Result<Connection, ApiError> {
        open_database(&self.db_path).map_err(ApiError::from)
    }
}

// ═══════════════════════════════════════════════════════════
// Account context: injected by auth middleware
// ═══════════════════════════════════════════════════════════

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the bearer token resolved to a live session.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub account_id: i64,
    pub token_hash: [u8; 32],
    pub role: Role,
}

impl AccountContext {
    /// Unrestricted, district admin or region admin.
    pub fn require_admin(&self, action: &str) -> Result<(), ApiError> {
        if self.role.is_admin_tier() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("{} may not {action}", self.role.kind())))
        }
    }

    /// Hierarchy, lookup, settings and account management.
    pub fn require_unrestricted(&self, action: &str) -> Result<(), ApiError> {
        if self.role.is_unrestricted() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("{} may not {action}", self.role.kind())))
        }
    }
}

/// Local calendar date used for every deadline computation.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: Role) -> AccountContext {
        AccountContext { account_id: 1, token_hash: [0; 32], role }
    }

    #[test]
    fn admin_tier_passes_admin_check() {
        let ctx = context(Role::DistrictAdmin { district_id: 1, region_id: 1 });
        assert!(ctx.require_admin("create patients").is_ok());
        assert!(ctx.require_unrestricted("manage accounts").is_err());
    }

    #[test]
    fn psychiatrist_is_refused_with_role_name() {
        let ctx = context(Role::Psychiatrist { psychiatrist_id: 1, district_id: 1, region_id: 1 });
        match ctx.require_admin("delete patients") {
            Err(ApiError::Forbidden(msg)) => assert_eq!(msg, "psychiatrist may not delete patients"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn context_opens_database_under_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ApiContext::new(&AppConfig::rooted_at(dir.path()));
        ctx.open_db().unwrap();
        assert!(dir.path().join("psytrack.db").exists());
    }
}
