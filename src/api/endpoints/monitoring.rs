//! Statistics, dashboard and monitoring endpoints.
//!
//! All of them require an admin-tier caller and aggregate over the
//! caller's scope only.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::{Extension, Json};

use crate::api::endpoints::xlsx_attachment;
use crate::api::error::ApiError;
use crate::api::types::{today, AccountContext, ApiContext};
use crate::export::{district_monitoring_workbook, export_filename, neighborhood_monitoring_workbook};
use crate::monitoring::{self, Dashboard, DistrictTotal, MonitoringTable, NeighborhoodStats};

fn district_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("District {id} not found"))
}

/// `GET /api/stats/districts`
pub async fn district_stats(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<Json<Vec<DistrictTotal>>, ApiError> {
    caller.require_admin("view statistics")?;
    let conn = ctx.open_db()?;
    Ok(Json(monitoring::district_patient_stats(&conn, &caller.role)?))
}

/// `GET /api/stats/districts/:id/neighborhoods`
pub async fn neighborhood_stats(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(district_id): Path<i64>,
) -> Result<Json<NeighborhoodStats>, ApiError> {
    caller.require_admin("view statistics")?;
    let conn = ctx.open_db()?;
    monitoring::neighborhood_patient_stats(&conn, &caller.role, district_id, today())?
        .map(Json)
        .ok_or_else(|| district_not_found(district_id))
}

/// `GET /api/dashboard`
pub async fn dashboard(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<Json<Dashboard>, ApiError> {
    caller.require_admin("view the dashboard")?;
    let conn = ctx.open_db()?;
    Ok(Json(monitoring::dashboard(&conn, &caller.role, today())?))
}

/// `GET /api/monitoring`
pub async fn districts(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<Json<MonitoringTable>, ApiError> {
    caller.require_admin("view monitoring")?;
    let conn = ctx.open_db()?;
    Ok(Json(monitoring::district_monitoring(&conn, &caller.role, today())?))
}

/// `GET /api/monitoring/:district_id`
pub async fn neighborhoods(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(district_id): Path<i64>,
) -> Result<Json<MonitoringTable>, ApiError> {
    caller.require_admin("view monitoring")?;
    let conn = ctx.open_db()?;
    monitoring::neighborhood_monitoring(&conn, &caller.role, district_id, today())?
        .map(Json)
        .ok_or_else(|| district_not_found(district_id))
}

/// `GET /api/monitoring/export`
pub async fn export_districts(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<Response, ApiError> {
    caller.require_admin("export monitoring")?;
    let conn = ctx.open_db()?;
    let today = today();
    let table = monitoring::district_monitoring(&conn, &caller.role, today)?;
    let bytes = district_monitoring_workbook(&table)?;
    Ok(xlsx_attachment(&export_filename("monitoring", today), bytes))
}

/// `GET /api/monitoring/:district_id/export`
pub async fn export_neighborhoods(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(district_id): Path<i64>,
) -> Result<Response, ApiError> {
    caller.require_admin("export monitoring")?;
    let conn = ctx.open_db()?;
    let today = today();
    let table = monitoring::neighborhood_monitoring(&conn, &caller.role, district_id, today)?
        .ok_or_else(|| district_not_found(district_id))?;
    let bytes = neighborhood_monitoring_workbook(&table)?;
    Ok(xlsx_attachment(&export_filename("monitoring", today), bytes))
}
