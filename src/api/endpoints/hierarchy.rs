//! Region / district / neighborhood endpoints.
//!
//! Reads are scoped by the caller's role; writes require an unrestricted
//! account.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::endpoints::Created;
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::authorization::{scope_predicate, ScopeTarget};
use crate::db::repository;
use crate::models::*;
use crate::validation::require_text;

const NAME_MAX: usize = 255;

#[derive(Debug, Default, Deserialize)]
pub struct DistrictQuery {
    pub region_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NeighborhoodQuery {
    pub district_id: Option<i64>,
    pub q: Option<String>,
}

// ═══════════════════════════════════════════
// Regions
// ═══════════════════════════════════════════

pub async fn list_regions(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<Json<Vec<Region>>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Region);
    Ok(Json(repository::list_regions(&conn, &scope)?))
}

pub async fn get_region(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<Region>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Region);
    repository::get_region(&conn, id, &scope)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Region {id} not found")))
}

pub async fn create_region(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<RegionInput>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_unrestricted("manage regions")?;
    require_text("name", &input.name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    let id = repository::insert_region(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update_region(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<RegionInput>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage regions")?;
    require_text("name", &input.name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    repository::update_region(&conn, id, &input)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_region(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage regions")?;
    let conn = ctx.open_db()?;
    repository::delete_region(&conn, id)?;
    tracing::info!(region_id = id, "Region deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════
// Districts
// ═══════════════════════════════════════════

pub async fn list_districts(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(query): Query<DistrictQuery>,
) -> Result<Json<Vec<District>>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::District);
    Ok(Json(repository::list_districts(&conn, &scope, query.region_id)?))
}

pub async fn get_district(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<District>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::District);
    repository::get_district(&conn, id, &scope)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("District {id} not found")))
}

pub async fn create_district(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<DistrictInput>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_unrestricted("manage districts")?;
    require_text("name", &input.name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    let id = repository::insert_district(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update_district(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<DistrictInput>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage districts")?;
    require_text("name", &input.name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    repository::update_district(&conn, id, &input)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_district(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage districts")?;
    let conn = ctx.open_db()?;
    repository::delete_district(&conn, id)?;
    tracing::info!(district_id = id, "District deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════
// Neighborhoods
// ═══════════════════════════════════════════

pub async fn list_neighborhoods(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(query): Query<NeighborhoodQuery>,
) -> Result<Json<Vec<Neighborhood>>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Neighborhood);
    Ok(Json(repository::list_neighborhoods(
        &conn,
        &scope,
        query.district_id,
        query.q.as_deref(),
    )?))
}

pub async fn get_neighborhood(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<Neighborhood>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Neighborhood);
    repository::get_neighborhood(&conn, id, &scope)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Neighborhood {id} not found")))
}

pub async fn create_neighborhood(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<NeighborhoodInput>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_unrestricted("manage neighborhoods")?;
    require_text("name", &input.name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    let id = repository::insert_neighborhood(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update_neighborhood(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<NeighborhoodInput>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage neighborhoods")?;
    require_text("name", &input.name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    repository::update_neighborhood(&conn, id, &input)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_neighborhood(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage neighborhoods")?;
    let conn = ctx.open_db()?;
    repository::delete_neighborhood(&conn, id)?;
    tracing::info!(neighborhood_id = id, "Neighborhood deleted");
    Ok(StatusCode::NO_CONTENT)
}
