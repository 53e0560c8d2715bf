//! Inspector, psychiatrist and doctor endpoints.
//!
//! Inspectors and psychiatrists carry a login account, so writing them is
//! account management and needs an unrestricted caller. Doctors may be
//! managed by any admin-tier role inside its scope.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rusqlite::Connection;

use crate::api::endpoints::Created;
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::authorization::{scope_predicate, ScopeTarget};
use crate::db::repository;
use crate::models::*;
use crate::validation::{max_chars, require_text, ValidationError};

const NAME_MAX: usize = 255;
const DOCTOR_PHONE_MAX: usize = 13;

fn validate_doctor(input: &DoctorInput) -> Result<(), ValidationError> {
    require_text("full_name", &input.full_name, NAME_MAX)?;
    max_chars("phone", input.phone.as_deref(), DOCTOR_PHONE_MAX)?;
    max_chars("brigade_number", input.brigade_number.as_deref(), NAME_MAX)?;
    max_chars("polyclinic_name", input.polyclinic_name.as_deref(), NAME_MAX)
}

/// Doctors may only be placed in neighborhoods the caller can see.
fn ensure_neighborhood_visible(conn: &Connection, caller: &AccountContext, id: i64) -> Result<(), ApiError> {
    let scope = scope_predicate(&caller.role, ScopeTarget::Neighborhood);
    repository::get_neighborhood(conn, id, &scope)?
        .map(|_| ())
        .ok_or_else(|| ApiError::Forbidden(format!("neighborhood {id} is outside your scope")))
}

// ═══════════════════════════════════════════
// Inspectors
// ═══════════════════════════════════════════

pub async fn list_inspectors(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(filter): Query<StaffFilter>,
) -> Result<Json<Vec<Inspector>>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Inspector);
    Ok(Json(repository::list_inspectors(&conn, &scope, &filter)?))
}

pub async fn get_inspector(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<Inspector>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Inspector);
    repository::get_inspector(&conn, id, &scope)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Inspector {id} not found")))
}

pub async fn create_inspector(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<InspectorInput>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_unrestricted("manage inspectors")?;
    require_text("full_name", &input.full_name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    let id = repository::insert_inspector(&conn, &input)?;
    tracing::info!(inspector_id = id, neighborhood_id = input.neighborhood_id, "Inspector created");
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update_inspector(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<InspectorInput>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage inspectors")?;
    require_text("full_name", &input.full_name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    repository::update_inspector(&conn, id, &input)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Refused with 409 while the inspector still owns patients.
pub async fn delete_inspector(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage inspectors")?;
    let conn = ctx.open_db()?;
    repository::delete_inspector(&conn, id)?;
    tracing::info!(inspector_id = id, "Inspector deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════
// Psychiatrists
// ═══════════════════════════════════════════

pub async fn list_psychiatrists(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(filter): Query<StaffFilter>,
) -> Result<Json<Vec<Psychiatrist>>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Psychiatrist);
    Ok(Json(repository::list_psychiatrists(&conn, &scope, &filter)?))
}

pub async fn get_psychiatrist(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<Psychiatrist>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Psychiatrist);
    repository::get_psychiatrist(&conn, id, &scope)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Psychiatrist {id} not found")))
}

pub async fn create_psychiatrist(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<PsychiatristInput>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_unrestricted("manage psychiatrists")?;
    require_text("full_name", &input.full_name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    let id = repository::insert_psychiatrist(&conn, &input)?;
    tracing::info!(psychiatrist_id = id, district_id = input.district_id, "Psychiatrist created");
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update_psychiatrist(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<PsychiatristInput>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage psychiatrists")?;
    require_text("full_name", &input.full_name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    repository::update_psychiatrist(&conn, id, &input)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Patients of a removed psychiatrist keep existing without one.
pub async fn delete_psychiatrist(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage psychiatrists")?;
    let conn = ctx.open_db()?;
    repository::delete_psychiatrist(&conn, id)?;
    tracing::info!(psychiatrist_id = id, "Psychiatrist deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════
// Doctors
// ═══════════════════════════════════════════

pub async fn list_doctors(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(filter): Query<StaffFilter>,
) -> Result<Json<Vec<Doctor>>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Doctor);
    Ok(Json(repository::list_doctors(&conn, &scope, &filter)?))
}

pub async fn get_doctor(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<Doctor>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Doctor);
    repository::get_doctor(&conn, id, &scope)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Doctor {id} not found")))
}

pub async fn create_doctor(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<DoctorInput>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_admin("create doctors")?;
    validate_doctor(&input)?;
    let conn = ctx.open_db()?;
    ensure_neighborhood_visible(&conn, &caller, input.neighborhood_id)?;
    let id = repository::insert_doctor(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update_doctor(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<DoctorInput>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin("edit doctors")?;
    validate_doctor(&input)?;
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Doctor);
    repository::get_doctor(&conn, id, &scope)?
        .ok_or_else(|| ApiError::NotFound(format!("Doctor {id} not found")))?;
    ensure_neighborhood_visible(&conn, &caller, input.neighborhood_id)?;
    repository::update_doctor(&conn, id, &input)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_doctor(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_admin("delete doctors")?;
    let conn = ctx.open_db()?;
    let scope = scope_predicate(&caller.role, ScopeTarget::Doctor);
    repository::get_doctor(&conn, id, &scope)?
        .ok_or_else(|| ApiError::NotFound(format!("Doctor {id} not found")))?;
    repository::delete_doctor(&conn, id)?;
    tracing::info!(doctor_id = id, "Doctor deleted");
    Ok(StatusCode::NO_CONTENT)
}
