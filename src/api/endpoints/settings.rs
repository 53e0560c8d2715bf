//! Settings store endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::endpoints::Created;
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::db::repository;
use crate::models::{ExaminationLimits, SettingsInput, SettingsKey};
use crate::validation::{require_text, ValidationError};

const NAME_MAX: usize = 255;
const KEY_MAX: usize = 100;
const VALUE_MAX: usize = 255;

fn validate(input: &SettingsInput) -> Result<(), ValidationError> {
    require_text("name", &input.name, NAME_MAX)?;
    require_text("key", &input.key, KEY_MAX)?;
    require_text("value", &input.value, VALUE_MAX)
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<Json<Vec<SettingsKey>>, ApiError> {
    caller.require_unrestricted("manage settings")?;
    let conn = ctx.open_db()?;
    Ok(Json(repository::list_settings(&conn)?))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<SettingsKey>, ApiError> {
    caller.require_unrestricted("manage settings")?;
    let conn = ctx.open_db()?;
    repository::get_setting(&conn, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Setting {id} not found")))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<SettingsInput>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_unrestricted("manage settings")?;
    validate(&input)?;
    let conn = ctx.open_db()?;
    let id = repository::insert_setting(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<SettingsInput>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage settings")?;
    validate(&input)?;
    let conn = ctx.open_db()?;
    repository::update_setting(&conn, id, &input)?;
    tracing::info!(key = %input.key, "Setting updated");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage settings")?;
    let conn = ctx.open_db()?;
    repository::delete_setting(&conn, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/settings/limits`: examination thresholds, readable by any
/// signed-in account. Missing keys are seeded with defaults.
pub async fn limits(State(ctx): State<ApiContext>) -> Result<Json<ExaminationLimits>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(repository::get_examination_limits(&conn)?))
}
