//! Account management (unrestricted callers only).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::endpoints::Created;
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::authorization::{assign_role, resolve_role, Role, RoleAssignment};
use crate::credentials::hash_password;
use crate::db::repository;
use crate::models::{Account, AccountUpdate, NewAccount};
use crate::validation::{max_chars, require_text, ValidationError};

const USERNAME_MAX: usize = 150;
const FULL_NAME_MAX: usize = 255;
const TELEGRAM_ID_MAX: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct AccountDetail {
    #[serde(flatten)]
    pub account: Account,
    pub role: Role,
}

fn validate_profile(full_name: Option<&str>, telegram_id: Option<&str>) -> Result<(), ValidationError> {
    max_chars("full_name", full_name, FULL_NAME_MAX)?;
    max_chars("telegram_id", telegram_id, TELEGRAM_ID_MAX)
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<Vec<Account>>, ApiError> {
    caller.require_unrestricted("manage accounts")?;
    let conn = ctx.open_db()?;
    Ok(Json(repository::list_accounts(&conn, query.q.as_deref())?))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<AccountDetail>, ApiError> {
    caller.require_unrestricted("manage accounts")?;
    let conn = ctx.open_db()?;
    let account = repository::get_account(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("Account {id} not found")))?;
    let role = resolve_role(&conn, id)?;
    Ok(Json(AccountDetail { account, role }))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<NewAccount>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_unrestricted("manage accounts")?;
    require_text("username", &input.username, USERNAME_MAX)?;
    validate_profile(input.full_name.as_deref(), input.telegram_id.as_deref())?;
    let password_hash = hash_password(&input.password)?;

    let conn = ctx.open_db()?;
    let id = repository::insert_account(
        &conn,
        input.username.trim(),
        &password_hash,
        input.full_name.as_deref(),
        input.telegram_id.as_deref(),
    )?;
    tracing::info!(account_id = id, created_by = caller.account_id, "Account created");
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<AccountUpdate>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage accounts")?;
    validate_profile(input.full_name.as_deref(), input.telegram_id.as_deref())?;
    let password_hash = input.password.as_deref().map(hash_password).transpose()?;

    let conn = ctx.open_db()?;
    repository::update_account(
        &conn,
        id,
        input.full_name.as_deref(),
        input.telegram_id.as_deref(),
        input.is_active,
    )?;
    if let Some(hash) = password_hash {
        repository::set_password_hash(&conn, id, &hash)?;
        tracing::info!(account_id = id, "Password replaced");
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage accounts")?;
    if id == caller.account_id {
        return Err(ApiError::Conflict("cannot delete the signed-in account".into()));
    }
    let conn = ctx.open_db()?;
    repository::delete_account(&conn, id)?;
    tracing::info!(account_id = id, deleted_by = caller.account_id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/accounts/:id/role`: replace the account's admin/officer
/// link. Returns the resulting role.
pub async fn set_role(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(assignment): Json<RoleAssignment>,
) -> Result<Json<Role>, ApiError> {
    caller.require_unrestricted("manage accounts")?;
    let conn = ctx.open_db()?;
    repository::get_account(&conn, id)?.ok_or_else(|| ApiError::NotFound(format!("Account {id} not found")))?;
    Ok(Json(assign_role(&conn, id, assignment)?))
}
