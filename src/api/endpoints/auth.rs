//! Session endpoints.
//!
//! `POST /api/auth/login`: Unprotected: username/password → bearer token
//! `POST /api/auth/logout`: Protected: revoke the presented token
//! `GET /api/auth/me`: Protected: current account and role

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::authorization::{resolve_role, Role};
use crate::config::SESSION_TTL_HOURS;
use crate::credentials::{generate_token, hash_token, verify_password};
use crate::db::repository::{
    delete_expired_sessions, delete_session, get_account, get_credentials, insert_session,
};
use crate::models::Account;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub account: Account,
    pub role: Role,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub account: Account,
    pub role: Role,
}

/// `POST /api/auth/login`: verify credentials and open a session.
///
/// Unknown usernames, wrong passwords and inactive accounts all answer 401
/// with the same message. Expired sessions are swept here.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let now = Utc::now();

    let swept = delete_expired_sessions(&conn, now)?;
    if swept > 0 {
        tracing::debug!(swept, "Expired sessions removed");
    }

    let credentials = get_credentials(&conn, request.username.trim())?;
    let account_id = match credentials {
        Some(c) if c.is_active && verify_password(&request.password, &c.password_hash)? => c.id,
        _ => {
            tracing::warn!(username = %request.username, "Failed login attempt");
            return Err(ApiError::Unauthorized);
        }
    };

    let token = generate_token();
    let expires_at = now + Duration::hours(SESSION_TTL_HOURS);
    insert_session(&conn, &hash_token(&token), account_id, now, expires_at)?;

    let account = get_account(&conn, account_id)?.ok_or(ApiError::Unauthorized)?;
    let role = resolve_role(&conn, account_id)?;
    tracing::info!(account_id, role = role.kind(), "Login");

    Ok(Json(LoginResponse {
        token,
        expires_at: expires_at.to_rfc3339(),
        account,
        role,
    }))
}

/// `POST /api/auth/logout`: revoke the current token.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.open_db()?;
    delete_session(&conn, &caller.token_hash)?;
    tracing::info!(account_id = caller.account_id, "Logout");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<Json<MeResponse>, ApiError> {
    let conn = ctx.open_db()?;
    let account = get_account(&conn, caller.account_id)?.ok_or(ApiError::Unauthorized)?;
    Ok(Json(MeResponse { account, role: caller.role }))
}
