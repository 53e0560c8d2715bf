//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves the session to an
//! account and its role, and injects `AccountContext` into request
//! extensions for downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::authorization::resolve_role;
use crate::credentials::hash_token;
use crate::db::repository::find_session_account;

/// Require a live session token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `AccountContext` and adds `Cache-Control: no-store`.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(mut req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;
    let token_hash = hash_token(token);

    let account = {
        let conn = ctx.open_db()?;
        let account_id =
            find_session_account(&conn, &token_hash, chrono::Utc::now())?.ok_or(ApiError::Unauthorized)?;
        let role = resolve_role(&conn, account_id)?;
        AccountContext { account_id, token_hash, role }
    }; // Connection dropped here, before any .await

    req.extensions_mut().insert(account);

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}
