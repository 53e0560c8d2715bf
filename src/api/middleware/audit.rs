//! Audit logging middleware.
//!
//! Logs every authenticated request with account, role, method, path and
//! response status. Runs innermost, after auth has injected the account.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::AccountContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let caller = req
        .extensions()
        .get::<AccountContext>()
        .map(|a| (a.account_id, a.role.kind()));

    let response = next.run(req).await;

    let status = response.status().as_u16();
    match caller {
        Some((account_id, role)) => {
            tracing::info!(account_id, role, %method, %path, status, "API access");
        }
        None => tracing::info!(%method, %path, status, "API access"),
    }
    response
}
