//! HTTP router.
//!
//! Returns a composable `Router` with every endpoint under `/api/` and
//! stored uploads under `/media/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Extension(ApiContext) → 3. Auth validator → 4. Audit logger

use axum::extract::DefaultBodyLimit;
use axum::http::header::{HeaderValue, X_CONTENT_TYPE_OPTIONS};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::endpoints::lookups::{environments, reasons};
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::MAX_UPLOAD_BYTES;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected outside auth).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let upload_limit = DefaultBodyLimit::max(MAX_UPLOAD_BYTES as usize + MULTIPART_OVERHEAD_BYTES);

    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/me", get(endpoints::auth::me))
        // Patients
        .route("/patients", get(endpoints::patients::list).post(endpoints::patients::create))
        .route("/patients/filters", get(endpoints::patients::filters))
        .route("/patients/export", get(endpoints::patients::export))
        .route(
            "/patients/:id",
            get(endpoints::patients::detail)
                .put(endpoints::patients::update)
                .delete(endpoints::patients::delete),
        )
        .route(
            "/patients/:id/files/:event",
            post(endpoints::patients::upload).layer(upload_limit),
        )
        // Hierarchy
        .route(
            "/regions",
            get(endpoints::hierarchy::list_regions).post(endpoints::hierarchy::create_region),
        )
        .route(
            "/regions/:id",
            get(endpoints::hierarchy::get_region)
                .put(endpoints::hierarchy::update_region)
                .delete(endpoints::hierarchy::delete_region),
        )
        .route(
            "/districts",
            get(endpoints::hierarchy::list_districts).post(endpoints::hierarchy::create_district),
        )
        .route(
            "/districts/:id",
            get(endpoints::hierarchy::get_district)
                .put(endpoints::hierarchy::update_district)
                .delete(endpoints::hierarchy::delete_district),
        )
        .route(
            "/neighborhoods",
            get(endpoints::hierarchy::list_neighborhoods).post(endpoints::hierarchy::create_neighborhood),
        )
        .route(
            "/neighborhoods/:id",
            get(endpoints::hierarchy::get_neighborhood)
                .put(endpoints::hierarchy::update_neighborhood)
                .delete(endpoints::hierarchy::delete_neighborhood),
        )
        // Staff
        .route(
            "/inspectors",
            get(endpoints::staff::list_inspectors).post(endpoints::staff::create_inspector),
        )
        .route(
            "/inspectors/:id",
            get(endpoints::staff::get_inspector)
                .put(endpoints::staff::update_inspector)
                .delete(endpoints::staff::delete_inspector),
        )
        .route(
            "/psychiatrists",
            get(endpoints::staff::list_psychiatrists).post(endpoints::staff::create_psychiatrist),
        )
        .route(
            "/psychiatrists/:id",
            get(endpoints::staff::get_psychiatrist)
                .put(endpoints::staff::update_psychiatrist)
                .delete(endpoints::staff::delete_psychiatrist),
        )
        .route(
            "/doctors",
            get(endpoints::staff::list_doctors).post(endpoints::staff::create_doctor),
        )
        .route(
            "/doctors/:id",
            get(endpoints::staff::get_doctor)
                .put(endpoints::staff::update_doctor)
                .delete(endpoints::staff::delete_doctor),
        )
        // Lookups
        .route("/reasons", get(reasons::list).post(reasons::create))
        .route("/reasons/:id", get(reasons::detail).put(reasons::update).delete(reasons::delete))
        .route("/environments", get(environments::list).post(environments::create))
        .route(
            "/environments/:id",
            get(environments::detail).put(environments::update).delete(environments::delete),
        )
        // Settings
        .route("/settings", get(endpoints::settings::list).post(endpoints::settings::create))
        .route("/settings/limits", get(endpoints::settings::limits))
        .route(
            "/settings/:id",
            get(endpoints::settings::detail)
                .put(endpoints::settings::update)
                .delete(endpoints::settings::delete),
        )
        // Accounts
        .route("/accounts", get(endpoints::accounts::list).post(endpoints::accounts::create))
        .route(
            "/accounts/:id",
            get(endpoints::accounts::detail)
                .put(endpoints::accounts::update)
                .delete(endpoints::accounts::delete),
        )
        .route("/accounts/:id/role", post(endpoints::accounts::set_role))
        // Statistics and monitoring
        .route("/stats/districts", get(endpoints::monitoring::district_stats))
        .route(
            "/stats/districts/:id/neighborhoods",
            get(endpoints::monitoring::neighborhood_stats),
        )
        .route("/dashboard", get(endpoints::monitoring::dashboard))
        .route("/monitoring", get(endpoints::monitoring::districts))
        .route("/monitoring/export", get(endpoints::monitoring::export_districts))
        .route("/monitoring/:district_id", get(endpoints::monitoring::neighborhoods))
        .route(
            "/monitoring/:district_id/export",
            get(endpoints::monitoring::export_neighborhoods),
        )
        // Typeahead
        .route("/autocomplete/psychiatrists", get(endpoints::autocomplete::psychiatrists))
        .route("/autocomplete/inspectors", get(endpoints::autocomplete::inspectors))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone());

    // Stored uploads are patient records: same auth as the API.
    let media = Router::new()
        .nest_service("/media", ServeDir::new(ctx.media_dir.as_path()))
        .layer(SetResponseHeaderLayer::overriding(
            X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx));

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .merge(media)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::credentials::{generate_token, hash_password, hash_token};
    use crate::db::repository::fixtures::{self, Seed};
    use crate::db::repository::{insert_session, set_password_hash};
    use crate::db::sqlite::open_database;

    /// Router over a seeded on-disk database. Keep the tempdir alive for
    /// the duration of the test.
    fn test_app() -> (ApiContext, Seed, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::rooted_at(tmp.path());
        let conn = open_database(&config.db_path).unwrap();
        let seed = fixtures::seed(&conn);
        (ApiContext::new(&config), seed, tmp)
    }

    fn session_for(ctx: &ApiContext, account_id: i64) -> String {
        let conn = ctx.open_db().unwrap();
        let token = generate_token();
        let now = Utc::now();
        insert_session(&conn, &hash_token(&token), account_id, now, now + Duration::hours(1)).unwrap();
        token
    }

    fn request(method: &str, uri: &str, token: Option<&str>, json: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match json {
            Some(value) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn add_patient(ctx: &ApiContext, seed: &Seed, hood_id: i64, inspector_id: i64) -> i64 {
        let conn = ctx.open_db().unwrap();
        fixtures::patient(&conn, "Karimov Anvar", hood_id, inspector_id, Some(seed.psychiatrist_a), false)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (ctx, _seed, _tmp) = test_app();
        let response = api_router(ctx).oneshot(request("GET", "/api/health", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_token() {
        let (ctx, _seed, _tmp) = test_app();
        let response = api_router(ctx).oneshot(request("GET", "/api/patients", None, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn unknown_token_returns_401() {
        let (ctx, _seed, _tmp) = test_app();
        let response = api_router(ctx)
            .oneshot(request("GET", "/api/auth/me", Some("not-a-session"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_me_logout_flow() {
        let (ctx, seed, _tmp) = test_app();
        {
            let conn = ctx.open_db().unwrap();
            set_password_hash(&conn, seed.district_admin_account, &hash_password("s3cret").unwrap()).unwrap();
        }
        let app = api_router(ctx);

        let wrong = serde_json::json!({"username": "district_admin", "password": "nope"});
        let response = app.clone().oneshot(request("POST", "/api/auth/login", None, Some(wrong))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = serde_json::json!({"username": "district_admin", "password": "s3cret"});
        let response = app.clone().oneshot(request("POST", "/api/auth/login", None, Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["role"]["role"], "district_admin");
        let token = json["token"].as_str().unwrap().to_string();

        let response = app.clone().oneshot(request("GET", "/api/auth/me", Some(&token), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let json = json_body(response).await;
        assert_eq!(json["account"]["username"], "district_admin");

        let response = app.clone().oneshot(request("POST", "/api/auth/logout", Some(&token), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(request("GET", "/api/auth/me", Some(&token), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn patient_outside_scope_is_not_found() {
        let (ctx, seed, _tmp) = test_app();
        let foreign = add_patient(&ctx, &seed, seed.hood_b1, seed.inspector_b1);
        let own = add_patient(&ctx, &seed, seed.hood_a1, seed.inspector_a1);
        let token = session_for(&ctx, seed.district_admin_account);
        let app = api_router(ctx);

        let response = app
            .clone()
            .oneshot(request("GET", &format!("/api/patients/{foreign}"), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(request("GET", &format!("/api/patients/{own}"), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn roster_only_lists_scoped_patients() {
        let (ctx, seed, _tmp) = test_app();
        add_patient(&ctx, &seed, seed.hood_a1, seed.inspector_a1);
        add_patient(&ctx, &seed, seed.hood_a2, seed.inspector_a2);
        add_patient(&ctx, &seed, seed.hood_b1, seed.inspector_b1);
        let token = session_for(&ctx, seed.inspector_a1_account);

        let response = api_router(ctx)
            .oneshot(request("GET", "/api/patients", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn monitoring_requires_admin_tier() {
        let (ctx, seed, _tmp) = test_app();
        let token = session_for(&ctx, seed.inspector_a1_account);
        let response = api_router(ctx)
            .oneshot(request("GET", "/api/monitoring", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn monitoring_for_foreign_district_is_not_found() {
        let (ctx, seed, _tmp) = test_app();
        let token = session_for(&ctx, seed.district_admin_account);
        let response = api_router(ctx)
            .oneshot(request("GET", &format!("/api/monitoring/{}", seed.district_b), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn monitoring_export_is_xlsx_attachment() {
        let (ctx, seed, _tmp) = test_app();
        add_patient(&ctx, &seed, seed.hood_a1, seed.inspector_a1);
        let token = session_for(&ctx, seed.region_admin_account);
        let response = api_router(ctx)
            .oneshot(request("GET", "/api/monitoring/export", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        let disposition = response.headers().get("Content-Disposition").unwrap().to_str().unwrap();
        assert!(disposition.contains("monitoring-"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        // xlsx is a zip archive
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn account_management_is_unrestricted_only() {
        let (ctx, seed, _tmp) = test_app();
        let admin = session_for(&ctx, seed.superuser_account);
        let district_admin = session_for(&ctx, seed.district_admin_account);
        let app = api_router(ctx);

        let response = app
            .clone()
            .oneshot(request("GET", "/api/accounts", Some(&district_admin), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = serde_json::json!({"username": "new_admin", "password": "pw"});
        let response = app.clone().oneshot(request("POST", "/api/accounts", Some(&admin), Some(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = json_body(response).await["id"].as_i64().unwrap();

        let assignment = serde_json::json!({"role": "district_admin", "district_id": seed.district_b});
        let response = app
            .clone()
            .oneshot(request("POST", &format!("/api/accounts/{id}/role"), Some(&admin), Some(assignment)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["role"], "district_admin");

        let duplicate = serde_json::json!({"username": "new_admin", "password": "pw"});
        let response = app.oneshot(request("POST", "/api/accounts", Some(&admin), Some(duplicate))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn settings_limits_readable_by_any_account() {
        let (ctx, seed, _tmp) = test_app();
        let token = session_for(&ctx, seed.inspector_a1_account);
        let app = api_router(ctx);

        let response = app
            .clone()
            .oneshot(request("GET", "/api/settings/limits", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(request("GET", "/api/settings", Some(&token), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    fn multipart_request(uri: &str, token: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let boundary = "psytrack-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n").as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_stamps_event_and_serves_file() {
        let (ctx, seed, _tmp) = test_app();
        let id = add_patient(&ctx, &seed, seed.hood_a1, seed.inspector_a1);
        let token = session_for(&ctx, seed.district_admin_account);
        let app = api_router(ctx);

        let uri = format!("/api/patients/{id}/files/home_visit");
        let response = app
            .clone()
            .oneshot(multipart_request(&uri, &token, "visit.pdf", b"%PDF-1.4 test"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        let stored = json["last_home_visit_by_doctor_file"].as_str().unwrap().to_string();
        assert!(stored.starts_with("uploads/home_visit_by_doctor/"));
        assert!(!json["last_home_visit_by_doctor_date"].is_null());

        let response = app
            .clone()
            .oneshot(request("GET", &format!("/media/{stored}"), None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(request("GET", &format!("/media/{stored}"), Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-Content-Type-Options").unwrap(), "nosniff");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_extension() {
        let (ctx, seed, _tmp) = test_app();
        let id = add_patient(&ctx, &seed, seed.hood_a1, seed.inspector_a1);
        let token = session_for(&ctx, seed.psychiatrist_a_account);
        let uri = format!("/api/patients/{id}/files/psychiatric_appointment");
        let response = api_router(ctx)
            .oneshot(multipart_request(&uri, &token, "notes.docx", b"data"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (ctx, _seed, _tmp) = test_app();
        let response = api_router(ctx)
            .oneshot(request("GET", "/api/nonexistent", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
