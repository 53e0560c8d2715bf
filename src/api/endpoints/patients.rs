//! Patient endpoints.
//!
//! - `GET /api/patients`: scoped roster with filters
//! - `POST /api/patients`: create (admin tier)
//! - `GET|PUT|DELETE /api/patients/:id`
//! - `POST /api/patients/:id/files/:event`: multipart evidentiary upload
//! - `GET /api/patients/filters`: scoped filter options
//! - `GET /api/patients/export`: roster workbook

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};

use crate::api::endpoints::{xlsx_attachment, Created};
use crate::api::error::ApiError;
use crate::api::types::{today, AccountContext, ApiContext};
use crate::export::{export_filename, patients_workbook};
use crate::models::{PatientFilter, PatientInput, TrackedEvent};
use crate::patients::{self, FilterOptions, PatientCard};
use crate::uploads::check_upload;

/// Multipart field carrying the file.
const FILE_FIELD: &str = "file";

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<Vec<PatientCard>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(patients::list_roster(&conn, &caller.role, &filter, today())?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Json(input): Json<PatientInput>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let conn = ctx.open_db()?;
    let id = patients::create_patient(&conn, &caller.role, input)?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<Json<PatientCard>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(patients::get_card(&conn, &caller.role, id, today())?))
}

/// `PUT /api/patients/:id`: full replacement of the writable fields.
/// Fields the caller's role may not edit must be sent unchanged.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
    Json(input): Json<PatientInput>,
) -> Result<Json<PatientCard>, ApiError> {
    let conn = ctx.open_db()?;
    patients::update_patient(&conn, &caller.role, id, input)?;
    Ok(Json(patients::get_card(&conn, &caller.role, id, today())?))
}

pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.open_db()?;
    patients::delete_patient(&conn, &caller.role, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/patients/:id/files/:event`: store the `file` part and stamp
/// the event date to today.
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Path((id, event)): Path<(i64, TrackedEvent)>,
    mut multipart: Multipart,
) -> Result<Json<PatientCard>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("File part has no filename".into()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Cannot read upload: {e}")))?;
        file = Some((filename, bytes));
        break;
    }
    let (filename, bytes) = file.ok_or_else(|| ApiError::BadRequest(format!("Missing '{FILE_FIELD}' part")))?;

    // Reject before touching the database.
    check_upload(&filename, bytes.len() as u64)?;

    let conn = ctx.open_db()?;
    let card = patients::attach_file(
        &conn,
        &caller.role,
        &ctx.media_dir,
        id,
        event,
        &filename,
        &bytes,
        today(),
    )?;
    tracing::info!(patient_id = id, event = event.as_str(), size = bytes.len(), "Evidentiary file attached");
    Ok(Json(card))
}

pub async fn filters(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
) -> Result<Json<FilterOptions>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(patients::filter_options(&conn, &caller.role)?))
}

/// `GET /api/patients/export`: the filtered roster as xlsx.
pub async fn export(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(filter): Query<PatientFilter>,
) -> Result<Response, ApiError> {
    let conn = ctx.open_db()?;
    let today = today();
    let cards = patients::list_roster(&conn, &caller.role, &filter, today)?;
    let bytes = patients_workbook(&cards)?;
    tracing::info!(rows = cards.len(), account_id = caller.account_id, "Roster exported");
    Ok(xlsx_attachment(&export_filename("patients", today), bytes))
}
