//! API endpoint handlers.
//!
//! Each module corresponds to one resource family. Handlers open a
//! connection, call into the domain modules and map errors at the edge.

pub mod accounts;
pub mod auth;
pub mod autocomplete;
pub mod health;
pub mod hierarchy;
pub mod lookups;
pub mod monitoring;
pub mod patients;
pub mod settings;
pub mod staff;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Body of a successful create.
#[derive(Debug, Serialize)]
pub struct Created {
    pub id: i64,
}

/// Workbook bytes as a file download.
pub(crate) fn xlsx_attachment(filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response()
}
