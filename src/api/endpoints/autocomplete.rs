//! Typeahead endpoints for staff pickers.

use axum::extract::{Query, State};
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::autocomplete::{self, AutocompleteQuery, Suggestion};

/// `GET /api/autocomplete/psychiatrists?neighborhood=&district=&q=`
pub async fn psychiatrists(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(autocomplete::psychiatrists(&conn, &caller.role, &query)?))
}

/// `GET /api/autocomplete/inspectors?neighborhood=&district=&q=`
pub async fn inspectors(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<AccountContext>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(autocomplete::inspectors(&conn, &caller.role, &query)?))
}
