//! Lookup tables: special-consideration reasons and social environments.
//!
//! Both tables share one set of handlers; the route picks the kind.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::endpoints::Created;
use crate::api::error::ApiError;
use crate::api::types::{AccountContext, ApiContext};
use crate::db::repository;
use crate::models::{LookupInput, LookupItem, LookupKind};
use crate::validation::require_text;

const NAME_MAX: usize = 255;

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub q: Option<String>,
}

async fn list(ctx: ApiContext, kind: LookupKind, query: LookupQuery) -> Result<Json<Vec<LookupItem>>, ApiError> {
    let conn = ctx.open_db()?;
    Ok(Json(repository::list_lookups(&conn, kind, query.q.as_deref())?))
}

async fn detail(ctx: ApiContext, kind: LookupKind, id: i64) -> Result<Json<LookupItem>, ApiError> {
    let conn = ctx.open_db()?;
    repository::get_lookup(&conn, kind, id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("{} {id} not found", kind.entity_name())))
}

async fn create(
    ctx: ApiContext,
    caller: AccountContext,
    kind: LookupKind,
    input: LookupInput,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    caller.require_unrestricted("manage lookups")?;
    require_text("name", &input.name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    let id = repository::insert_lookup(&conn, kind, input.name.trim())?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

async fn update(
    ctx: ApiContext,
    caller: AccountContext,
    kind: LookupKind,
    id: i64,
    input: LookupInput,
) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage lookups")?;
    require_text("name", &input.name, NAME_MAX)?;
    let conn = ctx.open_db()?;
    repository::update_lookup(&conn, kind, id, input.name.trim())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete(ctx: ApiContext, caller: AccountContext, kind: LookupKind, id: i64) -> Result<StatusCode, ApiError> {
    caller.require_unrestricted("manage lookups")?;
    let conn = ctx.open_db()?;
    repository::delete_lookup(&conn, kind, id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Generates the five route handlers for one lookup kind.
macro_rules! lookup_handlers {
    ($module:ident, $kind:expr) => {
        pub mod $module {
            use super::*;

            pub async fn list(
                State(ctx): State<ApiContext>,
                Query(query): Query<LookupQuery>,
            ) -> Result<Json<Vec<LookupItem>>, ApiError> {
                super::list(ctx, $kind, query).await
            }

            pub async fn detail(
                State(ctx): State<ApiContext>,
                Path(id): Path<i64>,
            ) -> Result<Json<LookupItem>, ApiError> {
                super::detail(ctx, $kind, id).await
            }

            pub async fn create(
                State(ctx): State<ApiContext>,
                Extension(caller): Extension<AccountContext>,
                Json(input): Json<LookupInput>,
            ) -> Result<(StatusCode, Json<Created>), ApiError> {
                super::create(ctx, caller, $kind, input).await
            }

            pub async fn update(
                State(ctx): State<ApiContext>,
                Extension(caller): Extension<AccountContext>,
                Path(id): Path<i64>,
                Json(input): Json<LookupInput>,
            ) -> Result<StatusCode, ApiError> {
                super::update(ctx, caller, $kind, id, input).await
            }

            pub async fn delete(
                State(ctx): State<ApiContext>,
                Extension(caller): Extension<AccountContext>,
                Path(id): Path<i64>,
            ) -> Result<StatusCode, ApiError> {
                super::delete(ctx, caller, $kind, id).await
            }
        }
    };
}

lookup_handlers!(reasons, LookupKind::ReasonForSpecialConsideration);
lookup_handlers!(environments, LookupKind::SocialDomesticEnvironment);
