use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::middleware::{known_user, CurrentUser};
use crate::errors::ApiError;
use crate::filters::Filters;
use crate::fitness::dto::{CreateFitnessRequest, ListParams, UpdateFitnessRequest};
use crate::fitness::repo;
use crate::request::JsonBody;
use crate::state::AppState;
use crate::validator::Validator;

const SORT_SAFELIST: &[&str] = &[
    "id", "steps", "cups", "date", "-id", "-steps", "-cups", "-date",
];

fn validate_counts(v: &mut Validator, steps: i32, cups: i32) {
    v.check(steps >= 0, "steps", "must not be negative");
    v.check(cups >= 0, "cups", "must not be negative");
}

/// POST /v1/fitness (records:write)
#[instrument(skip(state, current, payload))]
pub async fn create(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    JsonBody(payload): JsonBody<CreateFitnessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = known_user(current)?;

    let mut v = Validator::new();
    validate_counts(&mut v, payload.steps, payload.cups);
    if !v.is_valid() {
        return Err(ApiError::Validation(v.errors));
    }

    let record = repo::insert(&state.db, user.id, payload.steps, payload.cups, payload.date).await?;

    info!(user_id = %user.id, record_id = %record.id, "fitness record created");
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/v1/fitness/{}", record.id))],
        Json(json!({ "fitness": record })),
    ))
}

/// GET /v1/fitness (records:read)
#[instrument(skip(state, current, params))]
pub async fn list(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = known_user(current)?;

    let filters = Filters {
        page: params.page,
        page_size: params.page_size,
        sort: params.sort.clone(),
        sort_safelist: SORT_SAFELIST,
    };

    let mut v = Validator::new();
    filters.validate(&mut v);
    if !v.is_valid() {
        return Err(ApiError::Validation(v.errors));
    }

    let (records, metadata) =
        repo::list(&state.db, user.id, params.steps, params.cups, &filters).await?;

    Ok(Json(json!({ "fitness": records, "metadata": metadata })))
}

/// GET /v1/fitness/:id (records:read)
#[instrument(skip(state, current))]
pub async fn show(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = known_user(current)?;
    let record = repo::get(&state.db, user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(json!({ "fitness": record })))
}

/// PATCH /v1/fitness/:id (records:write)
#[instrument(skip(state, current, payload))]
pub async fn update(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateFitnessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = known_user(current)?;

    let mut record = repo::get(&state.db, user.id, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if let Some(steps) = payload.steps {
        record.steps = steps;
    }
    if let Some(cups) = payload.cups {
        record.cups = cups;
    }
    if let Some(date) = payload.date {
        record.date = date;
    }

    let mut v = Validator::new();
    validate_counts(&mut v, record.steps, record.cups);
    if !v.is_valid() {
        return Err(ApiError::Validation(v.errors));
    }

    repo::update(&state.db, &record).await?;

    info!(user_id = %user.id, record_id = %record.id, "fitness record updated");
    Ok(Json(json!({ "fitness": record })))
}

/// DELETE /v1/fitness/:id (records:write)
#[instrument(skip(state, current))]
pub async fn delete(
    State(state): State<AppState>,
    current: Option<Extension<CurrentUser>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let user = known_user(current)?;
    repo::delete(&state.db, user.id, id).await?;

    info!(user_id = %user.id, record_id = %id, "fitness record deleted");
    Ok(Json(json!({ "message": "fitness record successfully deleted" })))
}
