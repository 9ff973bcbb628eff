// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{actor::Actor, answer::SubmitAttemptRequest},
    quiz::lifecycle,
    state::SharedStore,
    utils::{extract::AppJson, jwt::Claims},
};

/// Starts an attempt on a quiz, or resumes the caller's open one.
///
/// Returns 201 for a new attempt and 200 for a resumed one. Questions come
/// back in presentation order without answer keys.
pub async fn start_attempt(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;

    let view = lifecycle::start_attempt(store.as_ref(), &quiz_id, &actor, Utc::now()).await?;

    let status = if view.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(view)))
}

/// Submits the caller's attempt and grades what can be graded automatically.
pub async fn submit_attempt(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;

    let view = lifecycle::submit_attempt(store.as_ref(), &attempt_id, &actor, req, Utc::now()).await?;

    Ok(Json(view))
}

/// Returns an attempt's graded detail, subject to the viewer's access.
pub async fn get_attempt(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;

    let results = lifecycle::attempt_results(store.as_ref(), &attempt_id, &actor).await?;

    Ok(Json(results))
}
