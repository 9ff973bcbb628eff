// src/handlers/grading.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{actor::Actor, answer::GradeEssayRequest, attempt::AttemptListEntry},
    quiz::scoring,
    state::SharedStore,
    utils::{extract::AppJson, jwt::Claims},
};

/// Grades an essay answer and recomputes its attempt.
/// Quiz owner or admin only.
pub async fn grade_answer(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(answer_id): Path<String>,
    AppJson(req): AppJson<GradeEssayRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;

    let graded = scoring::grade_essay(store.as_ref(), &answer_id, &actor, req, Utc::now()).await?;

    Ok(Json(graded))
}

/// Lists every attempt on a quiz with the number of answers still awaiting a grade.
/// Quiz owner or admin only.
pub async fn list_attempts(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;

    let quiz = store
        .find_quiz(&quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !actor.can_manage(&quiz.teacher_id) {
        return Err(AppError::Forbidden(
            "Only the quiz owner can list attempts".to_string(),
        ));
    }

    let attempts = store.list_attempts_by_quiz(&quiz.id).await?;
    let mut entries = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        let pending_grading = store
            .find_answers_by_attempt(&attempt.id)
            .await?
            .iter()
            .filter(|a| a.is_pending())
            .count();
        entries.push(AttemptListEntry {
            attempt,
            pending_grading,
        });
    }

    Ok(Json(entries))
}
