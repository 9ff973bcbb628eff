// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        actor::{Actor, Role},
        question::CreateQuestionRequest,
        quiz::{CreateQuizRequest, Quiz, QuizStatus, UpdateQuizStatusRequest},
    },
    quiz::projector,
    state::SharedStore,
    utils::{extract::AppJson, html::clean_html, jwt::Claims},
};

/// Loads a quiz and checks the caller may author it.
async fn managed_quiz(store: &SharedStore, quiz_id: &str, actor: &Actor) -> Result<Quiz, AppError> {
    let quiz = store
        .find_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !actor.can_manage(&quiz.teacher_id) {
        return Err(AppError::Forbidden(
            "Only the quiz owner can modify this quiz".to_string(),
        ));
    }
    Ok(quiz)
}

/// Creates a new quiz in DRAFT.
/// Teachers and admins only; the caller becomes the owner.
pub async fn create_quiz(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;
    if actor.role == Role::Student {
        return Err(AppError::Forbidden("Students cannot create quizzes".to_string()));
    }
    payload.check()?;

    let now = Utc::now();
    let quiz = Quiz {
        id: uuid::Uuid::new_v4().to_string(),
        teacher_id: actor.id,
        subject_id: payload.subject_id,
        title: clean_html(payload.title.trim()),
        description: payload.description.as_deref().map(clean_html),
        time_limit_minutes: payload.time_limit_minutes,
        passing_score: payload.passing_score,
        shuffle_questions: payload.shuffle_questions,
        shuffle_answers: payload.shuffle_answers,
        show_results: payload.show_results,
        start_date: payload.start_date,
        end_date: payload.end_date,
        status: QuizStatus::Draft,
        created_at: now,
        updated_at: now,
    };

    store.create_quiz(&quiz).await.map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::from(e)
    })?;

    tracing::info!("Teacher {} created quiz {}", quiz.teacher_id, quiz.id);

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Returns a quiz.
///
/// * Owner / admin: full quiz including answer keys.
/// * Student: header of a published quiz in an enrolled subject, plus their attempt if any.
pub async fn get_quiz(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;

    let quiz = store
        .find_quiz(&quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let own_attempt = match actor.role {
        _ if actor.can_manage(&quiz.teacher_id) => None,
        Role::Student => {
            // Unpublished quizzes do not exist as far as students are concerned.
            if quiz.status != QuizStatus::Published {
                return Err(AppError::NotFound("Quiz not found".to_string()));
            }
            if !store.has_subject_access(&actor.id, &quiz.subject_id).await? {
                return Err(AppError::Forbidden(
                    "You are not enrolled in this quiz's subject".to_string(),
                ));
            }
            store.find_attempt(&quiz.id, &actor.id).await?
        }
        Role::Teacher | Role::Admin => {
            return Err(AppError::Forbidden(
                "Only the quiz owner can view this quiz".to_string(),
            ));
        }
    };

    let questions = store.find_questions_by_quiz(&quiz.id).await?;

    Ok(Json(projector::project_quiz(
        &actor,
        quiz,
        questions,
        own_attempt.as_ref(),
    )))
}

/// Adds a question to a DRAFT quiz.
/// Display order defaults to the next free slot.
pub async fn add_question(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
    AppJson(payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;
    let quiz = managed_quiz(&store, &quiz_id, &actor).await?;

    if quiz.status != QuizStatus::Draft {
        return Err(AppError::InvalidState(
            "Questions can only be added to draft quizzes".to_string(),
        ));
    }

    let display_order = match payload.display_order {
        Some(order) => order,
        None => store
            .find_questions_by_quiz(&quiz.id)
            .await?
            .iter()
            .map(|q| q.display_order + 1)
            .max()
            .unwrap_or(0),
    };

    let question = payload.into_question(&quiz.id, display_order, Utc::now())?;
    store.create_question(&question).await?;

    tracing::info!(
        "Added {} question {} to quiz {}",
        question.kind(),
        question.id,
        quiz.id
    );

    Ok((StatusCode::CREATED, Json(question)))
}

/// Moves a quiz through DRAFT -> PUBLISHED -> ARCHIVED.
pub async fn update_quiz_status(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<String>,
    AppJson(payload): AppJson<UpdateQuizStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::try_from(&claims)?;
    let quiz = managed_quiz(&store, &quiz_id, &actor).await?;

    if !quiz.status.can_transition_to(payload.status) {
        return Err(AppError::InvalidState(format!(
            "Cannot move quiz from {} to {}",
            quiz.status, payload.status
        )));
    }

    if payload.status == QuizStatus::Published
        && store.find_questions_by_quiz(&quiz.id).await?.is_empty()
    {
        return Err(AppError::InvalidState(
            "Cannot publish a quiz without questions".to_string(),
        ));
    }

    let updated = store.update_quiz_status(&quiz.id, payload.status).await?;
    tracing::info!("Quiz {} is now {}", updated.id, updated.status);

    Ok(Json(updated))
}
