// src/quiz/lifecycle.rs

//! Attempt lifecycle: NONE -> IN_PROGRESS -> SUBMITTED -> GRADED.
//!
//! `start` creates or resumes the single attempt a student has per quiz;
//! `submit` grades and closes it. Grading of essays lives in `scoring`.

use chrono::{DateTime, Duration, Utc};
use validator::Validate;

use super::{
    projector::{self, ResultView, SubmissionView, TakingView},
    randomizer, scoring,
};
use crate::{
    config::TIME_LIMIT_GRACE_SECONDS,
    error::AppError,
    models::{
        actor::{Actor, Role},
        answer::SubmitAttemptRequest,
        attempt::{AttemptStatus, QuizAttempt, SubmissionRecord},
        quiz::{Availability, Quiz, QuizStatus},
    },
    store::{EntityStore, StoreError},
};

/// Starts an attempt, or resumes the student's open one.
///
/// The existence check below is advisory. Two concurrent starts can both pass
/// it; the store's unique (quiz, student) key rejects the loser, which then
/// resolves against the winner's row.
pub async fn start_attempt(
    store: &dyn EntityStore,
    quiz_id: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<TakingView, AppError> {
    if actor.role != Role::Student {
        return Err(AppError::Forbidden(
            "Only students can attempt quizzes".to_string(),
        ));
    }

    let quiz = store
        .find_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if quiz.status != QuizStatus::Published {
        return Err(AppError::InvalidState("Quiz is not published".to_string()));
    }
    match quiz.availability_at(now) {
        Availability::NotYetOpen => {
            return Err(AppError::InvalidState("Quiz is not open yet".to_string()));
        }
        Availability::Closed => {
            return Err(AppError::InvalidState("Quiz has closed".to_string()));
        }
        Availability::Open => {}
    }

    if !store.has_subject_access(&actor.id, &quiz.subject_id).await? {
        return Err(AppError::Forbidden(
            "You are not enrolled in this quiz's subject".to_string(),
        ));
    }

    if let Some(existing) = store.find_attempt(&quiz.id, &actor.id).await? {
        return resume_or_reject(store, &quiz, existing).await;
    }

    let attempt = QuizAttempt::start(&quiz.id, &actor.id, now);
    match store.create_attempt(&attempt).await {
        Ok(()) => {
            tracing::info!(
                "Student {} started attempt {} on quiz {}",
                actor.id,
                attempt.id,
                quiz.id
            );
            render(store, &quiz, &attempt, false).await
        }
        Err(StoreError::UniqueViolation(_)) => {
            tracing::warn!(
                "Concurrent start for quiz {} by student {}, using existing attempt",
                quiz.id,
                actor.id
            );
            let existing = store
                .find_attempt(&quiz.id, &actor.id)
                .await?
                .ok_or(AppError::InternalServerError(
                    "Attempt vanished after unique violation".to_string(),
                ))?;
            resume_or_reject(store, &quiz, existing).await
        }
        Err(e) => Err(e.into()),
    }
}

async fn resume_or_reject(
    store: &dyn EntityStore,
    quiz: &Quiz,
    existing: QuizAttempt,
) -> Result<TakingView, AppError> {
    match existing.status {
        AttemptStatus::InProgress => {
            tracing::debug!("Resuming attempt {}", existing.id);
            render(store, quiz, &existing, true).await
        }
        AttemptStatus::Submitted | AttemptStatus::Graded => Err(AppError::AlreadyCompleted {
            attempt_id: existing.id,
        }),
    }
}

async fn render(
    store: &dyn EntityStore,
    quiz: &Quiz,
    attempt: &QuizAttempt,
    resumed: bool,
) -> Result<TakingView, AppError> {
    let questions = store.find_questions_by_quiz(&quiz.id).await?;
    let arranged = {
        let mut rng = rand::thread_rng();
        randomizer::arrange(quiz, questions, &mut rng)
    };
    Ok(projector::taking_view(quiz, attempt, &arranged, resumed))
}

/// Grades and closes an IN_PROGRESS attempt.
pub async fn submit_attempt(
    store: &dyn EntityStore,
    attempt_id: &str,
    actor: &Actor,
    req: SubmitAttemptRequest,
    now: DateTime<Utc>,
) -> Result<SubmissionView, AppError> {
    req.validate()?;

    let attempt = store
        .find_attempt_by_id(attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.student_id != actor.id {
        return Err(AppError::Forbidden(
            "This attempt belongs to another student".to_string(),
        ));
    }
    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::InvalidState(
            "Attempt has already been submitted".to_string(),
        ));
    }

    let quiz = store
        .find_quiz(&attempt.quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    let elapsed = now - attempt.started_at;
    if let Some(limit) = quiz.time_limit_seconds() {
        // Compared at full precision; the grace period is the only slack.
        if elapsed > Duration::seconds(limit + TIME_LIMIT_GRACE_SECONDS) {
            tracing::info!(
                "Rejected late submission of attempt {}: {}ms elapsed, limit {}s",
                attempt.id,
                elapsed.num_milliseconds(),
                limit
            );
            return Err(AppError::TimeLimitExceeded(format!(
                "Time limit of {} minutes exceeded",
                limit / 60
            )));
        }
    }

    let questions = store.find_questions_by_quiz(&quiz.id).await?;
    let answers = scoring::score_submission(&attempt.id, &questions, &req.answers, now)?;
    let aggregate = scoring::aggregate(&quiz, &questions, &answers);

    let record = SubmissionRecord {
        aggregate,
        submitted_at: now,
        time_spent_seconds: req
            .time_spent_seconds
            .unwrap_or_else(|| elapsed.num_seconds())
            .max(0),
    };
    let attempt = store.submit_attempt(&attempt.id, &answers, &record).await?;

    tracing::info!(
        "Attempt {} submitted: {} ({}/{}), {} answer(s) pending grading",
        attempt.id,
        attempt.status,
        record.aggregate.score,
        record.aggregate.max_score,
        record.aggregate.pending_count
    );

    projector::project_submission(actor, &quiz, attempt, &questions, answers)
}

/// Loads an attempt's results as the viewer is allowed to see them.
pub async fn attempt_results(
    store: &dyn EntityStore,
    attempt_id: &str,
    actor: &Actor,
) -> Result<ResultView, AppError> {
    let attempt = store
        .find_attempt_by_id(attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;
    let quiz = store
        .find_quiz(&attempt.quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    // Check before loading answers so a denied viewer costs two lookups only.
    match projector::result_access(actor, &quiz, &attempt) {
        projector::ResultAccess::Full => {}
        projector::ResultAccess::Withheld(reason) => {
            return Err(AppError::ResultsNotAvailable(reason.to_string()));
        }
        projector::ResultAccess::Denied(reason) => {
            return Err(AppError::Forbidden(reason.to_string()));
        }
    }

    let questions = store.find_questions_by_quiz(&quiz.id).await?;
    let answers = store.find_answers_by_attempt(&attempt.id).await?;
    projector::project_results(actor, &quiz, attempt, &questions, answers)
}
