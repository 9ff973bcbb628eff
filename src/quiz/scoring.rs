// src/quiz/scoring.rs

//! Scoring engine: per-answer grading at submission time, manual essay grades,
//! and the attempt aggregate that is recomputed after every grade.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        actor::{Actor, Role},
        answer::{Answer, AnswerPayload, EssayGrade, GradeEssayRequest, SubmittedAnswer},
        attempt::{AttemptAggregate, AttemptStatus, QuizAttempt},
        question::{Question, QuestionBody, QuestionOption},
        quiz::Quiz,
    },
    store::EntityStore,
    utils::html::clean_html,
};

/// Result of grading a single answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// `None` while an essay waits for a grader.
    pub is_correct: Option<bool>,
    pub points_awarded: Option<i32>,
}

impl AnswerOutcome {
    const PENDING: AnswerOutcome = AnswerOutcome {
        is_correct: None,
        points_awarded: None,
    };

    fn choice(question: &Question, is_correct: bool) -> Self {
        AnswerOutcome {
            is_correct: Some(is_correct),
            points_awarded: Some(if is_correct { question.points } else { 0 }),
        }
    }
}

/// Maps a TRUE_FALSE boolean onto an option id: by option text first, then by position.
fn resolve_boolean(options: &[QuestionOption], value: bool) -> Option<&str> {
    let wanted = if value { "true" } else { "false" };
    options
        .iter()
        .find(|o| o.text.trim().eq_ignore_ascii_case(wanted))
        .or_else(|| options.get(if value { 0 } else { 1 }))
        .map(|o| o.id.as_str())
}

fn is_correct_option(question: &Question, option_id: &str) -> bool {
    question
        .correct_option()
        .is_some_and(|correct| correct.id == option_id)
}

/// Grades one answer against its question. Essays come back pending.
pub fn grade_answer(question: &Question, payload: &AnswerPayload) -> Result<AnswerOutcome, AppError> {
    match (&question.body, payload) {
        (
            QuestionBody::MultipleChoice { .. } | QuestionBody::TrueFalse { .. },
            AnswerPayload::SelectedOption { option_id },
        ) => Ok(AnswerOutcome::choice(question, is_correct_option(question, option_id))),
        (QuestionBody::TrueFalse { options }, AnswerPayload::Boolean { value }) => {
            let is_correct = resolve_boolean(options, *value)
                .is_some_and(|option_id| is_correct_option(question, option_id));
            Ok(AnswerOutcome::choice(question, is_correct))
        }
        (QuestionBody::Essay { word_limit }, AnswerPayload::Text { text }) => {
            if let Some(limit) = word_limit {
                let words = text.split_whitespace().count();
                if words > *limit as usize {
                    return Err(AppError::ValidationFailed(format!(
                        "Answer to question {} has {} words, limit is {}",
                        question.id, words, limit
                    )));
                }
            }
            Ok(AnswerOutcome::PENDING)
        }
        _ => Err(AppError::ValidationFailed(format!(
            "Answer to question {} does not match question type {}",
            question.id,
            question.kind()
        ))),
    }
}

/// Builds and grades the answer rows of a submission.
///
/// All-or-nothing: the first unknown question id, duplicate or malformed answer
/// fails the whole batch. Essays left unanswered still get a pending row so the
/// grader can resolve them.
///
/// Essay text is stored sanitized, as HTML: markup outside the allow-list is
/// dropped and bare `<`, `>` and `&` are stored as entities (`x < y` becomes
/// `x &lt; y`). Clients display it as HTML, never as raw text.
pub fn score_submission(
    attempt_id: &str,
    questions: &[Question],
    submitted: &[SubmittedAnswer],
    now: DateTime<Utc>,
) -> Result<Vec<Answer>, AppError> {
    let by_id: HashMap<&str, &Question> = questions.iter().map(|q| (q.id.as_str(), q)).collect();
    let mut answered: HashSet<&str> = HashSet::new();
    let mut answers = Vec::with_capacity(questions.len());

    for item in submitted {
        let question = by_id.get(item.question_id.as_str()).ok_or_else(|| {
            AppError::InvalidQuestion(format!(
                "Question {} does not belong to this quiz",
                item.question_id
            ))
        })?;
        if !answered.insert(question.id.as_str()) {
            return Err(AppError::ValidationFailed(format!(
                "Question {} was answered more than once",
                question.id
            )));
        }

        let payload = match &item.answer {
            AnswerPayload::Text { text } => AnswerPayload::Text {
                text: clean_html(text),
            },
            other => other.clone(),
        };
        let outcome = grade_answer(question, &payload)?;
        answers.push(new_answer(attempt_id, &question.id, payload, outcome, now));
    }

    for question in questions {
        if !question.is_auto_gradable() && !answered.contains(question.id.as_str()) {
            let payload = AnswerPayload::Text {
                text: String::new(),
            };
            answers.push(new_answer(
                attempt_id,
                &question.id,
                payload,
                AnswerOutcome::PENDING,
                now,
            ));
        }
    }

    Ok(answers)
}

fn new_answer(
    attempt_id: &str,
    question_id: &str,
    payload: AnswerPayload,
    outcome: AnswerOutcome,
    now: DateTime<Utc>,
) -> Answer {
    Answer {
        id: uuid::Uuid::new_v4().to_string(),
        attempt_id: attempt_id.to_string(),
        question_id: question_id.to_string(),
        payload,
        is_correct: outcome.is_correct,
        points_awarded: outcome.points_awarded,
        feedback: None,
        graded_by: None,
        graded_at: None,
        created_at: now,
    }
}

/// `score / max_score >= passing_score / 100`, compared in integers so the boundary is exact.
pub fn meets_passing_score(score: i32, max_score: i32, passing_score: i32) -> bool {
    if max_score <= 0 {
        return passing_score <= 0;
    }
    i64::from(score) * 100 >= i64::from(passing_score) * i64::from(max_score)
}

/// Aggregates an attempt over all of its answers.
///
/// `max_score` counts every question of the quiz, answered or not. While any
/// answer is ungraded the attempt stays SUBMITTED and `is_passed` is `None`.
pub fn aggregate(quiz: &Quiz, questions: &[Question], answers: &[Answer]) -> AttemptAggregate {
    let max_score: i32 = questions.iter().map(|q| q.points).sum();
    let score: i32 = answers.iter().filter_map(|a| a.points_awarded).sum();
    let pending_count = answers.iter().filter(|a| a.is_pending()).count();

    let percentage = if max_score > 0 {
        f64::from(score) / f64::from(max_score) * 100.0
    } else {
        0.0
    };

    let (status, is_passed) = if pending_count > 0 {
        (AttemptStatus::Submitted, None)
    } else {
        (
            AttemptStatus::Graded,
            Some(meets_passing_score(score, max_score, quiz.passing_score)),
        )
    };

    AttemptAggregate {
        score,
        max_score,
        percentage,
        is_passed,
        status,
        pending_count,
    }
}

/// Validates a manual grade for an essay answer.
pub fn essay_grade(
    question: &Question,
    points_awarded: i32,
    feedback: Option<String>,
    graded_by: &str,
    now: DateTime<Utc>,
) -> Result<EssayGrade, AppError> {
    if question.is_auto_gradable() {
        return Err(AppError::InvalidState(format!(
            "Question {} is {} and graded automatically",
            question.id,
            question.kind()
        )));
    }
    if !(0..=question.points).contains(&points_awarded) {
        return Err(AppError::OutOfRange(format!(
            "points_awarded must be between 0 and {}",
            question.points
        )));
    }
    Ok(EssayGrade {
        points_awarded,
        is_correct: points_awarded == question.points,
        feedback,
        graded_by: graded_by.to_string(),
        graded_at: now,
    })
}

/// Response of a manual grade.
#[derive(Debug, Serialize)]
pub struct GradedEssay {
    pub answer: Answer,
    pub attempt: QuizAttempt,
}

/// Applies a manual grade to an essay answer and recomputes the attempt.
pub async fn grade_essay(
    store: &dyn EntityStore,
    answer_id: &str,
    actor: &Actor,
    req: GradeEssayRequest,
    now: DateTime<Utc>,
) -> Result<GradedEssay, AppError> {
    if actor.role == Role::Student {
        return Err(AppError::Forbidden("Students cannot grade answers".to_string()));
    }
    req.validate()?;

    let answer = store
        .find_answer(answer_id)
        .await?
        .ok_or(AppError::NotFound("Answer not found".to_string()))?;
    let attempt = store
        .find_attempt_by_id(&answer.attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;
    let quiz = store
        .find_quiz(&attempt.quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if !actor.can_manage(&quiz.teacher_id) {
        return Err(AppError::Forbidden(
            "Only the quiz owner can grade this answer".to_string(),
        ));
    }
    if attempt.status == AttemptStatus::InProgress {
        return Err(AppError::InvalidState(
            "Attempt has not been submitted".to_string(),
        ));
    }

    let questions = store.find_questions_by_quiz(&quiz.id).await?;
    let question = questions
        .iter()
        .find(|q| q.id == answer.question_id)
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let feedback = req.feedback.as_deref().map(clean_html);
    let grade = essay_grade(question, req.points_awarded, feedback, &actor.id, now)?;

    let recompute = |answers: &[Answer]| aggregate(&quiz, &questions, answers);
    let (answer, attempt) = store.grade_answer(&answer.id, &grade, &recompute).await?;

    tracing::info!(
        "Graded answer {} of attempt {}: {}/{} points, attempt now {} ({}/{})",
        answer.id,
        attempt.id,
        grade.points_awarded,
        question.points,
        attempt.status,
        attempt.score.unwrap_or(0),
        attempt.max_score.unwrap_or(0)
    );

    Ok(GradedEssay { answer, attempt })
}
