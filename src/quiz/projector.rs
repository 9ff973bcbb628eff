// src/quiz/projector.rs

//! Result projector: the only place that decides which quiz and attempt
//! fields reach a viewer. Answer keys live on `Question`; students taking a
//! quiz only ever receive `PublicQuestion`, which has no field for them.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        actor::{Actor, Role},
        answer::Answer,
        attempt::{AttemptReceipt, AttemptStatus, QuizAttempt},
        question::{PublicOption, PublicQuestion, Question},
        quiz::{PublicQuiz, Quiz},
    },
};

/// How much of a completed attempt a viewer may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultAccess {
    /// Scores, answer keys, explanations and feedback.
    Full,
    /// The viewer owns the attempt but results are held back for now.
    Withheld(&'static str),
    /// The viewer has no business with this attempt.
    Denied(&'static str),
}

/// Decides result visibility over role x attempt phase.
pub fn result_access(viewer: &Actor, quiz: &Quiz, attempt: &QuizAttempt) -> ResultAccess {
    match viewer.role {
        Role::Admin => ResultAccess::Full,
        Role::Teacher if quiz.teacher_id == viewer.id => ResultAccess::Full,
        Role::Teacher => ResultAccess::Denied("Only the quiz owner can view these results"),
        Role::Student if attempt.student_id != viewer.id => {
            ResultAccess::Denied("This attempt belongs to another student")
        }
        Role::Student => match attempt.status {
            AttemptStatus::InProgress => ResultAccess::Withheld("Attempt has not been submitted yet"),
            AttemptStatus::Graded => ResultAccess::Full,
            AttemptStatus::Submitted if quiz.show_results => ResultAccess::Full,
            AttemptStatus::Submitted => {
                ResultAccess::Withheld("Results are available once grading is complete")
            }
        },
    }
}

/// Strips the answer key and explanation from a question.
pub fn redact_question(question: &Question) -> PublicQuestion {
    PublicQuestion {
        id: question.id.clone(),
        question_type: question.kind(),
        prompt: question.prompt.clone(),
        points: question.points,
        display_order: question.display_order,
        word_limit: question.body.word_limit(),
        options: question
            .body
            .options()
            .iter()
            .map(|o| PublicOption {
                id: o.id.clone(),
                text: o.text.clone(),
            })
            .collect(),
    }
}

/// Payload for a student starting or resuming an attempt.
#[derive(Debug, Serialize)]
pub struct TakingView {
    pub attempt: AttemptReceipt,
    pub resumed: bool,
    /// Start time plus the time limit; submissions are accepted for a short grace period after.
    pub deadline: Option<DateTime<Utc>>,
    pub quiz: PublicQuiz,
    pub questions: Vec<PublicQuestion>,
}

/// `questions` must already be arranged for presentation.
pub fn taking_view(quiz: &Quiz, attempt: &QuizAttempt, questions: &[Question], resumed: bool) -> TakingView {
    TakingView {
        attempt: AttemptReceipt::from(attempt),
        resumed,
        deadline: quiz
            .time_limit_seconds()
            .map(|secs| attempt.started_at + Duration::seconds(secs)),
        quiz: PublicQuiz::from(quiz),
        questions: questions.iter().map(redact_question).collect(),
    }
}

#[derive(Debug, Serialize)]
pub struct GradedQuestion {
    pub question: Question,
    pub answer: Option<Answer>,
}

/// Full grading detail of an attempt.
#[derive(Debug, Serialize)]
pub struct ResultView {
    pub attempt: QuizAttempt,
    pub quiz: PublicQuiz,
    pub show_results: bool,
    pub questions: Vec<GradedQuestion>,
}

fn result_view(quiz: &Quiz, attempt: QuizAttempt, questions: &[Question], answers: Vec<Answer>) -> ResultView {
    let mut by_question: HashMap<String, Answer> = answers
        .into_iter()
        .map(|a| (a.question_id.clone(), a))
        .collect();

    let mut ordered: Vec<&Question> = questions.iter().collect();
    ordered.sort_by_key(|q| q.display_order);

    ResultView {
        quiz: PublicQuiz::from(quiz),
        show_results: quiz.show_results,
        questions: ordered
            .into_iter()
            .map(|q| GradedQuestion {
                question: q.clone(),
                answer: by_question.remove(&q.id),
            })
            .collect(),
        attempt,
    }
}

/// Results endpoint: full detail or an error, never a partial view.
pub fn project_results(
    viewer: &Actor,
    quiz: &Quiz,
    attempt: QuizAttempt,
    questions: &[Question],
    answers: Vec<Answer>,
) -> Result<ResultView, AppError> {
    match result_access(viewer, quiz, &attempt) {
        ResultAccess::Full => Ok(result_view(quiz, attempt, questions, answers)),
        ResultAccess::Withheld(reason) => Err(AppError::ResultsNotAvailable(reason.to_string())),
        ResultAccess::Denied(reason) => Err(AppError::Forbidden(reason.to_string())),
    }
}

/// Payload returned from a submission.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum SubmissionView {
    Results(ResultView),
    /// Results are withheld; only the lifecycle fields are shown.
    Receipt(AttemptReceipt),
}

/// Submission response: results when visible, otherwise a receipt without scores.
pub fn project_submission(
    viewer: &Actor,
    quiz: &Quiz,
    attempt: QuizAttempt,
    questions: &[Question],
    answers: Vec<Answer>,
) -> Result<SubmissionView, AppError> {
    match result_access(viewer, quiz, &attempt) {
        ResultAccess::Full => Ok(SubmissionView::Results(result_view(
            quiz, attempt, questions, answers,
        ))),
        ResultAccess::Withheld(_) => Ok(SubmissionView::Receipt(AttemptReceipt::from(&attempt))),
        ResultAccess::Denied(reason) => Err(AppError::Forbidden(reason.to_string())),
    }
}

/// Quiz as returned by the quiz endpoint.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum QuizView {
    /// Owner or admin: everything, answer keys included.
    Full { quiz: Quiz, questions: Vec<Question> },
    /// Student: header only. Questions are revealed by starting an attempt.
    Preview {
        quiz: PublicQuiz,
        question_count: usize,
        total_points: i32,
        attempt: Option<AttemptReceipt>,
    },
}

pub fn project_quiz(
    viewer: &Actor,
    quiz: Quiz,
    questions: Vec<Question>,
    own_attempt: Option<&QuizAttempt>,
) -> QuizView {
    if viewer.can_manage(&quiz.teacher_id) {
        return QuizView::Full { quiz, questions };
    }
    QuizView::Preview {
        quiz: PublicQuiz::from(&quiz),
        question_count: questions.len(),
        total_points: questions.iter().map(|q| q.points).sum(),
        attempt: own_attempt.map(AttemptReceipt::from),
    }
}
