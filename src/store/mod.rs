// src/store/mod.rs

//! Entity store consumed by the quiz engine.
//!
//! The engine only needs "return an entity by id" and "persist an entity", plus
//! two multi-row writes that must be atomic: the submit batch and the essay
//! grade with its aggregate recompute. Uniqueness of (quiz, student) attempts is
//! enforced here, not by callers.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    answer::{Answer, EssayGrade},
    attempt::{AttemptAggregate, QuizAttempt, SubmissionRecord},
    question::Question,
    quiz::{Quiz, QuizStatus},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key rejected the write (duplicate attempt, duplicate display order).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// The row changed phase under us, e.g. a second submit of the same attempt.
    #[error("stale state: {0}")]
    StaleState(String),

    /// A stored row could not be mapped back into a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Recomputes an attempt aggregate from the attempt's full answer list.
/// Runs inside the grading transaction so the answer list cannot change under it.
pub type Recompute<'a> = &'a (dyn Fn(&[Answer]) -> AttemptAggregate + Send + Sync);

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_quiz(&self, quiz_id: &str) -> StoreResult<Option<Quiz>>;

    async fn create_quiz(&self, quiz: &Quiz) -> StoreResult<()>;

    async fn update_quiz_status(&self, quiz_id: &str, status: QuizStatus) -> StoreResult<Quiz>;

    /// Questions of a quiz ordered by display order.
    async fn find_questions_by_quiz(&self, quiz_id: &str) -> StoreResult<Vec<Question>>;

    /// Fails with `UniqueViolation` when the display order is taken.
    async fn create_question(&self, question: &Question) -> StoreResult<()>;

    async fn find_attempt(&self, quiz_id: &str, student_id: &str) -> StoreResult<Option<QuizAttempt>>;

    async fn find_attempt_by_id(&self, attempt_id: &str) -> StoreResult<Option<QuizAttempt>>;

    /// Attempts of a quiz ordered by start time.
    async fn list_attempts_by_quiz(&self, quiz_id: &str) -> StoreResult<Vec<QuizAttempt>>;

    /// Inserts a new attempt. A concurrent duplicate for the same (quiz, student)
    /// fails with `UniqueViolation`; this is the authoritative race resolution.
    async fn create_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()>;

    /// Writes the answer batch and the attempt aggregate in one transaction.
    /// Fails with `StaleState` (writing nothing) if the attempt is no longer IN_PROGRESS.
    async fn submit_attempt(
        &self,
        attempt_id: &str,
        answers: &[Answer],
        record: &SubmissionRecord,
    ) -> StoreResult<QuizAttempt>;

    async fn find_answers_by_attempt(&self, attempt_id: &str) -> StoreResult<Vec<Answer>>;

    async fn find_answer(&self, answer_id: &str) -> StoreResult<Option<Answer>>;

    /// Writes an essay grade, then recomputes and stores the attempt aggregate
    /// while holding the attempt row.
    async fn grade_answer(
        &self,
        answer_id: &str,
        grade: &EssayGrade,
        recompute: Recompute<'_>,
    ) -> StoreResult<(Answer, QuizAttempt)>;

    /// Enrollment lookup: does the student have access to the subject?
    async fn has_subject_access(&self, student_id: &str, subject_id: &str) -> StoreResult<bool>;
}
