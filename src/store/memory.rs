// src/store/memory.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EntityStore, Recompute, StoreError, StoreResult};
use crate::models::{
    answer::{Answer, EssayGrade},
    attempt::{AttemptStatus, QuizAttempt, SubmissionRecord},
    question::Question,
    quiz::{Quiz, QuizStatus},
};

#[derive(Default)]
struct Tables {
    quizzes: HashMap<String, Quiz>,
    questions: HashMap<String, Question>,
    attempts: HashMap<String, QuizAttempt>,
    answers: HashMap<String, Answer>,
    /// (student_id, subject_id)
    enrollments: HashSet<(String, String)>,
}

/// Process-local store. Every operation runs under one lock, so multi-row
/// writes are atomic and the (quiz, student) uniqueness check cannot race.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants a student access to a subject. Enrollment management lives outside
    /// the quiz engine; this seeds the lookup for local runs and tests.
    pub async fn enroll(&self, student_id: &str, subject_id: &str) {
        self.tables
            .lock()
            .await
            .enrollments
            .insert((student_id.to_string(), subject_id.to_string()));
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_quiz(&self, quiz_id: &str) -> StoreResult<Option<Quiz>> {
        Ok(self.tables.lock().await.quizzes.get(quiz_id).cloned())
    }

    async fn create_quiz(&self, quiz: &Quiz) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.quizzes.contains_key(&quiz.id) {
            return Err(StoreError::UniqueViolation("quiz".to_string()));
        }
        tables.quizzes.insert(quiz.id.clone(), quiz.clone());
        Ok(())
    }

    async fn update_quiz_status(&self, quiz_id: &str, status: QuizStatus) -> StoreResult<Quiz> {
        let mut tables = self.tables.lock().await;
        let quiz = tables
            .quizzes
            .get_mut(quiz_id)
            .ok_or_else(|| StoreError::NotFound("quiz".to_string()))?;
        quiz.status = status;
        quiz.updated_at = chrono::Utc::now();
        Ok(quiz.clone())
    }

    async fn find_questions_by_quiz(&self, quiz_id: &str) -> StoreResult<Vec<Question>> {
        let tables = self.tables.lock().await;
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.display_order);
        Ok(questions)
    }

    async fn create_question(&self, question: &Question) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.quizzes.contains_key(&question.quiz_id) {
            return Err(StoreError::NotFound("quiz".to_string()));
        }
        let order_taken = tables
            .questions
            .values()
            .any(|q| q.quiz_id == question.quiz_id && q.display_order == question.display_order);
        if order_taken || tables.questions.contains_key(&question.id) {
            return Err(StoreError::UniqueViolation("question display order".to_string()));
        }
        tables.questions.insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn find_attempt(&self, quiz_id: &str, student_id: &str) -> StoreResult<Option<QuizAttempt>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .attempts
            .values()
            .find(|a| a.quiz_id == quiz_id && a.student_id == student_id)
            .cloned())
    }

    async fn find_attempt_by_id(&self, attempt_id: &str) -> StoreResult<Option<QuizAttempt>> {
        Ok(self.tables.lock().await.attempts.get(attempt_id).cloned())
    }

    async fn list_attempts_by_quiz(&self, quiz_id: &str) -> StoreResult<Vec<QuizAttempt>> {
        let tables = self.tables.lock().await;
        let mut attempts: Vec<QuizAttempt> = tables
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.started_at);
        Ok(attempts)
    }

    async fn create_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.quizzes.contains_key(&attempt.quiz_id) {
            return Err(StoreError::NotFound("quiz".to_string()));
        }
        let duplicate = tables
            .attempts
            .values()
            .any(|a| a.quiz_id == attempt.quiz_id && a.student_id == attempt.student_id);
        if duplicate {
            return Err(StoreError::UniqueViolation("quiz attempt".to_string()));
        }
        tables.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn submit_attempt(
        &self,
        attempt_id: &str,
        answers: &[Answer],
        record: &SubmissionRecord,
    ) -> StoreResult<QuizAttempt> {
        let mut tables = self.tables.lock().await;

        let mut attempt = tables
            .attempts
            .get(attempt_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("quiz attempt".to_string()))?;
        if attempt.status != AttemptStatus::InProgress {
            return Err(StoreError::StaleState(
                "Attempt has already been submitted".to_string(),
            ));
        }
        if answers.iter().any(|a| tables.answers.contains_key(&a.id)) {
            return Err(StoreError::UniqueViolation("answer".to_string()));
        }

        attempt.apply_aggregate(&record.aggregate);
        attempt.submitted_at = Some(record.submitted_at);
        attempt.time_spent_seconds = Some(record.time_spent_seconds);

        for answer in answers {
            tables.answers.insert(answer.id.clone(), answer.clone());
        }
        tables.attempts.insert(attempt.id.clone(), attempt.clone());

        Ok(attempt)
    }

    async fn find_answers_by_attempt(&self, attempt_id: &str) -> StoreResult<Vec<Answer>> {
        let tables = self.tables.lock().await;
        let mut answers: Vec<Answer> = tables
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect();
        answers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(answers)
    }

    async fn find_answer(&self, answer_id: &str) -> StoreResult<Option<Answer>> {
        Ok(self.tables.lock().await.answers.get(answer_id).cloned())
    }

    async fn grade_answer(
        &self,
        answer_id: &str,
        grade: &EssayGrade,
        recompute: Recompute<'_>,
    ) -> StoreResult<(Answer, QuizAttempt)> {
        let mut tables = self.tables.lock().await;

        let mut answer = tables
            .answers
            .get(answer_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("answer".to_string()))?;
        let mut attempt = tables
            .attempts
            .get(&answer.attempt_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("quiz attempt".to_string()))?;

        answer.points_awarded = Some(grade.points_awarded);
        answer.is_correct = Some(grade.is_correct);
        answer.feedback = grade.feedback.clone();
        answer.graded_by = Some(grade.graded_by.clone());
        answer.graded_at = Some(grade.graded_at);

        let all_answers: Vec<Answer> = tables
            .answers
            .values()
            .filter(|a| a.attempt_id == attempt.id)
            .map(|a| if a.id == answer.id { answer.clone() } else { a.clone() })
            .collect();
        attempt.apply_aggregate(&recompute(&all_answers));

        tables.answers.insert(answer.id.clone(), answer.clone());
        tables.attempts.insert(attempt.id.clone(), attempt.clone());

        Ok((answer, attempt))
    }

    async fn has_subject_access(&self, student_id: &str, subject_id: &str) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .enrollments
            .contains(&(student_id.to_string(), subject_id.to_string())))
    }
}
