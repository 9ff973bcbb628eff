// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, types::Json};

use super::{EntityStore, Recompute, StoreError, StoreResult};
use crate::models::{
    answer::{Answer, AnswerPayload, EssayGrade},
    attempt::{AttemptStatus, QuizAttempt, SubmissionRecord},
    question::{Question, QuestionBody, QuestionKind, QuestionOption},
    quiz::{Quiz, QuizStatus},
};

const QUIZ_COLUMNS: &str = "id, teacher_id, subject_id, title, description, time_limit_minutes, \
    passing_score, shuffle_questions, shuffle_answers, show_results, start_date, end_date, \
    status, created_at, updated_at";

const QUESTION_COLUMNS: &str = "id, quiz_id, type AS question_type, prompt, points, display_order, \
    explanation, word_limit, options, created_at";

const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, status, started_at, submitted_at, \
    time_spent_seconds, score, max_score, percentage, is_passed";

const ANSWER_COLUMNS: &str = "id, attempt_id, question_id, payload, is_correct, points_awarded, \
    feedback, graded_by, graded_at, created_at";

#[derive(FromRow)]
struct QuizRow {
    id: String,
    teacher_id: String,
    subject_id: String,
    title: String,
    description: Option<String>,
    time_limit_minutes: Option<i32>,
    passing_score: i32,
    shuffle_questions: bool,
    shuffle_answers: bool,
    show_results: bool,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuizRow> for Quiz {
    type Error = StoreError;

    fn try_from(row: QuizRow) -> Result<Self, Self::Error> {
        Ok(Quiz {
            status: row.status.parse::<QuizStatus>().map_err(StoreError::Corrupt)?,
            id: row.id,
            teacher_id: row.teacher_id,
            subject_id: row.subject_id,
            title: row.title,
            description: row.description,
            time_limit_minutes: row.time_limit_minutes,
            passing_score: row.passing_score,
            shuffle_questions: row.shuffle_questions,
            shuffle_answers: row.shuffle_answers,
            show_results: row.show_results,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: String,
    quiz_id: String,
    /// Mapped from the column 'type' since `type` is a reserved keyword in Rust.
    question_type: String,
    prompt: String,
    points: i32,
    display_order: i32,
    explanation: Option<String>,
    word_limit: Option<i32>,
    options: Json<Vec<QuestionOption>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuestionRow> for Question {
    type Error = StoreError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let kind = row
            .question_type
            .parse::<QuestionKind>()
            .map_err(StoreError::Corrupt)?;
        let options = row.options.0;
        let body = match kind {
            QuestionKind::MultipleChoice => QuestionBody::MultipleChoice { options },
            QuestionKind::TrueFalse => QuestionBody::TrueFalse { options },
            QuestionKind::Essay => QuestionBody::Essay {
                word_limit: row.word_limit,
            },
        };
        Ok(Question {
            id: row.id,
            quiz_id: row.quiz_id,
            prompt: row.prompt,
            points: row.points,
            display_order: row.display_order,
            explanation: row.explanation,
            body,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: String,
    quiz_id: String,
    student_id: String,
    status: String,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    time_spent_seconds: Option<i64>,
    score: Option<i32>,
    max_score: Option<i32>,
    percentage: Option<f64>,
    is_passed: Option<bool>,
}

impl TryFrom<AttemptRow> for QuizAttempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(QuizAttempt {
            status: row
                .status
                .parse::<AttemptStatus>()
                .map_err(StoreError::Corrupt)?,
            id: row.id,
            quiz_id: row.quiz_id,
            student_id: row.student_id,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
            time_spent_seconds: row.time_spent_seconds,
            score: row.score,
            max_score: row.max_score,
            percentage: row.percentage,
            is_passed: row.is_passed,
        })
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: String,
    attempt_id: String,
    question_id: String,
    payload: Json<AnswerPayload>,
    is_correct: Option<bool>,
    points_awarded: Option<i32>,
    feedback: Option<String>,
    graded_by: Option<String>,
    graded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<AnswerRow> for Answer {
    fn from(row: AnswerRow) -> Self {
        Answer {
            id: row.id,
            attempt_id: row.attempt_id,
            question_id: row.question_id,
            payload: row.payload.0,
            is_correct: row.is_correct,
            points_awarded: row.points_awarded,
            feedback: row.feedback,
            graded_by: row.graded_by,
            graded_at: row.graded_at,
            created_at: row.created_at,
        }
    }
}

/// Maps a unique-constraint rejection to `UniqueViolation`, everything else to `Database`.
fn map_unique(err: sqlx::Error, what: &str) -> StoreError {
    let unique = matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation());
    if unique {
        StoreError::UniqueViolation(what.to_string())
    } else {
        StoreError::Database(err)
    }
}

/// Postgres-backed entity store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn find_quiz(&self, quiz_id: &str) -> StoreResult<Option<Quiz>> {
        let sql = format!("SELECT {} FROM quizzes WHERE id = $1", QUIZ_COLUMNS);
        sqlx::query_as::<_, QuizRow>(&sql)
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Quiz::try_from)
            .transpose()
    }

    async fn create_quiz(&self, quiz: &Quiz) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quizzes
            (id, teacher_id, subject_id, title, description, time_limit_minutes, passing_score,
             shuffle_questions, shuffle_answers, show_results, start_date, end_date, status,
             created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(&quiz.id)
        .bind(&quiz.teacher_id)
        .bind(&quiz.subject_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(quiz.time_limit_minutes)
        .bind(quiz.passing_score)
        .bind(quiz.shuffle_questions)
        .bind(quiz.shuffle_answers)
        .bind(quiz.show_results)
        .bind(quiz.start_date)
        .bind(quiz.end_date)
        .bind(quiz.status.as_str())
        .bind(quiz.created_at)
        .bind(quiz.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "quiz"))?;
        Ok(())
    }

    async fn update_quiz_status(&self, quiz_id: &str, status: QuizStatus) -> StoreResult<Quiz> {
        let sql = format!(
            "UPDATE quizzes SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING {}",
            QUIZ_COLUMNS
        );
        sqlx::query_as::<_, QuizRow>(&sql)
            .bind(quiz_id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("quiz".to_string()))
            .and_then(Quiz::try_from)
    }

    async fn find_questions_by_quiz(&self, quiz_id: &str) -> StoreResult<Vec<Question>> {
        let sql = format!(
            "SELECT {} FROM questions WHERE quiz_id = $1 ORDER BY display_order ASC",
            QUESTION_COLUMNS
        );
        sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Question::try_from)
            .collect()
    }

    async fn create_question(&self, question: &Question) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO questions
            (id, quiz_id, type, prompt, points, display_order, explanation, word_limit, options, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&question.id)
        .bind(&question.quiz_id)
        .bind(question.kind().as_str())
        .bind(&question.prompt)
        .bind(question.points)
        .bind(question.display_order)
        .bind(&question.explanation)
        .bind(question.body.word_limit())
        .bind(Json(question.body.options()))
        .bind(question.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "question display order"))?;
        Ok(())
    }

    async fn find_attempt(&self, quiz_id: &str, student_id: &str) -> StoreResult<Option<QuizAttempt>> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts WHERE quiz_id = $1 AND student_id = $2",
            ATTEMPT_COLUMNS
        );
        sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(quiz_id)
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await?
            .map(QuizAttempt::try_from)
            .transpose()
    }

    async fn find_attempt_by_id(&self, attempt_id: &str) -> StoreResult<Option<QuizAttempt>> {
        let sql = format!("SELECT {} FROM quiz_attempts WHERE id = $1", ATTEMPT_COLUMNS);
        sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?
            .map(QuizAttempt::try_from)
            .transpose()
    }

    async fn list_attempts_by_quiz(&self, quiz_id: &str) -> StoreResult<Vec<QuizAttempt>> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts WHERE quiz_id = $1 ORDER BY started_at ASC",
            ATTEMPT_COLUMNS
        );
        sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(QuizAttempt::try_from)
            .collect()
    }

    async fn create_attempt(&self, attempt: &QuizAttempt) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts (id, quiz_id, student_id, status, started_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.quiz_id)
        .bind(&attempt.student_id)
        .bind(attempt.status.as_str())
        .bind(attempt.started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "quiz attempt"))?;
        Ok(())
    }

    async fn submit_attempt(
        &self,
        attempt_id: &str,
        answers: &[Answer],
        record: &SubmissionRecord,
    ) -> StoreResult<QuizAttempt> {
        let mut tx = self.pool.begin().await?;

        // Guarded on IN_PROGRESS: a concurrent submit finds zero rows and rolls back.
        let sql = format!(
            r#"
            UPDATE quiz_attempts
            SET status = $2, score = $3, max_score = $4, percentage = $5, is_passed = $6,
                submitted_at = $7, time_spent_seconds = $8
            WHERE id = $1 AND status = 'IN_PROGRESS'
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );
        let aggregate = &record.aggregate;
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(attempt_id)
            .bind(aggregate.status.as_str())
            .bind(aggregate.score)
            .bind(aggregate.max_score)
            .bind(aggregate.percentage)
            .bind(aggregate.is_passed)
            .bind(record.submitted_at)
            .bind(record.time_spent_seconds)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quiz_attempts WHERE id = $1)")
                    .bind(attempt_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                StoreError::StaleState("Attempt has already been submitted".to_string())
            } else {
                StoreError::NotFound("quiz attempt".to_string())
            });
        };

        if !answers.is_empty() {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO answers (id, attempt_id, question_id, payload, is_correct, points_awarded, created_at) ",
            );
            builder.push_values(answers, |mut b, answer| {
                b.push_bind(&answer.id)
                    .push_bind(&answer.attempt_id)
                    .push_bind(&answer.question_id)
                    .push_bind(Json(&answer.payload))
                    .push_bind(answer.is_correct)
                    .push_bind(answer.points_awarded)
                    .push_bind(answer.created_at);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_unique(e, "answer"))?;
        }

        tx.commit().await?;

        QuizAttempt::try_from(row)
    }

    async fn find_answers_by_attempt(&self, attempt_id: &str) -> StoreResult<Vec<Answer>> {
        let sql = format!(
            "SELECT {} FROM answers WHERE attempt_id = $1 ORDER BY created_at ASC, id ASC",
            ANSWER_COLUMNS
        );
        let rows = sqlx::query_as::<_, AnswerRow>(&sql)
            .bind(attempt_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Answer::from).collect())
    }

    async fn find_answer(&self, answer_id: &str) -> StoreResult<Option<Answer>> {
        let sql = format!("SELECT {} FROM answers WHERE id = $1", ANSWER_COLUMNS);
        let row = sqlx::query_as::<_, AnswerRow>(&sql)
            .bind(answer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Answer::from))
    }

    async fn grade_answer(
        &self,
        answer_id: &str,
        grade: &EssayGrade,
        recompute: Recompute<'_>,
    ) -> StoreResult<(Answer, QuizAttempt)> {
        let mut tx = self.pool.begin().await?;

        let attempt_id: String = sqlx::query_scalar("SELECT attempt_id FROM answers WHERE id = $1")
            .bind(answer_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound("answer".to_string()))?;

        // Serializes concurrent grade calls on the same attempt.
        let lock_sql = format!(
            "SELECT {} FROM quiz_attempts WHERE id = $1 FOR UPDATE",
            ATTEMPT_COLUMNS
        );
        sqlx::query_as::<_, AttemptRow>(&lock_sql)
            .bind(&attempt_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound("quiz attempt".to_string()))?;

        let grade_sql = format!(
            r#"
            UPDATE answers
            SET points_awarded = $2, is_correct = $3, feedback = $4, graded_by = $5, graded_at = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ANSWER_COLUMNS
        );
        let answer: Answer = sqlx::query_as::<_, AnswerRow>(&grade_sql)
            .bind(answer_id)
            .bind(grade.points_awarded)
            .bind(grade.is_correct)
            .bind(&grade.feedback)
            .bind(&grade.graded_by)
            .bind(grade.graded_at)
            .fetch_one(&mut *tx)
            .await?
            .into();

        let all_sql = format!(
            "SELECT {} FROM answers WHERE attempt_id = $1 ORDER BY created_at ASC, id ASC",
            ANSWER_COLUMNS
        );
        let all_answers: Vec<Answer> = sqlx::query_as::<_, AnswerRow>(&all_sql)
            .bind(&attempt_id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(Answer::from)
            .collect();

        let aggregate = recompute(&all_answers);

        let update_sql = format!(
            r#"
            UPDATE quiz_attempts
            SET status = $2, score = $3, max_score = $4, percentage = $5, is_passed = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttemptRow>(&update_sql)
            .bind(&attempt_id)
            .bind(aggregate.status.as_str())
            .bind(aggregate.score)
            .bind(aggregate.max_score)
            .bind(aggregate.percentage)
            .bind(aggregate.is_passed)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((answer, QuizAttempt::try_from(row)?))
    }

    async fn has_subject_access(&self, student_id: &str, subject_id: &str) -> StoreResult<bool> {
        let allowed: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM enrollments WHERE student_id = $1 AND subject_id = $2)",
        )
        .bind(student_id)
        .bind(subject_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(allowed)
    }
}
