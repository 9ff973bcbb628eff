// src/models/quiz.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Lifecycle status of a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizStatus {
    Draft,
    Published,
    Archived,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Draft => "DRAFT",
            QuizStatus::Published => "PUBLISHED",
            QuizStatus::Archived => "ARCHIVED",
        }
    }

    /// Whether the authoring workflow allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: QuizStatus) -> bool {
        matches!(
            (self, next),
            (QuizStatus::Draft, QuizStatus::Published)
                | (QuizStatus::Draft, QuizStatus::Archived)
                | (QuizStatus::Published, QuizStatus::Archived)
        )
    }
}

impl fmt::Display for QuizStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(QuizStatus::Draft),
            "PUBLISHED" => Ok(QuizStatus::Published),
            "ARCHIVED" => Ok(QuizStatus::Archived),
            other => Err(format!("unknown quiz status '{}'", other)),
        }
    }
}

/// Represents the 'quizzes' table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,

    /// Owning teacher. Only this teacher (or an admin) may author, review or grade.
    pub teacher_id: String,

    /// Subject the quiz belongs to. Students need an enrollment in it.
    pub subject_id: String,

    pub title: String,
    pub description: Option<String>,

    /// Time limit in minutes; `None` means untimed.
    pub time_limit_minutes: Option<i32>,

    /// Minimum percentage (0-100) needed to pass.
    pub passing_score: i32,

    pub shuffle_questions: bool,
    pub shuffle_answers: bool,

    /// Lets students see graded detail before every essay is graded.
    pub show_results: bool,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    pub status: QuizStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where `now` sits relative to a quiz's availability window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    NotYetOpen,
    Open,
    Closed,
}

impl Quiz {
    pub fn availability_at(&self, now: DateTime<Utc>) -> Availability {
        if self.start_date.is_some_and(|start| now < start) {
            return Availability::NotYetOpen;
        }
        if self.end_date.is_some_and(|end| now > end) {
            return Availability::Closed;
        }
        Availability::Open
    }

    /// Time limit expressed in seconds, if the quiz is timed.
    pub fn time_limit_seconds(&self) -> Option<i64> {
        self.time_limit_minutes.map(|m| i64::from(m) * 60)
    }
}

/// Quiz header shown to students while taking a quiz.
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuiz {
    pub id: String,
    pub subject_id: String,
    pub title: String,
    pub description: Option<String>,
    pub time_limit_minutes: Option<i32>,
    pub passing_score: i32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl From<&Quiz> for PublicQuiz {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id.clone(),
            subject_id: quiz.subject_id.clone(),
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            time_limit_minutes: quiz.time_limit_minutes,
            passing_score: quiz.passing_score,
            start_date: quiz.start_date,
            end_date: quiz.end_date,
        }
    }
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject_id: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub shuffle_answers: bool,
    #[serde(default)]
    pub show_results: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl CreateQuizRequest {
    /// Field rules plus the cross-field window check.
    pub fn check(&self) -> Result<(), crate::error::AppError> {
        self.validate()?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(crate::error::AppError::ValidationFailed(
                    "start_date must not be after end_date".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// DTO for moving a quiz through DRAFT -> PUBLISHED -> ARCHIVED.
#[derive(Debug, Deserialize)]
pub struct UpdateQuizStatusRequest {
    pub status: QuizStatus,
}
