// src/models/attempt.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a quiz attempt. "No attempt yet" is the absence of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Graded,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "IN_PROGRESS",
            AttemptStatus::Submitted => "SUBMITTED",
            AttemptStatus::Graded => "GRADED",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(AttemptStatus::InProgress),
            "SUBMITTED" => Ok(AttemptStatus::Submitted),
            "GRADED" => Ok(AttemptStatus::Graded),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

/// Represents the 'quiz_attempts' table.
/// Unique per (quiz_id, student_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: String,
    pub quiz_id: String,
    pub student_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
    pub score: Option<i32>,
    pub max_score: Option<i32>,
    pub percentage: Option<f64>,

    /// `None` until every answer has been graded.
    pub is_passed: Option<bool>,
}

impl QuizAttempt {
    /// A fresh IN_PROGRESS attempt.
    pub fn start(quiz_id: &str, student_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            quiz_id: quiz_id.to_string(),
            student_id: student_id.to_string(),
            status: AttemptStatus::InProgress,
            started_at: now,
            submitted_at: None,
            time_spent_seconds: None,
            score: None,
            max_score: None,
            percentage: None,
            is_passed: None,
        }
    }

    /// Copies a freshly computed aggregate onto the attempt.
    pub fn apply_aggregate(&mut self, aggregate: &AttemptAggregate) {
        self.score = Some(aggregate.score);
        self.max_score = Some(aggregate.max_score);
        self.percentage = Some(aggregate.percentage);
        self.is_passed = aggregate.is_passed;
        self.status = aggregate.status;
    }
}

/// Attempt-level score derived from all of its answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptAggregate {
    pub score: i32,
    pub max_score: i32,
    pub percentage: f64,
    pub is_passed: Option<bool>,
    pub status: AttemptStatus,

    /// Answers still waiting for manual grading.
    pub pending_count: usize,
}

/// Everything written in the submit transaction besides the answer rows.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    pub aggregate: AttemptAggregate,
    pub submitted_at: DateTime<Utc>,
    pub time_spent_seconds: i64,
}

/// Attempt fields a student may always see, even when results are withheld.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptReceipt {
    pub id: String,
    pub quiz_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: Option<i64>,
}

impl From<&QuizAttempt> for AttemptReceipt {
    fn from(attempt: &QuizAttempt) -> Self {
        Self {
            id: attempt.id.clone(),
            quiz_id: attempt.quiz_id.clone(),
            status: attempt.status,
            started_at: attempt.started_at,
            submitted_at: attempt.submitted_at,
            time_spent_seconds: attempt.time_spent_seconds,
        }
    }
}

/// Row of the teacher's attempt list.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptListEntry {
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub pending_grading: usize,
}
