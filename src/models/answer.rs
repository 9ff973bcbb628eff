// src/models/answer.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// What a student submitted for one question. The variant must match the question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerPayload {
    /// MULTIPLE_CHOICE or TRUE_FALSE: the chosen option's id.
    SelectedOption { option_id: String },
    /// TRUE_FALSE shorthand.
    Boolean { value: bool },
    /// ESSAY.
    Text { text: String },
}

/// Represents the 'answers' table. One row per (attempt, question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub attempt_id: String,
    pub question_id: String,
    pub payload: AnswerPayload,

    /// `None` for an essay that has not been graded yet.
    pub is_correct: Option<bool>,
    pub points_awarded: Option<i32>,

    pub feedback: Option<String>,
    pub graded_by: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Answer {
    pub fn is_pending(&self) -> bool {
        self.points_awarded.is_none()
    }
}

/// Manual grade written onto an essay answer.
#[derive(Debug, Clone)]
pub struct EssayGrade {
    pub points_awarded: i32,
    pub is_correct: bool,
    pub feedback: Option<String>,
    pub graded_by: String,
    pub graded_at: DateTime<Utc>,
}

/// A single answer inside a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub answer: AnswerPayload,
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[validate(length(max = 500))]
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,

    /// Client-measured time on task; the server falls back to wall-clock elapsed time.
    #[validate(range(min = 0))]
    pub time_spent_seconds: Option<i64>,
}

/// DTO for grading an essay answer.
#[derive(Debug, Deserialize, Validate)]
pub struct GradeEssayRequest {
    pub points_awarded: i32,
    #[validate(length(max = 5000))]
    pub feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let payload: AnswerPayload =
            serde_json::from_str(r#"{"type":"selected_option","option_id":"b"}"#).unwrap();
        assert_eq!(
            payload,
            AnswerPayload::SelectedOption {
                option_id: "b".to_string()
            }
        );

        let payload: AnswerPayload = serde_json::from_str(r#"{"type":"boolean","value":false}"#).unwrap();
        assert_eq!(payload, AnswerPayload::Boolean { value: false });
    }

    #[test]
    fn test_payload_rejects_unknown_variant() {
        let result: Result<AnswerPayload, _> = serde_json::from_str(r#"{"type":"drawing"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_time_spent_fails_validation() {
        let req = SubmitAttemptRequest {
            answers: vec![],
            time_spent_seconds: Some(-5),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_answer_count_is_capped() {
        let answer = SubmittedAnswer {
            question_id: "q1".to_string(),
            answer: AnswerPayload::Boolean { value: true },
        };
        let req = SubmitAttemptRequest {
            answers: vec![answer.clone(); 500],
            time_spent_seconds: None,
        };
        assert!(req.validate().is_ok());

        let req = SubmitAttemptRequest {
            answers: vec![answer; 501],
            time_spent_seconds: None,
        };
        let err = req.validate().unwrap_err();
        assert!(err.field_errors().contains_key("answers"));
    }
}
