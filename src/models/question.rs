// src/models/question.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{error::AppError, utils::html::clean_html};

/// Question type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    Essay,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionKind::TrueFalse => "TRUE_FALSE",
            QuestionKind::Essay => "ESSAY",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MULTIPLE_CHOICE" => Ok(QuestionKind::MultipleChoice),
            "TRUE_FALSE" => Ok(QuestionKind::TrueFalse),
            "ESSAY" => Ok(QuestionKind::Essay),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

/// A selectable option of a choice question. Stored as a JSON array on the question row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

/// Type-dependent part of a question.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "question_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionBody {
    MultipleChoice { options: Vec<QuestionOption> },
    TrueFalse { options: Vec<QuestionOption> },
    Essay { word_limit: Option<i32> },
}

impl QuestionBody {
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionBody::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            QuestionBody::TrueFalse { .. } => QuestionKind::TrueFalse,
            QuestionBody::Essay { .. } => QuestionKind::Essay,
        }
    }

    /// Options in stored order; empty for essays.
    pub fn options(&self) -> &[QuestionOption] {
        match self {
            QuestionBody::MultipleChoice { options } | QuestionBody::TrueFalse { options } => options,
            QuestionBody::Essay { .. } => &[],
        }
    }

    pub fn options_mut(&mut self) -> Option<&mut Vec<QuestionOption>> {
        match self {
            QuestionBody::MultipleChoice { options } | QuestionBody::TrueFalse { options } => {
                Some(options)
            }
            QuestionBody::Essay { .. } => None,
        }
    }

    pub fn word_limit(&self) -> Option<i32> {
        match self {
            QuestionBody::Essay { word_limit } => *word_limit,
            _ => None,
        }
    }
}

/// Represents the 'questions' table.
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: String,
    pub quiz_id: String,
    pub prompt: String,
    pub points: i32,

    /// Position within the quiz. Unique per quiz.
    pub display_order: i32,

    /// Shown alongside graded results only.
    pub explanation: Option<String>,

    #[serde(flatten)]
    pub body: QuestionBody,

    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        self.body.kind()
    }

    pub fn is_auto_gradable(&self) -> bool {
        !matches!(self.body, QuestionBody::Essay { .. })
    }

    /// The option flagged correct. Authoring guarantees exactly one for choice questions.
    pub fn correct_option(&self) -> Option<&QuestionOption> {
        self.body.options().iter().find(|o| o.is_correct)
    }
}

/// Option as shown to a student: the answer key is not part of this type.
#[derive(Debug, Clone, Serialize)]
pub struct PublicOption {
    pub id: String,
    pub text: String,
}

/// DTO for sending a question to a student taking the quiz (no answer key, no explanation).
#[derive(Debug, Clone, Serialize)]
pub struct PublicQuestion {
    pub id: String,
    pub question_type: QuestionKind,
    pub prompt: String,
    pub points: i32,
    pub display_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_limit: Option<i32>,
    pub options: Vec<PublicOption>,
}

/// Option as submitted by the authoring teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionInput {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for adding a question to a draft quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub question_type: QuestionKind,
    #[validate(length(min = 1, max = 5000))]
    pub prompt: String,
    #[validate(range(min = 1, max = 1000))]
    pub points: i32,
    #[validate(range(min = 0))]
    pub display_order: Option<i32>,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
    #[validate(range(min = 1, max = 20000))]
    pub word_limit: Option<i32>,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<OptionInput>,
}

fn validate_options(options: &[OptionInput]) -> Result<(), validator::ValidationError> {
    if options.len() > 20 {
        return Err(validator::ValidationError::new("too_many_options"));
    }
    for opt in options {
        if opt.text.trim().is_empty() {
            return Err(validator::ValidationError::new("option_text_empty"));
        }
        if opt.text.len() > 1000 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

impl CreateQuestionRequest {
    /// Validates the request against the rules of its question type and builds the question.
    pub fn into_question(
        self,
        quiz_id: &str,
        display_order: i32,
        now: DateTime<Utc>,
    ) -> Result<Question, AppError> {
        self.validate()?;

        if self.question_type != QuestionKind::Essay && self.word_limit.is_some() {
            return Err(AppError::ValidationFailed(
                "word_limit is only allowed on ESSAY questions".to_string(),
            ));
        }

        let correct_count = self.options.iter().filter(|o| o.is_correct).count();
        let options: Vec<QuestionOption> = self
            .options
            .iter()
            .map(|o| QuestionOption {
                id: uuid::Uuid::new_v4().to_string(),
                text: clean_html(o.text.trim()),
                is_correct: o.is_correct,
            })
            .collect();

        let body = match self.question_type {
            QuestionKind::MultipleChoice => {
                if options.len() < 2 {
                    return Err(AppError::ValidationFailed(
                        "MULTIPLE_CHOICE questions need at least two options".to_string(),
                    ));
                }
                if correct_count != 1 {
                    return Err(AppError::ValidationFailed(
                        "MULTIPLE_CHOICE questions need exactly one correct option".to_string(),
                    ));
                }
                QuestionBody::MultipleChoice { options }
            }
            QuestionKind::TrueFalse => {
                if options.len() != 2 || correct_count != 1 {
                    return Err(AppError::ValidationFailed(
                        "TRUE_FALSE questions need exactly two options, one of them correct"
                            .to_string(),
                    ));
                }
                QuestionBody::TrueFalse { options }
            }
            QuestionKind::Essay => {
                if !options.is_empty() {
                    return Err(AppError::ValidationFailed(
                        "ESSAY questions take no options".to_string(),
                    ));
                }
                QuestionBody::Essay {
                    word_limit: self.word_limit,
                }
            }
        };

        Ok(Question {
            id: uuid::Uuid::new_v4().to_string(),
            quiz_id: quiz_id.to_string(),
            prompt: clean_html(&self.prompt),
            points: self.points,
            display_order,
            explanation: self.explanation.as_deref().map(clean_html),
            body,
            created_at: now,
        })
    }
}
