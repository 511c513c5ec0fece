// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub test_id: i64,
    /// The question text. May carry sanitized rich-text markup.
    pub body: String,
    /// Points awarded for a correct answer.
    pub points: i64,
}

/// Represents the 'options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub body: String,
    pub is_correct: bool,
}

/// DTO for sending an option to a student taking a test
/// (excludes the correctness flag).
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub body: String,
}

/// DTO for sending a question to a student taking a test.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub body: String,
    pub points: i64,
    pub options: Vec<PublicOption>,
}

/// DTO for an option inside `CreateQuestionRequest`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOptionRequest {
    pub body: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for an admin creating a single question by hand.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
    #[validate(range(min = 1, max = 100))]
    pub points: i64,
    #[validate(custom(function = validate_options))]
    pub options: Vec<CreateOptionRequest>,
}

/// The hand-authoring path insists on exactly one correct option so the
/// grader's assumption holds. The bulk importer is deliberately more
/// permissive; see `importer`.
fn validate_options(options: &[CreateOptionRequest]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for opt in options {
        if opt.body.trim().is_empty() || opt.body.len() > 2000 {
            return Err(validator::ValidationError::new("invalid_option_body"));
        }
    }
    let correct = options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_option"));
    }
    Ok(())
}
