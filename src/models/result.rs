// src/models/result.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// Represents the 'results' table: the frozen outcome of one student's
/// one submission for one test. Never mutated after creation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub student_id: i64,
    pub test_id: i64,
    pub score: i64,
    pub total_questions: i64,
    pub correct_count: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'answers' table: which option the student picked for one
/// question, with correctness computed at submission time and frozen.
/// `option_id` goes NULL if the option is later deleted from storage.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StudentAnswer {
    pub id: i64,
    pub result_id: i64,
    pub question_id: i64,
    pub option_id: Option<i64>,
    pub is_correct: bool,
}

/// DTO for submitting a test attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitTestRequest {
    /// Key: question id. Value: selected option id.
    /// Unanswered questions are simply absent.
    pub answers: HashMap<i64, i64>,
}

/// DTO returned after a submission (or when one already exists).
#[derive(Debug, Serialize)]
pub struct SubmitTestResponse {
    pub result_id: i64,
    pub score: i64,
    pub correct_count: i64,
    pub total_questions: i64,
    pub already_submitted: bool,
}

/// One option row of the review display.
#[derive(Debug, Serialize)]
pub struct ReviewOption {
    pub id: i64,
    pub body: String,
    pub is_correct: bool,
    pub is_selected: bool,
}

/// One question of the review display, annotated with the student's pick.
#[derive(Debug, Serialize)]
pub struct ReviewQuestion {
    pub id: i64,
    pub body: String,
    pub points: i64,
    pub answered_correctly: bool,
    pub selected_option_id: Option<i64>,
    pub options: Vec<ReviewOption>,
}

/// Full review payload for a solved test.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub test_id: i64,
    pub test_name: String,
    pub result: TestResult,
    pub questions: Vec<ReviewQuestion>,
}

/// Admin-facing per-student outcome row for one test.
#[derive(Debug, Serialize, FromRow)]
pub struct ResultListItem {
    pub result_id: i64,
    pub username: String,
    pub score: i64,
    pub correct_count: i64,
    pub total_questions: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
