// src/models/student.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'student_profiles' table.
/// `total_points` is the cumulative score across all of the student's
/// results, recomputed from scratch on every new submission.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StudentProfile {
    pub user_id: i64,
    pub class_group_id: Option<i64>,
    pub total_points: i64,
}

/// One row of the class ranking, ordered by total points.
#[derive(Debug, Serialize, FromRow)]
pub struct RankingEntry {
    pub user_id: i64,
    pub username: String,
    pub total_points: i64,
}

/// Aggregated dashboard payload for the current student.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub username: String,
    pub class_name: Option<String>,
    /// Informational message when no class group is assigned yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub total_points: i64,
    /// 1-based position within the class ranking; 0 when unranked.
    pub rank: i64,
    pub ranking: Vec<RankingEntry>,
    pub tests_available: i64,
    pub tests_solved: i64,
}
