// src/models/class_group.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'class_groups' table: a school class such as "5-A".
/// Both students and tests point at a class group; it gates which tests
/// a student may see and take.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ClassGroup {
    pub id: i64,
    pub name: String,
}

/// DTO for creating a class group.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateClassGroupRequest {
    #[validate(length(min = 1, max = 10, message = "Class name must be 1-10 characters."))]
    pub name: String,
}
