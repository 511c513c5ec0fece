// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    importer,
    models::{
        class_group::{ClassGroup, CreateClassGroupRequest},
        question::CreateQuestionRequest,
        result::ResultListItem,
        test::{CreateTestRequest, TestListItem},
        user::UserListItem,
    },
    utils::{hash::hash_password, html::clean_html, jwt::Claims},
};

// ---------------- Users ----------------

/// Lists all users with their class assignment and cumulative points.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, UserListItem>(
        r#"
        SELECT u.id, u.username, u.role,
               sp.class_group_id, cg.name AS class_name, sp.total_points,
               u.created_at
        FROM users u
        LEFT JOIN student_profiles sp ON sp.user_id = u.id
        LEFT JOIN class_groups cg ON cg.id = sp.class_group_id
        ORDER BY u.id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role and class).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username length must be between 3 and 50 characters."))]
    pub username: String,
    #[validate(length(min = 4, max = 128, message = "Password length must be between 4 and 128 characters."))]
    pub password: String,
    /// 'student' or 'admin'.
    pub role: String,
    /// Class assignment, only meaningful for students.
    pub class_group_id: Option<i64>,
}

/// Creates a new user with a specific role. Students get a profile,
/// optionally assigned to a class right away.
/// Admin only.
pub async fn create_user(
    State(pool): State<PgPool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if payload.role != "student" && payload.role != "admin" {
        return Err(AppError::BadRequest(
            "Role must be 'student' or 'admin'".to_string(),
        ));
    }

    let hashed_password = hash_password(&payload.password)?;

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(&payload.role)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    if payload.role == "student" {
        sqlx::query("INSERT INTO student_profiles (user_id, class_group_id) VALUES ($1, $2)")
            .bind(id)
            .bind(payload.class_group_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Moves the student to another class.
    pub class_group_id: Option<i64>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Check existence
    let _exists: i64 = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    // Perform updates sequentially if fields are present
    if let Some(new_username) = payload.username {
        sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
            .bind(new_username)
            .bind(id)
            .execute(&pool)
            .await
            .map_err(|e| {
                if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                    AppError::Conflict("Username already exists".to_string())
                } else {
                    AppError::InternalServerError(e.to_string())
                }
            })?;
    }

    if let Some(new_password) = payload.password {
        let hashed = hash_password(&new_password)?;
        sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(hashed)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    if let Some(new_class) = payload.class_group_id {
        let updated = sqlx::query("UPDATE student_profiles SET class_group_id = $1 WHERE user_id = $2")
            .bind(new_class)
            .bind(id)
            .execute(&pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::BadRequest(
                "User has no student profile".to_string(),
            ));
        }
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // Prevent self-deletion
    if id == claims.user_id() {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------- Class groups ----------------

/// Lists all class groups.
/// Admin only.
pub async fn list_class_groups(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let groups = sqlx::query_as::<_, ClassGroup>("SELECT id, name FROM class_groups ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(groups))
}

/// Creates a class group.
/// Admin only.
pub async fn create_class_group(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateClassGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let id: i64 = sqlx::query_scalar("INSERT INTO class_groups (name) VALUES ($1) RETURNING id")
        .bind(&payload.name)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("Class '{}' already exists", payload.name))
            } else {
                tracing::error!("Failed to create class group: {:?}", e);
                AppError::InternalServerError(e.to_string())
            }
        })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Deletes a class group. Tests targeting it cascade away; student
/// assignments are cleared, not deleted.
/// Admin only.
pub async fn delete_class_group(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM class_groups WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Class group not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------- Tests ----------------

/// Lists all tests with class names and question counts.
/// Admin only.
pub async fn list_tests(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let tests = sqlx::query_as::<_, TestListItem>(
        r#"
        SELECT t.id, t.name, t.class_group_id, cg.name AS class_name,
               (SELECT COUNT(*) FROM questions q WHERE q.test_id = t.id) AS total_questions,
               t.created_at
        FROM tests t
        JOIN class_groups cg ON cg.id = t.class_group_id
        ORDER BY t.created_at DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(tests))
}

/// Creates a test for a class group.
/// Admin only.
pub async fn create_test(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let class_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM class_groups WHERE id = $1")
        .bind(payload.class_group_id)
        .fetch_optional(&pool)
        .await?;
    if class_exists.is_none() {
        return Err(AppError::BadRequest("Class group not found".to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO tests (name, class_group_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(&payload.name)
    .bind(payload.class_group_id)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create test: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Deletes a test and, by cascade, its questions, options, results and
/// answers.
/// Admin only.
pub async fn delete_test(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM tests WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------- Questions ----------------

/// Creates a single question with its options by hand. Unlike the bulk
/// importer, this path requires exactly one correct option.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Path(test_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let test_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM tests WHERE id = $1")
        .bind(test_id)
        .fetch_optional(&pool)
        .await?;
    if test_exists.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    let mut tx = pool.begin().await?;

    let question_id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (test_id, body, points) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(test_id)
    .bind(clean_html(&payload.body))
    .bind(payload.points)
    .fetch_one(&mut *tx)
    .await?;

    for option in &payload.options {
        sqlx::query("INSERT INTO options (question_id, body, is_correct) VALUES ($1, $2, $3)")
            .bind(question_id)
            .bind(clean_html(&option.body))
            .bind(option.is_correct)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": question_id})),
    ))
}

/// Deletes a question and its options.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------- Bulk import ----------------

/// DTO for the bulk import endpoint: one pasted document.
#[derive(Debug, Deserialize, Validate)]
pub struct ImportQuestionsRequest {
    #[validate(length(min = 1, message = "Import text must not be empty."))]
    pub text: String,
}

/// Bulk-imports questions into a test from pasted semi-structured text.
/// See `importer` for the format. Responds with the number of questions
/// imported; a failed write aborts the whole import.
/// Admin only.
pub async fn import_questions(
    State(pool): State<PgPool>,
    Path(test_id): Path<i64>,
    Json(payload): Json<ImportQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let test_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM tests WHERE id = $1")
        .bind(test_id)
        .fetch_optional(&pool)
        .await?;
    if test_exists.is_none() {
        return Err(AppError::NotFound("Test not found".to_string()));
    }

    let imported = importer::import_into_test(&pool, test_id, &payload.text).await?;

    tracing::info!("Imported {} questions into test {}", imported, test_id);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"imported": imported})),
    ))
}

// ---------------- Results ----------------

/// Lists per-student outcomes for one test.
/// Admin only.
pub async fn list_test_results(
    State(pool): State<PgPool>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let results = sqlx::query_as::<_, ResultListItem>(
        r#"
        SELECT r.id AS result_id, u.username, r.score, r.correct_count,
               r.total_questions, r.created_at
        FROM results r
        JOIN users u ON u.id = r.student_id
        WHERE r.test_id = $1
        ORDER BY r.score DESC, r.created_at
        "#,
    )
    .bind(test_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(results))
}
