// src/handlers/student.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;

use crate::{
    error::AppError,
    grading::{GradableOption, GradableQuestion, grade_submission},
    models::{
        question::{PublicOption, PublicQuestion},
        result::{
            ReviewOption, ReviewQuestion, ReviewResponse, SubmitTestRequest, SubmitTestResponse,
            TestResult,
        },
        student::{DashboardResponse, RankingEntry},
        test::{Test, TestStatusItem},
    },
    utils::jwt::Claims,
};

/// The current student's profile joined with username and class name.
#[derive(sqlx::FromRow)]
struct ProfileRow {
    user_id: i64,
    class_group_id: Option<i64>,
    total_points: i64,
    username: String,
    class_name: Option<String>,
}

async fn fetch_profile(pool: &PgPool, user_id: i64) -> Result<ProfileRow, AppError> {
    sqlx::query_as::<_, ProfileRow>(
        r#"
        SELECT sp.user_id, sp.class_group_id, sp.total_points,
               u.username, cg.name AS class_name
        FROM student_profiles sp
        JOIN users u ON u.id = sp.user_id
        LEFT JOIN class_groups cg ON cg.id = sp.class_group_id
        WHERE sp.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Student profile not found".to_string()))
}

/// Fetches a test and verifies it targets the student's class group.
async fn fetch_test_for_student(
    pool: &PgPool,
    test_id: i64,
    profile: &ProfileRow,
) -> Result<Test, AppError> {
    let class_group_id = profile.class_group_id.ok_or(AppError::BadRequest(
        "No class group assigned. Please contact your administrator.".to_string(),
    ))?;

    let test = sqlx::query_as::<_, Test>(
        "SELECT id, name, class_group_id, created_at FROM tests WHERE id = $1",
    )
    .bind(test_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Test not found".to_string()))?;

    if test.class_group_id != class_group_id {
        return Err(AppError::Forbidden(
            "This test targets a different class".to_string(),
        ));
    }

    Ok(test)
}

/// One row of the joined questions/options query.
#[derive(sqlx::FromRow)]
struct QuestionOptionRow {
    question_id: i64,
    body: String,
    points: i64,
    option_id: Option<i64>,
    option_body: Option<String>,
    is_correct: Option<bool>,
}

async fn fetch_question_rows(
    pool: &PgPool,
    test_id: i64,
) -> Result<Vec<QuestionOptionRow>, AppError> {
    Ok(sqlx::query_as::<_, QuestionOptionRow>(
        r#"
        SELECT q.id AS question_id, q.body, q.points,
               o.id AS option_id, o.body AS option_body, o.is_correct
        FROM questions q
        LEFT JOIN options o ON o.question_id = q.id
        WHERE q.test_id = $1
        ORDER BY q.id, o.id
        "#,
    )
    .bind(test_id)
    .fetch_all(pool)
    .await?)
}

/// Student dashboard: class ranking, own rank and test counters.
///
/// A student without a class group is not an error case; they get an
/// informational message and empty ranking instead.
pub async fn dashboard(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let profile = fetch_profile(&pool, claims.user_id()).await?;

    let Some(class_group_id) = profile.class_group_id else {
        return Ok(Json(DashboardResponse {
            username: profile.username,
            class_name: None,
            message: Some("No class group assigned. Please contact your administrator.".to_string()),
            total_points: profile.total_points,
            rank: 0,
            ranking: Vec::new(),
            tests_available: 0,
            tests_solved: 0,
        }));
    };

    // Ranking covers only classmates, ordered by cumulative points.
    let ranking = sqlx::query_as::<_, RankingEntry>(
        r#"
        SELECT sp.user_id, u.username, sp.total_points
        FROM student_profiles sp
        JOIN users u ON u.id = sp.user_id
        WHERE sp.class_group_id = $1
        ORDER BY sp.total_points DESC, u.username
        "#,
    )
    .bind(class_group_id)
    .fetch_all(&pool)
    .await?;

    let rank = ranking
        .iter()
        .position(|entry| entry.user_id == profile.user_id)
        .map(|i| i as i64 + 1)
        .unwrap_or(0);

    let tests_available: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tests WHERE class_group_id = $1")
            .bind(class_group_id)
            .fetch_one(&pool)
            .await?;

    let tests_solved: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE student_id = $1")
            .bind(profile.user_id)
            .fetch_one(&pool)
            .await?;

    Ok(Json(DashboardResponse {
        username: profile.username,
        class_name: profile.class_name,
        message: None,
        total_points: profile.total_points,
        rank,
        ranking,
        tests_available,
        tests_solved,
    }))
}

/// Lists the tests of the student's class, each with solved status.
pub async fn list_tests(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let profile = fetch_profile(&pool, claims.user_id()).await?;

    let class_group_id = profile.class_group_id.ok_or(AppError::BadRequest(
        "No class group assigned. Please contact your administrator.".to_string(),
    ))?;

    let tests = sqlx::query_as::<_, TestStatusItem>(
        r#"
        SELECT t.id, t.name, t.created_at,
               (SELECT COUNT(*) FROM questions q WHERE q.test_id = t.id) AS total_questions,
               (r.id IS NOT NULL) AS solved,
               r.id AS result_id,
               r.score AS score
        FROM tests t
        LEFT JOIN results r ON r.test_id = t.id AND r.student_id = $1
        WHERE t.class_group_id = $2
        ORDER BY t.created_at DESC
        "#,
    )
    .bind(profile.user_id)
    .bind(class_group_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(tests))
}

/// Returns a test's questions for taking it, without correctness flags.
///
/// When the student already has a result for this test, no questions are
/// returned; the payload points at the existing result for review instead.
pub async fn get_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let profile = fetch_profile(&pool, claims.user_id()).await?;
    let test = fetch_test_for_student(&pool, test_id, &profile).await?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM results WHERE student_id = $1 AND test_id = $2")
            .bind(profile.user_id)
            .bind(test.id)
            .fetch_optional(&pool)
            .await?;

    if let Some(result_id) = existing {
        return Ok(Json(json!({
            "already_solved": true,
            "result_id": result_id,
        })));
    }

    let rows = fetch_question_rows(&pool, test.id).await?;

    let mut questions: Vec<PublicQuestion> = Vec::new();
    for row in rows {
        if questions.last().map(|q| q.id) != Some(row.question_id) {
            questions.push(PublicQuestion {
                id: row.question_id,
                body: row.body,
                points: row.points,
                options: Vec::new(),
            });
        }
        if let (Some(id), Some(body)) = (row.option_id, row.option_body) {
            questions
                .last_mut()
                .expect("question pushed above")
                .options
                .push(PublicOption { id, body });
        }
    }

    Ok(Json(json!({
        "already_solved": false,
        "test": test,
        "questions": questions,
    })))
}

/// Accepts a submission, grades it and freezes the outcome.
///
/// The at-most-once rule is enforced by the unique constraint on
/// (student_id, test_id): the insert uses ON CONFLICT DO NOTHING, so two
/// racing submissions cannot both create a result. The loser gets the
/// existing result back with `already_submitted: true`.
pub async fn submit_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(test_id): Path<i64>,
    Json(payload): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = fetch_profile(&pool, claims.user_id()).await?;
    let test = fetch_test_for_student(&pool, test_id, &profile).await?;

    let rows = fetch_question_rows(&pool, test.id).await?;

    let mut gradables: Vec<GradableQuestion> = Vec::new();
    for row in &rows {
        if gradables.last().map(|q| q.id) != Some(row.question_id) {
            gradables.push(GradableQuestion {
                id: row.question_id,
                points: row.points,
                options: Vec::new(),
            });
        }
        if let (Some(id), Some(is_correct)) = (row.option_id, row.is_correct) {
            gradables
                .last_mut()
                .expect("question pushed above")
                .options
                .push(GradableOption { id, is_correct });
        }
    }

    let graded = grade_submission(&gradables, &payload.answers);

    let mut tx = pool.begin().await?;

    let result_id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO results (student_id, test_id, score, total_questions, correct_count)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (student_id, test_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(profile.user_id)
    .bind(test.id)
    .bind(graded.score)
    .bind(graded.total_questions)
    .bind(graded.correct_count)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(result_id) = result_id else {
        // Lost the race or resubmitted: hand back the existing result.
        drop(tx);
        let existing = sqlx::query_as::<_, TestResult>(
            r#"
            SELECT id, student_id, test_id, score, total_questions, correct_count, created_at
            FROM results
            WHERE student_id = $1 AND test_id = $2
            "#,
        )
        .bind(profile.user_id)
        .bind(test.id)
        .fetch_one(&pool)
        .await?;

        return Ok(Json(SubmitTestResponse {
            result_id: existing.id,
            score: existing.score,
            correct_count: existing.correct_count,
            total_questions: existing.total_questions,
            already_submitted: true,
        }));
    };

    for answer in &graded.answers {
        sqlx::query(
            r#"
            INSERT INTO answers (result_id, question_id, option_id, is_correct)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(result_id)
        .bind(answer.question_id)
        .bind(answer.option_id)
        .bind(answer.is_correct)
        .execute(&mut *tx)
        .await?;
    }

    // Recompute from scratch rather than incrementing: self-healing and
    // cheap at classroom scale.
    sqlx::query(
        r#"
        UPDATE student_profiles
        SET total_points = (SELECT COALESCE(SUM(score), 0) FROM results WHERE student_id = $1)
        WHERE user_id = $1
        "#,
    )
    .bind(profile.user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Student {} submitted test {}: {}/{} correct, {} points",
        profile.username,
        test.id,
        graded.correct_count,
        graded.total_questions,
        graded.score
    );

    Ok(Json(SubmitTestResponse {
        result_id,
        score: graded.score,
        correct_count: graded.correct_count,
        total_questions: graded.total_questions,
        already_submitted: false,
    }))
}

/// Detailed review of one of the student's own results.
///
/// Options carry `is_selected` and `is_correct` annotations; re-rendering
/// is read-only, so repeated calls produce identical payloads.
pub async fn review_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(result_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let profile = fetch_profile(&pool, claims.user_id()).await?;

    let result = sqlx::query_as::<_, TestResult>(
        r#"
        SELECT id, student_id, test_id, score, total_questions, correct_count, created_at
        FROM results
        WHERE id = $1 AND student_id = $2
        "#,
    )
    .bind(result_id)
    .bind(profile.user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Result not found".to_string()))?;

    let test_name: String = sqlx::query_scalar("SELECT name FROM tests WHERE id = $1")
        .bind(result.test_id)
        .fetch_one(&pool)
        .await?;

    #[derive(sqlx::FromRow)]
    struct AnswerRow {
        question_id: i64,
        option_id: Option<i64>,
        is_correct: bool,
    }

    let answers = sqlx::query_as::<_, AnswerRow>(
        "SELECT question_id, option_id, is_correct FROM answers WHERE result_id = $1",
    )
    .bind(result.id)
    .fetch_all(&pool)
    .await?;

    let answer_map: HashMap<i64, (Option<i64>, bool)> = answers
        .into_iter()
        .map(|a| (a.question_id, (a.option_id, a.is_correct)))
        .collect();

    let rows = fetch_question_rows(&pool, result.test_id).await?;

    let mut questions: Vec<ReviewQuestion> = Vec::new();
    for row in rows {
        if questions.last().map(|q| q.id) != Some(row.question_id) {
            // A deleted option leaves option_id NULL; the answer then no
            // longer counts as correct in the review.
            let (selected, answered_correctly) = answer_map
                .get(&row.question_id)
                .map(|&(opt, correct)| (opt, opt.is_some() && correct))
                .unwrap_or((None, false));

            questions.push(ReviewQuestion {
                id: row.question_id,
                body: row.body,
                points: row.points,
                answered_correctly,
                selected_option_id: selected,
                options: Vec::new(),
            });
        }
        if let (Some(id), Some(body), Some(is_correct)) =
            (row.option_id, row.option_body, row.is_correct)
        {
            let question = questions.last_mut().expect("question pushed above");
            question.options.push(ReviewOption {
                id,
                body,
                is_correct,
                is_selected: question.selected_option_id == Some(id),
            });
        }
    }

    Ok(Json(ReviewResponse {
        test_id: result.test_id,
        test_name,
        result,
        questions,
    }))
}
