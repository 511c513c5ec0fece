// src/grading.rs
//
// Pure grading of a test submission. The handler in `handlers::student`
// loads the questions, calls `grade_submission`, and persists the outcome;
// nothing here touches the database, which keeps the scoring rules unit
// testable on in-memory data.

use std::collections::HashMap;

/// One selectable option of a gradable question.
#[derive(Debug, Clone)]
pub struct GradableOption {
    pub id: i64,
    pub is_correct: bool,
}

/// A question as the grader sees it: id, its point value, and its options.
#[derive(Debug, Clone)]
pub struct GradableQuestion {
    pub id: i64,
    pub points: i64,
    pub options: Vec<GradableOption>,
}

/// A validated selection, ready to be frozen as an answer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub option_id: i64,
    pub is_correct: bool,
}

/// The computed outcome of one submission.
#[derive(Debug, Clone)]
pub struct GradedSubmission {
    pub score: i64,
    pub correct_count: i64,
    pub total_questions: i64,
    pub answers: Vec<GradedAnswer>,
}

/// Grades `selections` (question id -> selected option id) against the
/// test's questions.
///
/// * A question with no entry in `selections` is skipped: it produces no
///   answer record and contributes zero to the score.
/// * A selection referencing an option that does not belong to the question
///   is treated exactly like no answer.
/// * Correctness is the selected option's flag; a correct pick adds the
///   question's points and bumps the correct count.
pub fn grade_submission(
    questions: &[GradableQuestion],
    selections: &HashMap<i64, i64>,
) -> GradedSubmission {
    let mut score = 0;
    let mut correct_count = 0;
    let mut answers = Vec::new();

    for question in questions {
        let Some(&selected_id) = selections.get(&question.id) else {
            continue;
        };

        // The selection must reference one of this question's own options.
        let Some(option) = question.options.iter().find(|o| o.id == selected_id) else {
            continue;
        };

        if option.is_correct {
            score += question.points;
            correct_count += 1;
        }

        answers.push(GradedAnswer {
            question_id: question.id,
            option_id: option.id,
            is_correct: option.is_correct,
        });
    }

    GradedSubmission {
        score,
        correct_count,
        total_questions: questions.len() as i64,
        answers,
    }
}
