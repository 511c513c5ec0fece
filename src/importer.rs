// src/importer.rs
//
// Bulk question import. Admins paste a whole document of questions copied
// from a word processor; this module turns it into question/option rows.
//
// The format is deliberately loose so that humans can type it:
//
//   #1.What is 2+2?
//   #ball:2
//   A) 3
//   +B) 4
//   C) 5
//
// Each block starts at a `#<n>.` marker. An optional `#ball:<points>` line
// separates the question body from its options; without it the whole block
// is treated as body and the question is worth 1 point. Option tokens are
// `A)`..`D)`, with a leading `+` marking the correct one.

use regex::Regex;
use sqlx::PgPool;
use std::sync::LazyLock;

use crate::{error::AppError, utils::html::clean_html};

/// Marks the start of a question block. The number is only a visual label
/// for the author; blocks are imported in document order regardless.
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#\d+\.").unwrap());

/// Separates the question body from the option list and carries the points.
static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#ball:\s*(\d+)").unwrap());

/// An option token: optional correctness marker, letter, closing paren.
static OPTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\+)?([A-D])\)").unwrap());

const DEFAULT_POINTS: i64 = 1;

/// One answer option extracted from a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOption {
    pub body: String,
    pub is_correct: bool,
}

/// One question extracted from a block, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuestion {
    pub body: String,
    pub points: i64,
    pub options: Vec<ParsedOption>,
}

/// Parses a raw import document into questions, in document order.
///
/// Blocks whose question body trims to nothing are dropped silently; the
/// caller only ever learns the aggregate count. A block may legitimately
/// yield zero options (the author forgot them) or several options marked
/// correct; both are preserved as written.
pub fn parse_import_text(text: &str) -> Vec<ParsedQuestion> {
    let markers: Vec<_> = BLOCK_RE.find_iter(text).collect();

    let mut questions = Vec::new();
    for (i, marker) in markers.iter().enumerate() {
        let block_end = markers
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let block = &text[marker.end()..block_end];

        if let Some(question) = parse_block(block) {
            questions.push(question);
        }
    }
    questions
}

/// Parses one block (the text between two `#<n>.` markers).
///
/// Returns `None` when no question body can be extracted. Note the sharp
/// edge inherited from the format: with no `#ball:` marker the option text
/// ends up inside the question body, since nothing separates the two.
fn parse_block(block: &str) -> Option<ParsedQuestion> {
    let (raw_body, points, tail) = match SCORE_RE.captures(block) {
        Some(caps) => {
            let m = caps.get(0).unwrap();
            let points = caps[1].parse().unwrap_or(DEFAULT_POINTS);
            (&block[..m.start()], points, &block[m.end()..])
        }
        None => (block, DEFAULT_POINTS, ""),
    };

    let body = raw_body.trim();
    if body.is_empty() {
        return None;
    }

    Some(ParsedQuestion {
        body: body.to_string(),
        points,
        options: parse_options(tail),
    })
}

/// Scans the post-`#ball:` tail for option tokens. Each option's text runs
/// from just after its `X)` up to the next token or the end of the block.
fn parse_options(tail: &str) -> Vec<ParsedOption> {
    let tokens: Vec<_> = OPTION_RE.captures_iter(tail).collect();

    let mut options = Vec::with_capacity(tokens.len());
    for (i, caps) in tokens.iter().enumerate() {
        let full = caps.get(0).unwrap();
        let text_end = tokens
            .get(i + 1)
            .map(|next| next.get(0).unwrap().start())
            .unwrap_or(tail.len());

        options.push(ParsedOption {
            body: tail[full.end()..text_end].trim().to_string(),
            is_correct: caps.get(1).is_some(),
        });
    }
    options
}

/// Parses `text` and persists the resulting questions and options under
/// `test_id`. Returns how many questions were imported.
///
/// The whole import runs in one transaction: if any insert fails, nothing
/// from this call remains in the database.
pub async fn import_into_test(pool: &PgPool, test_id: i64, text: &str) -> Result<u64, AppError> {
    let questions = parse_import_text(text);

    let mut tx = pool.begin().await?;
    let mut imported: u64 = 0;

    for question in &questions {
        let question_id: i64 = sqlx::query_scalar(
            "INSERT INTO questions (test_id, body, points) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(test_id)
        .bind(clean_html(&question.body))
        .bind(question.points)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert imported question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        for option in &question.options {
            sqlx::query("INSERT INTO options (question_id, body, is_correct) VALUES ($1, $2, $3)")
                .bind(question_id)
                .bind(clean_html(&option.body))
                .bind(option.is_correct)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to insert imported option: {:?}", e);
                    AppError::InternalServerError(e.to_string())
                })?;
        }

        imported += 1;
    }

    tx.commit().await?;
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "#1.What is 2+2?\n#ball:2\nA) 3\n+B) 4\nC) 5\n#2.Capital of France?\n#ball:1\n+A) Paris\nB) London\n";

    #[test]
    fn parses_the_sample_document() {
        let questions = parse_import_text(SAMPLE);
        assert_eq!(questions.len(), 2);

        let q1 = &questions[0];
        assert_eq!(q1.body, "What is 2+2?");
        assert_eq!(q1.points, 2);
        assert_eq!(q1.options.len(), 3);
        assert_eq!(q1.options[0].body, "3");
        assert!(!q1.options[0].is_correct);
        assert_eq!(q1.options[1].body, "4");
        assert!(q1.options[1].is_correct);
        assert!(!q1.options[2].is_correct);

        let q2 = &questions[1];
        assert_eq!(q2.body, "Capital of France?");
        assert_eq!(q2.points, 1);
        assert_eq!(q2.options.len(), 2);
        assert!(q2.options[0].is_correct);
        assert_eq!(q2.options[1].body, "London");
    }

    #[test]
    fn count_skips_blocks_with_empty_body() {
        let text = "#1.\n#ball:2\nA) orphaned\n#2.Real question\n#ball:1\n+A) yes\nB) no\n";
        let questions = parse_import_text(text);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].body, "Real question");
    }

    #[test]
    fn missing_score_marker_defaults_to_one_point_and_swallows_options() {
        // Known sharp edge: without #ball: there is nothing separating the
        // body from the options, so everything stays in the body.
        let text = "#1.Question without marker\nA) first\n+B) second\n";
        let questions = parse_import_text(text);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].points, 1);
        assert!(questions[0].options.is_empty());
        assert!(questions[0].body.contains("first"));
    }

    #[test]
    fn text_before_the_first_marker_is_ignored() {
        let text = "Imported from 5-A midterm.docx\n#1.Body\n#ball:3\n+A) x\nB) y\n";
        let questions = parse_import_text(text);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].points, 3);
    }

    #[test]
    fn no_markers_yields_nothing() {
        assert!(parse_import_text("just some prose, no markers").is_empty());
        assert!(parse_import_text("").is_empty());
    }

    #[test]
    fn option_text_is_trimmed() {
        let text = "#1.Q\n#ball:1\nA)   padded   \n+B)\n\ttabbed\t\n";
        let questions = parse_import_text(text);
        let options = &questions[0].options;
        assert_eq!(options[0].body, "padded");
        assert_eq!(options[1].body, "tabbed");
        assert!(options[1].is_correct);
    }

    #[test]
    fn block_with_marker_but_no_options_still_counts() {
        let text = "#1.Lonely question\n#ball:5\n";
        let questions = parse_import_text(text);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].points, 5);
        assert!(questions[0].options.is_empty());
    }

    #[test]
    fn multiple_correct_markers_are_preserved_as_written() {
        // The format does not enforce a single correct option; the admin
        // endpoint does, the importer does not.
        let text = "#1.Pick any\n#ball:1\n+A) one\n+B) two\nC) three\n";
        let questions = parse_import_text(text);
        let correct: Vec<_> = questions[0].options.iter().filter(|o| o.is_correct).collect();
        assert_eq!(correct.len(), 2);
    }

    #[test]
    fn sequence_labels_do_not_reorder_blocks() {
        let text = "#9.First in document\n#ball:1\n+A) a\nB) b\n#2.Second in document\n#ball:1\n+A) a\nB) b\n";
        let questions = parse_import_text(text);
        assert_eq!(questions[0].body, "First in document");
        assert_eq!(questions[1].body, "Second in document");
    }

    #[test]
    fn multiline_bodies_survive_with_inner_whitespace() {
        let text = "#1.Line one\nline two\n\nline three\n#ball:2\n+A) x\nB) y\n";
        let questions = parse_import_text(text);
        assert_eq!(questions[0].body, "Line one\nline two\n\nline three");
    }
}
