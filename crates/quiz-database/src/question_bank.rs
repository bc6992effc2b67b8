//! Parsing of the bundled JSON question bank.
//!
//! Entries look like:
//!
//! ```json
//! {"id": 1, "question_en": "...", "question_de": "...",
//!  "options_en": ["A) ...", "B) ...", "C) ...", "D) ..."],
//!  "options_de": ["A) ...", "B) ...", "C) ...", "D) ..."],
//!  "correct": "B"}
//! ```

use crate::{DatabaseError, DatabaseResult, Question, ANSWER_LETTERS};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct QuestionBankEntry {
    id: i64,
    question_en: String,
    question_de: String,
    options_en: Vec<String>,
    options_de: Vec<String>,
    correct: String,
}

/// Parse a JSON array of questions.
///
/// Option labels like `"A) "` are stripped. Entries without exactly four
/// options per language or with a correct letter outside A-D are rejected.
pub fn parse_question_bank(json: &str) -> DatabaseResult<Vec<Question>> {
    let entries: Vec<QuestionBankEntry> = serde_json::from_str(json)?;
    entries.into_iter().map(into_question).collect()
}

fn into_question(entry: QuestionBankEntry) -> DatabaseResult<Question> {
    let correct = entry.correct.trim().to_ascii_uppercase();
    if !ANSWER_LETTERS.contains(&correct.as_str()) {
        return Err(DatabaseError::Invariant(format!(
            "question {}: correct answer '{}' is not one of A-D",
            entry.id, entry.correct
        )));
    }

    Ok(Question {
        id: entry.id,
        question_en: entry.question_en,
        question_de: entry.question_de,
        options_en: strip_labels(entry.id, entry.options_en)?,
        options_de: strip_labels(entry.id, entry.options_de)?,
        correct,
    })
}

fn strip_labels(id: i64, options: Vec<String>) -> DatabaseResult<Vec<String>> {
    if options.len() != ANSWER_LETTERS.len() {
        return Err(DatabaseError::Invariant(format!(
            "question {}: expected 4 options, got {}",
            id,
            options.len()
        )));
    }

    Ok(options
        .into_iter()
        .zip(ANSWER_LETTERS)
        .map(|(option, letter)| {
            let label = format!("{}) ", letter);
            option
                .strip_prefix(label.as_str())
                .map(str::to_string)
                .unwrap_or(option)
        })
        .collect())
}
