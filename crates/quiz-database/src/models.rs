//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answer letters in display order.
pub const ANSWER_LETTERS: [&str; 4] = ["A", "B", "C", "D"];

/// A multiple-choice question with English and German text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question_en: String,
    pub question_de: String,
    /// Four options, A through D.
    pub options_en: Vec<String>,
    pub options_de: Vec<String>,
    /// Correct answer letter.
    pub correct: String,
}

impl Question {
    /// Question text in the given language.
    pub fn text(&self, language: Language) -> &str {
        match language {
            Language::En => &self.question_en,
            Language::De => &self.question_de,
        }
    }

    /// Options in the given language.
    pub fn options(&self, language: Language) -> &[String] {
        match language {
            Language::En => &self.options_en,
            Language::De => &self.options_de,
        }
    }

    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct.eq_ignore_ascii_case(answer.trim())
    }
}

/// Quiz language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    De,
}

impl Default for Language {
    fn default() -> Self {
        Self::En
    }
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::De => "de",
        }
    }

    /// Case-insensitive; anything but `de` is English.
    pub fn parse_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "de" => Self::De,
            _ => Self::En,
        }
    }
}

/// A stored quiz session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: i64,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub percentage: f64,
    pub duration_seconds: i64,
    pub language: Language,
    /// False when the quiz was aborted or is still running.
    pub is_completed: bool,
}

impl QuizSession {
    pub fn duration_minutes(&self) -> i64 {
        self.duration_seconds / 60
    }
}

/// Parameters for inserting a quiz session.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuizSession {
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub percentage: f64,
    pub duration_seconds: i64,
    pub language: Language,
    pub is_completed: bool,
}

impl NewQuizSession {
    /// A fresh, not yet answered session.
    pub fn started(user_id: impl Into<String>, total_questions: i64, language: Language) -> Self {
        Self {
            user_id: user_id.into(),
            started_at: Utc::now(),
            total_questions,
            correct_answers: 0,
            wrong_answers: 0,
            percentage: 0.0,
            duration_seconds: 0,
            language,
            is_completed: false,
        }
    }
}

/// Final numbers written onto a session when it finishes or is aborted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOutcome {
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub duration_seconds: i64,
    pub is_completed: bool,
}

impl SessionOutcome {
    /// Percentage of `total_questions` answered correctly.
    pub fn percentage(&self, total_questions: i64) -> f64 {
        if total_questions <= 0 {
            0.0
        } else {
            self.correct_answers as f64 / total_questions as f64 * 100.0
        }
    }
}

/// A stored answer to one question in a session. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: i64,
    pub session_id: i64,
    pub question_id: i64,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// Parameters for inserting an answer; the session id is assigned on save.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUserAnswer {
    pub question_id: i64,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

impl NewUserAnswer {
    pub fn new(question_id: i64, user_answer: &str, correct_answer: &str) -> Self {
        Self {
            question_id,
            user_answer: user_answer.to_string(),
            correct_answer: correct_answer.to_string(),
            is_correct: user_answer.trim().eq_ignore_ascii_case(correct_answer.trim()),
            answered_at: Utc::now(),
        }
    }
}

/// Aggregate progress, stored as the singleton row `id = 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub current_streak: i64,
    pub longest_streak: i64,
    /// `yyyy-MM-dd`, empty when never active.
    pub last_activity_date: String,
    pub daily_goal: i64,
    pub today_question_count: i64,
    /// `yyyy-MM-dd`, empty when never reset.
    pub last_goal_reset_date: String,
    pub total_quizzes_taken: i64,
    pub total_questions_answered: i64,
    pub total_correct_answers: i64,
    pub overall_accuracy: f64,
    pub total_time_spent_minutes: i64,
    pub fastest_quiz_time_seconds: Option<i64>,
    /// Comma-joined achievement ids.
    pub unlocked_achievements: String,
    pub highest_unlocked_exam: i64,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: String::new(),
            daily_goal: 10,
            today_question_count: 0,
            last_goal_reset_date: String::new(),
            total_quizzes_taken: 0,
            total_questions_answered: 0,
            total_correct_answers: 0,
            overall_accuracy: 0.0,
            total_time_spent_minutes: 0,
            fastest_quiz_time_seconds: None,
            unlocked_achievements: String::new(),
            highest_unlocked_exam: 1,
        }
    }
}

impl UserStats {
    /// Achievement ids in stored order, blanks dropped.
    pub fn achievements(&self) -> Vec<&str> {
        self.unlocked_achievements
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Exact-id membership test.
    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements().iter().any(|a| *a == id)
    }

    /// Add an achievement id. Returns false when already present.
    pub fn add_achievement(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.has_achievement(id) {
            return false;
        }
        let mut ids: Vec<String> = self.achievements().into_iter().map(String::from).collect();
        ids.push(id.to_string());
        self.unlocked_achievements = ids.join(",");
        true
    }

    /// Recompute `overall_accuracy` from the totals.
    pub fn recompute_accuracy(&mut self) {
        self.overall_accuracy = if self.total_questions_answered > 0 {
            self.total_correct_answers as f64 / self.total_questions_answered as f64 * 100.0
        } else {
            0.0
        };
    }
}
