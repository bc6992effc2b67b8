//! Exam catalog and gating rules.

use quiz_config_and_utils::ProgressionRules;
use quiz_database::UserStats;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Exams 1-3 are easy, 4-6 medium, the rest hard.
    pub fn for_exam(number: i64) -> Self {
        match number {
            n if n <= 3 => Self::Easy,
            4..=6 => Self::Medium,
            _ => Self::Hard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub number: i64,
    pub difficulty: Difficulty,
    pub question_count: i64,
    pub time_limit_minutes: i64,
    /// Minimum correct answers to pass.
    pub passing_score: i64,
}

const TIME_LIMIT_MINUTES: i64 = 90;

/// All exams, numbered from 1.
pub fn exam_catalog(rules: &ProgressionRules) -> Vec<Exam> {
    (1..=rules.exam_count)
        .map(|number| Exam {
            number,
            difficulty: Difficulty::for_exam(number),
            question_count: rules.questions_per_exam,
            time_limit_minutes: TIME_LIMIT_MINUTES,
            passing_score: rules.passing_score(),
        })
        .collect()
}

/// Gate check against a stats snapshot.
///
/// Exam 1 opens at the correct-answer threshold; later exams open once the
/// previous one was passed (`number <= highest_unlocked_exam`).
pub fn exam_unlocked(stats: &UserStats, number: i64, rules: &ProgressionRules) -> bool {
    match number {
        1 => stats.total_correct_answers >= rules.exam_one_threshold,
        n if n > 1 => n <= stats.highest_unlocked_exam,
        _ => false,
    }
}

/// An exam passes with at most `max_wrong_to_pass` wrong or unanswered questions.
pub fn exam_passed(correct: i64, total: i64, rules: &ProgressionRules) -> bool {
    total > 0 && correct >= 0 && correct <= total && total - correct <= rules.max_wrong_to_pass
}

/// Progress toward opening exam 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockProgress {
    pub current: i64,
    pub required: i64,
    pub remaining: i64,
    pub percentage: f64,
    pub unlocked: bool,
}

pub fn exam_one_progress(stats: &UserStats, rules: &ProgressionRules) -> UnlockProgress {
    let required = rules.exam_one_threshold;
    let current = stats.total_correct_answers;
    let percentage = if required > 0 {
        (current as f64 / required as f64 * 100.0).min(100.0)
    } else {
        100.0
    };
    UnlockProgress {
        current,
        required,
        remaining: (required - current).max(0),
        percentage,
        unlocked: current >= required,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_eight_exams_with_difficulty_bands() {
        let exams = exam_catalog(&ProgressionRules::default());
        assert_eq!(exams.len(), 8);
        assert_eq!(exams[0].difficulty, Difficulty::Easy);
        assert_eq!(exams[3].difficulty, Difficulty::Medium);
        assert_eq!(exams[7].difficulty, Difficulty::Hard);
        assert!(exams.iter().all(|e| e.passing_score == 70 && e.question_count == 80));
    }

    #[test]
    fn exam_one_threshold() {
        let rules = ProgressionRules::default();
        let mut stats = UserStats {
            total_correct_answers: 49,
            total_questions_answered: 60,
            ..Default::default()
        };
        assert!(!exam_unlocked(&stats, 1, &rules));
        stats.total_correct_answers = 50;
        assert!(exam_unlocked(&stats, 1, &rules));
    }

    #[test]
    fn later_exams_follow_highest_unlocked() {
        let rules = ProgressionRules::default();
        let stats = UserStats {
            highest_unlocked_exam: 3,
            ..Default::default()
        };
        assert!(exam_unlocked(&stats, 2, &rules));
        assert!(exam_unlocked(&stats, 3, &rules));
        assert!(!exam_unlocked(&stats, 4, &rules));
        assert!(!exam_unlocked(&stats, 0, &rules));
        assert!(!exam_unlocked(&stats, 9, &rules));
    }

    #[test]
    fn passing_last_exam_opens_the_next_number() {
        let rules = ProgressionRules::default();
        let stats = UserStats {
            highest_unlocked_exam: 9,
            ..Default::default()
        };
        assert!(exam_unlocked(&stats, 9, &rules));
        assert!(!exam_unlocked(&stats, 10, &rules));
    }

    #[test]
    fn passing_allows_ten_wrong() {
        let rules = ProgressionRules::default();
        assert!(exam_passed(70, 80, &rules));
        assert!(!exam_passed(69, 80, &rules));
        assert!(!exam_passed(0, 0, &rules));
        assert!(!exam_passed(81, 80, &rules));
    }

    #[test]
    fn progress_toward_exam_one() {
        let rules = ProgressionRules::default();
        let stats = UserStats {
            total_correct_answers: 20,
            total_questions_answered: 30,
            ..Default::default()
        };
        let progress = exam_one_progress(&stats, &rules);
        assert_eq!(progress.remaining, 30);
        assert_eq!(progress.percentage, 40.0);
        assert!(!progress.unlocked);
    }
}
