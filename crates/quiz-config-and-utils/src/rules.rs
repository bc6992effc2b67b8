//! Progression rule constants shared by the store, the progression engine
//! and the CLI.

/// Correct answers needed before exam 1 opens.
pub const EXAM_ONE_UNLOCK_THRESHOLD: i64 = 50;

/// Tunable progression rules.
///
/// Everything that gates unlocks or achievements reads from here so the
/// numbers live in one place.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionRules {
    /// Total correct answers required for exam 1.
    pub exam_one_threshold: i64,
    /// Number of exams in the catalog.
    pub exam_count: i64,
    /// Questions per exam.
    pub questions_per_exam: i64,
    /// Wrong answers tolerated while still passing an exam.
    pub max_wrong_to_pass: i64,
    /// Quiz duration (seconds) under which `speed_demon` unlocks.
    pub speed_demon_seconds: i64,
    /// Overall accuracy (percent) at which `master` unlocks.
    pub master_accuracy: f64,
    /// Current streak (days) at which `dedicated` unlocks.
    pub dedicated_streak: i64,
    /// Default number of questions per day.
    pub default_daily_goal: i64,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self {
            exam_one_threshold: EXAM_ONE_UNLOCK_THRESHOLD,
            exam_count: 8,
            questions_per_exam: 80,
            max_wrong_to_pass: 10,
            speed_demon_seconds: 300,
            master_accuracy: 90.0,
            dedicated_streak: 10,
            default_daily_goal: 10,
        }
    }
}

impl ProgressionRules {
    /// Minimum correct answers needed to pass an exam.
    pub fn passing_score(&self) -> i64 {
        self.questions_per_exam - self.max_wrong_to_pass
    }
}
