//! Achievement catalog and unlock rules.

use quiz_config_and_utils::ProgressionRules;
use quiz_database::UserStats;
use serde::{Deserialize, Serialize};

use crate::workflow::QuizSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstSteps,
    PerfectScore,
    SpeedDemon,
    Master,
    Dedicated,
}

impl Achievement {
    pub const ALL: [Achievement; 5] = [
        Self::FirstSteps,
        Self::PerfectScore,
        Self::SpeedDemon,
        Self::Master,
        Self::Dedicated,
    ];

    /// Stable ID stored in `unlocked_achievements` and sent to the server.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstSteps => "first_steps",
            Self::PerfectScore => "perfect_score",
            Self::SpeedDemon => "speed_demon",
            Self::Master => "master",
            Self::Dedicated => "dedicated",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == id)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::FirstSteps => "First Steps",
            Self::PerfectScore => "Perfect Score",
            Self::SpeedDemon => "Speed Demon",
            Self::Master => "Master",
            Self::Dedicated => "Dedicated",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FirstSteps => "Complete your first quiz",
            Self::PerfectScore => "Answer every question of a quiz correctly",
            Self::SpeedDemon => "Finish a quiz in under five minutes",
            Self::Master => "Reach 90% overall accuracy",
            Self::Dedicated => "Practice ten days in a row",
        }
    }
}

/// Achievements satisfied by `stats` (already updated for `quiz`).
///
/// Returns every satisfied one, unlocked or not; callers filter.
pub fn earned_achievements(
    stats: &UserStats,
    quiz: &QuizSummary,
    rules: &ProgressionRules,
) -> Vec<Achievement> {
    Achievement::ALL
        .into_iter()
        .filter(|achievement| match achievement {
            Achievement::FirstSteps => stats.total_quizzes_taken >= 1,
            Achievement::PerfectScore => {
                quiz.total_questions > 0 && quiz.correct_answers == quiz.total_questions
            }
            Achievement::SpeedDemon => quiz.duration_seconds < rules.speed_demon_seconds,
            Achievement::Master => stats.overall_accuracy >= rules.master_accuracy,
            Achievement::Dedicated => stats.current_streak >= rules.dedicated_streak,
        })
        .collect()
}
