//! Pure stats transitions for streaks, daily goals and totals.
//!
//! These mutate a [`UserStats`] value in place; the engine runs them inside
//! a single store transaction.

use chrono::NaiveDate;
use quiz_database::UserStats;

use crate::clock::{format_date, parse_date};
use crate::{ProgressionError, ProgressionResult};

/// Apply one day of activity to the streak.
///
/// Same day: unchanged. Consecutive day: +1. Otherwise the streak restarts
/// at 1. `longest_streak` never drops below `current_streak`.
pub fn apply_streak(stats: &mut UserStats, today: NaiveDate) {
    let last = parse_date(&stats.last_activity_date);
    if last == Some(today) {
        return;
    }

    let yesterday = today.pred_opt();
    if last.is_some() && last == yesterday {
        stats.current_streak += 1;
    } else {
        stats.current_streak = 1;
    }
    stats.longest_streak = stats.longest_streak.max(stats.current_streak);
    stats.last_activity_date = format_date(today);
}

/// Add answered questions to today's counter, resetting it on a new day.
pub fn apply_daily_progress(stats: &mut UserStats, questions: i64, today: NaiveDate) {
    let today_str = format_date(today);
    if stats.last_goal_reset_date != today_str {
        stats.today_question_count = questions;
        stats.last_goal_reset_date = today_str;
    } else {
        stats.today_question_count += questions;
    }
}

/// Whether today's counter has reached the goal.
pub fn daily_goal_reached(stats: &UserStats, today: NaiveDate) -> bool {
    stats.last_goal_reset_date == format_date(today) && stats.today_question_count >= stats.daily_goal
}

/// Counts added to the overall totals by one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsDelta {
    pub quizzes: i64,
    pub questions_answered: i64,
    pub correct_answers: i64,
    pub time_minutes: i64,
}

impl StatsDelta {
    pub fn validate(&self) -> ProgressionResult<()> {
        if self.quizzes < 0 || self.questions_answered < 0 || self.correct_answers < 0 || self.time_minutes < 0 {
            return Err(ProgressionError::InvalidInput(format!(
                "negative stats delta: {:?}",
                self
            )));
        }
        if self.correct_answers > self.questions_answered {
            return Err(ProgressionError::InvalidInput(format!(
                "correct answers ({}) exceed questions answered ({})",
                self.correct_answers, self.questions_answered
            )));
        }
        Ok(())
    }
}

/// Accumulate totals and recompute accuracy.
pub fn apply_overall(stats: &mut UserStats, delta: StatsDelta) {
    stats.total_quizzes_taken += delta.quizzes;
    stats.total_questions_answered += delta.questions_answered;
    stats.total_correct_answers += delta.correct_answers;
    stats.total_time_spent_minutes += delta.time_minutes;
    stats.recompute_accuracy();
}
