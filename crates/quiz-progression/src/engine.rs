//! Stats/progression engine over the local store.
//!
//! Every operation is one read-modify-write of the stats row executed on
//! the store's single SQLite thread, so concurrent callers cannot lose
//! each other's updates.

use std::sync::Arc;

use chrono::NaiveDate;
use quiz_config_and_utils::ProgressionRules;
use quiz_database::{LocalStore, UserStats};
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::exams::{self, Exam, UnlockProgress};
use crate::streak::{self, StatsDelta};
use crate::{ProgressionError, ProgressionResult};

/// Exam plus its current gate state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamStatus {
    pub exam: Exam,
    pub unlocked: bool,
}

#[derive(Clone)]
pub struct ProgressionEngine {
    pub(crate) store: LocalStore,
    pub(crate) rules: ProgressionRules,
    pub(crate) clock: Arc<dyn Clock>,
}

impl ProgressionEngine {
    pub fn new(store: LocalStore, rules: ProgressionRules) -> Self {
        Self::with_clock(store, rules, Arc::new(SystemClock))
    }

    pub fn with_clock(store: LocalStore, rules: ProgressionRules, clock: Arc<dyn Clock>) -> Self {
        Self { store, rules, clock }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn rules(&self) -> &ProgressionRules {
        &self.rules
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Current stats snapshot.
    pub async fn stats(&self) -> ProgressionResult<UserStats> {
        Ok(self.store.user_stats().await?)
    }

    // ==========================================
    // Streak and daily goal
    // ==========================================

    /// Register activity today. Returns the current streak.
    pub async fn update_streak(&self) -> ProgressionResult<i64> {
        let today = self.today();
        let current = self
            .store
            .update_user_stats(move |stats| {
                streak::apply_streak(stats, today);
                Ok(stats.current_streak)
            })
            .await?;
        debug!(current_streak = current, "Streak updated");
        Ok(current)
    }

    /// Add answered questions to today's counter. Returns today's count.
    pub async fn update_daily_progress(&self, questions: i64) -> ProgressionResult<i64> {
        if questions < 0 {
            return Err(ProgressionError::InvalidInput(format!(
                "question count must not be negative, got {}",
                questions
            )));
        }
        let today = self.today();
        let count = self
            .store
            .update_user_stats(move |stats| {
                streak::apply_daily_progress(stats, questions, today);
                Ok(stats.today_question_count)
            })
            .await?;
        Ok(count)
    }

    pub async fn daily_goal_reached(&self) -> ProgressionResult<bool> {
        let stats = self.store.user_stats().await?;
        Ok(streak::daily_goal_reached(&stats, self.today()))
    }

    pub async fn set_daily_goal(&self, goal: i64) -> ProgressionResult<()> {
        if goal <= 0 {
            return Err(ProgressionError::InvalidInput(format!(
                "daily goal must be positive, got {}",
                goal
            )));
        }
        self.store
            .update_user_stats(move |stats| {
                stats.daily_goal = goal;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // ==========================================
    // Overall counters
    // ==========================================

    /// Accumulate totals and recompute accuracy.
    ///
    /// Rejects negative inputs and `correct_answers > questions_answered`.
    pub async fn update_overall_stats(
        &self,
        quiz_count: i64,
        questions_answered: i64,
        correct_answers: i64,
        time_minutes: i64,
    ) -> ProgressionResult<UserStats> {
        let delta = StatsDelta {
            quizzes: quiz_count,
            questions_answered,
            correct_answers,
            time_minutes,
        };
        delta.validate()?;

        let stats = self
            .store
            .update_user_stats(move |stats| {
                streak::apply_overall(stats, delta);
                Ok(stats.clone())
            })
            .await?;
        debug!(
            total_quizzes = stats.total_quizzes_taken,
            total_correct = stats.total_correct_answers,
            accuracy = stats.overall_accuracy,
            "Overall stats updated"
        );
        Ok(stats)
    }

    /// Record a completed quiz duration. Returns true on a new fastest time.
    pub async fn record_quiz_time(&self, seconds: i64) -> ProgressionResult<bool> {
        if seconds < 0 {
            return Err(ProgressionError::InvalidInput(format!(
                "quiz duration must not be negative, got {}",
                seconds
            )));
        }
        Ok(self
            .store
            .update_user_stats(move |stats| Ok(record_fastest(stats, seconds)))
            .await?)
    }

    pub async fn total_correct_answers(&self) -> ProgressionResult<i64> {
        Ok(self.store.user_stats().await?.total_correct_answers)
    }

    // ==========================================
    // Achievements
    // ==========================================

    /// Add an achievement ID. Returns true if it was newly unlocked.
    pub async fn unlock_achievement(&self, id: &str) -> ProgressionResult<bool> {
        let id = validate_achievement_id(id)?;
        let log_id = id.clone();
        let unlocked = self
            .store
            .update_user_stats(move |stats| Ok(stats.add_achievement(&id)))
            .await?;
        if unlocked {
            info!(achievement = %log_id, "Achievement unlocked");
        }
        Ok(unlocked)
    }

    pub async fn is_achievement_unlocked(&self, id: &str) -> ProgressionResult<bool> {
        Ok(self.store.user_stats().await?.has_achievement(id.trim()))
    }

    pub async fn unlocked_achievements(&self) -> ProgressionResult<Vec<String>> {
        let stats = self.store.user_stats().await?;
        Ok(stats.achievements().into_iter().map(String::from).collect())
    }

    // ==========================================
    // Exams
    // ==========================================

    pub async fn is_exam_unlocked(&self, exam_number: i64) -> ProgressionResult<bool> {
        let stats = self.store.user_stats().await?;
        Ok(exams::exam_unlocked(&stats, exam_number, &self.rules))
    }

    /// Open the exam after `completed_exam`. Idempotent; never lowers the
    /// highest unlocked exam. Returns the new highest.
    pub async fn unlock_next_exam(&self, completed_exam: i64) -> ProgressionResult<i64> {
        if completed_exam < 1 {
            return Err(ProgressionError::InvalidInput(format!(
                "exam number must be at least 1, got {}",
                completed_exam
            )));
        }
        let highest = self
            .store
            .update_user_stats(move |stats| {
                stats.highest_unlocked_exam = stats.highest_unlocked_exam.max(completed_exam + 1);
                Ok(stats.highest_unlocked_exam)
            })
            .await?;
        info!(completed_exam, highest_unlocked_exam = highest, "Exam unlock applied");
        Ok(highest)
    }

    pub async fn exam_statuses(&self) -> ProgressionResult<Vec<ExamStatus>> {
        let stats = self.store.user_stats().await?;
        Ok(exams::exam_catalog(&self.rules)
            .into_iter()
            .map(|exam| ExamStatus {
                unlocked: exams::exam_unlocked(&stats, exam.number, &self.rules),
                exam,
            })
            .collect())
    }

    pub async fn exam_one_progress(&self) -> ProgressionResult<UnlockProgress> {
        let stats = self.store.user_stats().await?;
        Ok(exams::exam_one_progress(&stats, &self.rules))
    }
}

pub(crate) fn record_fastest(stats: &mut UserStats, seconds: i64) -> bool {
    match stats.fastest_quiz_time_seconds {
        Some(fastest) if fastest <= seconds => false,
        _ => {
            stats.fastest_quiz_time_seconds = Some(seconds);
            true
        }
    }
}

fn validate_achievement_id(id: &str) -> ProgressionResult<String> {
    let id = id.trim();
    if id.is_empty() || id.contains(',') {
        return Err(ProgressionError::InvalidInput(format!(
            "invalid achievement id '{}'",
            id
        )));
    }
    Ok(id.to_string())
}
