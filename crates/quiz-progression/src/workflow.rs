//! Finishing and aborting a quiz.
//!
//! The session and its answers are saved atomically first; the stats row is
//! then updated in one separate read-modify-write. A failed save leaves the
//! stats untouched.

use quiz_config_and_utils::ProgressionRules;
use quiz_database::{NewQuizSession, NewUserAnswer, UserStats};
use serde::Serialize;
use tracing::{info, warn};

use crate::achievements::{earned_achievements, Achievement};
use crate::engine::{record_fastest, ProgressionEngine};
use crate::exams;
use crate::streak::{self, StatsDelta};
use crate::{ProgressionError, ProgressionResult};

/// Numbers of a finished quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuizSummary {
    pub total_questions: i64,
    pub correct_answers: i64,
    pub wrong_answers: i64,
    pub duration_seconds: i64,
}

impl QuizSummary {
    fn from_answers(total_questions: i64, answers: &[NewUserAnswer], duration_seconds: i64) -> Self {
        let correct_answers = answers.iter().filter(|a| a.is_correct).count() as i64;
        Self {
            total_questions,
            correct_answers,
            wrong_answers: answers.len() as i64 - correct_answers,
            duration_seconds,
        }
    }

    fn answered(&self) -> i64 {
        self.correct_answers + self.wrong_answers
    }
}

/// Result of completing a quiz.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizCompletion {
    pub session_id: i64,
    pub summary: QuizSummary,
    /// Achievements unlocked by this quiz, in catalog order.
    pub new_achievements: Vec<Achievement>,
    pub stats: UserStats,
}

/// Result of an exam attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExamOutcome {
    pub exam_number: i64,
    pub passed: bool,
    pub highest_unlocked_exam: i64,
}

impl ProgressionEngine {
    /// Save a completed quiz and apply it to streak, daily progress,
    /// totals, fastest time and achievements.
    pub async fn complete_quiz(
        &self,
        session: NewQuizSession,
        answers: Vec<NewUserAnswer>,
        duration_seconds: i64,
    ) -> ProgressionResult<QuizCompletion> {
        let summary = self.summarize(&session, &answers, duration_seconds)?;

        let mut session = session;
        session.correct_answers = summary.correct_answers;
        session.wrong_answers = summary.wrong_answers;
        session.percentage = percentage(summary.correct_answers, summary.total_questions);
        session.duration_seconds = duration_seconds;
        session.is_completed = true;

        let session_id = self.store.save_session_with_answers(session, answers).await?;

        let today = self.today();
        let rules = self.rules.clone();
        let (new_achievements, stats) = self
            .store
            .update_user_stats(move |stats| {
                streak::apply_streak(stats, today);
                streak::apply_daily_progress(stats, summary.answered(), today);
                streak::apply_overall(
                    stats,
                    StatsDelta {
                        quizzes: 1,
                        questions_answered: summary.answered(),
                        correct_answers: summary.correct_answers,
                        time_minutes: summary.duration_seconds / 60,
                    },
                );
                record_fastest(stats, summary.duration_seconds);

                let newly = unlock_earned(stats, &summary, &rules);
                Ok((newly, stats.clone()))
            })
            .await?;

        info!(
            session_id,
            correct = summary.correct_answers,
            total = summary.total_questions,
            new_achievements = new_achievements.len(),
            "Quiz completed"
        );

        Ok(QuizCompletion {
            session_id,
            summary,
            new_achievements,
            stats,
        })
    }

    /// Save an incomplete quiz with the answers given so far.
    ///
    /// Only the overall totals move; streak, daily progress and
    /// achievements are left alone.
    pub async fn abort_quiz(
        &self,
        session: NewQuizSession,
        answers: Vec<NewUserAnswer>,
        duration_seconds: i64,
    ) -> ProgressionResult<i64> {
        let summary = self.summarize(&session, &answers, duration_seconds)?;

        let mut session = session;
        session.correct_answers = summary.correct_answers;
        session.wrong_answers = summary.wrong_answers;
        session.percentage = percentage(summary.correct_answers, summary.answered());
        session.duration_seconds = duration_seconds;
        session.is_completed = false;

        let session_id = self.store.save_session_with_answers(session, answers).await?;
        self.update_overall_stats(
            1,
            summary.answered(),
            summary.correct_answers,
            summary.duration_seconds / 60,
        )
        .await?;

        warn!(
            session_id,
            answered = summary.answered(),
            total = summary.total_questions,
            "Quiz aborted"
        );
        Ok(session_id)
    }

    /// Unlock every achievement `quiz` satisfies against the current stats.
    /// Returns the newly unlocked ones.
    pub async fn evaluate_achievements(&self, quiz: QuizSummary) -> ProgressionResult<Vec<Achievement>> {
        let rules = self.rules.clone();
        let newly = self
            .store
            .update_user_stats(move |stats| Ok(unlock_earned(stats, &quiz, &rules)))
            .await?;
        for achievement in &newly {
            info!(achievement = achievement.as_str(), "Achievement unlocked");
        }
        Ok(newly)
    }

    /// Record an exam attempt; a pass opens the next exam.
    pub async fn record_exam_result(
        &self,
        exam_number: i64,
        correct_answers: i64,
        total_questions: i64,
    ) -> ProgressionResult<ExamOutcome> {
        if exam_number < 1 || exam_number > self.rules.exam_count {
            return Err(ProgressionError::InvalidInput(format!(
                "unknown exam {}",
                exam_number
            )));
        }

        let passed = exams::exam_passed(correct_answers, total_questions, &self.rules);
        let highest_unlocked_exam = if passed {
            self.unlock_next_exam(exam_number).await?
        } else {
            self.stats().await?.highest_unlocked_exam
        };

        info!(exam_number, passed, highest_unlocked_exam, "Exam result recorded");
        Ok(ExamOutcome {
            exam_number,
            passed,
            highest_unlocked_exam,
        })
    }

    fn summarize(
        &self,
        session: &NewQuizSession,
        answers: &[NewUserAnswer],
        duration_seconds: i64,
    ) -> ProgressionResult<QuizSummary> {
        if duration_seconds < 0 {
            return Err(ProgressionError::InvalidInput(format!(
                "quiz duration must not be negative, got {}",
                duration_seconds
            )));
        }
        let total_questions = session.total_questions.max(answers.len() as i64);
        Ok(QuizSummary::from_answers(total_questions, answers, duration_seconds))
    }
}

/// Add every achievement earned by `quiz` to `stats`; returns the new ones.
fn unlock_earned(stats: &mut UserStats, quiz: &QuizSummary, rules: &ProgressionRules) -> Vec<Achievement> {
    earned_achievements(stats, quiz, rules)
        .into_iter()
        .filter(|achievement| stats.add_achievement(achievement.as_str()))
        .collect()
}

fn percentage(correct: i64, total: i64) -> f64 {
    if total <= 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use quiz_database::{Language, LocalStore};

    use super::*;
    use crate::clock::FixedClock;

    async fn engine() -> (ProgressionEngine, Arc<FixedClock>) {
        let store = LocalStore::open_in_memory().await.unwrap();
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
        (
            ProgressionEngine::with_clock(store, ProgressionRules::default(), clock.clone()),
            clock,
        )
    }

    fn answers(correct: usize, wrong: usize) -> Vec<NewUserAnswer> {
        let mut out = Vec::new();
        for i in 0..correct {
            out.push(NewUserAnswer::new(i as i64 + 1, "A", "A"));
        }
        for i in 0..wrong {
            out.push(NewUserAnswer::new((correct + i) as i64 + 1, "B", "C"));
        }
        out
    }

    #[tokio::test]
    async fn complete_quiz_updates_everything() {
        let (engine, _) = engine().await;
        let session = NewQuizSession::started("local", 10, Language::En);

        let done = engine.complete_quiz(session, answers(10, 0), 240).await.unwrap();

        assert_eq!(done.summary.correct_answers, 10);
        assert_eq!(
            done.new_achievements,
            vec![Achievement::FirstSteps, Achievement::PerfectScore, Achievement::SpeedDemon, Achievement::Master]
        );
        assert_eq!(done.stats.current_streak, 1);
        assert_eq!(done.stats.today_question_count, 10);
        assert_eq!(done.stats.total_quizzes_taken, 1);
        assert_eq!(done.stats.total_time_spent_minutes, 4);
        assert_eq!(done.stats.fastest_quiz_time_seconds, Some(240));

        let saved = engine.store().session(done.session_id).await.unwrap().unwrap();
        assert!(saved.is_completed);
        assert_eq!(saved.percentage, 100.0);
        assert_eq!(engine.store().answers_for_session(done.session_id).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn achievements_unlock_only_once() {
        let (engine, clock) = engine().await;
        let first = engine
            .complete_quiz(NewQuizSession::started("local", 4, Language::En), answers(2, 2), 900)
            .await
            .unwrap();
        assert_eq!(first.new_achievements, vec![Achievement::FirstSteps]);

        clock.advance_days(1);
        let second = engine
            .complete_quiz(NewQuizSession::started("local", 4, Language::De), answers(1, 3), 900)
            .await
            .unwrap();
        assert!(second.new_achievements.is_empty());
        assert_eq!(second.stats.current_streak, 2);
        assert_eq!(second.stats.achievements(), vec!["first_steps"]);
    }

    #[tokio::test]
    async fn abort_quiz_only_touches_totals() {
        let (engine, _) = engine().await;
        let session = NewQuizSession::started("local", 20, Language::En);

        let id = engine.abort_quiz(session, answers(3, 1), 125).await.unwrap();

        let saved = engine.store().session(id).await.unwrap().unwrap();
        assert!(!saved.is_completed);
        assert_eq!(saved.total_questions, 20);
        assert_eq!(saved.percentage, 75.0);

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.total_quizzes_taken, 1);
        assert_eq!(stats.total_questions_answered, 4);
        assert_eq!(stats.total_correct_answers, 3);
        assert_eq!(stats.total_time_spent_minutes, 2);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.today_question_count, 0);
        assert!(stats.achievements().is_empty());
        assert_eq!(stats.fastest_quiz_time_seconds, None);
    }

    #[tokio::test]
    async fn negative_duration_writes_nothing() {
        let (engine, _) = engine().await;
        let result = engine
            .complete_quiz(NewQuizSession::started("local", 2, Language::En), answers(1, 1), -5)
            .await;
        assert!(matches!(result, Err(ProgressionError::InvalidInput(_))));
        assert!(engine.store().recent_sessions("local", 10).await.unwrap().is_empty());
        assert_eq!(engine.stats().await.unwrap(), UserStats::default());
    }

    #[tokio::test]
    async fn exam_pass_unlocks_next() {
        let (engine, _) = engine().await;

        let failed = engine.record_exam_result(1, 60, 80).await.unwrap();
        assert!(!failed.passed);
        assert_eq!(failed.highest_unlocked_exam, 1);

        let passed = engine.record_exam_result(1, 72, 80).await.unwrap();
        assert!(passed.passed);
        assert_eq!(passed.highest_unlocked_exam, 2);
        assert!(engine.is_exam_unlocked(2).await.unwrap());

        assert!(engine.record_exam_result(9, 80, 80).await.is_err());
    }

    #[tokio::test]
    async fn subscribers_see_quiz_completion() {
        let (engine, _) = engine().await;
        let mut sub = engine.store().subscribe_stats().await.unwrap();
        assert_eq!(sub.recv().await.unwrap(), UserStats::default());

        engine
            .complete_quiz(NewQuizSession::started("local", 2, Language::En), answers(2, 0), 600)
            .await
            .unwrap();

        let update = sub.recv().await.unwrap();
        assert_eq!(update.total_quizzes_taken, 1);
        assert_eq!(update.total_correct_answers, 2);
    }

    #[tokio::test]
    async fn evaluate_achievements_against_current_stats() {
        let (engine, _) = engine().await;
        engine.update_overall_stats(1, 10, 9, 5).await.unwrap();

        let quiz = QuizSummary {
            total_questions: 10,
            correct_answers: 9,
            wrong_answers: 1,
            duration_seconds: 600,
        };
        let newly = engine.evaluate_achievements(quiz).await.unwrap();
        assert_eq!(newly, vec![Achievement::FirstSteps, Achievement::Master]);
        assert!(engine.evaluate_achievements(quiz).await.unwrap().is_empty());
        assert!(engine.is_achievement_unlocked("master").await.unwrap());
    }
}
