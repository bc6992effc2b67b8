//! Max-merge of progression snapshots.
//!
//! Every counter is monotonic, so the merge takes the coordinate-wise
//! maximum and the union of achievements. The result does not depend on
//! argument order and re-merging with either input changes nothing.

use std::collections::BTreeSet;

use chrono::SecondsFormat;
use quiz_database::{QuizSession, UserStats};
use quiz_remote_gateway::{QuizSessionDto, UserStatsDto};

/// Merge two optional snapshots. Missing on both sides gives the default
/// (zeros, exam 1, no achievements).
pub fn merge_stats(local: Option<&UserStatsDto>, server: Option<&UserStatsDto>) -> UserStatsDto {
    match (local, server) {
        (Some(local), Some(server)) => UserStatsDto {
            total_quizzes_taken: local.total_quizzes_taken.max(server.total_quizzes_taken),
            total_questions_answered: local.total_questions_answered.max(server.total_questions_answered),
            total_correct_answers: local.total_correct_answers.max(server.total_correct_answers),
            overall_accuracy: local.overall_accuracy.max(server.overall_accuracy),
            current_streak: local.current_streak.max(server.current_streak),
            longest_streak: local.longest_streak.max(server.longest_streak),
            highest_unlocked_exam: local.highest_unlocked_exam.max(server.highest_unlocked_exam),
            unlocked_achievements: union_achievements(&local.unlocked_achievements, &server.unlocked_achievements),
        },
        (Some(only), None) | (None, Some(only)) => only.clone(),
        (None, None) => UserStatsDto::default(),
    }
}

/// Union of two comma-joined achievement lists, deduplicated, blanks
/// dropped, sorted.
pub fn union_achievements(a: &str, b: &str) -> String {
    let set: BTreeSet<&str> = a
        .split(',')
        .chain(b.split(','))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .collect();
    set.into_iter().collect::<Vec<_>>().join(",")
}

/// Download ratchet: accept server data only when it shows more progress.
pub fn should_update_local(local: &UserStats, server: &UserStatsDto) -> bool {
    server.total_correct_answers > local.total_correct_answers
        || server.longest_streak > local.longest_streak
        || server.highest_unlocked_exam > local.highest_unlocked_exam
}

/// Max-merge `server` into the local row. Never lowers any field.
pub fn apply_to_local(local: &mut UserStats, server: &UserStatsDto) {
    local.total_quizzes_taken = local.total_quizzes_taken.max(server.total_quizzes_taken);
    local.total_questions_answered = local.total_questions_answered.max(server.total_questions_answered);
    local.total_correct_answers = local
        .total_correct_answers
        .max(server.total_correct_answers)
        .min(local.total_questions_answered);
    local.overall_accuracy = local.overall_accuracy.max(server.overall_accuracy);
    local.current_streak = local.current_streak.max(server.current_streak);
    local.longest_streak = local.longest_streak.max(server.longest_streak).max(local.current_streak);
    local.highest_unlocked_exam = local.highest_unlocked_exam.max(server.highest_unlocked_exam);
    local.unlocked_achievements = union_achievements(&local.unlocked_achievements, &server.unlocked_achievements);
}

pub fn stats_to_dto(stats: &UserStats) -> UserStatsDto {
    UserStatsDto {
        total_quizzes_taken: stats.total_quizzes_taken,
        total_questions_answered: stats.total_questions_answered,
        total_correct_answers: stats.total_correct_answers,
        overall_accuracy: stats.overall_accuracy,
        current_streak: stats.current_streak,
        longest_streak: stats.longest_streak,
        highest_unlocked_exam: stats.highest_unlocked_exam,
        unlocked_achievements: stats.unlocked_achievements.clone(),
    }
}

pub fn session_to_dto(session: &QuizSession) -> QuizSessionDto {
    QuizSessionDto {
        session_id: Some(session.id),
        total_questions: session.total_questions,
        correct_answers: session.correct_answers,
        wrong_answers: session.wrong_answers,
        percentage: session.percentage,
        completed_at: Some(session.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        is_completed: session.is_completed,
    }
}
