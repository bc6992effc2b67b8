//! Standalone query functions.
//!
//! Each function takes a `&Connection` (or `&mut Connection` when it opens a
//! transaction) and is meant to run inside `AsyncDatabase::call`.

use crate::{
    DatabaseError, DatabaseResult, Language, NewQuizSession, NewUserAnswer, Question, QuizSession,
    SessionOutcome, UserAnswer, UserStats,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

// ==========================================
// Questions
// ==========================================

/// Insert or replace a batch of questions. Returns the number written.
pub fn upsert_questions(conn: &mut Connection, questions: &[Question]) -> DatabaseResult<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached(
            "INSERT OR REPLACE INTO questions (id, question_en, question_de, options_en, options_de, correct)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for question in questions {
            stmt.execute(params![
                question.id,
                question.question_en,
                question.question_de,
                serde_json::to_string(&question.options_en)?,
                serde_json::to_string(&question.options_de)?,
                question.correct,
            ])?;
        }
    }
    tx.commit()?;
    debug!(count = questions.len(), "Questions upserted");
    Ok(questions.len())
}

/// Get a question by ID.
pub fn get_question(conn: &Connection, id: i64) -> DatabaseResult<Option<Question>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, question_en, question_de, options_en, options_de, correct
         FROM questions WHERE id = ?1",
    )?;

    let row = stmt
        .query_row(params![id], question_columns)
        .optional()?;
    row.map(QuestionColumns::into_question).transpose()
}

/// List all questions ordered by ID.
pub fn list_questions(conn: &Connection) -> DatabaseResult<Vec<Question>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, question_en, question_de, options_en, options_de, correct
         FROM questions ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map([], question_columns)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(QuestionColumns::into_question).collect()
}

/// Count stored questions.
pub fn count_questions(conn: &Connection) -> DatabaseResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?)
}

/// Raw question row; options are JSON arrays decoded outside the row closure.
struct QuestionColumns {
    id: i64,
    question_en: String,
    question_de: String,
    options_en: String,
    options_de: String,
    correct: String,
}

impl QuestionColumns {
    fn into_question(self) -> DatabaseResult<Question> {
        Ok(Question {
            id: self.id,
            question_en: self.question_en,
            question_de: self.question_de,
            options_en: serde_json::from_str(&self.options_en)?,
            options_de: serde_json::from_str(&self.options_de)?,
            correct: self.correct,
        })
    }
}

fn question_columns(row: &Row<'_>) -> rusqlite::Result<QuestionColumns> {
    Ok(QuestionColumns {
        id: row.get(0)?,
        question_en: row.get(1)?,
        question_de: row.get(2)?,
        options_en: row.get(3)?,
        options_de: row.get(4)?,
        correct: row.get(5)?,
    })
}

// ==========================================
// Quiz sessions
// ==========================================

/// Insert a session row. Returns the new session ID.
pub fn insert_session(conn: &Connection, session: &NewQuizSession) -> DatabaseResult<i64> {
    conn.execute(
        "INSERT INTO quiz_sessions (user_id, started_at, total_questions, correct_answers, wrong_answers, percentage, duration_seconds, language, is_completed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            session.user_id,
            format_datetime(&session.started_at),
            session.total_questions,
            session.correct_answers,
            session.wrong_answers,
            session.percentage,
            session.duration_seconds,
            session.language.as_str(),
            session.is_completed,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Write the final counts onto an existing session.
pub fn update_session_outcome(
    conn: &Connection,
    session_id: i64,
    outcome: &SessionOutcome,
) -> DatabaseResult<()> {
    let total: i64 = conn
        .query_row(
            "SELECT total_questions FROM quiz_sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound(format!("quiz session {}", session_id)))?;

    conn.execute(
        "UPDATE quiz_sessions
         SET correct_answers = ?2, wrong_answers = ?3, percentage = ?4, duration_seconds = ?5, is_completed = ?6
         WHERE id = ?1",
        params![
            session_id,
            outcome.correct_answers,
            outcome.wrong_answers,
            outcome.percentage(total),
            outcome.duration_seconds,
            outcome.is_completed,
        ],
    )?;
    Ok(())
}

/// Get a session by ID.
pub fn get_session(conn: &Connection, id: i64) -> DatabaseResult<Option<QuizSession>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user_id, started_at, total_questions, correct_answers, wrong_answers, percentage, duration_seconds, language, is_completed
         FROM quiz_sessions WHERE id = ?1",
    )?;

    Ok(stmt.query_row(params![id], map_session).optional()?)
}

/// Most recent sessions for a user, newest first.
pub fn list_recent_sessions(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> DatabaseResult<Vec<QuizSession>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user_id, started_at, total_questions, correct_answers, wrong_answers, percentage, duration_seconds, language, is_completed
         FROM quiz_sessions WHERE user_id = ?1
         ORDER BY started_at DESC, id DESC
         LIMIT ?2",
    )?;

    let sessions = stmt
        .query_map(params![user_id, limit as i64], map_session)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sessions)
}

/// Delete every session (and, by cascade, every answer) of a user.
pub fn delete_sessions_for_user(conn: &Connection, user_id: &str) -> DatabaseResult<usize> {
    Ok(conn.execute(
        "DELETE FROM quiz_sessions WHERE user_id = ?1",
        params![user_id],
    )?)
}

fn map_session(row: &Row<'_>) -> rusqlite::Result<QuizSession> {
    Ok(QuizSession {
        id: row.get(0)?,
        user_id: row.get(1)?,
        started_at: parse_datetime(row, 2)?,
        total_questions: row.get(3)?,
        correct_answers: row.get(4)?,
        wrong_answers: row.get(5)?,
        percentage: row.get(6)?,
        duration_seconds: row.get(7)?,
        language: Language::parse_or_default(&row.get::<_, String>(8)?),
        is_completed: row.get(9)?,
    })
}

// ==========================================
// Answers
// ==========================================

/// Insert one answer for a session.
pub fn insert_answer(
    conn: &Connection,
    session_id: i64,
    answer: &NewUserAnswer,
) -> DatabaseResult<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO user_answers (session_id, question_id, user_answer, correct_answer, is_correct, answered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    stmt.execute(params![
        session_id,
        answer.question_id,
        answer.user_answer,
        answer.correct_answer,
        answer.is_correct,
        format_datetime(&answer.answered_at),
    ])?;
    Ok(conn.last_insert_rowid())
}

/// Answers of a session in the order they were given.
pub fn list_answers_for_session(conn: &Connection, session_id: i64) -> DatabaseResult<Vec<UserAnswer>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, session_id, question_id, user_answer, correct_answer, is_correct, answered_at
         FROM user_answers WHERE session_id = ?1
         ORDER BY answered_at ASC, id ASC",
    )?;

    let answers = stmt
        .query_map(params![session_id], |row| {
            Ok(UserAnswer {
                id: row.get(0)?,
                session_id: row.get(1)?,
                question_id: row.get(2)?,
                user_answer: row.get(3)?,
                correct_answer: row.get(4)?,
                is_correct: row.get(5)?,
                answered_at: parse_datetime(row, 6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(answers)
}

/// Distinct question IDs that were ever answered incorrectly.
pub fn list_wrong_question_ids(conn: &Connection) -> DatabaseResult<Vec<i64>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT question_id FROM user_answers WHERE is_correct = 0 ORDER BY question_id ASC",
    )?;

    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// Questions that were ever answered incorrectly.
///
/// Answers whose question is not in the bank are skipped.
pub fn list_wrongly_answered_questions(conn: &Connection) -> DatabaseResult<Vec<Question>> {
    let mut stmt = conn.prepare_cached(
        "SELECT q.id, q.question_en, q.question_de, q.options_en, q.options_de, q.correct
         FROM questions q
         WHERE q.id IN (SELECT question_id FROM user_answers WHERE is_correct = 0)
         ORDER BY q.id ASC",
    )?;

    let rows = stmt
        .query_map([], question_columns)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(QuestionColumns::into_question).collect()
}

/// Insert a session and all of its answers in one transaction.
///
/// Either the session and every answer are committed, or nothing is.
pub fn save_session_with_answers(
    conn: &mut Connection,
    session: &NewQuizSession,
    answers: &[NewUserAnswer],
) -> DatabaseResult<i64> {
    let tx = conn.transaction()?;
    let session_id = insert_session(&tx, session)?;
    for answer in answers {
        insert_answer(&tx, session_id, answer)?;
    }
    tx.commit()?;

    debug!(session_id, answers = answers.len(), "Session saved with answers");
    Ok(session_id)
}

/// Append answers to an existing session in one transaction.
pub fn insert_answers(
    conn: &mut Connection,
    session_id: i64,
    answers: &[NewUserAnswer],
) -> DatabaseResult<()> {
    let tx = conn.transaction()?;
    for answer in answers {
        insert_answer(&tx, session_id, answer)?;
    }
    tx.commit()?;
    Ok(())
}

// ==========================================
// User stats
// ==========================================

/// Read the singleton stats row, if it exists.
pub fn get_user_stats(conn: &Connection) -> DatabaseResult<Option<UserStats>> {
    let mut stmt = conn.prepare_cached(
        "SELECT current_streak, longest_streak, last_activity_date, daily_goal, today_question_count,
                last_goal_reset_date, total_quizzes_taken, total_questions_answered, total_correct_answers,
                overall_accuracy, total_time_spent_minutes, fastest_quiz_time_seconds,
                unlocked_achievements, highest_unlocked_exam
         FROM user_stats WHERE id = 1",
    )?;

    let stats = stmt
        .query_row([], |row| {
            Ok(UserStats {
                current_streak: row.get(0)?,
                longest_streak: row.get(1)?,
                last_activity_date: row.get(2)?,
                daily_goal: row.get(3)?,
                today_question_count: row.get(4)?,
                last_goal_reset_date: row.get(5)?,
                total_quizzes_taken: row.get(6)?,
                total_questions_answered: row.get(7)?,
                total_correct_answers: row.get(8)?,
                overall_accuracy: row.get(9)?,
                total_time_spent_minutes: row.get(10)?,
                fastest_quiz_time_seconds: row.get(11)?,
                unlocked_achievements: row.get(12)?,
                highest_unlocked_exam: row.get(13)?,
            })
        })
        .optional()?;
    Ok(stats)
}

/// Read the stats row, inserting the defaults first if it is missing.
pub fn get_or_create_user_stats(conn: &Connection) -> DatabaseResult<UserStats> {
    if let Some(stats) = get_user_stats(conn)? {
        return Ok(stats);
    }
    let stats = UserStats::default();
    upsert_user_stats(conn, &stats)?;
    debug!("Created default user stats row");
    Ok(stats)
}

/// Insert or replace the singleton stats row.
pub fn upsert_user_stats(conn: &Connection, stats: &UserStats) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO user_stats (id, current_streak, longest_streak, last_activity_date, daily_goal,
                today_question_count, last_goal_reset_date, total_quizzes_taken, total_questions_answered,
                total_correct_answers, overall_accuracy, total_time_spent_minutes, fastest_quiz_time_seconds,
                unlocked_achievements, highest_unlocked_exam, updated_at)
         VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(id) DO UPDATE SET
            current_streak = excluded.current_streak,
            longest_streak = excluded.longest_streak,
            last_activity_date = excluded.last_activity_date,
            daily_goal = excluded.daily_goal,
            today_question_count = excluded.today_question_count,
            last_goal_reset_date = excluded.last_goal_reset_date,
            total_quizzes_taken = excluded.total_quizzes_taken,
            total_questions_answered = excluded.total_questions_answered,
            total_correct_answers = excluded.total_correct_answers,
            overall_accuracy = excluded.overall_accuracy,
            total_time_spent_minutes = excluded.total_time_spent_minutes,
            fastest_quiz_time_seconds = excluded.fastest_quiz_time_seconds,
            unlocked_achievements = excluded.unlocked_achievements,
            highest_unlocked_exam = excluded.highest_unlocked_exam,
            updated_at = excluded.updated_at",
        params![
            stats.current_streak,
            stats.longest_streak,
            stats.last_activity_date,
            stats.daily_goal,
            stats.today_question_count,
            stats.last_goal_reset_date,
            stats.total_quizzes_taken,
            stats.total_questions_answered,
            stats.total_correct_answers,
            stats.overall_accuracy,
            stats.total_time_spent_minutes,
            stats.fastest_quiz_time_seconds,
            stats.unlocked_achievements,
            stats.highest_unlocked_exam,
            format_datetime(&Utc::now()),
        ],
    )?;
    Ok(())
}

/// Fixed-width RFC 3339 so timestamps sort lexically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read an RFC 3339 column; a malformed value fails the row.
fn parse_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn question(id: i64) -> Question {
        Question {
            id,
            question_en: format!("Question {id}?"),
            question_de: format!("Frage {id}?"),
            options_en: vec!["one".into(), "two".into(), "three".into(), "four".into()],
            options_de: vec!["eins".into(), "zwei".into(), "drei".into(), "vier".into()],
            correct: "B".to_string(),
        }
    }

    fn session(user_id: &str) -> NewQuizSession {
        NewQuizSession {
            is_completed: true,
            correct_answers: 1,
            wrong_answers: 1,
            percentage: 50.0,
            ..NewQuizSession::started(user_id, 2, Language::En)
        }
    }

    #[test]
    fn test_questions_round_trip() {
        let mut conn = setup();
        upsert_questions(&mut conn, &[question(2), question(1)]).unwrap();

        assert_eq!(count_questions(&conn).unwrap(), 2);
        let all = list_questions(&conn).unwrap();
        assert_eq!(all.iter().map(|q| q.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(get_question(&conn, 2).unwrap(), Some(question(2)));
        assert_eq!(get_question(&conn, 99).unwrap(), None);
    }

    #[test]
    fn test_save_session_with_answers_commits_everything() {
        let mut conn = setup();
        let answers = vec![NewUserAnswer::new(1, "B", "B"), NewUserAnswer::new(2, "A", "B")];

        let id = save_session_with_answers(&mut conn, &session("u1"), &answers).unwrap();

        let stored = get_session(&conn, id).unwrap().unwrap();
        assert!(stored.is_completed);
        assert_eq!(stored.user_id, "u1");
        let stored_answers = list_answers_for_session(&conn, id).unwrap();
        assert_eq!(stored_answers.len(), 2);
        assert!(stored_answers.iter().all(|a| a.session_id == id));
    }

    #[test]
    fn test_save_session_with_answers_rolls_back_on_failure() {
        let mut conn = setup();
        // Force the second answer insert to fail
        conn.execute_batch(
            "CREATE TRIGGER reject_question_666 BEFORE INSERT ON user_answers
             WHEN NEW.question_id = 666
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        let answers = vec![NewUserAnswer::new(1, "B", "B"), NewUserAnswer::new(666, "A", "B")];
        let result = save_session_with_answers(&mut conn, &session("u1"), &answers);
        assert!(result.is_err());

        let sessions: i64 = conn
            .query_row("SELECT COUNT(*) FROM quiz_sessions", [], |row| row.get(0))
            .unwrap();
        let answers: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_answers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(sessions, 0);
        assert_eq!(answers, 0);
    }

    #[test]
    fn test_recent_sessions_newest_first_and_limited() {
        let conn = setup();
        let base = Utc::now();
        for i in 0..12 {
            let mut s = session("u1");
            s.started_at = base + chrono::Duration::minutes(i);
            insert_session(&conn, &s).unwrap();
        }
        insert_session(&conn, &session("someone-else")).unwrap();

        let recent = list_recent_sessions(&conn, "u1", 10).unwrap();
        assert_eq!(recent.len(), 10);
        assert!(recent.windows(2).all(|w| w[0].started_at >= w[1].started_at));
        assert!(recent.iter().all(|s| s.user_id == "u1"));
    }

    #[test]
    fn test_update_session_outcome() {
        let conn = setup();
        let id = insert_session(&conn, &NewQuizSession::started("u1", 4, Language::De)).unwrap();

        update_session_outcome(
            &conn,
            id,
            &SessionOutcome {
                correct_answers: 3,
                wrong_answers: 1,
                duration_seconds: 125,
                is_completed: true,
            },
        )
        .unwrap();

        let stored = get_session(&conn, id).unwrap().unwrap();
        assert_eq!(stored.percentage, 75.0);
        assert_eq!(stored.duration_minutes(), 2);
        assert_eq!(stored.language, Language::De);

        let missing = update_session_outcome(
            &conn,
            999,
            &SessionOutcome {
                correct_answers: 0,
                wrong_answers: 0,
                duration_seconds: 0,
                is_completed: false,
            },
        );
        assert!(matches!(missing, Err(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_wrong_answers_are_distinct() {
        let mut conn = setup();
        upsert_questions(&mut conn, &[question(1), question(2), question(3)]).unwrap();
        let answers = vec![
            NewUserAnswer::new(1, "A", "B"),
            NewUserAnswer::new(1, "C", "B"),
            NewUserAnswer::new(2, "B", "B"),
            NewUserAnswer::new(3, "D", "B"),
            NewUserAnswer::new(42, "D", "B"),
        ];
        save_session_with_answers(&mut conn, &session("u1"), &answers).unwrap();

        assert_eq!(list_wrong_question_ids(&conn).unwrap(), vec![1, 3, 42]);
        let questions = list_wrongly_answered_questions(&conn).unwrap();
        assert_eq!(questions.iter().map(|q| q.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_delete_sessions_cascades_answers() {
        let mut conn = setup();
        save_session_with_answers(&mut conn, &session("u1"), &[NewUserAnswer::new(1, "A", "B")])
            .unwrap();

        assert_eq!(delete_sessions_for_user(&conn, "u1").unwrap(), 1);
        let answers: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_answers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(answers, 0);
    }

    #[test]
    fn test_user_stats_lazy_create_and_upsert() {
        let conn = setup();
        assert!(get_user_stats(&conn).unwrap().is_none());

        let mut stats = get_or_create_user_stats(&conn).unwrap();
        assert_eq!(stats, UserStats::default());

        stats.total_correct_answers = 7;
        stats.fastest_quiz_time_seconds = Some(95);
        stats.unlocked_achievements = "first_steps".to_string();
        upsert_user_stats(&conn, &stats).unwrap();

        assert_eq!(get_or_create_user_stats(&conn).unwrap(), stats);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM user_stats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_malformed_timestamp_fails_read() {
        let conn = setup();
        let id = insert_session(&conn, &session("u1")).unwrap();
        conn.execute(
            "UPDATE quiz_sessions SET started_at = 'yesterday' WHERE id = ?1",
            params![id],
        )
        .unwrap();

        let result = get_session(&conn, id);
        assert!(matches!(
            result,
            Err(DatabaseError::Sqlite(rusqlite::Error::FromSqlConversionFailure(2, Type::Text, _)))
        ));
    }
}
