//! Local store facade used by the progression and sync layers.
//!
//! Wraps [`AsyncDatabase`] with the quiz operations and owns the
//! [`StatsHub`] so that every stats write is broadcast after commit.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::live::{StatsHub, StatsSubscription};
use crate::question_bank::parse_question_bank;
use crate::{
    queries, AsyncDatabase, DatabaseError, DatabaseResult, NewQuizSession, NewUserAnswer, Question,
    QuizSession, SessionOutcome, UserAnswer, UserStats,
};

/// Handle to the on-device quiz database. Cheap to clone.
#[derive(Clone)]
pub struct LocalStore {
    db: AsyncDatabase,
    stats_hub: Arc<StatsHub>,
}

impl LocalStore {
    /// Open the store at `path`, creating and migrating it if needed.
    pub async fn open(path: &Path) -> DatabaseResult<Self> {
        Ok(Self::from_database(AsyncDatabase::open(path).await?))
    }

    /// Open a throwaway in-memory store.
    pub async fn open_in_memory() -> DatabaseResult<Self> {
        Ok(Self::from_database(AsyncDatabase::open_in_memory().await?))
    }

    pub fn from_database(db: AsyncDatabase) -> Self {
        Self {
            db,
            stats_hub: Arc::new(StatsHub::new()),
        }
    }

    /// Underlying executor, for ad-hoc queries.
    pub fn database(&self) -> &AsyncDatabase {
        &self.db
    }

    // ==========================================
    // Questions
    // ==========================================

    /// Insert or replace questions.
    pub async fn import_questions(&self, questions: Vec<Question>) -> DatabaseResult<usize> {
        self.db
            .call_mut(move |conn| queries::upsert_questions(conn, &questions))
            .await
    }

    /// Seed the question table from a JSON bank when it is empty.
    ///
    /// Returns the number of questions imported (0 when already seeded).
    pub async fn initialize_questions_if_needed(&self, bank_json: &str) -> DatabaseResult<usize> {
        if self.question_count().await? > 0 {
            debug!("Question bank already seeded");
            return Ok(0);
        }
        let questions = parse_question_bank(bank_json)?;
        let count = self.import_questions(questions).await?;
        info!(count, "Question bank imported");
        Ok(count)
    }

    pub async fn all_questions(&self) -> DatabaseResult<Vec<Question>> {
        self.db.call(queries::list_questions).await
    }

    pub async fn question_by_id(&self, id: i64) -> DatabaseResult<Option<Question>> {
        self.db.call(move |conn| queries::get_question(conn, id)).await
    }

    pub async fn question_count(&self) -> DatabaseResult<i64> {
        self.db.call(queries::count_questions).await
    }

    // ==========================================
    // Sessions and answers
    // ==========================================

    /// Persist a session together with all of its answers atomically.
    ///
    /// On failure nothing is written and the error is returned.
    pub async fn save_session_with_answers(
        &self,
        session: NewQuizSession,
        answers: Vec<NewUserAnswer>,
    ) -> DatabaseResult<i64> {
        let answer_count = answers.len();
        let session_id = self
            .db
            .call_mut(move |conn| queries::save_session_with_answers(conn, &session, &answers))
            .await?;
        info!(session_id, answers = answer_count, "Quiz session saved");
        Ok(session_id)
    }

    /// Insert an in-progress session. Returns its ID.
    pub async fn start_session(&self, session: NewQuizSession) -> DatabaseResult<i64> {
        self.db
            .call(move |conn| queries::insert_session(conn, &session))
            .await
    }

    /// Record one answer for a running session.
    pub async fn record_answer(&self, session_id: i64, answer: NewUserAnswer) -> DatabaseResult<i64> {
        self.db
            .call(move |conn| queries::insert_answer(conn, session_id, &answer))
            .await
    }

    /// Write the final counts onto a session.
    pub async fn finish_session(&self, session_id: i64, outcome: SessionOutcome) -> DatabaseResult<()> {
        self.db
            .call(move |conn| queries::update_session_outcome(conn, session_id, &outcome))
            .await
    }

    /// Write the counts reached so far and leave the session incomplete.
    pub async fn abort_session(&self, session_id: i64, outcome: SessionOutcome) -> DatabaseResult<()> {
        let outcome = SessionOutcome {
            is_completed: false,
            ..outcome
        };
        self.finish_session(session_id, outcome).await?;
        debug!(session_id, "Quiz session aborted");
        Ok(())
    }

    pub async fn session(&self, session_id: i64) -> DatabaseResult<Option<QuizSession>> {
        self.db
            .call(move |conn| queries::get_session(conn, session_id))
            .await
    }

    /// Most recent sessions for `user_id`, newest first.
    pub async fn recent_sessions(&self, user_id: &str, limit: usize) -> DatabaseResult<Vec<QuizSession>> {
        let user_id = user_id.to_string();
        self.db
            .call(move |conn| queries::list_recent_sessions(conn, &user_id, limit))
            .await
    }

    pub async fn answers_for_session(&self, session_id: i64) -> DatabaseResult<Vec<UserAnswer>> {
        self.db
            .call(move |conn| queries::list_answers_for_session(conn, session_id))
            .await
    }

    /// Distinct IDs of questions that were ever answered incorrectly.
    pub async fn wrong_question_ids(&self) -> DatabaseResult<Vec<i64>> {
        self.db.call(queries::list_wrong_question_ids).await
    }

    /// Questions that were ever answered incorrectly, for review mode.
    pub async fn wrongly_answered_questions(&self) -> DatabaseResult<Vec<Question>> {
        self.db.call(queries::list_wrongly_answered_questions).await
    }

    /// Delete a user's sessions and their answers.
    pub async fn clear_history(&self, user_id: &str) -> DatabaseResult<usize> {
        let user_id = user_id.to_string();
        self.db
            .call(move |conn| queries::delete_sessions_for_user(conn, &user_id))
            .await
    }

    // ==========================================
    // User stats
    // ==========================================

    /// One-shot read of the stats row (created with defaults if missing).
    pub async fn user_stats(&self) -> DatabaseResult<UserStats> {
        self.db.call(queries::get_or_create_user_stats).await
    }

    /// Read-modify-write the stats row as one unit on the executor thread.
    ///
    /// `f` must stay cheap: it runs on the SQLite thread. The write is
    /// rejected if it would leave more correct answers than answered
    /// questions or lower the highest unlocked exam. Subscribers are
    /// notified only when the row actually changed.
    pub async fn update_user_stats<F, R>(&self, f: F) -> DatabaseResult<R>
    where
        F: FnOnce(&mut UserStats) -> DatabaseResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let hub = self.stats_hub.clone();
        self.db
            .call_mut(move |conn| {
                let tx = conn.transaction()?;
                let current = queries::get_or_create_user_stats(&tx)?;
                let mut next = current.clone();
                let result = f(&mut next)?;

                check_stats_invariants(&current, &next)?;

                if next != current {
                    queries::upsert_user_stats(&tx, &next)?;
                    tx.commit()?;
                    hub.notify(&next);
                } else {
                    tx.commit()?;
                }
                Ok(result)
            })
            .await
    }

    /// Subscribe to stats changes. The first item is the current row.
    pub async fn subscribe_stats(&self) -> DatabaseResult<StatsSubscription> {
        let hub = self.stats_hub.clone();
        // Registering on the executor thread keeps the initial snapshot
        // ordered before any later commit.
        self.db
            .call(move |conn| {
                let current = queries::get_or_create_user_stats(conn)?;
                Ok(hub.subscribe_with(current))
            })
            .await
    }
}

fn check_stats_invariants(current: &UserStats, next: &UserStats) -> DatabaseResult<()> {
    if next.total_correct_answers > next.total_questions_answered {
        return Err(DatabaseError::Invariant(format!(
            "total_correct_answers ({}) exceeds total_questions_answered ({})",
            next.total_correct_answers, next.total_questions_answered
        )));
    }
    if next.highest_unlocked_exam < current.highest_unlocked_exam {
        return Err(DatabaseError::Invariant(format!(
            "highest_unlocked_exam cannot drop from {} to {}",
            current.highest_unlocked_exam, next.highest_unlocked_exam
        )));
    }
    Ok(())
}
