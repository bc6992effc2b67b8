//! Upload, download and smart sync between the local store and the backend.

use std::sync::Arc;

use quiz_database::LocalStore;
use quiz_remote_gateway::{SyncApi, SyncRequest, UserStatsDto};
use tracing::{debug, info, warn};

use crate::merge::{apply_to_local, merge_stats, session_to_dto, should_update_local, stats_to_dto};
use crate::{SyncFailure, SyncOutcome};

/// Sessions included in one upload.
pub const UPLOAD_SESSION_LIMIT: usize = 10;

/// Runs one sync attempt per call and reports the result as a value.
#[derive(Clone)]
pub struct SyncEngine {
    api: Arc<dyn SyncApi>,
    store: LocalStore,
    device_id: String,
    user_id: String,
}

impl SyncEngine {
    pub fn new(api: Arc<dyn SyncApi>, store: LocalStore, device_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            api,
            store,
            device_id: device_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Push the local stats and recent sessions.
    ///
    /// Nothing is posted unless the health check passes.
    pub async fn upload(&self) -> SyncOutcome {
        let outcome = SyncOutcome::from(self.try_upload().await);
        log_outcome("upload", &outcome);
        outcome
    }

    /// Pull the server snapshot and apply it only if it shows more progress.
    pub async fn download(&self) -> SyncOutcome {
        let outcome = SyncOutcome::from(self.try_download().await);
        log_outcome("download", &outcome);
        outcome
    }

    /// Bidirectional max-merge. Uploads instead when the server has no
    /// stats for this device.
    pub async fn smart_sync(&self) -> SyncOutcome {
        let outcome = SyncOutcome::from(self.try_smart_sync().await);
        log_outcome("smart_sync", &outcome);
        outcome
    }

    pub async fn is_server_reachable(&self) -> bool {
        self.api.is_healthy().await
    }

    /// Transport errors keep their own failure kind; a reachable server
    /// reporting anything but `ok` is `ServerUnhealthy`.
    async fn check_health(&self) -> Result<(), SyncFailure> {
        let health = self.api.health().await?;
        if !health.is_ok() {
            warn!(status = %health.status, "Server not healthy, skipping sync");
            return Err(SyncFailure::ServerUnhealthy);
        }
        debug!(uptime = health.uptime, "Server health OK");
        Ok(())
    }

    async fn try_upload(&self) -> Result<String, SyncFailure> {
        self.check_health().await?;
        self.push_snapshot().await
    }

    async fn push_snapshot(&self) -> Result<String, SyncFailure> {
        let stats = self.store.user_stats().await?;
        let sessions = self
            .store
            .recent_sessions(&self.user_id, UPLOAD_SESSION_LIMIT)
            .await?;

        let request = SyncRequest {
            device_id: self.device_id.clone(),
            user_stats: Some(stats_to_dto(&stats)),
            quiz_sessions: Some(sessions.iter().map(session_to_dto).collect()),
            last_sync: chrono::Utc::now().timestamp_millis(),
        };

        let response = self.api.upload(&request).await?;
        if !response.success {
            return Err(SyncFailure::Rejected(if response.message.is_empty() {
                "Upload failed".to_string()
            } else {
                response.message
            }));
        }

        info!(
            device_id = %self.device_id,
            sessions = sessions.len(),
            "Upload successful"
        );
        Ok("Data uploaded successfully".to_string())
    }

    async fn try_download(&self) -> Result<String, SyncFailure> {
        let response = self.api.download(&self.device_id).await?;
        if !response.success {
            return Err(SyncFailure::Rejected("Download failed".to_string()));
        }

        let Some(data) = response.data else {
            return Ok("No server data available".to_string());
        };
        let Some(server_stats) = data.user_stats else {
            return Ok("No server stats available".to_string());
        };
        let session_count = data.quiz_sessions.as_ref().map(Vec::len).unwrap_or(0);

        let applied = self
            .store
            .update_user_stats(move |local| {
                if should_update_local(local, &server_stats) {
                    apply_to_local(local, &server_stats);
                    Ok(true)
                } else {
                    Ok(false)
                }
            })
            .await?;

        if applied {
            info!(sessions = session_count, "Applied server stats");
            Ok(format!("Data downloaded: {} sessions", session_count))
        } else {
            Ok("Local data is up-to-date".to_string())
        }
    }

    async fn try_smart_sync(&self) -> Result<String, SyncFailure> {
        self.check_health().await?;

        let Some(server_stats) = self.api.get_user_stats(&self.device_id).await? else {
            info!(device_id = %self.device_id, "No server stats yet, uploading local data");
            return self.push_snapshot().await;
        };

        let local = self.store.user_stats().await?;
        let merged = merge_stats(Some(&stats_to_dto(&local)), Some(&server_stats));

        // Another writer may have moved the row since the read; merge again
        // against whatever is current.
        let to_apply = merged.clone();
        let written: UserStatsDto = self
            .store
            .update_user_stats(move |local| {
                apply_to_local(local, &to_apply);
                Ok(stats_to_dto(local))
            })
            .await?;

        self.api.update_user_stats(&self.device_id, &written).await?;

        debug!(
            correct = written.total_correct_answers,
            longest_streak = written.longest_streak,
            highest_exam = written.highest_unlocked_exam,
            "Merged stats written locally and remotely"
        );
        Ok("Sync completed successfully".to_string())
    }
}

fn log_outcome(operation: &str, outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Success(message) => info!(operation, message = %message, "Sync finished"),
        SyncOutcome::Failure(failure) => warn!(operation, error = %failure, "Sync failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;
    use quiz_database::{Language, NewQuizSession, NewUserAnswer, UserStats};

    async fn engine_with(server: &Arc<FakeServer>) -> SyncEngine {
        let store = LocalStore::open_in_memory().await.unwrap();
        SyncEngine::new(server.clone(), store, "dev-1", "local")
    }

    async fn set_local(engine: &SyncEngine, correct: i64, streak: i64, exam: i64) {
        engine
            .store
            .update_user_stats(move |stats| {
                stats.total_questions_answered = correct + 20;
                stats.total_correct_answers = correct;
                stats.current_streak = streak;
                stats.longest_streak = streak;
                stats.highest_unlocked_exam = exam;
                Ok(())
            })
            .await
            .unwrap();
    }

    fn server_dto(correct: i64, streak: i64, exam: i64) -> UserStatsDto {
        UserStatsDto {
            total_questions_answered: correct + 5,
            total_correct_answers: correct,
            current_streak: streak,
            longest_streak: streak,
            highest_unlocked_exam: exam,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn upload_skips_post_when_unhealthy() {
        let server = FakeServer::new();
        server.set_health_status("degraded");
        let engine = engine_with(&server).await;

        let outcome = engine.upload().await;

        assert_eq!(outcome, SyncOutcome::Failure(SyncFailure::ServerUnhealthy));
        assert_eq!(server.upload_count(), 0);
    }

    #[tokio::test]
    async fn upload_fails_without_post_when_offline() {
        let server = FakeServer::new();
        server.set_offline(true);
        let engine = engine_with(&server).await;

        let outcome = engine.upload().await;

        assert!(matches!(outcome, SyncOutcome::Failure(SyncFailure::NotReachable(_))));
        assert_eq!(server.upload_count(), 0);
    }

    #[tokio::test]
    async fn upload_sends_stats_and_recent_sessions() {
        let server = FakeServer::new();
        let engine = engine_with(&server).await;
        set_local(&engine, 30, 2, 1).await;
        for _ in 0..12 {
            let session = NewQuizSession {
                is_completed: true,
                ..NewQuizSession::started("local", 1, Language::En)
            };
            engine
                .store
                .save_session_with_answers(session, vec![NewUserAnswer::new(1, "A", "A")])
                .await
                .unwrap();
        }

        let outcome = engine.upload().await;

        assert_eq!(outcome, SyncOutcome::Success("Data uploaded successfully".into()));
        let request = server.last_upload().unwrap();
        assert_eq!(request.device_id, "dev-1");
        assert_eq!(request.user_stats.unwrap().total_correct_answers, 30);
        assert_eq!(request.quiz_sessions.unwrap().len(), UPLOAD_SESSION_LIMIT);
    }

    #[tokio::test]
    async fn upload_rejected_by_server() {
        let server = FakeServer::new();
        server.set_reject_uploads(true);
        let engine = engine_with(&server).await;

        let outcome = engine.upload().await;
        assert!(matches!(outcome, SyncOutcome::Failure(SyncFailure::Rejected(_))));
    }

    #[tokio::test]
    async fn download_without_data() {
        let server = FakeServer::new();
        let engine = engine_with(&server).await;

        assert_eq!(engine.download().await, SyncOutcome::Success("No server data available".into()));

        server.set_download_without_stats();
        assert_eq!(engine.download().await, SyncOutcome::Success("No server stats available".into()));
    }

    #[tokio::test]
    async fn download_applies_only_better_server_data() {
        let server = FakeServer::new();
        let engine = engine_with(&server).await;
        set_local(&engine, 40, 3, 2).await;

        server.set_stats(Some(server_dto(30, 1, 1)));
        assert_eq!(engine.download().await, SyncOutcome::Success("Local data is up-to-date".into()));
        assert_eq!(engine.store.user_stats().await.unwrap().total_correct_answers, 40);

        server.set_stats(Some(server_dto(55, 1, 1)));
        assert_eq!(engine.download().await, SyncOutcome::Success("Data downloaded: 0 sessions".into()));

        let local = engine.store.user_stats().await.unwrap();
        assert_eq!(local.total_correct_answers, 55);
        assert_eq!(local.longest_streak, 3);
        assert_eq!(local.highest_unlocked_exam, 2);
    }

    #[tokio::test]
    async fn smart_sync_merges_both_ways() {
        let server = FakeServer::new();
        server.set_stats(Some(server_dto(55, 1, 2)));
        let engine = engine_with(&server).await;
        set_local(&engine, 40, 3, 1).await;

        let outcome = engine.smart_sync().await;
        assert_eq!(outcome, SyncOutcome::Success("Sync completed successfully".into()));

        let local = engine.store.user_stats().await.unwrap();
        assert_eq!(local.total_correct_answers, 55);
        assert_eq!(local.longest_streak, 3);
        assert_eq!(local.highest_unlocked_exam, 2);
        assert_eq!(server.stats(), Some(stats_to_dto(&local)));
        assert_eq!(server.upload_count(), 0);
    }

    #[tokio::test]
    async fn smart_sync_unions_achievements() {
        let server = FakeServer::new();
        server.set_stats(Some(UserStatsDto {
            unlocked_achievements: "master,speed_demon".into(),
            ..Default::default()
        }));
        let engine = engine_with(&server).await;
        engine
            .store
            .update_user_stats(|stats| {
                stats.add_achievement("first_steps");
                stats.add_achievement("master");
                Ok(())
            })
            .await
            .unwrap();

        assert!(engine.smart_sync().await.is_success());

        let local = engine.store.user_stats().await.unwrap();
        assert_eq!(local.achievements(), vec!["first_steps", "master", "speed_demon"]);
        assert_eq!(server.stats().unwrap().unlocked_achievements, "first_steps,master,speed_demon");
    }

    #[tokio::test]
    async fn smart_sync_degrades_to_upload() {
        let server = FakeServer::new();
        let engine = engine_with(&server).await;
        set_local(&engine, 12, 1, 1).await;

        let outcome = engine.smart_sync().await;

        assert_eq!(outcome, SyncOutcome::Success("Data uploaded successfully".into()));
        assert_eq!(server.upload_count(), 1);
        assert_eq!(server.stats().unwrap().total_correct_answers, 12);
        assert_eq!(server.health_check_count(), 1);
    }

    #[tokio::test]
    async fn smart_sync_with_unhealthy_status() {
        let server = FakeServer::new();
        server.set_health_status("degraded");
        let engine = engine_with(&server).await;

        assert_eq!(engine.smart_sync().await, SyncOutcome::Failure(SyncFailure::ServerUnhealthy));
        assert_eq!(server.upload_count(), 0);
    }

    #[tokio::test]
    async fn smart_sync_offline() {
        let server = FakeServer::new();
        server.set_offline(true);
        let engine = engine_with(&server).await;

        assert_eq!(
            engine.smart_sync().await,
            SyncOutcome::Failure(SyncFailure::NotReachable("connection refused".into()))
        );
        assert!(!engine.is_server_reachable().await);
        assert_eq!(engine.store.user_stats().await.unwrap(), UserStats::default());
    }

    #[tokio::test]
    async fn smart_sync_twice_changes_nothing() {
        let server = FakeServer::new();
        server.set_stats(Some(server_dto(55, 1, 2)));
        let engine = engine_with(&server).await;
        set_local(&engine, 40, 3, 1).await;

        engine.smart_sync().await;
        let first_local = engine.store.user_stats().await.unwrap();
        let first_server = server.stats();

        engine.smart_sync().await;
        assert_eq!(engine.store.user_stats().await.unwrap(), first_local);
        assert_eq!(server.stats(), first_server);
    }

    #[tokio::test]
    async fn two_devices_converge() {
        let server = FakeServer::new();
        let a = SyncEngine::new(server.clone(), LocalStore::open_in_memory().await.unwrap(), "dev-1", "local");
        let b = SyncEngine::new(server.clone(), LocalStore::open_in_memory().await.unwrap(), "dev-1", "local");
        set_local(&a, 40, 3, 1).await;
        set_local(&b, 55, 1, 2).await;

        assert!(a.smart_sync().await.is_success());
        assert!(b.smart_sync().await.is_success());
        assert!(a.smart_sync().await.is_success());

        let a_stats = stats_to_dto(&a.store.user_stats().await.unwrap());
        let b_stats = stats_to_dto(&b.store.user_stats().await.unwrap());
        assert_eq!(a_stats, b_stats);
        assert_eq!(server.stats(), Some(a_stats.clone()));
        assert_eq!(a_stats.total_correct_answers, 55);
        assert_eq!(a_stats.longest_streak, 3);
        assert_eq!(a_stats.highest_unlocked_exam, 2);
    }
}
