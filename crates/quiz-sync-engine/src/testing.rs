//! In-process backend for sync tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use quiz_remote_gateway::{
    GatewayError, GatewayResult, HealthResponse, SyncApi, SyncData, SyncDownloadData, SyncDownloadResponse,
    SyncRequest, SyncResponse, UserStatsDto,
};

#[derive(Default)]
struct State {
    health_status: String,
    offline: bool,
    health_checks: usize,
    reject_uploads: bool,
    has_download_data: bool,
    stats: Option<UserStatsDto>,
    uploads: Vec<SyncRequest>,
}

/// Keeps one stats record, like the real server does per device.
pub(crate) struct FakeServer {
    state: Mutex<State>,
}

impl FakeServer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                health_status: "ok".to_string(),
                ..Default::default()
            }),
        })
    }

    pub(crate) fn set_health_status(&self, status: &str) {
        self.state.lock().health_status = status.to_string();
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    pub(crate) fn set_reject_uploads(&self, reject: bool) {
        self.state.lock().reject_uploads = reject;
    }

    pub(crate) fn set_stats(&self, stats: Option<UserStatsDto>) {
        let mut state = self.state.lock();
        state.has_download_data = stats.is_some();
        state.stats = stats;
    }

    /// Download returns a data block with no stats in it.
    pub(crate) fn set_download_without_stats(&self) {
        let mut state = self.state.lock();
        state.has_download_data = true;
        state.stats = None;
    }

    pub(crate) fn stats(&self) -> Option<UserStatsDto> {
        self.state.lock().stats.clone()
    }

    pub(crate) fn upload_count(&self) -> usize {
        self.state.lock().uploads.len()
    }

    pub(crate) fn last_upload(&self) -> Option<SyncRequest> {
        self.state.lock().uploads.last().cloned()
    }

    pub(crate) fn health_check_count(&self) -> usize {
        self.state.lock().health_checks
    }

    fn check_online(&self) -> GatewayResult<()> {
        if self.state.lock().offline {
            Err(GatewayError::ConnectionRefused("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SyncApi for FakeServer {
    async fn health(&self) -> GatewayResult<HealthResponse> {
        self.state.lock().health_checks += 1;
        self.check_online()?;
        Ok(HealthResponse {
            status: self.state.lock().health_status.clone(),
            timestamp: None,
            uptime: 1.0,
            memory: None,
        })
    }

    async fn upload(&self, request: &SyncRequest) -> GatewayResult<SyncResponse> {
        self.check_online()?;
        let mut state = self.state.lock();
        state.uploads.push(request.clone());
        if state.reject_uploads {
            return Ok(SyncResponse {
                success: false,
                message: "Device ID is required".to_string(),
                data: None,
            });
        }
        if let Some(stats) = &request.user_stats {
            state.stats = Some(stats.clone());
            state.has_download_data = true;
        }
        Ok(SyncResponse {
            success: true,
            message: "Sync completed".to_string(),
            data: Some(SyncData {
                stats_updated: request.user_stats.is_some(),
                sessions_created: request.quiz_sessions.as_ref().map(|s| s.len() as i64).unwrap_or(0),
            }),
        })
    }

    async fn download(&self, _device_id: &str) -> GatewayResult<SyncDownloadResponse> {
        self.check_online()?;
        let state = self.state.lock();
        let data = state.has_download_data.then(|| SyncDownloadData {
            user_stats: state.stats.clone(),
            quiz_sessions: Some(Vec::new()),
            server_timestamp: 0,
        });
        Ok(SyncDownloadResponse { success: true, data })
    }

    async fn get_user_stats(&self, _device_id: &str) -> GatewayResult<Option<UserStatsDto>> {
        self.check_online()?;
        Ok(self.state.lock().stats.clone())
    }

    async fn update_user_stats(&self, _device_id: &str, stats: &UserStatsDto) -> GatewayResult<()> {
        self.check_online()?;
        let mut state = self.state.lock();
        state.stats = Some(stats.clone());
        state.has_download_data = true;
        Ok(())
    }
}
