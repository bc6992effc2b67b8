//! Endpoints the sync engine depends on.

use async_trait::async_trait;
use tracing::debug;

use crate::client::{encode_segment, ApiCall, RemoteGateway};
use crate::dto::{ApiResponse, HealthResponse, SyncDownloadResponse, SyncRequest, SyncResponse, UserStatsDto};
use crate::{GatewayError, GatewayResult};

/// Backend operations used by synchronization.
///
/// Implemented by [`RemoteGateway`]; tests substitute an in-process fake.
#[async_trait]
pub trait SyncApi: Send + Sync {
    /// `GET /api/health`.
    async fn health(&self) -> GatewayResult<HealthResponse>;

    /// `POST /api/sync/upload`.
    async fn upload(&self, request: &SyncRequest) -> GatewayResult<SyncResponse>;

    /// `GET /api/sync/download/{deviceId}`.
    async fn download(&self, device_id: &str) -> GatewayResult<SyncDownloadResponse>;

    /// `GET /api/stats/user/{deviceId}`. `None` when the server has no
    /// stats for the device.
    async fn get_user_stats(&self, device_id: &str) -> GatewayResult<Option<UserStatsDto>>;

    /// `POST /api/stats/update?deviceId=...`.
    async fn update_user_stats(&self, device_id: &str, stats: &UserStatsDto) -> GatewayResult<()>;

    /// Health check succeeded and reported `status == "ok"`.
    async fn is_healthy(&self) -> bool {
        match self.health().await {
            Ok(health) => health.is_ok(),
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }
}

#[async_trait]
impl SyncApi for RemoteGateway {
    async fn health(&self) -> GatewayResult<HealthResponse> {
        self.execute(&ApiCall::get("api/health")).await
    }

    async fn upload(&self, request: &SyncRequest) -> GatewayResult<SyncResponse> {
        let call = ApiCall::post("api/sync/upload", request)?;
        self.execute(&call).await
    }

    async fn download(&self, device_id: &str) -> GatewayResult<SyncDownloadResponse> {
        let call = ApiCall::get(format!("api/sync/download/{}", encode_segment(device_id)));
        self.execute(&call).await
    }

    async fn get_user_stats(&self, device_id: &str) -> GatewayResult<Option<UserStatsDto>> {
        let call = ApiCall::get(format!("api/stats/user/{}", encode_segment(device_id)));
        match self.execute::<ApiResponse<UserStatsDto>>(&call).await {
            Ok(response) if response.success => Ok(response.data),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update_user_stats(&self, device_id: &str, stats: &UserStatsDto) -> GatewayResult<()> {
        let call = ApiCall::post("api/stats/update", stats)?.query("deviceId", device_id);
        let response: ApiResponse<bool> = self.execute(&call).await?;
        if response.success {
            Ok(())
        } else {
            Err(GatewayError::Rejected(response.failure_reason()))
        }
    }
}
