//! Process-wide services, built once at startup.

use std::sync::Arc;

use quiz_config_and_utils::{Config, Paths, ProgressionRules};
use quiz_database::LocalStore;
use quiz_progression::ProgressionEngine;
use quiz_remote_gateway::{GatewayConfig, RemoteGateway};
use quiz_sync_engine::SyncEngine;
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub store: LocalStore,
    pub progression: ProgressionEngine,
    pub gateway: Arc<RemoteGateway>,
    pub sync: SyncEngine,
}

impl AppState {
    pub async fn init(config: Config, paths: Paths) -> Result<Self, Box<dyn std::error::Error>> {
        paths.ensure_dirs()?;

        let store = LocalStore::open(&paths.database_file()).await?;
        let progression = ProgressionEngine::new(store.clone(), ProgressionRules::default());
        if progression.stats().await?.daily_goal != config.daily_goal {
            progression.set_daily_goal(config.daily_goal).await?;
        }
        let gateway = Arc::new(RemoteGateway::new(GatewayConfig::from_config(&config)?)?);
        let sync = SyncEngine::new(
            gateway.clone(),
            store.clone(),
            config.device_id.clone(),
            config.user_id.clone(),
        );

        info!(
            database = %paths.database_file().display(),
            server_url = %config.server_url,
            device_id = %config.device_id,
            "Services initialized"
        );

        Ok(Self {
            config,
            store,
            progression,
            gateway,
            sync,
        })
    }
}
