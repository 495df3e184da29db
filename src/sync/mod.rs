// runtablesync/src/sync/mod.rs
pub(crate) mod logic;

use anyhow::Result;
use crate::config::AppConfig;

/// Public entry point for the sync process.
pub async fn run_sync_flow(app_config: &AppConfig) -> Result<()> {
    logic::perform_sync_orchestration(app_config).await
}
