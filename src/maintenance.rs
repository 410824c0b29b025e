use std::time::Duration;

use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info};

use crate::{
    domain::{Clock, LedgerStore},
    engine::LedgerEngine,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub evicted: usize,
    pub entered_free_play: usize,
}

/// One eviction + free play sweep. Failures are logged and reported as zero.
pub async fn run_maintenance<S, C>(engine: &LedgerEngine<S, C>) -> MaintenanceReport
where
    S: LedgerStore + 'static,
    C: Clock,
{
    let now = engine.now();
    let mut report = MaintenanceReport::default();

    match engine.evict_expired_outcomes(now).await {
        Ok(evicted) => report.evicted = evicted,
        Err(e) => error!(error = %e, "outcome eviction failed"),
    }
    match engine.sweep_free_play(now).await {
        Ok(entered) => report.entered_free_play = entered,
        Err(e) => error!(error = %e, "free play sweep failed"),
    }
    report
}

/// Runs maintenance immediately and then every `interval` until the handle is aborted.
pub fn spawn_maintenance<S, C>(engine: LedgerEngine<S, C>, interval: Duration) -> JoinHandle<()>
where
    S: LedgerStore + 'static,
    C: Clock + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = run_maintenance(&engine).await;
            info!(
                evicted = report.evicted,
                entered_free_play = report.entered_free_play,
                "maintenance pass complete"
            );
        }
    })
}
