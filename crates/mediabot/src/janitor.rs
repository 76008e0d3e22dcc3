use std::sync::Arc;
use std::time::Duration;
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use crate::correlator::RequestCorrelator;
use crate::store::{ArtifactStore, SweepReport};

/// One janitor pass: sweep stale files and drop expired pending requests
pub async fn tick(store: &ArtifactStore, correlator: &RequestCorrelator) -> SweepReport {
    let report = match store.sweep().await {
        Ok(report) => report,
        Err(e) => {
            warn!("Sweep of {} failed: {:#}", store.dir().display(), e);
            SweepReport::default()
        }
    };
    if report.deleted > 0 || report.failed > 0 {
        info!(
            "🧹 Sweep: {} scanned, {} deleted, {} failed",
            report.scanned, report.deleted, report.failed
        );
    }

    let expired = correlator.purge_expired();
    if expired > 0 {
        info!("🧹 Dropped {} expired request(s)", expired);
    }

    report
}

/// Run `tick` every `interval` for the life of the process
pub fn spawn_janitor(store: ArtifactStore, correlator: Arc<RequestCorrelator>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Janitor started: sweeping {} every {}s (TTL {}s)",
            store.dir().display(),
            interval.as_secs(),
            store.ttl().as_secs()
        );
        loop {
            tokio::time::sleep(interval).await;
            let report = tick(&store, &correlator).await;
            debug!("Janitor tick done ({} file(s) scanned)", report.scanned);
        }
    })
}
