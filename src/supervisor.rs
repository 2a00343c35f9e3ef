use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::classify::{classify, Classification};
use crate::config::Config;
use crate::executor::Executor;
use crate::probe::StorageProbe;
use crate::queue::RequestQueue;
use crate::registry::Registry;
use crate::stats::Stats;

/// Periodic sampling loop: scans mounts, records samples for every
/// watched mountpoint, classifies each, and enqueues hungry devices.
/// Mounts outside the configured watch-set are ignored entirely.
pub async fn run(
    config: Arc<Config>,
    executor: Arc<Executor>,
    registry: Arc<Registry>,
    stats: Arc<Stats>,
    queue: Arc<RequestQueue>,
    cancel: CancellationToken,
) {
    let probe = StorageProbe::new(&executor);
    let interval = Duration::from_secs(config.check_interval_secs);

    loop {
        tick(&config, &probe, &registry, &stats, &queue).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {
                info!("supervisor shutting down");
                return;
            }
        }
    }
}

async fn tick(
    config: &Config,
    probe: &StorageProbe<'_>,
    registry: &Registry,
    stats: &Stats,
    queue: &RequestQueue,
) {
    let samples = probe.scan_mounts().await;

    for sample in samples {
        if !config.mounts.iter().any(|m| m == &sample.mountpoint) {
            continue;
        }

        if !registry.get_or_create(&sample.device, &sample.mountpoint) {
            debug!(device = %sample.device, "registry full, dropping sample");
            continue;
        }

        registry.record_sample(&sample.device, &sample.mountpoint, sample.use_pct, "monitored");
        let entry = match registry.get(&sample.device) {
            Some(e) => e,
            None => continue,
        };

        match classify(&entry, config.threshold_high, config.threshold_low) {
            Classification::Hungry => {
                registry.set_last_msg(&sample.device, "queued for extension");
                queue.enqueue(&sample.device);
            }
            Classification::OverProvisioned => {
                registry.set_last_msg(&sample.device, "over-provisioned");
            }
            Classification::Ok => {}
        }
    }

    stats.record_check();
}
