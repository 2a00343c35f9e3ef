use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::ExtendError;
use crate::executor::{Executor, Kind};
use crate::probe::{can_shrink_filesystem, StorageProbe};
use crate::registry::Registry;
use crate::stats::Stats;
use crate::lock::{ExtenderLock, LockAttempt};

/// Runs the full remediation plan for one device, as drained from the
/// queue. Acquires the host-wide lock before any mutation and releases
/// it on every return path, including early returns on failure.
pub async fn handle_device(
    device: &str,
    config: &Config,
    executor: &Executor,
    registry: &Registry,
    stats: &Stats,
) {
    let lock = match ExtenderLock::try_acquire(&config.lock_file) {
        LockAttempt::Acquired(l) => l,
        LockAttempt::Busy => {
            warn!(%device, "lock busy, abandoning this attempt");
            return;
        }
        LockAttempt::Error(e) => {
            warn!(%device, error = %e, "failed to open lock file");
            return;
        }
    };

    run_plan(device, config, executor, registry, stats).await;

    drop(lock);
    tokio::time::sleep(Duration::from_secs(config.post_op_cooldown_secs)).await;
}

async fn run_plan(
    device: &str,
    config: &Config,
    executor: &Executor,
    registry: &Registry,
    stats: &Stats,
) {
    let probe = StorageProbe::new(executor);

    let (vg, lv) = match probe.resolve_device(device).await {
        Ok(pair) => pair,
        Err(ExtendError::Resolution) | Err(_) => {
            registry.set_last_msg(device, "extension failed (resolution)");
            return;
        }
    };

    let fs_type = probe.fs_type(&vg, &lv).await;
    registry.set_resolution(
        device,
        &vg,
        &lv,
        if fs_type.is_empty() { None } else { Some(fs_type.as_str()) },
    );

    let needed = config.extend_step_bytes as i64;
    let mut have = probe.vg_free_bytes(&vg).await;

    if have < needed {
        have = donor_shrink_phase(device, &vg, &lv, needed - have.max(0), config, executor, &probe, registry, stats).await;
    }

    if have < needed {
        have = fallback_annex_phase(&vg, config, executor, &probe, stats).await.unwrap_or(have);
    }

    if have >= needed {
        extend_phase(device, &vg, &lv, config, executor, registry, stats).await;
    } else {
        // Step 5 (extend_phase) was never reached, so this does not
        // touch extensions_succeeded/extensions_failed — that pair only
        // counts attempts that actually got to step 5.
        registry.set_last_msg(device, "extension failed (insufficient space)");
    }
}

/// Shrinks eligible sibling LVs in `vg` until accumulated freed space
/// covers the shortfall, or no more siblings remain. Returns the
/// re-queried VG free space after the phase.
async fn donor_shrink_phase(
    target_device: &str,
    vg: &str,
    target_lv: &str,
    shortfall: i64,
    config: &Config,
    executor: &Executor,
    probe: &StorageProbe<'_>,
    registry: &Registry,
    stats: &Stats,
) -> i64 {
    let siblings = probe.list_lvs(vg).await;
    let mut freed: i64 = 0;

    for sibling in siblings {
        if sibling == target_lv {
            continue;
        }

        let sibling_device = format!("/dev/{vg}/{sibling}");
        if sibling_device == target_device {
            continue;
        }

        // A sibling currently classified HUNGRY in the registry must
        // never be raided for extents meant to relieve somebody else.
        if let Some(entry) = registry.get(&sibling_device) {
            if entry.use_pct >= config.threshold_high {
                continue;
            }
        }

        let fs_type = probe.fs_type(vg, &sibling).await;
        if !can_shrink_filesystem(&fs_type, &config.shrinkable_fs) {
            continue;
        }

        let free = probe.fs_free_bytes(vg, &sibling).await;
        if free < config.donor_min_free_bytes as i64 {
            continue;
        }

        let step_gb = config.extend_step_bytes / (1024 * 1024 * 1024);
        let cmd = format!("sudo lvreduce -r -L -{step_gb}G /dev/{vg}/{sibling} -y");
        let out = executor
            .run(Kind::Mutate, &cmd, &format!("shrink donor {vg}/{sibling}"))
            .await;

        if out.success() {
            registry.record_shrink(&sibling_device);
            stats.record_shrink();
            freed += config.extend_step_bytes as i64;
            info!(donor = %sibling_device, "shrunk donor volume");
            if freed >= shortfall {
                break;
            }
        } else {
            warn!(donor = %sibling_device, exit_code = out.exit_code, "donor shrink failed");
        }
    }

    probe.vg_free_bytes(vg).await
}

/// Annexes the configured fallback device into `vg` if it exists and is
/// not already a physical volume. Any non-zero exit aborts the phase.
async fn fallback_annex_phase(
    vg: &str,
    config: &Config,
    executor: &Executor,
    probe: &StorageProbe<'_>,
    stats: &Stats,
) -> Option<i64> {
    let fallback = config.fallback_device.as_ref()?;
    if !Path::new(fallback).exists() {
        return None;
    }
    let fallback_str = fallback.to_string_lossy();
    if probe.is_physical_volume(&fallback_str).await {
        return None;
    }

    let init_cmd = format!("sudo pvcreate -y {fallback_str}");
    let init = executor
        .run(Kind::Mutate, &init_cmd, "initialize fallback PV")
        .await;
    if !init.success() {
        warn!(device = %fallback_str, exit_code = init.exit_code, "pvcreate failed");
        return None;
    }

    let extend_cmd = format!("sudo vgextend {vg} {fallback_str}");
    let extend = executor
        .run(Kind::Mutate, &extend_cmd, "extend vg with fallback device")
        .await;
    if !extend.success() {
        warn!(device = %fallback_str, exit_code = extend.exit_code, "vgextend failed");
        return None;
    }

    stats.record_fallback_pv();
    info!(device = %fallback_str, %vg, "annexed fallback device into vg");
    Some(probe.vg_free_bytes(vg).await)
}

async fn extend_phase(
    device: &str,
    vg: &str,
    lv: &str,
    config: &Config,
    executor: &Executor,
    registry: &Registry,
    stats: &Stats,
) {
    let step_gb = config.extend_step_bytes / (1024 * 1024 * 1024);
    let cmd = format!("sudo lvextend -r -L +{step_gb}G /dev/{vg}/{lv}");
    let out = executor
        .run(Kind::Mutate, &cmd, &format!("extend {vg}/{lv}"))
        .await;

    if out.success() {
        registry.record_extension(device);
        registry.set_last_msg(device, "extension succeeded");
        stats.record_extension_success();
        info!(%device, "extension succeeded");
    } else {
        registry.set_last_msg(device, &format!("extension failed (exit {})", out.exit_code));
        stats.record_extension_failure();
        warn!(%device, exit_code = out.exit_code, "extension failed");
    }
}

/// Owns the planner task: drains the queue until cancelled.
pub async fn run(
    config: Arc<Config>,
    executor: Arc<Executor>,
    registry: Arc<Registry>,
    stats: Arc<Stats>,
    queue: Arc<crate::queue::RequestQueue>,
    cancel: tokio_util::sync::CancellationToken,
) {
    let poll_interval = Duration::from_secs(1);
    loop {
        if cancel.is_cancelled() {
            info!("planner shutting down");
            return;
        }

        match queue.dequeue(poll_interval).await {
            crate::queue::Dequeued::Device(device) => {
                handle_device(&device, &config, &executor, &registry, &stats).await;
            }
            crate::queue::Dequeued::TimedOut => {}
        }
    }
}
