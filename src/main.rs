use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use extentd::config::{Cli, Config};
use extentd::executor::Executor;
use extentd::queue::RequestQueue;
use extentd::registry::Registry;
use extentd::stats::Stats;
use extentd::{planner, status, supervisor, writer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load(&cli)?);

    info!(
        dry_run = config.dry_run,
        check_interval = config.check_interval_secs,
        mounts = ?config.mounts,
        "extentd starting"
    );

    let executor = Arc::new(Executor::new(config.dry_run));
    let registry = Arc::new(Registry::new(
        config.history_samples,
        config.max_volumes,
        config.max_buffer,
    ));
    let stats = Arc::new(Stats::new());
    let queue = Arc::new(RequestQueue::new());
    let cancel = CancellationToken::new();

    let mut handles = Vec::new();

    handles.push(tokio::spawn(supervisor::run(
        config.clone(),
        executor.clone(),
        registry.clone(),
        stats.clone(),
        queue.clone(),
        cancel.clone(),
    )));

    handles.push(tokio::spawn(planner::run(
        config.clone(),
        executor.clone(),
        registry.clone(),
        stats.clone(),
        queue.clone(),
        cancel.clone(),
    )));

    if config.status_port != 0 {
        handles.push(tokio::spawn(status::run(
            config.status_port,
            config.dry_run,
            registry.clone(),
            stats.clone(),
            config.max_buffer,
            cancel.clone(),
        )));
    }

    if config.with_writer {
        if let Some(path) = config.writer_path.clone() {
            handles.push(tokio::spawn(writer::run(
                path,
                4096,
                std::time::Duration::from_millis(200),
                cancel.clone(),
            )));
        } else {
            warn!("--with-writer set without --writer-path, not starting writer");
        }
    }

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sighup.recv() => info!("received SIGHUP"),
    }

    info!("shutting down, waiting for tasks to finish their current iteration");
    cancel.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "task join failed during shutdown");
        }
    }

    info!("extentd stopped");
    Ok(())
}
