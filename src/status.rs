use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, AsyncBufReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::registry::Registry;
use crate::stats::Stats;

/// Read-only snapshot served by the status endpoint, matching the JSON
/// shape spec'd for the status protocol.
#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    dry_run: bool,
    stats: StatsBody,
    volumes: Vec<VolumeBody>,
}

#[derive(Serialize)]
struct StatsBody {
    checks: u64,
    extensions_ok: u64,
    extensions_fail: u64,
    shrinks: u64,
    fallback_pvs: u64,
}

#[derive(Serialize)]
struct VolumeBody {
    device: String,
    mount: String,
    #[serde(rename = "use")]
    use_pct: u8,
    msg: String,
}

/// Minimal line-based request/response server: one request, one
/// response, then the connection is closed. The only recognized request
/// is a GET of any path; the body is always the JSON snapshot below. No
/// mutation request is recognized.
pub async fn run(
    port: u16,
    dry_run: bool,
    registry: Arc<Registry>,
    stats: Arc<Stats>,
    max_buffer: usize,
    cancel: CancellationToken,
) {
    if port == 0 {
        debug!("status endpoint disabled (port 0)");
        return;
    }

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(l) => l,
        Err(e) => {
            warn!(%port, error = %e, "failed to bind status endpoint");
            return;
        }
    };
    info!(%port, "status endpoint listening");

    loop {
        let accept = tokio::time::timeout(Duration::from_secs(1), listener.accept());
        tokio::select! {
            result = accept => {
                match result {
                    Ok(Ok((stream, _addr))) => {
                        let registry = registry.clone();
                        let stats = stats.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_one(stream, dry_run, &registry, &stats, max_buffer).await {
                                debug!(error = %e, "status connection error");
                            }
                        });
                    }
                    Ok(Err(e)) => warn!(error = %e, "accept failed"),
                    Err(_) => {} // poll timeout, loop back to check cancellation
                }
            }
            _ = cancel.cancelled() => {
                info!("status endpoint shutting down");
                return;
            }
        }
    }
}

async fn serve_one(
    mut stream: TcpStream,
    dry_run: bool,
    registry: &Registry,
    stats: &Stats,
    max_buffer: usize,
) -> std::io::Result<()> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    // request-line, then headers terminated by an empty line; we don't
    // need any of it beyond draining the socket up to the blank line.
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line.trim().is_empty() {
            break;
        }
    }

    let body = build_snapshot_body(dry_run, registry, stats);
    let mut payload = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
    let truncated = payload.len() > max_buffer;
    if truncated {
        payload.truncate(max_buffer.saturating_sub(3));
        payload.push_str("...");
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        payload.len(),
        payload
    );

    write_half.write_all(response.as_bytes()).await?;
    write_half.flush().await?;
    // drain any trailing bytes the client sent without blocking the
    // response write above.
    let mut discard = [0u8; 1];
    let _ = tokio::time::timeout(Duration::from_millis(10), reader.read(&mut discard)).await;
    Ok(())
}

fn build_snapshot_body(dry_run: bool, registry: &Registry, stats: &Stats) -> StatusBody {
    let snap = stats.snapshot();
    let volumes = registry
        .snapshot()
        .into_iter()
        .map(|entry| VolumeBody {
            device: entry.device,
            mount: entry.mountpoint,
            use_pct: entry.use_pct,
            msg: entry.last_msg,
        })
        .collect();

    StatusBody {
        status: "ok",
        dry_run,
        stats: StatsBody {
            checks: snap.checks_performed,
            extensions_ok: snap.extensions_succeeded,
            extensions_fail: snap.extensions_failed,
            shrinks: snap.shrinks,
            fallback_pvs: snap.fallback_pvs_added,
        },
        volumes,
    }
}
