use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

/// Compiled-in defaults, mirroring the original daemon's constant header.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 8;
pub const DEFAULT_THRESHOLD_HIGH: u8 = 80;
pub const DEFAULT_THRESHOLD_LOW: u8 = 40;
pub const DEFAULT_HISTORY_SAMPLES: usize = 12;
pub const DEFAULT_EXTEND_STEP_GB: u64 = 1;
pub const DEFAULT_DONOR_MIN_FREE_GB: u64 = 1;
pub const DEFAULT_LOCK_FILE: &str = "/var/lock/extentd.lock";
pub const DEFAULT_MAX_VOLUMES: usize = 64;
pub const DEFAULT_MAX_BUFFER: usize = 8192;
pub const DEFAULT_STATUS_PORT: u16 = 8080;
pub const DEFAULT_POST_OP_COOLDOWN_SECS: u64 = 3;
const DEFAULT_SHRINKABLE_FS: &[&str] = &["ext2", "ext3", "ext4"];

/// CLI surface, layered over an optional TOML file and the compiled
/// defaults above. This is a thin adapter: it has no behavior of its own
/// beyond producing a `Config`.
#[derive(Parser, Debug)]
#[command(name = "extentd", about = "Keeps monitored logical volumes below a capacity high-water mark")]
pub struct Cli {
    /// Path to an optional TOML config file.
    #[arg(long, env = "EXTENTD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Simulate mutating commands instead of running them.
    #[arg(long, env = "EXTENTD_DRY_RUN")]
    pub dry_run: bool,

    /// Apply mutating commands for real (overrides --dry-run / config file).
    #[arg(long, conflicts_with = "dry_run", env = "EXTENTD_APPLY")]
    pub apply: bool,

    #[arg(long, env = "EXTENTD_CHECK_INTERVAL")]
    pub check_interval: Option<u64>,

    #[arg(long, env = "EXTENTD_THRESHOLD_HIGH")]
    pub threshold_high: Option<u8>,

    #[arg(long, env = "EXTENTD_THRESHOLD_LOW")]
    pub threshold_low: Option<u8>,

    #[arg(long, env = "EXTENTD_HISTORY_SAMPLES")]
    pub history_samples: Option<usize>,

    #[arg(long, env = "EXTENTD_EXTEND_STEP_GB")]
    pub extend_step_gb: Option<u64>,

    #[arg(long, env = "EXTENTD_DONOR_MIN_FREE_GB")]
    pub donor_min_free_gb: Option<u64>,

    #[arg(long, env = "EXTENTD_FALLBACK_DEVICE")]
    pub fallback_device: Option<PathBuf>,

    #[arg(long, env = "EXTENTD_LOCK_FILE")]
    pub lock_file: Option<PathBuf>,

    /// Mountpoints to monitor; may be repeated.
    #[arg(long = "mount", env = "EXTENTD_MOUNTS", value_delimiter = ',')]
    pub mounts: Vec<String>,

    #[arg(long, env = "EXTENTD_STATUS_PORT")]
    pub status_port: Option<u16>,

    #[arg(long, env = "EXTENTD_MAX_VOLUMES")]
    pub max_volumes: Option<usize>,

    #[arg(long, env = "EXTENTD_MAX_BUFFER")]
    pub max_buffer: Option<usize>,

    /// Base directory for the writer load-generator collaborator. Only
    /// used when `--with-writer` is set; exists purely to exercise the
    /// Supervisor/Planner loop during manual testing.
    #[arg(long, env = "EXTENTD_WRITER_PATH")]
    pub writer_path: Option<PathBuf>,

    /// Enables the writer collaborator.
    #[arg(long, env = "EXTENTD_WITH_WRITER")]
    pub with_writer: bool,
}

/// On-disk shape of the optional TOML config file. Every field is
/// optional: file values fill gaps between compiled defaults and CLI
/// overrides, they never silently override a flag the operator gave.
#[derive(Deserialize, Debug, Default)]
pub struct FileConfig {
    pub dry_run: Option<bool>,
    pub check_interval: Option<u64>,
    pub threshold_high: Option<u8>,
    pub threshold_low: Option<u8>,
    pub history_samples: Option<usize>,
    pub extend_step_gb: Option<u64>,
    pub donor_min_free_gb: Option<u64>,
    pub fallback_device: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
    pub mounts: Option<Vec<String>>,
    pub shrinkable_fs: Option<Vec<String>>,
    pub status_port: Option<u16>,
    pub max_volumes: Option<usize>,
    pub max_buffer: Option<usize>,
}

/// The fully resolved configuration the rest of the daemon is built
/// against. Never mutated once constructed.
#[derive(Debug, Clone)]
pub struct Config {
    pub dry_run: bool,
    pub check_interval_secs: u64,
    pub threshold_high: u8,
    pub threshold_low: u8,
    pub history_samples: usize,
    pub extend_step_bytes: u64,
    pub donor_min_free_bytes: u64,
    pub fallback_device: Option<PathBuf>,
    pub lock_file: PathBuf,
    pub mounts: Vec<String>,
    pub shrinkable_fs: Vec<String>,
    pub status_port: u16,
    pub max_volumes: usize,
    pub max_buffer: usize,
    pub post_op_cooldown_secs: u64,
    pub writer_path: Option<PathBuf>,
    pub with_writer: bool,
}

const GIB: u64 = 1024 * 1024 * 1024;

impl Config {
    /// Loads the config file (if any), then layers the CLI over it, then
    /// falls back to compiled defaults for anything still unset.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                toml::from_str(&text)?
            }
            None => FileConfig::default(),
        };

        let dry_run = if cli.apply {
            false
        } else {
            cli.dry_run || file.dry_run.unwrap_or(true)
        };

        let mounts = if !cli.mounts.is_empty() {
            cli.mounts.clone()
        } else {
            file.mounts.unwrap_or_default()
        };

        let shrinkable_fs = file
            .shrinkable_fs
            .unwrap_or_else(|| DEFAULT_SHRINKABLE_FS.iter().map(|s| s.to_string()).collect());

        let extend_step_gb = cli
            .extend_step_gb
            .or(file.extend_step_gb)
            .unwrap_or(DEFAULT_EXTEND_STEP_GB);
        let donor_min_free_gb = cli
            .donor_min_free_gb
            .or(file.donor_min_free_gb)
            .unwrap_or(DEFAULT_DONOR_MIN_FREE_GB);

        Ok(Config {
            dry_run,
            check_interval_secs: cli
                .check_interval
                .or(file.check_interval)
                .unwrap_or(DEFAULT_CHECK_INTERVAL_SECS),
            threshold_high: cli
                .threshold_high
                .or(file.threshold_high)
                .unwrap_or(DEFAULT_THRESHOLD_HIGH),
            threshold_low: cli
                .threshold_low
                .or(file.threshold_low)
                .unwrap_or(DEFAULT_THRESHOLD_LOW),
            history_samples: cli
                .history_samples
                .or(file.history_samples)
                .unwrap_or(DEFAULT_HISTORY_SAMPLES),
            extend_step_bytes: extend_step_gb * GIB,
            donor_min_free_bytes: donor_min_free_gb * GIB,
            fallback_device: cli.fallback_device.clone().or(file.fallback_device),
            lock_file: cli
                .lock_file
                .clone()
                .or(file.lock_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCK_FILE)),
            mounts,
            shrinkable_fs,
            status_port: cli
                .status_port
                .or(file.status_port)
                .unwrap_or(DEFAULT_STATUS_PORT),
            max_volumes: cli
                .max_volumes
                .or(file.max_volumes)
                .unwrap_or(DEFAULT_MAX_VOLUMES),
            max_buffer: cli
                .max_buffer
                .or(file.max_buffer)
                .unwrap_or(DEFAULT_MAX_BUFFER),
            post_op_cooldown_secs: DEFAULT_POST_OP_COOLDOWN_SECS,
            writer_path: cli.writer_path.clone(),
            with_writer: cli.with_writer,
        })
    }
}
