use tracing::{debug, info, warn};

/// Whether a command only observes state or changes it. Only `Mutate`
/// commands are suppressed in simulate mode; `Read` commands always run,
/// even under dry-run, because the rest of the core needs real state to
/// classify and plan against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Read,
    Mutate,
}

/// Result of running one external command: its exit code and the first
/// line of captured stdout (callers that need more than one line are not
/// expected — every probe command is designed to emit its answer on line
/// one).
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub first_line: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn simulated() -> Self {
        CommandOutput {
            exit_code: 0,
            first_line: String::new(),
        }
    }
}

/// Abstracts running an external command in either simulate or apply
/// mode. This is the single place dry-run is checked; nothing downstream
/// needs to know which mode is active.
#[derive(Debug, Clone)]
pub struct Executor {
    dry_run: bool,
}

impl Executor {
    pub fn new(dry_run: bool) -> Self {
        Executor { dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Runs `cmd_string` through `/bin/sh -c`. In simulate mode, `Mutate`
    /// commands are not spawned at all — the description is logged and a
    /// successful no-op result is returned. `Read` commands always run.
    pub async fn run(&self, kind: Kind, cmd_string: &str, description: &str) -> CommandOutput {
        if self.dry_run && kind == Kind::Mutate {
            info!(command = %cmd_string, %description, "simulate");
            return CommandOutput::simulated();
        }

        debug!(command = %cmd_string, %description, "executing");
        match tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(cmd_string)
            .output()
            .await
        {
            Ok(output) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let first_line = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if exit_code != 0 {
                    warn!(command = %cmd_string, exit_code, "command failed");
                }
                CommandOutput {
                    exit_code,
                    first_line,
                }
            }
            Err(e) => {
                warn!(command = %cmd_string, error = %e, "failed to spawn command");
                CommandOutput {
                    exit_code: -1,
                    first_line: String::new(),
                }
            }
        }
    }

    /// Like `run`, but returns every output line instead of just the
    /// first. Only the mount-scan probe needs this — every other Storage
    /// Probe query expects a single-line answer and uses `run`. Always a
    /// `Read`: no caller needs a multi-line mutating command.
    pub async fn run_lines(&self, cmd_string: &str, description: &str) -> Vec<String> {
        debug!(command = %cmd_string, %description, "executing (multiline)");
        match tokio::process::Command::new("/bin/sh")
            .arg("-c")
            .arg(cmd_string)
            .output()
            .await
        {
            Ok(output) => String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(|l| l.to_string())
                .collect(),
            Err(e) => {
                warn!(command = %cmd_string, error = %e, "failed to spawn command");
                Vec::new()
            }
        }
    }
}
