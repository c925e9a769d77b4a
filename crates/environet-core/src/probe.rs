//! Invocation of external diagnostic tools.
//!
//! A [`ProbeCommand`] describes what to measure; a [`ProbeRunner`] turns it
//! into `(exit status, stdout)`. The parsers never see a process, only the
//! captured [`ProbeOutput`], so tests drive them with canned text.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::error::{ProbeError, ProbeKind};
use crate::record::Direction;

// ---------------------------------------------------------------------------
// Command specification
// ---------------------------------------------------------------------------

/// One external diagnostic invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeCommand {
    /// `iwlist <interface> scan`, optionally through `sudo -n`.
    Scan { interface: String, use_sudo: bool },
    /// `iwconfig <interface>`.
    LinkStatus { interface: String },
    /// `ping -c <count> -I <interface> <target>`.
    Ping {
        interface: String,
        target: String,
        count: u32,
    },
    /// `iperf3 -c <server> -p <port> -t <duration> -J`, with `-R` for download.
    Throughput {
        server: String,
        port: u16,
        duration_secs: u32,
        direction: Direction,
    },
}

impl ProbeCommand {
    pub fn kind(&self) -> ProbeKind {
        match self {
            Self::Scan { .. } => ProbeKind::Scan,
            Self::LinkStatus { .. } => ProbeKind::LinkStatus,
            Self::Ping { .. } => ProbeKind::Latency,
            Self::Throughput { .. } => ProbeKind::Throughput,
        }
    }

    /// Host, server, or interface this probe is aimed at.
    pub fn target(&self) -> &str {
        match self {
            Self::Scan { interface, .. } | Self::LinkStatus { interface } => interface,
            Self::Ping { target, .. } => target,
            Self::Throughput { server, .. } => server,
        }
    }

    /// Program and argument vector.
    pub fn argv(&self) -> (String, Vec<String>) {
        match self {
            Self::Scan {
                interface,
                use_sudo,
            } => {
                let scan = vec![interface.clone(), "scan".to_string()];
                if *use_sudo {
                    let mut args = vec!["-n".to_string(), "iwlist".to_string()];
                    args.extend(scan);
                    ("sudo".to_string(), args)
                } else {
                    ("iwlist".to_string(), scan)
                }
            }
            Self::LinkStatus { interface } => ("iwconfig".to_string(), vec![interface.clone()]),
            Self::Ping {
                interface,
                target,
                count,
            } => (
                "ping".to_string(),
                vec![
                    "-c".to_string(),
                    count.to_string(),
                    "-I".to_string(),
                    interface.clone(),
                    target.clone(),
                ],
            ),
            Self::Throughput {
                server,
                port,
                duration_secs,
                direction,
            } => {
                let mut args = vec![
                    "-c".to_string(),
                    server.clone(),
                    "-p".to_string(),
                    port.to_string(),
                    "-t".to_string(),
                    duration_secs.to_string(),
                    "-J".to_string(),
                ];
                // Reverse mode makes the server send, i.e. we download.
                if *direction == Direction::Download {
                    args.push("-R".to_string());
                }
                ("iperf3".to_string(), args)
            }
        }
    }

    /// How long the tool is expected to run when healthy.
    ///
    /// Added to the configured grace period to form the probe's timeout, so a
    /// ten-second iperf3 run is not cut off by a five-second budget.
    pub fn expected_duration(&self) -> Duration {
        match self {
            Self::Scan { .. } => Duration::from_secs(5),
            Self::LinkStatus { .. } => Duration::ZERO,
            // ping sends one echo request per second.
            Self::Ping { count, .. } => Duration::from_secs(u64::from(*count)),
            Self::Throughput { duration_secs, .. } => {
                Duration::from_secs(u64::from(*duration_secs))
            }
        }
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        let (program, args) = self.argv();
        if args.is_empty() {
            program
        } else {
            format!("{program} {}", args.join(" "))
        }
    }
}

// ---------------------------------------------------------------------------
// Captured output
// ---------------------------------------------------------------------------

/// Exit status of a finished probe. `None` means killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStatus(pub Option<i32>);

impl ProbeStatus {
    pub const SUCCESS: ProbeStatus = ProbeStatus(Some(0));

    pub fn exited(code: i32) -> Self {
        Self(Some(code))
    }

    pub fn success(&self) -> bool {
        self.0 == Some(0)
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, "exit status {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Everything a parser needs from a finished tool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutput {
    pub status: ProbeStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProbeOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::SUCCESS,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::exited(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Override stdout (some tools print results even when exiting non-zero).
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    /// Best description of why the run failed: stderr, then stdout, then the status.
    pub fn failure_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        self.status.to_string()
    }
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

/// Executes probe commands. Implementations must not apply their own
/// timeout; callers wrap them with [`run_with_timeout`].
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run(&self, command: &ProbeCommand) -> Result<ProbeOutput, ProbeError>;
}

/// Runs the real system tools as child processes.
#[derive(Debug, Default, Clone)]
pub struct CommandProbeRunner;

impl CommandProbeRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProbeRunner for CommandProbeRunner {
    async fn run(&self, command: &ProbeCommand) -> Result<ProbeOutput, ProbeError> {
        let (program, args) = command.argv();
        debug!("running `{}`", command.display());
        spawn_probe(&program, &args)
            .await
            .map_err(|message| ProbeError::invocation(command.kind(), command.target(), message))
    }
}

/// Run one tool to completion, capturing its output. A spawn failure is
/// returned as the message for an invocation error.
async fn spawn_probe(program: &str, args: &[String]) -> Result<ProbeOutput, String> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // A timed-out probe is dropped; make sure the child goes with it.
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("failed to run `{program}`: {e}"))?;

    Ok(ProbeOutput {
        status: ProbeStatus(output.status.code()),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run `command` on `runner`, giving up after `grace` plus the command's
/// expected duration. Expiry becomes a `Timeout` probe error.
pub async fn run_with_timeout(
    runner: &dyn ProbeRunner,
    command: &ProbeCommand,
    grace: Duration,
) -> Result<ProbeOutput, ProbeError> {
    let budget = command.expected_duration() + grace;
    match tokio::time::timeout(budget, runner.run(command)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::timeout(
            command.kind(),
            command.target(),
            format!("`{}` did not finish within {:.1}s", command.display(), budget.as_secs_f64()),
        )),
    }
}
