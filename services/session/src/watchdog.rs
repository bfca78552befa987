//! Process watchdog for the upstream terminal.
//!
//! All operations block (process table walk, script launch, kill) and
//! must be called from a blocking worker, never from the timeline.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use serde::Serialize;
use sysinfo::{Pid, System};
use tracing::{debug, error, info, warn};

use crate::config::WatchdogConfig;
use crate::error::SessionError;

/// Number of terminal processes found, with "more than one" kept distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessCount {
    Absent,
    Single,
    Multiple,
}

/// Result of one process table walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessScan {
    /// Matching pids, ascending
    pub pids: Vec<u32>,
}

impl ProcessScan {
    pub fn new(mut pids: Vec<u32>) -> Self {
        pids.sort_unstable();
        pids.dedup();
        Self { pids }
    }

    pub fn count(&self) -> ProcessCount {
        match self.pids.len() {
            0 => ProcessCount::Absent,
            1 => ProcessCount::Single,
            _ => ProcessCount::Multiple,
        }
    }
}

/// Blocking control over the terminal process.
pub trait ProcessControl: Send + Sync + 'static {
    /// Enumerate processes matching the terminal's name.
    fn scan(&self) -> Result<ProcessScan, SessionError>;

    /// Start the terminal with the stored credentials.
    fn launch(&self) -> Result<(), SessionError>;

    /// Forcefully terminate every pid in `pids`.
    fn kill(&self, pids: &[u32]) -> Result<(), SessionError>;
}

/// [`ProcessControl`] backed by the OS process table.
#[derive(Debug, Clone)]
pub struct SystemProcessControl {
    config: WatchdogConfig,
    working_dir: PathBuf,
}

impl SystemProcessControl {
    pub fn new(config: WatchdogConfig) -> Result<Self, SessionError> {
        let working_dir = std::env::current_dir()
            .map_err(|e| SessionError::ProcessControl(format!("cannot resolve working dir: {e}")))?;
        Ok(Self {
            config,
            working_dir,
        })
    }

    fn matches(&self, name: &str) -> bool {
        let name = name.strip_suffix(".exe").unwrap_or(name);
        name == self.config.process_name
    }

    fn launch_command(&self) -> Command {
        if cfg!(windows) {
            let script = self.working_dir.join(&self.config.windows_script);
            let mut cmd = Command::new("cmd");
            cmd.arg("/C")
                .arg(script)
                .arg(&self.config.username)
                .arg(&self.config.password);
            cmd
        } else {
            let script = self.working_dir.join(&self.config.unix_script);
            let mut cmd = Command::new("bash");
            cmd.arg(script)
                .arg("-inline")
                .arg(&self.config.username)
                .arg(&self.config.password);
            cmd
        }
    }
}

impl ProcessControl for SystemProcessControl {
    fn scan(&self) -> Result<ProcessScan, SessionError> {
        let mut system = System::new();
        system.refresh_processes();
        let pids = system
            .processes()
            .iter()
            .filter(|(_, process)| self.matches(process.name()))
            .map(|(pid, _)| pid.as_u32())
            .collect();
        let scan = ProcessScan::new(pids);
        debug!(process = %self.config.process_name, pids = ?scan.pids, "Process scan");
        Ok(scan)
    }

    fn launch(&self) -> Result<(), SessionError> {
        let mut cmd = self.launch_command();
        cmd.current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| SessionError::ProcessControl(format!("launch failed: {e}")))?;
        info!(pid = child.id(), "Terminal start script launched");

        // Reap the script so it does not linger as a zombie.
        std::thread::spawn(move || match child.wait() {
            Ok(status) => info!(%status, "Terminal start script exited"),
            Err(e) => warn!(error = %e, "Failed to wait on terminal start script"),
        });
        Ok(())
    }

    fn kill(&self, pids: &[u32]) -> Result<(), SessionError> {
        if pids.is_empty() {
            return Ok(());
        }
        let mut system = System::new();
        system.refresh_processes();

        let mut failed = Vec::new();
        for &pid in pids {
            match system.process(Pid::from_u32(pid)) {
                Some(process) => {
                    if process.kill() {
                        info!(pid, "Terminal process killed");
                    } else {
                        error!(pid, "Failed to kill terminal process");
                        failed.push(pid);
                    }
                }
                None => debug!(pid, "Process already gone"),
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(SessionError::ProcessControl(format!(
                "could not kill pids {failed:?}"
            )))
        }
    }
}
