use crate::di::{DeltaTool, DiffOutcome};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Builds xz-compressed binary deltas with `bsdiff`
#[derive(Debug, Clone)]
pub struct BsdiffTool {
    program: PathBuf,
}

impl BsdiffTool {
    pub fn new() -> Self {
        Self::with_program("bsdiff")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for BsdiffTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeltaTool for BsdiffTool {
    fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    async fn diff(&self, old: &Path, new: &Path, out: &Path, timeout: Duration) -> DiffOutcome {
        let child = Command::new(&self.program)
            .arg(old)
            .arg(new)
            .arg(out)
            .arg("xz")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return DiffOutcome::Failed(format!("failed to start bsdiff: {}", e)),
        };

        // Dropping the wait future on timeout kills the child
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Err(_) => DiffOutcome::TimedOut,
            Ok(Err(e)) => DiffOutcome::Failed(e.to_string()),
            Ok(Ok(output)) if output.status.success() => DiffOutcome::Built,
            Ok(Ok(output)) => DiffOutcome::Failed(format!(
                "bsdiff exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
        }
    }
}
