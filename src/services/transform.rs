use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use crate::api::error::AppError;
use crate::services::workspace::Workspace;

/// Captured result of one transform run
#[derive(Debug)]
pub struct TransformOutcome {
    pub stdout: String,
    pub stderr: String,
}

/// Run the staged transform program with the workspace as its working
/// directory, bounded by `budget`.
///
/// The child gets its own process group on unix, and a guard SIGKILLs that
/// group whenever the invocation ends without a completed wait — timeout or
/// the caller dropping this future — so neither the transform nor anything
/// it spawned can outlive the request.
pub async fn invoke(
    workspace: &Workspace,
    interpreter: &str,
    script_name: &str,
    budget: Duration,
) -> Result<TransformOutcome, AppError> {
    let mut cmd = Command::new(interpreter);
    cmd.arg(script_name)
        .current_dir(workspace.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    tracing::info!(
        "Running transform: {} {} in {}",
        interpreter,
        script_name,
        workspace.path().display()
    );

    let child = cmd.spawn()?;
    let mut guard = GroupKillGuard::new(child.id());

    let output = match timeout(budget, child.wait_with_output()).await {
        Ok(res) => {
            let output = res?;
            guard.disarm();
            output
        }
        Err(_) => {
            tracing::error!(
                "Transform exceeded {}s budget, terminating",
                budget.as_secs()
            );
            // the guard kills the process group on the way out
            return Err(AppError::Timeout(budget.as_secs()));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let diagnostics = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        tracing::error!("Transform exited with {}: {}", output.status, diagnostics);
        return Err(AppError::Execution(diagnostics.to_string()));
    }

    tracing::info!("Transform completed successfully");
    Ok(TransformOutcome { stdout, stderr })
}

/// Kills the child's whole process group when dropped, unless disarmed
/// after a completed wait.
///
/// Both the timeout branch and a dropped invoke future (caller cancellation)
/// funnel through this, so the transform's own children never outlive the
/// request. `kill_on_drop` alone only reaps the direct child.
struct GroupKillGuard {
    pid: Option<u32>,
}

impl GroupKillGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    fn disarm(&mut self) {
        self.pid = None;
    }
}

impl Drop for GroupKillGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }
    }
}

/// Best-effort SIGKILL to the child's process group.
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let _ = std::process::Command::new("kill")
        .args(["-9", &format!("-{pid}")])
        .output();
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
