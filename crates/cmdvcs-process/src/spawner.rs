use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::{Invocation, ProcessError, ProcessInvoker, ProcessResult};

/// Live process invoker backed by `tokio::process`.
///
/// Each blocking [`ProcessInvoker::run`] call drives the child on its own
/// current-thread runtime, so no threads outlive the call. Calling it from
/// inside an async runtime panics; use [`ProcessSpawner::spawn`] there.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

impl ProcessSpawner {
    pub fn new() -> Self {
        Self
    }

    /// Spawn a process, capture its output, and enforce the invocation timeout
    pub async fn spawn(invocation: &Invocation) -> Result<ProcessResult, ProcessError> {
        invocation.validate()?;

        let start = Instant::now();

        debug!(
            program = %invocation.program.display(),
            args = ?invocation.args,
            working_dir = ?invocation.working_dir,
            timeout_ms = invocation.timeout.as_millis(),
            "Spawning process"
        );

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null()) // Non-interactive
            .kill_on_drop(true);

        // Own process group, so a timeout can take down everything the tool started
        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(ref dir) = invocation.working_dir {
            cmd.current_dir(dir);
        }

        for (key, value) in &invocation.env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Launch {
            program: invocation.program.clone(),
            source,
        })?;

        let mut stdout_handle = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
        let mut stderr_handle = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

        let pid = child.id();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let collect = async {
            // Drain both pipes concurrently so a chatty stderr cannot block stdout
            let drain = async {
                tokio::try_join!(
                    stdout_handle.read_to_end(&mut stdout),
                    stderr_handle.read_to_end(&mut stderr)
                )
            };
            tokio::pin!(drain);

            let status: ExitStatus = tokio::select! {
                biased;
                drained = &mut drain => {
                    drained?;
                    child.wait().await?
                }
                status = child.wait() => {
                    let status = status?;
                    // Leftover descendants may still hold the pipes open
                    if let Some(pid) = pid {
                        kill_process_group(pid);
                    }
                    drain.await?;
                    status
                }
            };
            Ok::<_, std::io::Error>(status)
        };

        let status = match tokio::time::timeout(invocation.timeout, collect).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    program = %invocation.program.display(),
                    timeout_ms = invocation.timeout.as_millis(),
                    "Process timed out, killing it"
                );
                // id() is None once the child is reaped, and then its group id may be reused
                if let Some(pid) = child.id() {
                    kill_process_group(pid);
                    // kill() also waits, so the child is reaped before we return
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill timed out process");
                    }
                }
                return Err(ProcessError::Timeout {
                    program: invocation.program.clone(),
                    timeout: invocation.timeout,
                });
            }
        };

        let duration = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        trace!(
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "Captured process output"
        );
        debug!(
            exit_code,
            duration_ms = duration.as_millis(),
            "Process completed"
        );

        Ok(ProcessResult::new(exit_code, stdout, stderr, duration))
    }
}

impl ProcessInvoker for ProcessSpawner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessResult, ProcessError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(Self::spawn(invocation))
    }
}

/// Send SIGKILL to every process in the group led by `pid`
#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg takes plain integers and touches no memory of ours
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        trace!(
            pgid,
            error = %std::io::Error::last_os_error(),
            "Process group already gone"
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
