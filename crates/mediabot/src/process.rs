use std::process::Stdio;
use std::time::Duration;
use anyhow::{anyhow, Context, Result};
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

/// Captured result of an external process
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Drain a pipe to EOF; bytes that are not UTF-8 are replaced, never fatal
fn collect_output<R>(mut reader: R, label: String) -> tokio::task::JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buf).await {
            debug!("Stopped reading {} output after {} bytes: {}", label, buf.len(), e);
        }
        String::from_utf8_lossy(&buf).trim_end_matches('\n').to_string()
    })
}

/// Spawn `cmd`, capture both output streams and wait for it, killing it once `deadline` passes
///
/// A non-zero exit is not an error here; callers decide what it means.
pub async fn run_with_deadline(
    mut cmd: Command,
    deadline: Option<Duration>,
    label: &str,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Executing {}: {:?}", label, cmd.as_std());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}. Ensure it is installed and accessible.", label))?;

    let stdout = child.stdout.take().ok_or_else(|| anyhow!("Failed to capture {} stdout", label))?;
    let stderr = child.stderr.take().ok_or_else(|| anyhow!("Failed to capture {} stderr", label))?;
    let stdout_handle = collect_output(stdout, format!("{} stdout", label));
    let stderr_handle = collect_output(stderr, format!("{} stderr", label));

    let status = match deadline {
        Some(limit) => match timeout(limit, child.wait()).await {
            Ok(result) => result.with_context(|| format!("Failed to wait for {}", label))?,
            Err(_) => {
                child
                    .kill()
                    .await
                    .with_context(|| format!("Failed to kill stuck {} process", label))?;
                return Err(anyhow!(
                    "{} timed out after {} seconds. Process was killed.",
                    label,
                    limit.as_secs()
                ));
            }
        },
        None => child.wait().await.with_context(|| format!("Failed to wait for {}", label))?,
    };

    let stdout = stdout_handle
        .await
        .with_context(|| format!("Failed to read {} stdout", label))?;
    let stderr = stderr_handle
        .await
        .with_context(|| format!("Failed to read {} stderr", label))?;

    debug!(
        "{} exit code: {:?}, stdout length: {}, stderr length: {}",
        label,
        status.code(),
        stdout.len(),
        stderr.len()
    );

    Ok(ProcessOutput {
        success: status.success(),
        exit_code: status.code(),
        stdout,
        stderr,
    })
}
