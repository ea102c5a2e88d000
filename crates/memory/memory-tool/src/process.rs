//! Subprocess runner shared by the tool clients.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use memory_core::{MemoryError, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs `program verb args...`, optionally feeding `stdin`, and returns stdout.
///
/// The child is killed when the timeout elapses (`kill_on_drop`), which
/// surfaces as `ToolInvocation { reason: "timeout" }`. A non-zero exit is a
/// `ToolInvocation` carrying the status and a stderr preview.
pub async fn run_tool(
    program: &str,
    verb: &str,
    args: &[String],
    stdin: Option<&str>,
    timeout: Duration,
) -> Result<String> {
    let mut command = Command::new(program);
    command
        .arg(verb)
        .args(args)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| MemoryError::tool(verb, format!("spawn failed: {}", e)))?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let input = input.to_string();
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(input.as_bytes()).await {
                debug!(error = %e, "tool stdin closed early");
            }
        });
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| MemoryError::tool(verb, format!("wait failed: {}", e)))?,
        Err(_) => {
            warn!(
                program = %program,
                verb = %verb,
                timeout_ms = timeout.as_millis() as u64,
                "tool invocation timed out, child killed"
            );
            return Err(MemoryError::tool(verb, "timeout"));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let preview: String = stderr.trim().chars().take(200).collect();
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(MemoryError::tool(verb, format!("exit {}: {}", code, preview)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether `program` resolves to an existing file, directly or through `PATH`.
pub async fn program_exists(program: &str) -> bool {
    if program.trim().is_empty() {
        return false;
    }
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return tokio::fs::metadata(program)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    for dir in std::env::split_paths(&paths) {
        if is_file(&dir.join(program)).await {
            return true;
        }
    }
    false
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
