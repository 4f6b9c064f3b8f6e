//! Helpers for running external OCR tools.

use std::process::{Output, Stdio};

use tokio::{
    io::{AsyncBufReadExt as _, AsyncRead, BufReader},
    process::Command,
};

use crate::prelude::*;

/// Run a command to completion and capture its output.
pub async fn run_command(command_name: &str, command: &mut Command) -> Result<Output> {
    command
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("cannot run {command_name}"))
}

/// Report any command failures, and include any error output.
///
/// Standard output and standard error are logged at debug level, because OCR
/// tools like to print progress chatter to stderr even when they succeed.
pub fn check_for_command_failure(command_name: &str, output: &Output) -> Result<()> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    trace!(
        command_name,
        output = %String::from_utf8_lossy(&output.stdout),
        "Standard output from command"
    );
    if !stderr.trim().is_empty() {
        debug!(command_name, output = %stderr, "Standard error from command");
    }

    if output.status.success() {
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr.trim_end(),
        ))
    } else {
        Err(anyhow!(
            "{} was terminated by a signal, with error output:\n{}",
            command_name,
            stderr.trim_end(),
        ))
    }
}

/// Forward lines from a child's stderr to our debug log until it closes.
pub fn forward_stderr_to_log<R>(command_name: String, stderr: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => debug!(command_name = %command_name, "{line}"),
                Ok(None) => break,
                Err(err) => {
                    debug!(command_name = %command_name, "Cannot read stderr: {err}");
                    break;
                }
            }
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_passes() -> Result<()> {
        let output = run_command("sh", Command::new("sh").args(["-c", "echo hi"])).await?;
        check_for_command_failure("sh", &output)?;
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hi\n");
        Ok(())
    }

    #[tokio::test]
    async fn failing_command_reports_exit_code_and_stderr() -> Result<()> {
        let output = run_command(
            "sh",
            Command::new("sh").args(["-c", "echo broken >&2; exit 3"]),
        )
        .await?;
        let err = check_for_command_failure("sh", &output).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("exit code 3"), "{msg}");
        assert!(msg.contains("broken"), "{msg}");
        Ok(())
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let result = run_command(
            "definitely-not-a-real-binary",
            &mut Command::new("definitely-not-a-real-binary"),
        )
        .await;
        assert!(result.is_err());
    }
}
