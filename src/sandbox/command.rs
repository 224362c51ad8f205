use std::time::Duration;

use crate::errors::{EyeControlError, EyeControlResult};

/// Run a host command with a timeout, returning raw stdout on success.
pub async fn run_cmd(program: &str, args: &[String], timeout: Duration) -> EyeControlResult<Vec<u8>> {
    let result = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => {
            if output.status.success() {
                Ok(output.stdout)
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(EyeControlError::Sandbox(
                    format!("{program} {} failed: {}", args.first().map(String::as_str).unwrap_or(""), stderr.trim())
                        .trim()
                        .to_string(),
                ))
            }
        }
        Ok(Err(e)) => Err(EyeControlError::Sandbox(format!("Failed to execute {program}: {e}"))),
        Err(_) => Err(EyeControlError::Sandbox(format!(
            "{program} timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Same as [`run_cmd`] but decodes stdout as trimmed text.
pub async fn run_cmd_text(program: &str, args: &[String], timeout: Duration) -> EyeControlResult<String> {
    let out = run_cmd(program, args, timeout).await?;
    Ok(String::from_utf8_lossy(&out).trim().to_string())
}
