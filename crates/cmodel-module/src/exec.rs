//! Subprocess invocation helper shared by the resolver and the compiler.
//!
//! Children inherit the parent environment extended with the toolchain's
//! module-mode and C-interop flags. Stdout is captured and returned; stderr
//! is captured and attached to the error on a non-zero exit. Dropping the
//! future kills the child, so caller cancellation does not leak processes.

use std::path::Path;
use std::process::Stdio;

use cmodel_core::{ModelError, ModelResult};
use tokio::process::Command;
use tracing::debug;

/// Environment extensions applied to every toolchain subprocess.
const TOOLCHAIN_ENV: &[(&str, &str)] = &[("GO111MODULE", "on"), ("CGO_ENABLED", "1")];

/// Runs `program` with `args` in `dir` and returns its stdout.
pub async fn exec(
    dir: &Path,
    program: &str,
    args: &[&str],
    env: &[(&str, &str)],
) -> ModelResult<String> {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(dir)
        .envs(env.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program, ?args, dir = %dir.display(), "running subprocess");
    let output = command.output().await.map_err(|e| {
        ModelError::internal(format!("failed to run '{program} {}': {e}", args.join(" ")))
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(ModelError::internal(format!(
            "'{program} {}' exited with {}: {}",
            args.join(" "),
            output.status,
            stderr.trim()
        )));
    }
    if !stderr.is_empty() {
        debug!(program, "subprocess stderr: {}", stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs the `go` toolchain with the standard environment extensions.
pub async fn go_exec(dir: &Path, args: &[&str]) -> ModelResult<String> {
    exec(dir, "go", args, TOOLCHAIN_ENV).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let dir = std::env::temp_dir();
        let out = exec(&dir, "echo", &["hello"], &[]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_attaches_stderr() {
        let dir = std::env::temp_dir();
        let err = exec(&dir, "sh", &["-c", "echo boom >&2; exit 3"], &[])
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("boom"), "missing stderr in: {message}");
    }

    #[tokio::test]
    async fn missing_program_is_internal() {
        let dir = std::env::temp_dir();
        let err = exec(&dir, "definitely-not-a-program", &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Internal(_)));
    }
}
