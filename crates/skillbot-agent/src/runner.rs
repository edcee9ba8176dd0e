//! Script runner — bounded child-process execution with deterministic output.
//!
//! Two entry points:
//! - [`ScriptRunner::run_command`] runs a shell command (the `bash` tool).
//! - [`ScriptRunner::run_script`] persists generated code to a temp artifact
//!   and runs it with the configured interpreter (the `run_script` tool).
//!
//! Failures never surface as Rust errors: exit codes, spawn failures, and
//! timeouts all become result text the model can read.
//!
//! Artifacts are tracked by an [`ArtifactScope`]. Successful scripts delete
//! their artifact immediately; failed ones keep it so the model can `cat` and
//! patch it. Whatever is left is removed when the scope ends.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

/// Returned by a successful command that printed nothing.
pub const COMMAND_NO_OUTPUT: &str = "Command executed successfully (no output)";

/// Returned by a successful script that printed nothing.
pub const SCRIPT_NO_OUTPUT: &str = "Success (no output)";

// ─────────────────────────────────────────────
// Process execution
// ─────────────────────────────────────────────

/// Raw result of a bounded child process.
#[derive(Debug)]
enum ExecOutcome {
    Exited {
        code: i32,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

impl ExecOutcome {
    /// Error stream, or standard output when the error stream is empty.
    fn diagnostics(stdout: &str, stderr: &str) -> String {
        if stderr.trim().is_empty() {
            stdout.trim_end().to_string()
        } else {
            stderr.trim_end().to_string()
        }
    }
}

/// Spawn and wait with a deadline. The child is killed if the deadline passes.
async fn execute(mut command: Command, timeout: Duration) -> std::io::Result<ExecOutcome> {
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => {
            let output = output?;
            Ok(ExecOutcome::Exited {
                // Signal-terminated processes have no exit code.
                code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
        Err(_) => Ok(ExecOutcome::TimedOut),
    }
}

// ─────────────────────────────────────────────
// ArtifactScope
// ─────────────────────────────────────────────

/// Tracks temporary script artifacts for one unit of work and removes any
/// that remain when the scope is dropped.
pub struct ArtifactScope {
    dir: PathBuf,
    prefix: String,
    suffix: String,
    files: Mutex<Vec<PathBuf>>,
}

impl ArtifactScope {
    /// Artifacts are named `analysis_<random>.py` inside `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_naming(dir, "analysis_", ".py")
    }

    pub fn with_naming(dir: impl Into<PathBuf>, prefix: &str, suffix: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            files: Mutex::new(Vec::new()),
        }
    }

    /// Write `body` to a new uniquely named artifact and track it.
    pub fn create(&self, body: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(&self.prefix)
            .suffix(&self.suffix)
            .tempfile_in(&self.dir)?;
        file.write_all(body.as_bytes())?;
        file.flush()?;
        let (_, path) = file.keep().map_err(|e| e.error)?;

        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.clone());
        debug!(path = %path.display(), "created script artifact");
        Ok(path)
    }

    /// Delete one artifact and stop tracking it.
    pub fn release(&self, path: &Path) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|p| p != path);
        remove_artifact(path);
    }

    /// Artifacts still on disk.
    pub fn remaining(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Remove every tracked artifact.
    pub fn cleanup(&self) {
        let files: Vec<PathBuf> = std::mem::take(
            &mut *self.files.lock().unwrap_or_else(|e| e.into_inner()),
        );
        if !files.is_empty() {
            debug!(count = files.len(), "cleaning up script artifacts");
        }
        for path in files {
            remove_artifact(&path);
        }
    }
}

impl Drop for ArtifactScope {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_artifact(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove script artifact");
        }
    }
}

// ─────────────────────────────────────────────
// ScriptRunner
// ─────────────────────────────────────────────

/// Runs commands and generated scripts in fresh child processes.
///
/// Holds no mutable state; concurrent threads may share one instance.
#[derive(Clone, Debug)]
pub struct ScriptRunner {
    interpreter: String,
    working_dir: Option<PathBuf>,
}

impl ScriptRunner {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            working_dir: None,
        }
    }

    /// Run commands and scripts from `dir` instead of the process cwd.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    fn base_command(&self, program: &str) -> Command {
        let mut cmd = Command::new(program);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run a shell command.
    ///
    /// Success returns standard output only; failure returns the error stream
    /// (or stdout) with the exit code.
    pub async fn run_command(&self, command: &str, timeout: Duration) -> String {
        info!(command = %command, timeout_secs = timeout.as_secs(), "executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = self.base_command("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = self.base_command("sh");
            c.args(["-c", command]);
            c
        };
        cmd.env("PYTHONUNBUFFERED", "1");

        match execute(cmd, timeout).await {
            Ok(ExecOutcome::Exited { code: 0, stdout, .. }) => {
                if stdout.trim().is_empty() {
                    COMMAND_NO_OUTPUT.to_string()
                } else {
                    stdout.trim_end().to_string()
                }
            }
            Ok(ExecOutcome::Exited {
                code,
                stdout,
                stderr,
            }) => {
                debug!(code, "command failed");
                format!(
                    "Command failed with exit code {code}\nError: {}",
                    ExecOutcome::diagnostics(&stdout, &stderr)
                )
            }
            Ok(ExecOutcome::TimedOut) => {
                warn!(command = %command, "command timed out");
                format!(
                    "Error: Command execution timed out ({} second limit)",
                    timeout.as_secs()
                )
            }
            Err(e) => format!("Error executing command: {e}"),
        }
    }

    /// Persist `code` as an artifact in `scope` and run it.
    ///
    /// The artifact is deleted on success and kept (with its path reported)
    /// on failure or timeout.
    pub async fn run_script(&self, code: &str, timeout: Duration, scope: &ArtifactScope) -> String {
        let path = match scope.create(code) {
            Ok(p) => p,
            Err(e) => return format!("ERROR: could not write script artifact: {e}"),
        };
        let shown = path.display().to_string();
        info!(path = %shown, interpreter = %self.interpreter, "running script");

        let mut cmd = self.base_command(&self.interpreter);
        cmd.arg(&path).env("PYTHONUNBUFFERED", "1");

        match execute(cmd, timeout).await {
            Ok(ExecOutcome::Exited { code: 0, stdout, .. }) => {
                scope.release(&path);
                if stdout.trim().is_empty() {
                    SCRIPT_NO_OUTPUT.to_string()
                } else {
                    stdout.trim_end().to_string()
                }
            }
            Ok(ExecOutcome::Exited {
                code,
                stdout,
                stderr,
            }) => {
                debug!(path = %shown, code, "script failed, keeping artifact");
                format!(
                    "ERROR in {shown} (exit code {code})\n{}",
                    ExecOutcome::diagnostics(&stdout, &stderr)
                )
            }
            Ok(ExecOutcome::TimedOut) => {
                warn!(path = %shown, "script timed out");
                format!("TIMEOUT in {shown} - exceeded {}s", timeout.as_secs())
            }
            Err(e) => format!(
                "ERROR in {shown} (exit code -1)\nfailed to start '{}': {e}",
                self.interpreter
            ),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SECS: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_command_success_returns_stdout() {
        let runner = ScriptRunner::new("sh");
        assert_eq!(runner.run_command("echo X", SECS).await, "X");
    }

    #[tokio::test]
    async fn test_command_empty_output_sentinel() {
        let runner = ScriptRunner::new("sh");
        assert_eq!(runner.run_command("true", SECS).await, COMMAND_NO_OUTPUT);
    }

    #[tokio::test]
    async fn test_command_ignores_stderr_on_success() {
        let runner = ScriptRunner::new("sh");
        let out = runner.run_command("echo ok; echo noise >&2", SECS).await;
        assert_eq!(out, "ok");
    }

    #[tokio::test]
    async fn test_command_failure_reports_exit_code_and_stderr() {
        let runner = ScriptRunner::new("sh");
        let out = runner
            .run_command("echo partial; echo broken >&2; exit 3", SECS)
            .await;
        assert_eq!(out, "Command failed with exit code 3\nError: broken");
    }

    #[tokio::test]
    async fn test_command_failure_falls_back_to_stdout() {
        let runner = ScriptRunner::new("sh");
        let out = runner.run_command("echo only-stdout; exit 1", SECS).await;
        assert_eq!(out, "Command failed with exit code 1\nError: only-stdout");
    }

    #[tokio::test]
    async fn test_command_timeout_repeats_limit() {
        let runner = ScriptRunner::new("sh");
        let out = runner.run_command("sleep 5", Duration::from_secs(1)).await;
        assert_eq!(out, "Error: Command execution timed out (1 second limit)");
    }

    #[tokio::test]
    async fn test_command_runs_in_working_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let runner = ScriptRunner::new("sh").with_working_dir(dir.path());
        assert_eq!(runner.run_command("cat marker.txt", SECS).await, "here");
    }

    #[tokio::test]
    async fn test_script_success_deletes_artifact() {
        let dir = tempdir().unwrap();
        let scope = ArtifactScope::with_naming(dir.path(), "analysis_", ".sh");
        let runner = ScriptRunner::new("sh");

        let out = runner.run_script("echo 42", SECS, &scope).await;
        assert_eq!(out, "42");
        assert!(scope.remaining().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_script_empty_output_sentinel() {
        let dir = tempdir().unwrap();
        let scope = ArtifactScope::with_naming(dir.path(), "analysis_", ".sh");
        let out = ScriptRunner::new("sh").run_script(":", SECS, &scope).await;
        assert_eq!(out, SCRIPT_NO_OUTPUT);
    }

    #[tokio::test]
    async fn test_script_failure_keeps_artifact_and_reports_path() {
        let dir = tempdir().unwrap();
        let scope = ArtifactScope::with_naming(dir.path(), "analysis_", ".sh");
        let runner = ScriptRunner::new("sh");

        let out = runner
            .run_script("echo 'bad column' >&2\nexit 2", SECS, &scope)
            .await;

        let remaining = scope.remaining();
        assert_eq!(remaining.len(), 1);
        let path = remaining[0].display().to_string();
        assert_eq!(out, format!("ERROR in {path} (exit code 2)\nbad column"));
        assert!(remaining[0].exists());
        let name = remaining[0].file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("analysis_"));
        assert!(name.ends_with(".sh"));
        // The body is still there to inspect.
        assert!(std::fs::read_to_string(&remaining[0]).unwrap().contains("bad column"));
    }

    #[tokio::test]
    async fn test_script_timeout_reports_limit() {
        let dir = tempdir().unwrap();
        let scope = ArtifactScope::with_naming(dir.path(), "analysis_", ".sh");
        let out = ScriptRunner::new("sh")
            .run_script("sleep 5", Duration::from_secs(1), &scope)
            .await;
        assert!(out.starts_with("TIMEOUT in "));
        assert!(out.ends_with(" - exceeded 1s"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_text() {
        let dir = tempdir().unwrap();
        let scope = ArtifactScope::new(dir.path());
        let out = ScriptRunner::new("definitely-not-an-interpreter-xyz")
            .run_script("print(1)", SECS, &scope)
            .await;
        assert!(out.starts_with("ERROR in "));
        assert!(out.contains("failed to start"));
    }

    #[test]
    fn test_scope_drop_removes_leftovers() {
        let dir = tempdir().unwrap();
        let kept = {
            let scope = ArtifactScope::new(dir.path());
            let a = scope.create("print('a')").unwrap();
            let b = scope.create("print('b')").unwrap();
            assert_ne!(a, b);
            assert!(a.exists() && b.exists());
            vec![a, b]
        };
        for path in kept {
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let dir = tempdir().unwrap();
        let one = ArtifactScope::new(dir.path());
        let two = ArtifactScope::new(dir.path());
        let mut names = std::collections::HashSet::new();
        for _ in 0..20 {
            assert!(names.insert(one.create("x").unwrap()));
            assert!(names.insert(two.create("x").unwrap()));
        }
        one.cleanup();
        assert_eq!(two.remaining().len(), 20);
    }
}
