//! Subprocess execution utilities.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Poll interval while waiting on a child with a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How a passthrough child process finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The child exited; `None` when it was terminated by a signal.
    Exited(Option<i32>),
    /// The child outlived its deadline and was killed.
    TimedOut,
}

impl RunStatus {
    /// True if the child exited with status 0.
    pub fn success(&self) -> bool {
        matches!(self, RunStatus::Exited(Some(0)))
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
            timeout: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.env
            .insert(key.as_ref().to_string(), value.as_ref().to_string());
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Kill the child if it runs longer than `limit`.
    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Get the extra environment.
    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Get the configured deadline.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and capture its output.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        cmd.output()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))
    }

    /// Execute with stdout/stderr inherited, blocking until the child exits
    /// or the deadline passes.
    pub fn run(&self) -> Result<RunStatus> {
        tracing::debug!("running `{}`", self.display_command());

        let mut cmd = self.build_command();
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.program.display()))?;

        let Some(limit) = self.timeout else {
            let status = child
                .wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;
            return Ok(RunStatus::Exited(status.code()));
        };

        let start = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("failed to wait for `{}`", self.program.display()))?
            {
                return Ok(RunStatus::Exited(status.code()));
            }

            if start.elapsed() >= limit {
                tracing::warn!(
                    "`{}` exceeded {}s, killing it",
                    self.display_command(),
                    limit.as_secs()
                );
                // The child may have exited between try_wait and kill.
                let _ = child.kill();
                let _ = child.wait();
                return Ok(RunStatus::TimedOut);
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|arg| {
            if arg.contains(' ') {
                format!("\"{}\"", arg)
            } else {
                arg.clone()
            }
        }));
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("cmake").args(["-G", "Unix Makefiles", "-S", "src"]);

        assert_eq!(pb.display_command(), "cmake -G \"Unix Makefiles\" -S src");
    }

    #[test]
    fn test_builder_records_env_and_timeout() {
        let pb = ProcessBuilder::new("ninja")
            .env("CC", "gcc")
            .timeout(Some(Duration::from_secs(5)));

        assert_eq!(pb.get_env().get("CC").map(String::as_str), Some("gcc"));
        assert_eq!(pb.get_timeout(), Some(Duration::from_secs(5)));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_exit_code() {
        let status = ProcessBuilder::new("sh").args(["-c", "exit 3"]).run().unwrap();
        assert_eq!(status, RunStatus::Exited(Some(3)));
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_kills_after_timeout() {
        let status = ProcessBuilder::new("sh")
            .args(["-c", "sleep 5"])
            .timeout(Some(Duration::from_millis(200)))
            .run()
            .unwrap();
        assert_eq!(status, RunStatus::TimedOut);
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_captures_output() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("hello"));
    }

    #[test]
    fn test_spawn_failure_is_an_error() {
        let result = ProcessBuilder::new("/nonexistent/definitely-not-a-tool").run();
        assert!(result.is_err());
    }
}
