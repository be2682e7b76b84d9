//! Builder for executing external tool commands.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 12;

/// What happens to the child's stdout and stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Discard stdout and capture stderr; used when the caller reports
    /// errors remotely.
    #[default]
    Capture,
    /// Let the child write straight to our terminal.
    Inherit,
}

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard error (lossy UTF-8, empty when inherited).
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code; `-1` when the child was terminated by a signal.
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// The last few lines of stderr, trimmed.
    pub fn stderr_tail(&self) -> String {
        let lines: Vec<&str> = self.stderr.trim().lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        lines[start..].join("\n")
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// Unlike a shell, arguments are handed to the child verbatim, so user
/// supplied paths and timecodes never need quoting. The child is killed if
/// the returned future is dropped before it exits.
///
/// # Example
///
/// ```no_run
/// use gifify_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> gifify_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("gifsicle"))
///     .arg("-O3")
///     .arg("in.gif")
///     .arg("-o")
///     .arg("out.gif")
///     .execute()
///     .await?;
/// assert!(output.success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
    output_mode: OutputMode,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
            output_mode: OutputMode::default(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set (or clear) the maximum execution time.
    pub fn timeout(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn output_mode(&mut self, mode: OutputMode) -> &mut Self {
        self.output_mode = mode;
        self
    }

    /// Human-readable command line, for logs only.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|a| {
                if a.is_empty() || a.contains(char::is_whitespace) || a.contains('\'') {
                    format!("'{}'", a.replace('\'', r"'\''"))
                } else {
                    a.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command and wait for it to exit.
    ///
    /// A non-zero exit is *not* an error here: the caller inspects
    /// [`ToolOutput::status`] and decides which failure kind applies.
    ///
    /// # Errors
    ///
    /// Returns [`gifify_core::Error::Tool`] if spawning fails, waiting fails,
    /// or the configured timeout expires.
    pub async fn execute(&self) -> gifify_core::Result<ToolOutput> {
        let program_name = self.program_name();
        tracing::debug!(tool = %program_name, "exec: {}", self.command_line());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match self.output_mode {
            OutputMode::Capture => {
                cmd.stdout(Stdio::null()).stderr(Stdio::piped());
            }
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }

        let child = cmd
            .spawn()
            .map_err(|e| gifify_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_elapsed| {
                    // The child was owned by the cancelled future and is
                    // killed on drop.
                    gifify_core::Error::tool(&program_name, format!("timed out after {limit:?}"))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| {
            gifify_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;

        let tool_output = ToolOutput {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        tracing::debug!(
            tool = %program_name,
            status = %tool_output.status,
            "process exited"
        );

        Ok(tool_output)
    }
}
