//! The two-stage conversion pipeline.
//!
//! Stage one runs ffmpeg with the palette filter graph. Stage two, when
//! optimization is requested and gifsicle is installed, rewrites the result
//! with gifsicle. Because gifsicle cannot read and write the same file, stage
//! one then targets an intermediate sibling (`out.tmp.gif`) that is removed
//! on every exit path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gifify_core::{ConversionOptions, Error, InputSource, PatternKind, Result};
use tracing::{debug, info, warn};

use crate::command::{OutputMode, ToolCommand, ToolOutput};
use crate::filter::filter_for;
use crate::scratch::{intermediate_path, ScratchPath};
use crate::tools::{ToolConfig, ToolRegistry, FFMPEG, GIFSICLE};

/// One conversion request.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub input: InputSource,
    pub output: PathBuf,
    pub options: ConversionOptions,
}

impl PipelineJob {
    pub fn new(input: InputSource, output: impl Into<PathBuf>, options: ConversionOptions) -> Self {
        Self {
            input,
            output: output.into(),
            options,
        }
    }
}

/// Non-fatal conditions raised while running a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineWarning {
    /// Optimization was requested but gifsicle is not installed; the
    /// unoptimized GIF was delivered instead.
    OptimizerUnavailable,
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::OptimizerUnavailable => {
                f.write_str("gifsicle not found; optimization skipped")
            }
        }
    }
}

/// Result of a successful job.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Path of the delivered artifact (always the job's output path).
    pub output: PathBuf,
    /// Whether the optimizer pass was applied.
    pub optimized: bool,
    pub warnings: Vec<PipelineWarning>,
}

/// Runs conversion jobs against the tools in a [`ToolRegistry`].
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    tools: Arc<ToolRegistry>,
    output_mode: OutputMode,
}

impl ConversionPipeline {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            output_mode: OutputMode::Capture,
        }
    }

    /// Choose whether child output is captured (for error reports) or shown
    /// on the terminal.
    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Run one job to completion.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] if ffmpeg is not installed.
    /// - [`Error::PreexistingOutput`] if a target exists and overwriting is off.
    /// - [`Error::Processor`] / [`Error::Optimizer`] carrying the child's exit
    ///   code when either tool fails.
    pub async fn run(&self, job: &PipelineJob) -> Result<PipelineOutcome> {
        let ffmpeg = self.tools.require(FFMPEG)?;
        let options = &job.options;
        let mut warnings = Vec::new();

        let optimizer = if options.optimize() {
            let found = self.tools.get(GIFSICLE);
            if found.is_none() {
                warn!("optimize requested but gifsicle was not found; delivering unoptimized output");
                warnings.push(PipelineWarning::OptimizerUnavailable);
            }
            found
        } else {
            None
        };

        let direct_target = match optimizer {
            Some(_) => intermediate_path(&job.output),
            None => job.output.clone(),
        };

        // Checked before any guard exists so a refusal never deletes a file
        // that belongs to someone else.
        if !options.overwrite() {
            for candidate in [&direct_target, &job.output] {
                if candidate.exists() {
                    return Err(Error::PreexistingOutput {
                        path: candidate.clone(),
                    });
                }
            }
        }

        let intermediate = optimizer.map(|_| ScratchPath::new(&direct_target));

        info!(input = %job.input, output = %job.output.display(), "converting");
        let output = self
            .command(ffmpeg, processor_args(job, &direct_target, self.output_mode))
            .execute()
            .await?;
        if !output.success() {
            return Err(Error::Processor {
                code: output.exit_code(),
                message: self.failure_detail(&output),
            });
        }

        let (Some(gifsicle), Some(intermediate)) = (optimizer, intermediate) else {
            info!(output = %job.output.display(), "conversion complete");
            return Ok(PipelineOutcome {
                output: job.output.clone(),
                optimized: false,
                warnings,
            });
        };

        debug!(lossy = ?options.lossy(), "optimizing with gifsicle");
        let output = self
            .command(
                gifsicle,
                optimizer_args(options.lossy(), intermediate.path(), &job.output),
            )
            .execute()
            .await?;
        if !output.success() {
            return Err(Error::Optimizer {
                code: output.exit_code(),
                message: self.failure_detail(&output),
            });
        }

        intermediate.remove();
        info!(output = %job.output.display(), "conversion complete (optimized)");
        Ok(PipelineOutcome {
            output: job.output.clone(),
            optimized: true,
            warnings,
        })
    }

    fn command(&self, tool: &ToolConfig, args: Vec<String>) -> ToolCommand {
        let mut cmd = ToolCommand::new(tool.path.clone());
        cmd.args(args)
            .timeout(tool.timeout)
            .output_mode(self.output_mode);
        cmd
    }

    fn failure_detail(&self, output: &ToolOutput) -> String {
        match self.output_mode {
            OutputMode::Inherit => "see tool output above".to_string(),
            OutputMode::Capture => {
                let tail = output.stderr_tail();
                if tail.is_empty() {
                    "no diagnostic output".to_string()
                } else {
                    tail
                }
            }
        }
    }
}

/// ffmpeg argument vector for `job`, writing to `target`.
///
/// Trim flags precede `-i` so trimming happens while decoding and the
/// palette pass sees exactly the frames that end up in the GIF.
pub fn processor_args(job: &PipelineJob, target: &Path, mode: OutputMode) -> Vec<String> {
    let options = &job.options;
    let mut args = vec!["-hide_banner".to_string()];
    if mode == OutputMode::Capture {
        args.extend(["-nostats", "-loglevel", "error"].map(String::from));
    }
    args.push(if options.overwrite() { "-y" } else { "-n" }.to_string());

    let trim = options.trim();
    for (flag, value) in [("-ss", &trim.start), ("-t", &trim.duration), ("-to", &trim.end)] {
        if let Some(value) = value {
            args.push(flag.to_string());
            args.push(value.clone());
        }
    }

    if job.input.pattern_kind() == Some(PatternKind::Glob) {
        args.push("-pattern_type".to_string());
        args.push("glob".to_string());
    }
    args.push("-i".to_string());
    args.push(job.input.locator());

    args.push("-vf".to_string());
    args.push(filter_for(options));
    args.push("-loop".to_string());
    args.push(options.loop_count().to_string());
    args.push(target.to_string_lossy().into_owned());
    args
}

/// gifsicle argument vector: maximum effort, optional lossy level.
pub fn optimizer_args(lossy: Option<u32>, input: &Path, output: &Path) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(level) = lossy {
        args.push(format!("--lossy={level}"));
    }
    args.push("-O3".to_string());
    args.push(input.to_string_lossy().into_owned());
    args.push("-o".to_string());
    args.push(output.to_string_lossy().into_owned());
    args
}
