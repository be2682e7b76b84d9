use clap::{Args, Parser, Subcommand};
use gifify_av::PipelineJob;
use gifify_core::{
    parse_saturating_int, ConversionOptions, DitherMode, Error, FrameRate, InputSource, Result,
    Trim,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gifify")]
#[command(author, version, about = "Convert videos and image sequences into optimized GIFs")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (shows every tool invocation)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a video or an image sequence to a GIF
    Convert(ConvertArgs),

    /// Start the drag-and-drop web UI
    Serve {
        /// Host to bind to (default: from config, else 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: from config, else 8765)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that ffmpeg and gifsicle are available
    CheckTools {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input video (may be omitted when --pattern is given)
    pub input: Option<PathBuf>,

    /// Output GIF path (default: input with a .gif extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output frame rate, decimal or rational (e.g. 12, 12.5, 30000/1001)
    #[arg(long, default_value = "12")]
    pub fps: FrameRate,

    /// Maximum width in pixels; smaller sources are not upscaled, 0 keeps the source size
    #[arg(long, default_value_t = 480, allow_negative_numbers = true, value_parser = wide_int)]
    pub max_width: i64,

    /// Palette size, clamped to 2-256
    #[arg(long, default_value_t = 256, allow_negative_numbers = true, value_parser = wide_int)]
    pub colors: i64,

    /// Dither mode: sierra2_4a, bayer, floyd_steinberg or none
    #[arg(long, default_value = "sierra2_4a")]
    pub dither: DitherMode,

    /// Loop count, 0 loops forever
    #[arg(long = "loop", default_value_t = 0)]
    pub loop_count: u32,

    /// Start time (seconds or HH:MM:SS.mmm)
    #[arg(long)]
    pub start: Option<String>,

    /// Duration (seconds or HH:MM:SS.mmm)
    #[arg(long)]
    pub duration: Option<String>,

    /// End time (may be combined with --start)
    #[arg(long)]
    pub to: Option<String>,

    /// Image-sequence pattern, glob ('frames/*.png') or printf ('frame%04d.png')
    #[arg(long)]
    pub pattern: Option<String>,

    /// Run gifsicle over the result
    #[arg(long)]
    pub optimize: bool,

    /// gifsicle lossy level (roughly 0-200), used with --optimize
    #[arg(long)]
    pub lossy: Option<u32>,

    /// Fail instead of replacing an existing output
    #[arg(long)]
    pub no_overwrite: bool,
}

/// Integer flag that saturates on overflow; the builder clamps it later.
fn wide_int(value: &str) -> Result<i64> {
    parse_saturating_int("value", value)
}

impl ConvertArgs {
    pub fn options(&self) -> ConversionOptions {
        ConversionOptions::builder()
            .frame_rate(self.fps.clone())
            .max_width(self.max_width)
            .colors(self.colors)
            .dither(self.dither)
            .loop_count(self.loop_count)
            .trim(Trim::new(
                self.start.clone(),
                self.duration.clone(),
                self.to.clone(),
            ))
            .optimize(self.optimize)
            .lossy(self.lossy)
            .overwrite(!self.no_overwrite)
            .build()
    }

    /// Work out input and output, checking what can be checked before any
    /// tool runs.
    pub fn to_job(&self) -> Result<PipelineJob> {
        let input = match (&self.pattern, &self.input) {
            (Some(pattern), _) => InputSource::Sequence(pattern.clone()),
            (None, Some(path)) if path.exists() => InputSource::File(path.clone()),
            (None, Some(path)) => {
                return Err(Error::Usage(format!(
                    "input does not exist: {}",
                    path.display()
                )))
            }
            (None, None) => {
                return Err(Error::Usage(
                    "an input file or --pattern is required".to_string(),
                ))
            }
        };

        let output = match (&self.output, &self.input) {
            (Some(out), _) => out.clone(),
            (None, Some(input)) => input.with_extension("gif"),
            (None, None) => {
                return Err(Error::Usage(
                    "--output is required when converting a --pattern".to_string(),
                ))
            }
        };

        Ok(PipelineJob::new(input, output, self.options()))
    }
}
