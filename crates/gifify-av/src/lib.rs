//! # gifify-av
//!
//! Tool orchestration for gifify.
//!
//! This crate provides functionality for:
//! - Building the palette filter-graph expression from quality parameters
//! - Locating ffmpeg and gifsicle on the host
//! - Running the two-stage conversion with guaranteed scratch cleanup
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gifify_av::{ConversionPipeline, PipelineJob, ToolRegistry, ToolsConfig};
//! use gifify_core::{ConversionOptions, InputSource};
//!
//! # async fn example() -> gifify_core::Result<()> {
//! let tools = Arc::new(ToolRegistry::discover(&ToolsConfig::default()));
//! let pipeline = ConversionPipeline::new(tools);
//! let job = PipelineJob::new(
//!     InputSource::File("clip.mp4".into()),
//!     "clip.gif",
//!     ConversionOptions::builder().optimize(true).build(),
//! );
//! let outcome = pipeline.run(&job).await?;
//! println!("wrote {}", outcome.output.display());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod filter;
pub mod pipeline;
pub mod scratch;
pub mod tools;

// Re-exports
pub use command::{OutputMode, ToolCommand, ToolOutput};
pub use filter::{build_filter, filter_for};
pub use pipeline::{ConversionPipeline, PipelineJob, PipelineOutcome, PipelineWarning};
pub use scratch::{ScratchPath, ScratchSpace};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, ToolsConfig, FFMPEG, GIFSICLE};
