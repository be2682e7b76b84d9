//! gifify-core: conversion options, option resolution, and the unified error
//! type shared by the pipeline crate and the binary.
//!
//! Everything that reaches the pipeline passes through
//! [`ConversionOptionsBuilder::build`], so clamping and normalization happen
//! in exactly one place regardless of whether the values came from CLI flags
//! or an HTTP request.

pub mod error;
pub mod options;
pub mod resolver;

pub use error::{Error, Result};
pub use options::{
    ConversionOptions, ConversionOptionsBuilder, DitherMode, FrameRate, InputSource,
    PatternKind, Trim,
};
pub use options::parse_saturating_int;
pub use resolver::{OptionLayer, RequestOptionResolver};
