//! Conversion option types.
//!
//! [`ConversionOptions`] is immutable once built. The only way to obtain one
//! is [`ConversionOptionsBuilder::build`], which clamps the palette size and
//! normalizes non-positive widths to "no downscale".

use std::fmt;
use std::num::IntErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default output frame rate.
pub const DEFAULT_FPS: u32 = 12;
/// Default maximum output width in pixels.
pub const DEFAULT_MAX_WIDTH: i64 = 480;
/// Smallest palette the quantizer accepts.
pub const MIN_COLORS: u16 = 2;
/// Largest palette a GIF can carry.
pub const MAX_COLORS: u16 = 256;

// ---------------------------------------------------------------------------
// FrameRate
// ---------------------------------------------------------------------------

/// A strictly positive frame rate, either decimal (`12`, `12.5`) or rational
/// (`30000/1001`).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRate {
    text: String,
}

impl FrameRate {
    fn decimal(value: f64) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::invalid_option(
                "fps",
                format!("must be a positive number, got {value}"),
            ));
        }
        Ok(Self {
            text: value.to_string(),
        })
    }

    /// Textual form handed to the filter graph.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self {
            text: DEFAULT_FPS.to_string(),
        }
    }
}

impl FromStr for FrameRate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((num, den)) = s.split_once('/') {
            let parse = |part: &str| {
                part.trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|v| *v > 0)
                    .ok_or_else(|| {
                        Error::invalid_option("fps", format!("invalid rational frame rate: {s}"))
                    })
            };
            let (num, den) = (parse(num)?, parse(den)?);
            return Ok(Self {
                text: format!("{num}/{den}"),
            });
        }

        let value: f64 = s
            .parse()
            .map_err(|_| Error::invalid_option("fps", format!("not a number: {s}")))?;
        Self::decimal(value)
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ---------------------------------------------------------------------------
// DitherMode
// ---------------------------------------------------------------------------

/// Strategy used when mapping frames onto the generated palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DitherMode {
    /// Two-row Sierra error diffusion; best quality for most footage.
    #[default]
    Sierra2_4a,
    /// Ordered Bayer pattern; cheaper and compresses well.
    Bayer,
    /// Floyd–Steinberg error diffusion.
    FloydSteinberg,
    /// No dithering, flat quantization.
    None,
}

impl DitherMode {
    /// All recognized modes, in display order.
    pub const ALL: [DitherMode; 4] = [
        DitherMode::Sierra2_4a,
        DitherMode::Bayer,
        DitherMode::FloydSteinberg,
        DitherMode::None,
    ];

    /// The wire / CLI name of this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            DitherMode::Sierra2_4a => "sierra2_4a",
            DitherMode::Bayer => "bayer",
            DitherMode::FloydSteinberg => "floyd_steinberg",
            DitherMode::None => "none",
        }
    }
}

impl FromStr for DitherMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| {
                Error::invalid_option(
                    "dither",
                    format!(
                        "unknown mode '{s}' (expected one of sierra2_4a, bayer, floyd_steinberg, none)"
                    ),
                )
            })
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Trim
// ---------------------------------------------------------------------------

/// Time-trim markers. Each value is an opaque timecode (`5`, `00:01:02.500`)
/// passed through to the processor untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trim {
    pub start: Option<String>,
    pub duration: Option<String>,
    pub end: Option<String>,
}

impl Trim {
    /// Build trim markers, dropping blank values.
    pub fn new(start: Option<String>, duration: Option<String>, end: Option<String>) -> Self {
        fn clean(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }
        Self {
            start: clean(start),
            duration: clean(duration),
            end: clean(end),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.duration.is_none() && self.end.is_none()
    }
}

// ---------------------------------------------------------------------------
// InputSource
// ---------------------------------------------------------------------------

/// How an image-sequence pattern is interpreted by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Shell glob (`frames/*.png`).
    Glob,
    /// Sequential-index template (`frame%04d.png`).
    Printf,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A single video (or any container the processor can decode).
    File(PathBuf),
    /// An ordered image sequence described by a pattern.
    Sequence(String),
}

impl InputSource {
    /// Pattern classification; `None` for single files.
    pub fn pattern_kind(&self) -> Option<PatternKind> {
        match self {
            InputSource::File(_) => None,
            InputSource::Sequence(pattern) => {
                if pattern.contains(&['*', '?', '['][..]) {
                    Some(PatternKind::Glob)
                } else {
                    Some(PatternKind::Printf)
                }
            }
        }
    }

    /// The locator string handed to the processor's `-i` flag.
    pub fn locator(&self) -> String {
        match self {
            InputSource::File(path) => path.to_string_lossy().into_owned(),
            InputSource::Sequence(pattern) => pattern.clone(),
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::File(path) => write!(f, "{}", path.display()),
            InputSource::Sequence(pattern) => write!(f, "sequence '{pattern}'"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConversionOptions
// ---------------------------------------------------------------------------

/// Canonical, validated conversion parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    frame_rate: FrameRate,
    max_width: Option<u32>,
    colors: u16,
    dither: DitherMode,
    loop_count: u32,
    trim: Trim,
    optimize: bool,
    lossy: Option<u32>,
    overwrite: bool,
}

impl ConversionOptions {
    pub fn builder() -> ConversionOptionsBuilder {
        ConversionOptionsBuilder::default()
    }

    pub fn frame_rate(&self) -> &FrameRate {
        &self.frame_rate
    }

    /// Maximum output width; `None` keeps the source dimensions.
    pub fn max_width(&self) -> Option<u32> {
        self.max_width
    }

    /// Palette size, always within `[MIN_COLORS, MAX_COLORS]`.
    pub fn colors(&self) -> u16 {
        self.colors
    }

    pub fn dither(&self) -> DitherMode {
        self.dither
    }

    /// Loop count; 0 loops forever.
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn trim(&self) -> &Trim {
        &self.trim
    }

    pub fn optimize(&self) -> bool {
        self.optimize
    }

    /// Lossy level for the optimizer, only meaningful when optimizing.
    pub fn lossy(&self) -> Option<u32> {
        self.lossy
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    /// Copy of these options with the overwrite policy replaced.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

impl Default for ConversionOptions {
    fn default() -> Self {
        ConversionOptionsBuilder::default().build()
    }
}

/// Collects raw, possibly out-of-range values and normalizes them in
/// [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ConversionOptionsBuilder {
    frame_rate: FrameRate,
    max_width: i64,
    colors: i64,
    dither: DitherMode,
    loop_count: u32,
    trim: Trim,
    optimize: bool,
    lossy: Option<u32>,
    overwrite: bool,
}

impl Default for ConversionOptionsBuilder {
    fn default() -> Self {
        Self {
            frame_rate: FrameRate::default(),
            max_width: DEFAULT_MAX_WIDTH,
            colors: i64::from(MAX_COLORS),
            dither: DitherMode::default(),
            loop_count: 0,
            trim: Trim::default(),
            optimize: false,
            lossy: None,
            overwrite: true,
        }
    }
}

impl ConversionOptionsBuilder {
    pub fn frame_rate(mut self, frame_rate: FrameRate) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Maximum width; values ≤ 0 disable downscaling.
    pub fn max_width(mut self, max_width: i64) -> Self {
        self.max_width = max_width;
        self
    }

    /// Palette size; clamped into `[MIN_COLORS, MAX_COLORS]` on build.
    pub fn colors(mut self, colors: i64) -> Self {
        self.colors = colors;
        self
    }

    pub fn dither(mut self, dither: DitherMode) -> Self {
        self.dither = dither;
        self
    }

    pub fn loop_count(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn trim(mut self, trim: Trim) -> Self {
        self.trim = trim;
        self
    }

    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn lossy(mut self, lossy: Option<u32>) -> Self {
        self.lossy = lossy;
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Normalize and freeze the options.
    pub fn build(self) -> ConversionOptions {
        ConversionOptions {
            frame_rate: self.frame_rate,
            max_width: normalize_max_width(self.max_width),
            colors: clamp_colors(self.colors),
            dither: self.dither,
            loop_count: self.loop_count,
            trim: self.trim,
            optimize: self.optimize,
            lossy: self.lossy,
            overwrite: self.overwrite,
        }
    }
}

/// Non-positive widths mean "keep the source width".
pub fn normalize_max_width(max_width: i64) -> Option<u32> {
    if max_width <= 0 {
        None
    } else {
        Some(u32::try_from(max_width).unwrap_or(u32::MAX))
    }
}

/// Clamp a requested palette size into the range a GIF can encode.
pub fn clamp_colors(colors: i64) -> u16 {
    let clamped = colors.clamp(i64::from(MIN_COLORS), i64::from(MAX_COLORS));
    if clamped != colors {
        tracing::debug!(requested = colors, clamped, "palette size clamped");
    }
    // In range by construction.
    clamped as u16
}

/// Parse an integer option, saturating values beyond the `i64` range.
///
/// Used for fields that are clamped or normalized afterwards, where an
/// absurdly long number means "as large (or small) as possible" rather than
/// a malformed request.
pub fn parse_saturating_int(field: &str, value: &str) -> Result<i64> {
    let value = value.trim();
    match value.parse::<i64>() {
        Ok(n) => Ok(n),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => Ok(i64::MAX),
            IntErrorKind::NegOverflow => Ok(i64::MIN),
            _ => Err(Error::invalid_option(
                field,
                format!("expected an integer, got '{value}'"),
            )),
        },
    }
}
