//! Filter-graph construction.
//!
//! The graph is a linear prefix (frame rate, optional downscale) followed by
//! the two-pass palette technique: the stream is split, one branch feeds
//! `palettegen`, the other is remapped onto that palette by `paletteuse`.

use gifify_core::{ConversionOptions, DitherMode, FrameRate};

/// Bayer pattern scale; 5 keeps the pattern subtle while staying cheap to
/// compress.
const BAYER_SCALE: u8 = 5;

/// `paletteuse` dither argument for a mode.
pub fn dither_option(dither: DitherMode) -> String {
    match dither {
        DitherMode::Sierra2_4a => "dither=sierra2_4a".to_string(),
        DitherMode::Bayer => format!("dither=bayer:bayer_scale={BAYER_SCALE}"),
        DitherMode::FloydSteinberg => "dither=floyd_steinberg".to_string(),
        DitherMode::None => "dither=none".to_string(),
    }
}

/// Build the filter-graph expression for a conversion.
///
/// ```
/// use gifify_av::filter::build_filter;
/// use gifify_core::{DitherMode, FrameRate};
///
/// let vf = build_filter(&FrameRate::default(), None, 64, DitherMode::None);
/// assert_eq!(
///     vf,
///     "fps=12,split[s0][s1];[s0]palettegen=stats_mode=diff:max_colors=64[p];[s1][p]paletteuse=dither=none"
/// );
/// ```
pub fn build_filter(
    frame_rate: &FrameRate,
    max_width: Option<u32>,
    colors: u16,
    dither: DitherMode,
) -> String {
    let mut linear = vec![format!("fps={frame_rate}")];

    // min(iw,W) never upscales a source narrower than W; -1 keeps the aspect.
    if let Some(width) = max_width {
        linear.push(format!("scale='min(iw,{width})':-1:flags=lanczos"));
    }

    let prefix = linear.join(",");
    let split = if prefix.is_empty() {
        "split[s0][s1]".to_string()
    } else {
        format!("{prefix},split[s0][s1]")
    };
    let palettegen = format!("[s0]palettegen=stats_mode=diff:max_colors={colors}[p]");
    let paletteuse = format!("[s1][p]paletteuse={}", dither_option(dither));

    format!("{split};{palettegen};{paletteuse}")
}

/// [`build_filter`] over a resolved option set.
pub fn filter_for(options: &ConversionOptions) -> String {
    build_filter(
        options.frame_rate(),
        options.max_width(),
        options.colors(),
        options.dither(),
    )
}
