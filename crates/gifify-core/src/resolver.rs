//! Resolution of raw key/value option candidates into [`ConversionOptions`].
//!
//! A request may carry two layers of options: a base layer (query-string
//! pairs) and an override layer (multipart form fields). For every field the
//! first non-empty value wins in the order override → base → default.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::options::{parse_saturating_int, ConversionOptions, DitherMode, FrameRate, Trim};

pub const KEY_FPS: &str = "fps";
pub const KEY_MAX_WIDTH: &str = "max_width";
pub const KEY_COLORS: &str = "colors";
pub const KEY_DITHER: &str = "dither";
pub const KEY_LOOP: &str = "loop";
pub const KEY_START: &str = "start";
pub const KEY_DURATION: &str = "duration";
pub const KEY_TO: &str = "to";
pub const KEY_OPTIMIZE: &str = "optimize";
pub const KEY_LOSSY: &str = "lossy";

/// One source of raw option values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionLayer {
    values: BTreeMap<String, String>,
}

impl OptionLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; a later insert for the same key replaces the earlier one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Non-blank value for `key`, trimmed.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionLayer {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut layer = Self::new();
        for (k, v) in iter {
            layer.insert(k, v);
        }
        layer
    }
}

/// Turns option layers into one canonical [`ConversionOptions`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptionResolver;

impl RequestOptionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `base` and optional `overrides` into validated options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] naming the first field that fails to
    /// parse, or an unrecognized dither mode. Integers too long to represent
    /// saturate and are then clamped like any other out-of-range value.
    pub fn resolve(
        &self,
        base: &OptionLayer,
        overrides: Option<&OptionLayer>,
    ) -> Result<ConversionOptions> {
        let value = |key: &str| pick(key, base, overrides);

        let mut builder = ConversionOptions::builder();

        if let Some(v) = value(KEY_FPS) {
            builder = builder.frame_rate(v.parse::<FrameRate>()?);
        }
        if let Some(v) = value(KEY_MAX_WIDTH) {
            builder = builder.max_width(parse_saturating_int(KEY_MAX_WIDTH, v)?);
        }
        if let Some(v) = value(KEY_COLORS) {
            builder = builder.colors(parse_saturating_int(KEY_COLORS, v)?);
        }
        if let Some(v) = value(KEY_DITHER) {
            builder = builder.dither(v.parse::<DitherMode>()?);
        }
        if let Some(v) = value(KEY_LOOP) {
            builder = builder.loop_count(parse_number(KEY_LOOP, v)?);
        }
        if let Some(v) = value(KEY_OPTIMIZE) {
            builder = builder.optimize(parse_bool(v));
        }
        if let Some(v) = value(KEY_LOSSY) {
            builder = builder.lossy(Some(parse_number(KEY_LOSSY, v)?));
        }

        let trim = Trim::new(
            value(KEY_START).map(str::to_string),
            value(KEY_DURATION).map(str::to_string),
            value(KEY_TO).map(str::to_string),
        );
        if !trim.is_empty() {
            builder = builder.trim(trim);
        }

        Ok(builder.build())
    }
}

fn pick<'a>(
    key: &str,
    base: &'a OptionLayer,
    overrides: Option<&'a OptionLayer>,
) -> Option<&'a str> {
    overrides.and_then(|o| o.get(key)).or_else(|| base.get(key))
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        Error::invalid_option(field, format!("expected an integer, got '{value}'"))
    })
}

/// Lenient HTML-form boolean: `1`, `true`, `on`, `yes` are true, anything
/// else is false.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(pairs: &[(&str, &str)]) -> OptionLayer {
        pairs.iter().copied().collect()
    }

    #[test]
    fn empty_layers_give_defaults() {
        let opts = RequestOptionResolver::new()
            .resolve(&OptionLayer::new(), None)
            .unwrap();
        assert_eq!(opts, ConversionOptions::default());
    }

    #[test]
    fn override_wins_then_clamps() {
        let base = layer(&[("colors", "100")]);
        let form = layer(&[("colors", "300")]);
        let opts = RequestOptionResolver::new()
            .resolve(&base, Some(&form))
            .unwrap();
        assert_eq!(opts.colors(), 256);
    }

    #[test]
    fn empty_override_falls_back_to_base() {
        let base = layer(&[("fps", "20"), ("dither", "bayer")]);
        let form = layer(&[("fps", ""), ("dither", "  ")]);
        let opts = RequestOptionResolver::new()
            .resolve(&base, Some(&form))
            .unwrap();
        assert_eq!(opts.frame_rate().as_str(), "20");
        assert_eq!(opts.dither(), DitherMode::Bayer);
    }

    #[test]
    fn override_only_fields_are_applied() {
        let base = layer(&[("loop", "3")]);
        let form = layer(&[("optimize", "on"), ("lossy", "80"), ("start", "1.5")]);
        let opts = RequestOptionResolver::new()
            .resolve(&base, Some(&form))
            .unwrap();
        assert_eq!(opts.loop_count(), 3);
        assert!(opts.optimize());
        assert_eq!(opts.lossy(), Some(80));
        assert_eq!(opts.trim().start.as_deref(), Some("1.5"));
    }

    #[test]
    fn non_positive_width_is_unset() {
        let opts = RequestOptionResolver::new()
            .resolve(&layer(&[("max_width", "0")]), None)
            .unwrap();
        assert_eq!(opts.max_width(), None);

        let opts = RequestOptionResolver::new()
            .resolve(&layer(&[("max_width", "-20")]), None)
            .unwrap();
        assert_eq!(opts.max_width(), None);
    }

    #[test]
    fn low_colors_clamp_to_two() {
        let opts = RequestOptionResolver::new()
            .resolve(&layer(&[("colors", "0")]), None)
            .unwrap();
        assert_eq!(opts.colors(), 2);
    }

    #[test]
    fn unparsable_numbers_name_the_field() {
        for (key, value) in [
            ("colors", "lots"),
            ("max_width", "wide"),
            ("loop", "-1"),
            ("lossy", "1.5"),
            ("fps", "fast"),
        ] {
            let err = RequestOptionResolver::new()
                .resolve(&layer(&[(key, value)]), None)
                .unwrap_err();
            match err {
                Error::InvalidOption { field, .. } => assert_eq!(field, key),
                other => panic!("unexpected error for {key}: {other}"),
            }
        }
    }

    #[test]
    fn unknown_dither_is_rejected() {
        let err = RequestOptionResolver::new()
            .resolve(&layer(&[("dither", "atkinson")]), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOption { ref field, .. } if field == "dither"));
    }

    #[test]
    fn bool_parsing_is_lenient() {
        for v in ["1", "true", "TRUE", "on", "Yes"] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["0", "false", "off", "no", "maybe"] {
            assert!(!parse_bool(v), "{v}");
        }
    }

    #[test]
    fn overlong_numbers_are_clamped_not_rejected() {
        let opts = RequestOptionResolver::new()
            .resolve(&layer(&[("colors", "99999999999999999999")]), None)
            .unwrap();
        assert_eq!(opts.colors(), 256);

        let opts = RequestOptionResolver::new()
            .resolve(&layer(&[("colors", "-99999999999999999999")]), None)
            .unwrap();
        assert_eq!(opts.colors(), 2);

        let opts = RequestOptionResolver::new()
            .resolve(&layer(&[("max_width", "99999999999999999999")]), None)
            .unwrap();
        assert_eq!(opts.max_width(), Some(u32::MAX));

        let opts = RequestOptionResolver::new()
            .resolve(&layer(&[("max_width", "-99999999999999999999")]), None)
            .unwrap();
        assert_eq!(opts.max_width(), None);
    }
}
