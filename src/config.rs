// src/config.rs
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OCR_MAX_PAGES: usize = 5;
/// Pages with less extractable text than this are considered scanned.
pub const DEFAULT_MIN_TEXT_CHARS: usize = 50;
pub const DEFAULT_STROKE_MAX_PROPORTION: f64 = 0.01;
pub const DEFAULT_COLUMN_TOLERANCE: f64 = 0.03;
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 120;

/// Runtime knobs of the extraction pipeline. Pattern tables are not part of
/// this: they are compiled once into process-wide statics.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub ocr_max_pages: usize,
    pub min_text_chars: usize,
    pub stroke_max_proportion: f64,
    pub column_tolerance: f64,
    pub ocr_timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_max_pages: DEFAULT_OCR_MAX_PAGES,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            stroke_max_proportion: DEFAULT_STROKE_MAX_PROPORTION,
            column_tolerance: DEFAULT_COLUMN_TOLERANCE,
            ocr_timeout: Duration::from_secs(DEFAULT_OCR_TIMEOUT_SECS),
        }
    }
}

impl ExtractionConfig {
    /// Defaults overlaid with `SDS_*` environment variables. Unparsable
    /// values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = parse_var(&lookup, "SDS_OCR_MAX_PAGES") {
            config.ocr_max_pages = v;
        }
        if let Some(v) = parse_var(&lookup, "SDS_MIN_TEXT_CHARS") {
            config.min_text_chars = v;
        }
        if let Some(v) = parse_var(&lookup, "SDS_STROKE_MAX_PROPORTION") {
            config.stroke_max_proportion = v;
        }
        if let Some(v) = parse_var(&lookup, "SDS_COLUMN_TOLERANCE") {
            config.column_tolerance = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, "SDS_OCR_TIMEOUT_SECS") {
            config.ocr_timeout = Duration::from_secs(v);
        }
        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            tracing::debug!("Using {}={} from environment", key, raw);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.ocr_max_pages, 5);
        assert_eq!(config.min_text_chars, 50);
    }

    #[test]
    fn test_env_overlay_ignores_garbage() {
        let vars: HashMap<&str, &str> =
            [("SDS_OCR_MAX_PAGES", "3"), ("SDS_COLUMN_TOLERANCE", "wide"), ("SDS_OCR_TIMEOUT_SECS", "10")]
                .into_iter()
                .collect();
        let config = ExtractionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.ocr_max_pages, 3);
        assert_eq!(config.column_tolerance, DEFAULT_COLUMN_TOLERANCE);
        assert_eq!(config.ocr_timeout, Duration::from_secs(10));
    }
}
