//! Pure display formatters for the dashboard.
//!
//! # Invariants
//! - Elapsed under one hour renders as `MM:SS:CC` (centiseconds).
//! - Elapsed of one hour or more renders as `HH:MM:SS`, hours modulo 24.
//! - Formatters never panic on negative input; it is clamped to zero.

/// Elapsed milliseconds at which the formatter switches to `HH:MM:SS`.
pub const HOUR_FORMAT_THRESHOLD_MS: i64 = 3_600_000;

/// Text shown by an idle or reset stopwatch.
pub const DEFAULT_TIME_TEXT: &str = "00:00:00";

/// Placeholder shown before a sensor produced its first value.
pub const PLACEHOLDER_TEXT: &str = "--";

/// Formats elapsed stopwatch time.
///
/// ```
/// use sensorlap_core::format_elapsed;
/// assert_eq!(format_elapsed(65_432), "01:05:43");
/// assert_eq!(format_elapsed(3_723_000), "01:02:03");
/// ```
pub fn format_elapsed(elapsed_ms: i64) -> String {
    let elapsed_ms = elapsed_ms.max(0);
    let seconds = (elapsed_ms / 1_000) % 60;
    let minutes = (elapsed_ms / 60_000) % 60;
    if elapsed_ms < HOUR_FORMAT_THRESHOLD_MS {
        let centis = (elapsed_ms % 1_000) / 10;
        format!("{minutes:02}:{seconds:02}:{centis:02}")
    } else {
        let hours = (elapsed_ms / HOUR_FORMAT_THRESHOLD_MS) % 24;
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// Decibel value with two decimals.
pub fn format_decibels(decibel_level: f64) -> String {
    format!("{decibel_level:.2}")
}

pub fn noise_text(decibel_level: Option<f64>) -> String {
    match decibel_level {
        Some(level) => format!("Noise: {} dB", format_decibels(level)),
        None => format!("Noise: {PLACEHOLDER_TEXT} dB"),
    }
}

/// Lux is shown exactly as the sensor reported it.
pub fn light_text(lux: Option<f32>) -> String {
    match lux {
        Some(lux) => format!("Light: {lux} lx"),
        None => format!("Light: {PLACEHOLDER_TEXT} lx"),
    }
}

pub fn heart_rate_text(bpm: Option<u32>) -> String {
    match bpm {
        Some(bpm) => format!("Heart rate: {bpm} bpm"),
        None => format!("Heart rate: {PLACEHOLDER_TEXT} bpm"),
    }
}

pub fn step_count_text(steps: Option<i64>) -> String {
    match steps {
        Some(steps) => format!("Steps: {steps}"),
        None => format!("Steps: {PLACEHOLDER_TEXT}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{format_decibels, format_elapsed, heart_rate_text, light_text};

    #[test]
    fn under_an_hour_uses_centiseconds() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(65_432), "01:05:43");
        assert_eq!(format_elapsed(3_599_999), "59:59:99");
    }

    #[test]
    fn an_hour_or_more_uses_hours() {
        assert_eq!(format_elapsed(3_600_000), "01:00:00");
        assert_eq!(format_elapsed(3_723_456), "01:02:03");
    }

    #[test]
    fn hours_wrap_at_a_day() {
        assert_eq!(format_elapsed(25 * 3_600_000 + 61_000), "01:01:01");
    }

    #[test]
    fn negative_elapsed_is_clamped() {
        assert_eq!(format_elapsed(-5_000), "00:00:00");
    }

    #[test]
    fn decibels_keep_two_decimals() {
        assert_eq!(format_decibels(20.0), "20.00");
        assert_eq!(format_decibels(3.14159), "3.14");
    }

    #[test]
    fn sensor_texts_show_placeholder_without_value() {
        assert_eq!(heart_rate_text(None), "Heart rate: -- bpm");
        assert_eq!(heart_rate_text(Some(72)), "Heart rate: 72 bpm");
        assert_eq!(light_text(Some(120.0)), "Light: 120 lx");
    }

    #[test]
    fn light_text_keeps_reported_precision() {
        assert_eq!(light_text(Some(12.34)), "Light: 12.34 lx");
        assert_eq!(light_text(Some(0.005)), "Light: 0.005 lx");
        assert_eq!(light_text(None), "Light: -- lx");
    }
}
