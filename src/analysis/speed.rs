//! Shutter speed fraction formatting

/// Format a pulse width as a conventional shutter-speed fraction
///
/// The denominator is `1 / pulse_width_s` rounded to the nearest integer,
/// not snapped to the standard speed table: a 7.95 ms pulse reports "1/126",
/// not "1/125". Non-positive widths return "N/A".
///
/// # Example
/// ```
/// use shutterscope::analysis::speed::format_fraction;
///
/// assert_eq!(format_fraction(0.008), "1/125");
/// assert_eq!(format_fraction(0.001), "1/1000");
/// assert_eq!(format_fraction(0.0), "N/A");
/// ```
pub fn format_fraction(pulse_width_s: f64) -> String {
    if pulse_width_s <= 0.0 {
        return "N/A".to_string();
    }
    let denominator = (1.0 / pulse_width_s).round() as i64;
    format!("1/{denominator}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_speeds() {
        assert_eq!(format_fraction(0.008), "1/125");
        assert_eq!(format_fraction(0.001), "1/1000");
        assert_eq!(format_fraction(0.0333), "1/30");
    }

    #[test]
    fn test_rounds_to_nearest_denominator() {
        // 8.05ms -> 124.2 -> 1/124, off the standard table on purpose
        assert_eq!(format_fraction(0.00805), "1/124");
        assert_eq!(format_fraction(0.00795), "1/126");
    }

    #[test]
    fn test_non_positive_width_is_sentinel() {
        assert_eq!(format_fraction(0.0), "N/A");
        assert_eq!(format_fraction(-0.01), "N/A");
    }
}
