//! 50%-threshold pulse detection
//!
//! Finds the first complete light pulse in a photodiode waveform by scanning
//! for the points where the signal crosses the midpoint between its observed
//! minimum and maximum, and interpolates both crossings to sub-sample
//! precision. Later pulses in the same buffer are ignored.

use thiserror::Error;

use crate::analysis::speed::format_fraction;
use crate::waveform::Waveform;

/// Errors from pulse detection
#[derive(Error, Debug)]
pub enum PulseError {
    /// The signal never rose through the threshold (includes flat signals,
    /// where min == max and no crossing is possible)
    #[error("no rising edge crossed the {threshold_v} V threshold")]
    PulseNotFound { threshold_v: f64 },
    /// A rising edge was found but the signal never came back down before the
    /// buffer ended
    #[error("rising edge at {rising_edge_time} s has no falling edge before the buffer ends")]
    IncompletePulse { rising_edge_time: f64 },
}

/// Results from a single-sensor pulse width measurement
///
/// All times are in seconds relative to the trigger event, voltages in volts.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseMetrics {
    /// Pulse width in seconds (falling edge minus rising edge)
    pub pulse_width_s: f64,
    /// Interpolated time of the rising threshold crossing
    pub rising_edge_time: f64,
    /// Interpolated time of the falling threshold crossing
    pub falling_edge_time: f64,
    /// Threshold used for edge detection, midway between min and max
    pub threshold_v: f64,
    /// Minimum voltage observed in the buffer
    pub min_v: f64,
    /// Maximum voltage observed in the buffer
    pub max_v: f64,
}

impl PulseMetrics {
    /// Pulse width in milliseconds
    pub fn pulse_width_ms(&self) -> f64 {
        self.pulse_width_s * 1000.0
    }

    /// Shutter speed as a conventional fraction string (e.g. "1/125")
    pub fn shutter_speed_fraction(&self) -> String {
        format_fraction(self.pulse_width_s)
    }
}

/// Measure pulse width using 50% threshold crossing
///
/// The threshold is the midpoint between the buffer's minimum and maximum
/// voltage. The scan looks for the first adjacent sample pair where the
/// signal rises through the threshold (`v[i-1] < threshold <= v[i]`), then
/// for the first pair after it where the signal falls back through
/// (`v[j-1] >= threshold > v[j]`). Both crossing times are linearly
/// interpolated between the bracketing samples.
///
/// Only the first complete rising/falling pair is considered; any later
/// pulses in the same buffer (mechanical bounce, a second shutter event) are
/// deliberately ignored.
///
/// # Errors
/// [`PulseError::PulseNotFound`] if no rising crossing exists,
/// [`PulseError::IncompletePulse`] if the pulse never ends inside the buffer.
///
/// # Example
/// ```
/// use shutterscope::waveform::Waveform;
/// use shutterscope::analysis::pulse::measure_pulse_width;
///
/// // 20µs low, 60µs high, 20µs low at 1MHz
/// let mut voltages = vec![0.0; 20];
/// voltages.extend(vec![3.3; 60]);
/// voltages.extend(vec![0.0; 20]);
/// let waveform = Waveform::new(voltages, 1e6, 0.0).unwrap();
///
/// let metrics = measure_pulse_width(&waveform).unwrap();
/// assert!((metrics.pulse_width_s - 60e-6).abs() < 2e-6);
/// assert!((metrics.threshold_v - 1.65).abs() < 1e-9);
/// ```
pub fn measure_pulse_width(waveform: &Waveform) -> Result<PulseMetrics, PulseError> {
    let voltages = waveform.voltages();
    let dt = waveform.sample_period();

    let min_v = voltages.iter().copied().fold(f64::INFINITY, f64::min);
    let max_v = voltages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = (min_v + max_v) / 2.0;

    // Rising edge: first pair going from below to at-or-above threshold.
    // A flat signal (min == max) can never satisfy the strict inequality.
    let mut rising_idx = None;
    for i in 1..voltages.len() {
        if voltages[i - 1] < threshold && threshold <= voltages[i] {
            rising_idx = Some(i);
            break;
        }
    }
    let rising_idx = rising_idx.ok_or(PulseError::PulseNotFound {
        threshold_v: threshold,
    })?;

    let rising_edge_time = interpolate_crossing(
        voltages[rising_idx - 1],
        voltages[rising_idx],
        threshold,
        waveform.time_at(rising_idx - 1),
        dt,
    );

    // Falling edge: first pair after the rising crossing going from
    // at-or-above to below threshold.
    let mut falling_idx = None;
    for j in rising_idx + 1..voltages.len() {
        if voltages[j - 1] >= threshold && threshold > voltages[j] {
            falling_idx = Some(j);
            break;
        }
    }
    let falling_idx = falling_idx.ok_or(PulseError::IncompletePulse { rising_edge_time })?;

    let falling_edge_time = interpolate_crossing(
        voltages[falling_idx - 1],
        voltages[falling_idx],
        threshold,
        waveform.time_at(falling_idx - 1),
        dt,
    );

    let pulse_width = falling_edge_time - rising_edge_time;

    tracing::debug!(
        pulse_width_ms = %format!("{:.4}", pulse_width * 1000.0),
        rising_edge_time,
        falling_edge_time,
        threshold_v = threshold,
        "pulse_measured"
    );

    Ok(PulseMetrics {
        pulse_width_s: pulse_width,
        rising_edge_time,
        falling_edge_time,
        threshold_v: threshold,
        min_v,
        max_v,
    })
}

/// Linearly interpolate the exact threshold crossing time
///
/// `v1`/`t1` describe the sample before the crossing, `v2` the sample after,
/// `dt` the sample period. The crossing rules guarantee `v1 != v2`.
fn interpolate_crossing(v1: f64, v2: f64, threshold: f64, t1: f64, dt: f64) -> f64 {
    let fraction = (threshold - v1) / (v2 - v1);
    t1 + fraction * dt
}
