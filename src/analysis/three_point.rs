//! Three-point shutter travel analysis
//!
//! Runs pulse detection on three photodiode channels spread across the film
//! gate and derives how long the curtain took to travel between them, how
//! fast it moved, and how evenly it exposed the frame. All three channels
//! must share the same trigger-relative time origin; the capture layer
//! guarantees this.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::pulse::{measure_pulse_width, PulseError, PulseMetrics};
use crate::waveform::Waveform;

/// Shutter travel direction across the sensor row
///
/// The three sensors sit in a fixed row. For a horizontally travelling
/// shutter the row spans the long (36 mm) side of a 35mm frame and the
/// curtain reaches the left sensor first. For a vertically travelling
/// shutter the camera is mounted rotated, the row spans the short (24 mm)
/// side, and the curtain runs top to bottom - reaching what is wired as the
/// right channel first. This mapping is a caller-supplied contract, not
/// inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Distance between the first and last sensor in millimetres
    ///
    /// 36.0 for horizontal and 24.0 for vertical, the 35mm-film frame
    /// dimensions.
    pub fn sensor_spacing_mm(&self) -> f64 {
        match self {
            Orientation::Horizontal => 36.0,
            Orientation::Vertical => 24.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel assignment and orientation for a three-point measurement
///
/// Defaults to channels 1/2/3 in left/center/right order, horizontal travel.
#[derive(Debug, Clone, Copy)]
pub struct ThreePointConfig {
    /// Channel wired to the left sensor (top sensor when rotated for vertical)
    pub left_channel: u8,
    /// Channel wired to the center sensor
    pub center_channel: u8,
    /// Channel wired to the right sensor (bottom sensor when rotated)
    pub right_channel: u8,
    /// Travel direction of the shutter under test
    pub orientation: Orientation,
}

impl Default for ThreePointConfig {
    fn default() -> Self {
        Self {
            left_channel: 1,
            center_channel: 2,
            right_channel: 3,
            orientation: Orientation::Horizontal,
        }
    }
}

impl ThreePointConfig {
    /// Channels mapped to (first, center, last) for this orientation
    pub fn ordered_channels(&self) -> (u8, u8, u8) {
        match self.orientation {
            Orientation::Horizontal => (self.left_channel, self.center_channel, self.right_channel),
            Orientation::Vertical => (self.right_channel, self.center_channel, self.left_channel),
        }
    }
}

/// Errors from three-point analysis
///
/// Any per-channel failure aborts the whole measurement; a partial
/// three-point result is never returned.
#[derive(Error, Debug)]
pub enum ThreePointError {
    /// A configured channel was not present in the capture
    #[error("channel {0} is missing from the capture")]
    MissingChannel(u8),
    /// Pulse detection failed on one channel
    #[error("pulse measurement failed on channel {channel}")]
    ChannelPulse {
        channel: u8,
        #[source]
        source: PulseError,
    },
    /// The pulses arrived in an order that contradicts the configured
    /// orientation, which signals a wrong orientation argument or sensor
    /// miswiring
    #[error(
        "pulse order contradicts {orientation} orientation \
         (first-to-center {first_to_center_s} s, center-to-last {center_to_last_s} s)"
    )]
    InconsistentPulseOrder {
        orientation: &'static str,
        first_to_center_s: f64,
        center_to_last_s: f64,
    },
}

/// Results from a three-point shutter travel measurement
///
/// "first" is the sensor the curtain reaches first under the configured
/// orientation; "last" the one it reaches last. Velocity, spacing and
/// uniformity are derived on demand rather than stored.
#[derive(Debug, Clone)]
pub struct ThreePointMetrics {
    pub first: PulseMetrics,
    pub center: PulseMetrics,
    pub last: PulseMetrics,
    pub orientation: Orientation,
    /// Rising-edge delay from the first to the center sensor, seconds
    pub first_to_center_delay_s: f64,
    /// Rising-edge delay from the center to the last sensor, seconds
    pub center_to_last_delay_s: f64,
    /// Rising-edge delay from the first to the last sensor, seconds
    pub shutter_travel_time_s: f64,
}

impl ThreePointMetrics {
    /// Distance between the first and last sensor in millimetres
    pub fn sensor_spacing_mm(&self) -> f64 {
        self.orientation.sensor_spacing_mm()
    }

    /// Curtain velocity in metres per second
    ///
    /// 0.0 when the travel time is not positive.
    pub fn shutter_velocity_m_per_s(&self) -> f64 {
        if self.shutter_travel_time_s > 0.0 {
            (self.sensor_spacing_mm() / 1000.0) / self.shutter_travel_time_s
        } else {
            0.0
        }
    }

    /// Exposure uniformity index in [0, 100]
    ///
    /// 100 means all three pulse widths are identical; the score drops by
    /// the largest relative deviation from the mean width.
    pub fn timing_uniformity(&self) -> f64 {
        let widths = [
            self.first.pulse_width_s,
            self.center.pulse_width_s,
            self.last.pulse_width_s,
        ];
        let mean = widths.iter().sum::<f64>() / widths.len() as f64;
        if mean == 0.0 {
            return 0.0;
        }
        let max_dev = widths
            .iter()
            .map(|w| (w - mean).abs())
            .fold(0.0, f64::max);
        (100.0 * (1.0 - max_dev / mean)).max(0.0)
    }

    pub fn first_to_center_delay_ms(&self) -> f64 {
        self.first_to_center_delay_s * 1000.0
    }

    pub fn center_to_last_delay_ms(&self) -> f64 {
        self.center_to_last_delay_s * 1000.0
    }

    pub fn shutter_travel_time_ms(&self) -> f64 {
        self.shutter_travel_time_s * 1000.0
    }
}

/// Run pulse detection across three channels and derive travel metrics
///
/// Each configured channel is measured with
/// [`measure_pulse_width`]; a failure on any channel aborts the measurement
/// tagged with the originating channel id. Delays are computed between
/// rising edges in first/center/last order; a negative delay means the
/// configured orientation does not match how the sensors fired and is
/// reported as [`ThreePointError::InconsistentPulseOrder`] instead of a
/// nonsensical travel time.
pub fn measure_three_point(
    waveforms: &BTreeMap<u8, Waveform>,
    config: &ThreePointConfig,
) -> Result<ThreePointMetrics, ThreePointError> {
    let (first_ch, center_ch, last_ch) = config.ordered_channels();

    let first = measure_channel(waveforms, first_ch)?;
    let center = measure_channel(waveforms, center_ch)?;
    let last = measure_channel(waveforms, last_ch)?;

    let first_to_center_delay_s = center.rising_edge_time - first.rising_edge_time;
    let center_to_last_delay_s = last.rising_edge_time - center.rising_edge_time;
    let shutter_travel_time_s = last.rising_edge_time - first.rising_edge_time;

    if first_to_center_delay_s < 0.0 || center_to_last_delay_s < 0.0 {
        return Err(ThreePointError::InconsistentPulseOrder {
            orientation: config.orientation.as_str(),
            first_to_center_s: first_to_center_delay_s,
            center_to_last_s: center_to_last_delay_s,
        });
    }

    let metrics = ThreePointMetrics {
        first,
        center,
        last,
        orientation: config.orientation,
        first_to_center_delay_s,
        center_to_last_delay_s,
        shutter_travel_time_s,
    };

    tracing::info!(
        orientation = config.orientation.as_str(),
        travel_time_ms = %format!("{:.3}", metrics.shutter_travel_time_ms()),
        velocity_m_per_s = %format!("{:.3}", metrics.shutter_velocity_m_per_s()),
        uniformity = %format!("{:.1}", metrics.timing_uniformity()),
        "three_point_measured"
    );

    Ok(metrics)
}

fn measure_channel(
    waveforms: &BTreeMap<u8, Waveform>,
    channel: u8,
) -> Result<PulseMetrics, ThreePointError> {
    let waveform = waveforms
        .get(&channel)
        .ok_or(ThreePointError::MissingChannel(channel))?;
    measure_pulse_width(waveform)
        .map_err(|source| ThreePointError::ChannelPulse { channel, source })
}
