//! Shutterscope - camera shutter speed measurement
//!
//! Captures photodiode waveforms from an oscilloscope and derives shutter
//! timing: single-point exposure time, and three-point curtain travel
//! (velocity and exposure uniformity across the frame). The analysis core is
//! pure and synchronous; instrument I/O, persistence, and plotting live in
//! their own modules.

pub mod analysis;
pub mod plot;
pub mod scope;
pub mod storage;
pub mod waveform;

pub use analysis::pulse::{measure_pulse_width, PulseError, PulseMetrics};
pub use analysis::speed::format_fraction;
pub use analysis::three_point::{
    measure_three_point, Orientation, ThreePointConfig, ThreePointError, ThreePointMetrics,
};
pub use scope::Oscilloscope;
pub use waveform::{Waveform, WaveformError};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default edge trigger level in volts
pub const DEFAULT_TRIGGER_LEVEL: f64 = 0.2;

/// Default sample interval in seconds (1 microsecond)
pub const DEFAULT_SAMPLE_INTERVAL: f64 = 1e-6;

/// Maximum capture window in seconds (1 second covers most mechanical shutters)
pub const MAX_CAPTURE_WINDOW: f64 = 1.0;

/// Default margin around the pulse when trimming, as a fraction of pulse width
pub const TRIM_MARGIN_FRACTION: f64 = 0.1;
