//! Waveform analysis for shutter timing measurement
//!
//! The analysis pipeline is pure and synchronous: a captured [`crate::waveform::Waveform`]
//! goes into [`pulse::measure_pulse_width`] (single sensor) or
//! [`three_point::measure_three_point`] (three sensors), and the resulting
//! metrics are handed to the storage and plot layers.

pub mod pulse;
pub mod speed;
pub mod three_point;
