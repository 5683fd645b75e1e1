//! Oscilloscope capture layer
//!
//! Everything the analysis core needs from an instrument is "per-channel
//! sampled voltage arrays with known sample rate and start time". The
//! [`Oscilloscope`] trait captures exactly that surface; the composition root
//! picks between the production Rigol driver and the mock at startup.

pub mod mock;
pub mod rigol;
pub mod transport;

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::waveform::{Waveform, WaveformError};

/// Errors from instrument communication and capture
#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("I/O error talking to the instrument")]
    Io(#[from] std::io::Error),
    /// The instrument answered a query with something unparseable
    #[error("unexpected response to {command:?}: {response:?}")]
    UnexpectedResponse { command: String, response: String },
    #[error("instrument did not trigger within {timeout_s} s")]
    TriggerTimeout { timeout_s: f64 },
    /// The requested channel is not available on this instrument
    #[error("channel {0} is not available")]
    UnknownChannel(u8),
    /// Downloaded data violated the waveform invariants
    #[error("captured data is not a valid waveform")]
    Waveform(#[from] WaveformError),
}

/// Edge trigger slope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSlope {
    Rising,
    Falling,
}

/// Interface for oscilloscope implementations
///
/// All channels captured after one trigger share the same trigger-relative
/// time origin; the three-point analyzer relies on this and does not
/// resample or align channels itself.
pub trait Oscilloscope {
    /// Configure the timebase for pulse capture
    ///
    /// # Arguments
    /// * `max_duration` - Maximum expected pulse duration in seconds
    /// * `sample_interval` - Desired time between samples in seconds
    /// * `channels` - Channels to enable for the capture
    fn configure_timebase(
        &mut self,
        max_duration: f64,
        sample_interval: f64,
        channels: &[u8],
    ) -> Result<(), ScopeError>;

    /// Arm a single-shot edge trigger on the given channel
    fn setup_edge_trigger(
        &mut self,
        channel: u8,
        level: f64,
        slope: TriggerSlope,
    ) -> Result<(), ScopeError>;

    /// Block until the instrument triggers or the timeout elapses
    fn wait_for_trigger(&mut self, timeout: Duration) -> Result<(), ScopeError>;

    /// Download the waveform captured on one channel
    fn get_waveform(&mut self, channel: u8) -> Result<Waveform, ScopeError>;

    /// Download several channels from the same trigger event
    fn get_waveforms(&mut self, channels: &[u8]) -> Result<BTreeMap<u8, Waveform>, ScopeError> {
        let mut waveforms = BTreeMap::new();
        for &channel in channels {
            waveforms.insert(channel, self.get_waveform(channel)?);
        }
        Ok(waveforms)
    }
}
