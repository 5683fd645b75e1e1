//! Mock oscilloscope
//!
//! Synthesizes clean square photodiode pulses instead of talking to hardware.
//! Used as the test double for the capture flow and behind the `--mock` CLI
//! flag for offline runs. All channels share the same trigger-relative time
//! origin, matching the guarantee the real instrument provides.

use std::collections::BTreeMap;
use std::time::Duration;

use super::{Oscilloscope, ScopeError, TriggerSlope};
use crate::waveform::Waveform;

/// A synthetic square pulse on one mock channel
#[derive(Debug, Clone, Copy)]
pub struct MockPulse {
    /// Baseline voltage outside the pulse
    pub baseline_v: f64,
    /// Voltage during the pulse
    pub amplitude_v: f64,
    /// Rising edge time in seconds, relative to the trigger
    pub rising_edge_s: f64,
    /// Pulse width in seconds
    pub width_s: f64,
}

/// Oscilloscope double producing configurable synthetic pulses
///
/// Channels without a configured pulse do not exist; a capture with no
/// channels at all never triggers.
pub struct MockOscilloscope {
    sample_rate: f64,
    start_time: f64,
    capture_duration: f64,
    pulses: BTreeMap<u8, MockPulse>,
    trigger_level: Option<f64>,
}

impl MockOscilloscope {
    pub fn new() -> Self {
        Self {
            sample_rate: 1e6,
            start_time: -0.009,
            capture_duration: 0.01,
            pulses: BTreeMap::new(),
            trigger_level: None,
        }
    }

    /// Add a synthetic pulse on `channel`
    pub fn with_pulse(mut self, channel: u8, pulse: MockPulse) -> Self {
        self.pulses.insert(channel, pulse);
        self
    }

    /// Three staggered channels resembling a horizontal curtain at 1/125
    ///
    /// The exposure ends at t = 0 where the falling-edge trigger fires, as in
    /// a real capture.
    pub fn with_demo_pulses() -> Self {
        let width = 0.008;
        let mut scope = Self::new();
        for (channel, rising_edge_s) in [(1u8, -0.011), (2, -0.0095), (3, -width)] {
            scope = scope.with_pulse(
                channel,
                MockPulse {
                    baseline_v: 0.05,
                    amplitude_v: 2.1,
                    rising_edge_s,
                    width_s: width,
                },
            );
        }
        scope
    }

    /// Trigger level recorded from the last [`Oscilloscope::setup_edge_trigger`] call
    pub fn trigger_level(&self) -> Option<f64> {
        self.trigger_level
    }
}

impl Default for MockOscilloscope {
    fn default() -> Self {
        Self::new()
    }
}

impl Oscilloscope for MockOscilloscope {
    fn configure_timebase(
        &mut self,
        max_duration: f64,
        sample_interval: f64,
        _channels: &[u8],
    ) -> Result<(), ScopeError> {
        self.sample_rate = 1.0 / sample_interval;
        self.capture_duration = max_duration;
        // Trigger near the right edge of the window, like the real setup
        self.start_time = -max_duration * 0.9;
        Ok(())
    }

    fn setup_edge_trigger(
        &mut self,
        _channel: u8,
        level: f64,
        _slope: TriggerSlope,
    ) -> Result<(), ScopeError> {
        self.trigger_level = Some(level);
        Ok(())
    }

    fn wait_for_trigger(&mut self, timeout: Duration) -> Result<(), ScopeError> {
        if self.pulses.is_empty() {
            return Err(ScopeError::TriggerTimeout {
                timeout_s: timeout.as_secs_f64(),
            });
        }
        Ok(())
    }

    fn get_waveform(&mut self, channel: u8) -> Result<Waveform, ScopeError> {
        let pulse = self
            .pulses
            .get(&channel)
            .ok_or(ScopeError::UnknownChannel(channel))?;

        let samples = (self.capture_duration * self.sample_rate) as usize;
        let falling_edge_s = pulse.rising_edge_s + pulse.width_s;
        let voltages = (0..samples)
            .map(|i| {
                let t = self.start_time + i as f64 / self.sample_rate;
                if t >= pulse.rising_edge_s && t < falling_edge_s {
                    pulse.amplitude_v
                } else {
                    pulse.baseline_v
                }
            })
            .collect();

        Ok(Waveform::new(voltages, self.sample_rate, self.start_time)?)
    }
}
