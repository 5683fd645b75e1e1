//! Sampled waveform buffer with trigger-relative timing
//!
//! A [`Waveform`] stores the voltage samples downloaded from one oscilloscope
//! channel together with the metadata needed to reconstruct sample times:
//! `time(i) = start_time + i / sample_rate`. Instances are immutable once
//! constructed; transformations such as [`Waveform::trim`] produce new buffers.

use thiserror::Error;

use crate::analysis::pulse::PulseMetrics;

/// Errors from waveform construction and trimming
#[derive(Error, Debug)]
pub enum WaveformError {
    /// The sample buffer was empty
    #[error("waveform contains no samples")]
    NoSamples,
    /// The sample rate was zero or negative
    #[error("sample rate must be positive, got {0} Hz")]
    NonPositiveSampleRate(f64),
    /// A trim window did not overlap the sampled data
    #[error("trim window [{start_s} s, {end_s} s] does not overlap the waveform")]
    EmptyTrimResult { start_s: f64, end_s: f64 },
}

/// Captured waveform data from one oscilloscope channel
///
/// Samples are uniformly spaced. `start_time` is relative to the trigger
/// event at t = 0, so pre-trigger samples carry negative times.
///
/// # Example
/// ```
/// use shutterscope::waveform::Waveform;
///
/// let waveform = Waveform::new(vec![0.0, 1.0, 0.0], 1e6, 0.0).unwrap();
/// assert_eq!(waveform.len(), 3);
/// assert_eq!(waveform.time_at(2), 2e-6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    voltages: Vec<f64>,
    sample_rate: f64,
    start_time: f64,
}

impl Waveform {
    /// Create a waveform, validating the buffer invariants
    ///
    /// # Arguments
    /// * `voltages` - Voltage samples in volts
    /// * `sample_rate` - Sample rate in Hz, must be positive
    /// * `start_time` - Time of the first sample in seconds, relative to the trigger
    ///
    /// # Errors
    /// [`WaveformError::NoSamples`] if `voltages` is empty,
    /// [`WaveformError::NonPositiveSampleRate`] if `sample_rate <= 0`.
    pub fn new(voltages: Vec<f64>, sample_rate: f64, start_time: f64) -> Result<Self, WaveformError> {
        if voltages.is_empty() {
            return Err(WaveformError::NoSamples);
        }
        if !(sample_rate > 0.0) {
            return Err(WaveformError::NonPositiveSampleRate(sample_rate));
        }
        Ok(Self {
            voltages,
            sample_rate,
            start_time,
        })
    }

    /// Voltage samples in volts
    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Time of the first sample in seconds, relative to the trigger event
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Number of samples in the buffer (always at least 1)
    pub fn len(&self) -> usize {
        self.voltages.len()
    }

    /// Always false; an empty buffer cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.voltages.is_empty()
    }

    /// Time of sample `i` in seconds
    pub fn time_at(&self, i: usize) -> f64 {
        self.start_time + i as f64 / self.sample_rate
    }

    /// Time between adjacent samples in seconds
    pub fn sample_period(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Total duration covered by the buffer in seconds
    pub fn duration(&self) -> f64 {
        self.voltages.len() as f64 / self.sample_rate
    }

    /// Generate the time value for every sample
    pub fn times(&self) -> Vec<f64> {
        (0..self.voltages.len()).map(|i| self.time_at(i)).collect()
    }

    /// Return a new waveform restricted to `[start_time, end_time)`
    ///
    /// Indices are computed by flooring `(t - self.start_time) * sample_rate`
    /// and clamping to the buffer, so a window that extends past either end is
    /// silently truncated to the available data.
    ///
    /// # Errors
    /// [`WaveformError::EmptyTrimResult`] if the window does not intersect
    /// the sampled data.
    ///
    /// # Example
    /// ```
    /// use shutterscope::waveform::Waveform;
    ///
    /// let waveform = Waveform::new(vec![0.0; 10_000], 1e6, 0.0).unwrap();
    /// let trimmed = waveform.trim(0.0005, 0.0095).unwrap();
    /// assert_eq!(trimmed.len(), 9_000);
    /// assert_eq!(trimmed.start_time(), 0.0005);
    /// ```
    pub fn trim(&self, start_time: f64, end_time: f64) -> Result<Self, WaveformError> {
        let start_idx = ((start_time - self.start_time) * self.sample_rate)
            .floor()
            .max(0.0) as usize;
        let end_idx = ((end_time - self.start_time) * self.sample_rate)
            .floor()
            .max(0.0)
            .min(self.voltages.len() as f64) as usize;

        if end_idx <= start_idx {
            return Err(WaveformError::EmptyTrimResult {
                start_s: start_time,
                end_s: end_time,
            });
        }

        Ok(Self {
            voltages: self.voltages[start_idx..end_idx].to_vec(),
            sample_rate: self.sample_rate,
            start_time: self.start_time + start_idx as f64 / self.sample_rate,
        })
    }

    /// Trim to the pulse region described by `metrics`, with a margin on both sides
    ///
    /// The margin is `metrics.pulse_width_s * margin_fraction`, so short pulses
    /// keep proportionally short lead-in and lead-out.
    pub fn trim_to_pulse(
        &self,
        metrics: &PulseMetrics,
        margin_fraction: f64,
    ) -> Result<Self, WaveformError> {
        let margin = metrics.pulse_width_s * margin_fraction;
        self.trim(
            metrics.rising_edge_time - margin,
            metrics.falling_edge_time + margin,
        )
    }
}
