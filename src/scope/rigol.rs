//! Rigol DS1000Z series driver
//!
//! Speaks SCPI over a [`ScpiTransport`] and downloads full-memory captures in
//! RAW byte mode. Scaling quirks of this family are handled here: the
//! waveform preamble reports wrong increments in RAW mode, so voltage scaling
//! is derived from the channel scale (8-bit ADC over 8 divisions) and the
//! sample rate is queried directly.

use std::time::{Duration, Instant};

use super::transport::{ScpiTransport, TcpTransport};
use super::{Oscilloscope, ScopeError, TriggerSlope};
use crate::waveform::Waveform;

/// Valid single-channel memory depth settings for the DS1000Z
const MEMORY_DEPTHS: [u64; 6] = [1_000, 10_000, 100_000, 1_000_000, 6_000_000, 12_000_000];

/// Maximum points per `:WAVeform:DATA?` read; larger transfers are flaky
const DOWNLOAD_CHUNK_POINTS: u64 = 250_000;

/// Poll interval while waiting for the trigger
const TRIGGER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause after `:STOP` before starting a download
const STOP_SETTLE: Duration = Duration::from_millis(100);

/// Rigol DS1000Z oscilloscope over a SCPI transport
pub struct RigolDs1000z<T: ScpiTransport> {
    transport: T,
}

impl RigolDs1000z<TcpTransport> {
    /// Connect over raw LXI TCP (port 5555 on this family)
    pub fn open_tcp(addr: &str, timeout: Duration) -> Result<Self, ScopeError> {
        let transport = TcpTransport::connect(addr, timeout)?;
        Ok(Self::new(transport))
    }
}

impl<T: ScpiTransport> RigolDs1000z<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Query the instrument identification string
    pub fn identify(&mut self) -> Result<String, ScopeError> {
        self.transport.query("*IDN?")
    }

    fn query_f64(&mut self, command: &str) -> Result<f64, ScopeError> {
        let response = self.transport.query(command)?;
        response
            .trim()
            .parse()
            .map_err(|_| ScopeError::UnexpectedResponse {
                command: command.to_string(),
                response,
            })
    }

    /// Pick the valid memory depth closest to the desired point count
    fn closest_memory_depth(desired: u64) -> u64 {
        let mut depth = MEMORY_DEPTHS[0];
        for &candidate in &MEMORY_DEPTHS {
            if candidate <= desired {
                depth = candidate;
            } else {
                if candidate.abs_diff(desired) < depth.abs_diff(desired) {
                    depth = candidate;
                }
                break;
            }
        }
        depth
    }
}

impl<T: ScpiTransport> Oscilloscope for RigolDs1000z<T> {
    /// Configure timebase for pulse capture
    ///
    /// The capture window is sized so `max_duration` fits in 10 of the 12
    /// horizontal divisions, the trigger is pushed 5 divisions to the right
    /// (most of the window shows pre-trigger signal, since the scope triggers
    /// on the falling edge at the end of the exposure), and the vertical
    /// scale puts a 0-2.5V photodiode signal on screen with margin.
    fn configure_timebase(
        &mut self,
        max_duration: f64,
        sample_interval: f64,
        channels: &[u8],
    ) -> Result<(), ScopeError> {
        self.transport.write(":STOP")?;

        let time_per_div = max_duration / 10.0;
        let total_time = time_per_div * 12.0;
        let desired_depth = (total_time / sample_interval) as u64;
        let memory_depth = Self::closest_memory_depth(desired_depth);

        tracing::debug!(
            time_per_div,
            memory_depth,
            desired_depth,
            "timebase_configured"
        );

        self.transport
            .write(&format!(":TIMebase:MAIN:SCALe {time_per_div}"))?;
        self.transport
            .write(&format!(":ACQuire:MDEPth {memory_depth}"))?;

        let trigger_offset = -time_per_div * 5.0;
        self.transport
            .write(&format!(":TIMebase:MAIN:OFFSet {trigger_offset}"))?;

        for &channel in channels {
            self.transport.write(&format!(":CHAN{channel}:SCALe 0.5"))?;
            self.transport.write(&format!(":CHAN{channel}:OFFSet -1.5"))?;
            self.transport.write(&format!(":CHAN{channel}:DISPlay ON"))?;
        }
        Ok(())
    }

    fn setup_edge_trigger(
        &mut self,
        channel: u8,
        level: f64,
        slope: TriggerSlope,
    ) -> Result<(), ScopeError> {
        self.transport.write(":TRIGger:MODE EDGE")?;
        self.transport
            .write(&format!(":TRIGger:EDGe:SOURce CHAN{channel}"))?;
        self.transport
            .write(&format!(":TRIGger:EDGe:LEVel {level}"))?;
        let slope_cmd = match slope {
            TriggerSlope::Rising => "POSitive",
            TriggerSlope::Falling => "NEGative",
        };
        self.transport
            .write(&format!(":TRIGger:EDGe:SLOPe {slope_cmd}"))?;
        self.transport.write(":TRIGger:SWEep SINGle")?;
        self.transport.write(":SINGle")?;
        Ok(())
    }

    fn wait_for_trigger(&mut self, timeout: Duration) -> Result<(), ScopeError> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.transport.query(":TRIGger:STATus?")?;
            match status.trim() {
                "TD" | "STOP" => return Ok(()),
                _ => {}
            }
            if Instant::now() >= deadline {
                return Err(ScopeError::TriggerTimeout {
                    timeout_s: timeout.as_secs_f64(),
                });
            }
            std::thread::sleep(TRIGGER_POLL_INTERVAL);
        }
    }

    /// Download one channel in RAW binary mode, full memory depth
    fn get_waveform(&mut self, channel: u8) -> Result<Waveform, ScopeError> {
        self.transport.write(":STOP")?;
        std::thread::sleep(STOP_SETTLE);

        self.transport
            .write(&format!(":WAVeform:SOURce CHAN{channel}"))?;
        self.transport.write(":WAVeform:MODE RAW")?;
        self.transport.write(":WAVeform:FORMat BYTE")?;

        // Preamble x_increment is wrong in RAW mode, ask for the rate directly
        let sample_rate = self.query_f64(":ACQuire:SRATe?")?;

        let mem_depth = self.transport.query(":ACQuire:MDEPth?")?;
        let total_points = if mem_depth.trim() == "AUTO" {
            let timebase = self.query_f64(":TIMebase:MAIN:SCALe?")?;
            (sample_rate * timebase * 12.0) as u64
        } else {
            mem_depth
                .trim()
                .parse::<f64>()
                .map_err(|_| ScopeError::UnexpectedResponse {
                    command: ":ACQuire:MDEPth?".to_string(),
                    response: mem_depth.clone(),
                })? as u64
        };

        // 8-bit ADC over 8 vertical divisions: one count is scale/32 volts.
        // The preamble y values cannot be trusted in RAW mode (firmware bug).
        let chan_scale = self.query_f64(&format!(":CHAN{channel}:SCALe?"))?;
        let y_increment = chan_scale / 32.0;
        let chan_offset = self.query_f64(&format!(":CHAN{channel}:OFFSet?"))?;

        // The memory buffer is centered on the screen; the trigger offset
        // shifts where t=0 falls inside it
        let total_duration = total_points as f64 / sample_rate;
        let trigger_offset = self.query_f64(":TIMebase:MAIN:OFFSet?")?;
        let x_origin = -(total_duration / 2.0) + trigger_offset;

        let mut raw_bytes: Vec<u8> = Vec::with_capacity(total_points as usize);
        let mut start = 1u64;
        while start <= total_points {
            let stop = (start + DOWNLOAD_CHUNK_POINTS - 1).min(total_points);
            self.transport.write(&format!(":WAVeform:STARt {start}"))?;
            self.transport.write(&format!(":WAVeform:STOP {stop}"))?;
            let chunk = self.transport.query_binary(":WAVeform:DATA?")?;
            raw_bytes.extend_from_slice(&chunk);
            start = stop + 1;
        }

        tracing::debug!(
            channel,
            points = raw_bytes.len(),
            sample_rate,
            x_origin,
            "waveform_downloaded"
        );

        // Byte 128 sits at screen center, which represents the negated
        // channel offset (positive offset moves the trace down)
        let voltages = raw_bytes
            .iter()
            .map(|&byte| (byte as f64 - 128.0) * y_increment - chan_offset)
            .collect();

        Ok(Waveform::new(voltages, sample_rate, x_origin)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::transport::scripted::ScriptedTransport;
    use super::*;

    #[test]
    fn test_closest_memory_depth() {
        assert_eq!(RigolDs1000z::<ScriptedTransport>::closest_memory_depth(500), 1_000);
        assert_eq!(
            RigolDs1000z::<ScriptedTransport>::closest_memory_depth(1_200_000),
            1_000_000
        );
        // 4M is closer to 6M than to 1M
        assert_eq!(
            RigolDs1000z::<ScriptedTransport>::closest_memory_depth(4_000_000),
            6_000_000
        );
        assert_eq!(
            RigolDs1000z::<ScriptedTransport>::closest_memory_depth(50_000_000),
            12_000_000
        );
    }

    #[test]
    fn test_configure_timebase_command_sequence() {
        let mut scope = RigolDs1000z::new(ScriptedTransport::new());
        scope.configure_timebase(1.0, 1e-6, &[1]).unwrap();

        let sent = &scope.transport.sent;
        assert_eq!(sent[0], ":STOP");
        assert_eq!(sent[1], ":TIMebase:MAIN:SCALe 0.1");
        // 1.2s / 1µs = 1.2M points, closest valid depth is 1M
        assert_eq!(sent[2], ":ACQuire:MDEPth 1000000");
        assert_eq!(sent[3], ":TIMebase:MAIN:OFFSet -0.5");
        assert_eq!(sent[4], ":CHAN1:SCALe 0.5");
        assert_eq!(sent[5], ":CHAN1:OFFSet -1.5");
        assert_eq!(sent[6], ":CHAN1:DISPlay ON");
    }

    #[test]
    fn test_setup_edge_trigger_falling() {
        let mut scope = RigolDs1000z::new(ScriptedTransport::new());
        scope
            .setup_edge_trigger(1, 0.2, TriggerSlope::Falling)
            .unwrap();

        let sent = &scope.transport.sent;
        assert!(sent.contains(&":TRIGger:EDGe:SOURce CHAN1".to_string()));
        assert!(sent.contains(&":TRIGger:EDGe:LEVel 0.2".to_string()));
        assert!(sent.contains(&":TRIGger:EDGe:SLOPe NEGative".to_string()));
        assert_eq!(sent.last().unwrap(), ":SINGle");
    }

    #[test]
    fn test_wait_for_trigger_returns_on_td() {
        let mut transport = ScriptedTransport::new();
        transport.expect_text(":TRIGger:STATus?", "TD");
        let mut scope = RigolDs1000z::new(transport);
        scope.wait_for_trigger(Duration::from_secs(1)).unwrap();
    }

    #[test]
    fn test_get_waveform_scaling() {
        let mut transport = ScriptedTransport::new();
        transport.expect_text(":ACQuire:SRATe?", "1000");
        transport.expect_text(":ACQuire:MDEPth?", "4");
        transport.expect_text(":CHAN1:SCALe?", "3.2");
        transport.expect_text(":CHAN1:OFFSet?", "-1.6");
        transport.expect_text(":TIMebase:MAIN:OFFSet?", "0");
        transport.expect_binary(":WAVeform:DATA?", vec![128, 138, 148, 128]);

        let mut scope = RigolDs1000z::new(transport);
        let waveform = scope.get_waveform(1).unwrap();

        // y_increment = 3.2/32 = 0.1 V per count, offset -1.6V
        let expected = [1.6, 2.6, 3.6, 1.6];
        for (v, e) in waveform.voltages().iter().zip(expected) {
            assert!((v - e).abs() < 1e-12, "got {v}, expected {e}");
        }
        assert_eq!(waveform.sample_rate(), 1000.0);
        // 4 points at 1kHz centered on the trigger
        assert!((waveform.start_time() - (-0.002)).abs() < 1e-12);
    }

    #[test]
    fn test_get_waveform_auto_depth() {
        let mut transport = ScriptedTransport::new();
        transport.expect_text(":ACQuire:SRATe?", "1000");
        transport.expect_text(":ACQuire:MDEPth?", "AUTO");
        transport.expect_text(":TIMebase:MAIN:SCALe?", "0.00025");
        transport.expect_text(":CHAN1:SCALe?", "3.2");
        transport.expect_text(":CHAN1:OFFSet?", "0");
        transport.expect_text(":TIMebase:MAIN:OFFSet?", "0");
        // 1000 * 0.00025 * 12 = 3 points
        transport.expect_binary(":WAVeform:DATA?", vec![128, 160, 128]);

        let mut scope = RigolDs1000z::new(transport);
        let waveform = scope.get_waveform(1).unwrap();
        assert_eq!(waveform.len(), 3);
        assert!((waveform.voltages()[1] - 3.2).abs() < 1e-12);
    }
}
