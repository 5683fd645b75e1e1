//! Capture persistence
//!
//! Writes captures and their measurements to versioned JSON documents, plus a
//! plain CSV export. Samples are rounded to 1 µV on the way out to keep the
//! files compact; nothing downstream resolves finer than that.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::pulse::PulseMetrics;
use crate::analysis::three_point::{Orientation, ThreePointConfig, ThreePointMetrics};
use crate::waveform::{Waveform, WaveformError};

/// Current JSON schema version
pub const WAVEFORM_JSON_VERSION: u32 = 1;

/// Errors from reading and writing capture files
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("capture file I/O failed")]
    Io(#[from] std::io::Error),
    #[error("capture file is not valid JSON")]
    Json(#[from] serde_json::Error),
    #[error("unsupported waveform file version: {0}")]
    UnsupportedVersion(u32),
    #[error("capture file does not contain a valid waveform")]
    Waveform(#[from] WaveformError),
}

/// Single-point capture document (schema version 1)
#[derive(Debug, Serialize, Deserialize)]
struct WaveformDocument {
    version: u32,
    capture_time: DateTime<Utc>,
    sample_rate_hz: f64,
    start_time_s: f64,
    samples: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shutter_speed_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shutter_speed_fraction: Option<String>,
}

/// One channel inside a three-point document
#[derive(Debug, Serialize, Deserialize)]
struct ChannelDocument {
    label: String,
    sample_rate_hz: f64,
    start_time_s: f64,
    samples: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PulseSummary {
    pulse_width_s: f64,
    shutter_speed_fraction: String,
}

impl PulseSummary {
    fn from_metrics(metrics: &PulseMetrics) -> Self {
        Self {
            pulse_width_s: metrics.pulse_width_s,
            shutter_speed_fraction: metrics.shutter_speed_fraction(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MeasurementsDocument {
    first: PulseSummary,
    center: PulseSummary,
    last: PulseSummary,
    first_to_center_delay_s: f64,
    center_to_last_delay_s: f64,
    shutter_travel_time_s: f64,
    shutter_velocity_m_per_s: f64,
    timing_uniformity: f64,
}

/// Three-point capture document (schema version 1)
#[derive(Debug, Serialize, Deserialize)]
struct ThreePointDocument {
    version: u32,
    mode: String,
    capture_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    orientation: Option<Orientation>,
    channels: BTreeMap<String, ChannelDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    measurements: Option<MeasurementsDocument>,
}

fn rounded_samples(waveform: &Waveform) -> Vec<f64> {
    waveform
        .voltages()
        .iter()
        .map(|v| (v * 1e6).round() / 1e6)
        .collect()
}

/// Label a channel by its position in the travel order, so the per-channel
/// labels always agree with the measurements block
fn channel_label(channel: u8, config: &ThreePointConfig) -> String {
    let (first, center, last) = config.ordered_channels();
    if channel == first {
        "first".to_string()
    } else if channel == center {
        "center".to_string()
    } else if channel == last {
        "last".to_string()
    } else {
        format!("channel_{channel}")
    }
}

/// Save a single-point capture, optionally with its measurement
pub fn save_waveform_json(
    waveform: &Waveform,
    path: &Path,
    metrics: Option<&PulseMetrics>,
) -> Result<(), StorageError> {
    let document = WaveformDocument {
        version: WAVEFORM_JSON_VERSION,
        capture_time: Utc::now(),
        sample_rate_hz: waveform.sample_rate(),
        start_time_s: waveform.start_time(),
        samples: rounded_samples(waveform),
        shutter_speed_s: metrics.map(|m| m.pulse_width_s),
        shutter_speed_fraction: metrics.map(|m| m.shutter_speed_fraction()),
    };

    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer(file, &document)?;
    tracing::info!(path = %path.display(), samples = waveform.len(), "waveform_saved");
    Ok(())
}

/// Load a single-point capture saved by [`save_waveform_json`]
pub fn load_waveform_json(path: &Path) -> Result<Waveform, StorageError> {
    let document: WaveformDocument = serde_json::from_reader(File::open(path)?)?;
    if document.version != WAVEFORM_JSON_VERSION {
        return Err(StorageError::UnsupportedVersion(document.version));
    }
    Ok(Waveform::new(
        document.samples,
        document.sample_rate_hz,
        document.start_time_s,
    )?)
}

/// Save a capture as `time_s,voltage_v` CSV rows
pub fn save_waveform_csv(waveform: &Waveform, path: &Path) -> Result<(), StorageError> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "time_s,voltage_v")?;
    for (t, v) in waveform.times().iter().zip(waveform.voltages()) {
        writeln!(file, "{t:.9},{v:.6}")?;
    }
    Ok(())
}

/// Save a three-point capture, optionally with its measurements
///
/// `config` supplies the channel-to-travel-order mapping so each channel is
/// labelled by the position the curtain reaches it in, not by its number.
pub fn save_three_point_json(
    waveforms: &BTreeMap<u8, Waveform>,
    path: &Path,
    config: &ThreePointConfig,
    metrics: Option<&ThreePointMetrics>,
) -> Result<(), StorageError> {
    let channels = waveforms
        .iter()
        .map(|(&channel, waveform)| {
            (
                channel.to_string(),
                ChannelDocument {
                    label: channel_label(channel, config),
                    sample_rate_hz: waveform.sample_rate(),
                    start_time_s: waveform.start_time(),
                    samples: rounded_samples(waveform),
                },
            )
        })
        .collect();

    let document = ThreePointDocument {
        version: WAVEFORM_JSON_VERSION,
        mode: "three_point".to_string(),
        capture_time: Utc::now(),
        orientation: metrics.map(|m| m.orientation),
        channels,
        measurements: metrics.map(|m| MeasurementsDocument {
            first: PulseSummary::from_metrics(&m.first),
            center: PulseSummary::from_metrics(&m.center),
            last: PulseSummary::from_metrics(&m.last),
            first_to_center_delay_s: m.first_to_center_delay_s,
            center_to_last_delay_s: m.center_to_last_delay_s,
            shutter_travel_time_s: m.shutter_travel_time_s,
            shutter_velocity_m_per_s: m.shutter_velocity_m_per_s(),
            timing_uniformity: m.timing_uniformity(),
        }),
    };

    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer(file, &document)?;
    tracing::info!(path = %path.display(), channels = waveforms.len(), "three_point_saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pulse::measure_pulse_width;

    fn pulse_waveform() -> Waveform {
        let mut v = vec![0.0; 20];
        v.extend(vec![3.3; 60]);
        v.extend(vec![0.0; 20]);
        Waveform::new(v, 1e6, -20e-6).unwrap()
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");
        let waveform = pulse_waveform();
        let metrics = measure_pulse_width(&waveform).unwrap();

        save_waveform_json(&waveform, &path, Some(&metrics)).unwrap();
        let loaded = load_waveform_json(&path).unwrap();

        assert_eq!(loaded.len(), waveform.len());
        assert_eq!(loaded.sample_rate(), waveform.sample_rate());
        assert_eq!(loaded.start_time(), waveform.start_time());
        assert_eq!(loaded.voltages(), waveform.voltages());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");
        std::fs::write(
            &path,
            r#"{"version":99,"capture_time":"2026-01-01T00:00:00Z","sample_rate_hz":1e6,"start_time_s":0.0,"samples":[0.0]}"#,
        )
        .unwrap();

        assert!(matches!(
            load_waveform_json(&path),
            Err(StorageError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_samples_rounded_to_microvolts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");
        let waveform = Waveform::new(vec![0.123456789, 1.0000004], 1e6, 0.0).unwrap();

        save_waveform_json(&waveform, &path, None).unwrap();
        let loaded = load_waveform_json(&path).unwrap();

        assert_eq!(loaded.voltages(), &[0.123457, 1.0]);
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.csv");
        let waveform = Waveform::new(vec![0.0, 1.5], 1e6, 0.0).unwrap();

        save_waveform_csv(&waveform, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("time_s,voltage_v"));
        assert_eq!(lines.next(), Some("0.000000000,0.000000"));
        assert_eq!(lines.next(), Some("0.000001000,1.500000"));
    }

    fn staggered_capture(order: [u8; 3]) -> BTreeMap<u8, Waveform> {
        let mut waveforms = BTreeMap::new();
        for (idx, &channel) in order.iter().enumerate() {
            let lead = 10 + idx * 10;
            let mut v = vec![0.0; lead];
            v.extend(vec![3.3; 60]);
            v.extend(vec![0.0; 100 - lead - 60]);
            waveforms.insert(channel, Waveform::new(v, 1e6, 0.0).unwrap());
        }
        waveforms
    }

    #[test]
    fn test_three_point_document_contents() {
        use crate::analysis::three_point::measure_three_point;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three_point.json");

        let waveforms = staggered_capture([1, 2, 3]);
        let config = ThreePointConfig::default();
        let metrics = measure_three_point(&waveforms, &config).unwrap();

        save_three_point_json(&waveforms, &path, &config, Some(&metrics)).unwrap();

        let value: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["mode"], "three_point");
        assert_eq!(value["orientation"], "horizontal");
        assert_eq!(value["channels"]["1"]["label"], "first");
        assert_eq!(value["channels"]["2"]["label"], "center");
        assert_eq!(value["channels"]["3"]["label"], "last");
        let measurements = &value["measurements"];
        assert!(measurements["shutter_travel_time_s"].as_f64().unwrap() > 0.0);
        assert!(measurements["timing_uniformity"].as_f64().unwrap() > 99.0);
        assert_eq!(
            measurements["first"]["shutter_speed_fraction"],
            format!("1/{}", (1.0 / metrics.first.pulse_width_s).round() as i64)
        );
    }

    #[test]
    fn test_vertical_labels_follow_travel_order() {
        use crate::analysis::three_point::measure_three_point;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("three_point.json");

        // Vertical run: channel 3 (top sensor) fires first
        let waveforms = staggered_capture([3, 2, 1]);
        let config = ThreePointConfig {
            orientation: Orientation::Vertical,
            ..ThreePointConfig::default()
        };
        let metrics = measure_three_point(&waveforms, &config).unwrap();

        save_three_point_json(&waveforms, &path, &config, Some(&metrics)).unwrap();

        let value: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["orientation"], "vertical");
        // Labels must match the order the curtain reached the sensors, so the
        // channel tagged "first" is the one the measurements block used as first
        assert_eq!(value["channels"]["3"]["label"], "first");
        assert_eq!(value["channels"]["2"]["label"], "center");
        assert_eq!(value["channels"]["1"]["label"], "last");
        assert!(
            (metrics.first.rising_edge_time
                - crate::analysis::pulse::measure_pulse_width(&waveforms[&3])
                    .unwrap()
                    .rising_edge_time)
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn test_custom_channels_outside_mapping_keep_numeric_labels() {
        let config = ThreePointConfig::default();
        assert_eq!(channel_label(7, &config), "channel_7");
        assert_eq!(channel_label(1, &config), "first");
    }
}
