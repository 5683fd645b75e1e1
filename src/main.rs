//! Shutterscope - shutter speed measurement CLI
//!
//! Composition root: picks the oscilloscope implementation, runs one capture,
//! analyzes it, and writes the results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use shutterscope::scope::mock::MockOscilloscope;
use shutterscope::scope::rigol::RigolDs1000z;
use shutterscope::scope::{Oscilloscope, TriggerSlope};
use shutterscope::waveform::Waveform;
use shutterscope::{
    measure_pulse_width, measure_three_point, plot, storage, Orientation, ThreePointConfig,
    DEFAULT_SAMPLE_INTERVAL, DEFAULT_TRIGGER_LEVEL, MAX_CAPTURE_WINDOW, TRIM_MARGIN_FRACTION,
};

/// Shutter travel direction as a command-line value
///
/// Thin shim over [`Orientation`] so the analysis core stays free of CLI
/// concerns.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OrientationArg {
    Horizontal,
    Vertical,
}

impl From<OrientationArg> for Orientation {
    fn from(arg: OrientationArg) -> Self {
        match arg {
            OrientationArg::Horizontal => Orientation::Horizontal,
            OrientationArg::Vertical => Orientation::Vertical,
        }
    }
}

/// Capture waveform data from a Rigol DS1000Z oscilloscope and measure
/// camera shutter speed
#[derive(Parser, Debug)]
#[command(name = "shutterscope", version)]
struct Cli {
    /// Instrument address (e.g. 192.168.1.100:5555). Required unless --mock.
    address: Option<String>,

    /// Trigger level in volts
    #[arg(long, default_value_t = DEFAULT_TRIGGER_LEVEL)]
    trigger_level: f64,

    /// Capture three channels and measure shutter travel
    #[arg(long)]
    three_point: bool,

    /// Shutter travel direction for three-point measurement
    #[arg(long, value_enum, default_value = "horizontal")]
    orientation: OrientationArg,

    /// Margin around the pulse when trimming, as a fraction of pulse width
    #[arg(long, default_value_t = TRIM_MARGIN_FRACTION)]
    margin: f64,

    /// Also save a plot next to the JSON output
    #[arg(long)]
    plot: bool,

    /// Also save a time_s,voltage_v CSV next to the JSON output
    #[arg(long)]
    csv: bool,

    /// Output JSON path
    #[arg(long, default_value = "capture.json")]
    output: PathBuf,

    /// Trigger wait timeout in seconds
    #[arg(long, default_value_t = 30.0)]
    timeout: f64,

    /// Use the built-in mock oscilloscope instead of real hardware
    #[arg(long)]
    mock: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shutterscope=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut scope: Box<dyn Oscilloscope> = if cli.mock {
        println!("Using mock oscilloscope");
        Box::new(MockOscilloscope::with_demo_pulses())
    } else {
        let address = cli
            .address
            .as_deref()
            .context("an instrument address is required unless --mock is given")?;
        println!("Connecting to {address}...");
        let mut rigol = RigolDs1000z::open_tcp(address, Duration::from_secs(5))
            .with_context(|| format!("failed to connect to {address}"))?;
        let identity = rigol.identify()?;
        println!("Connected: {identity}");
        Box::new(rigol)
    };

    if cli.three_point {
        run_three_point(scope.as_mut(), &cli)
    } else {
        run_single_point(scope.as_mut(), &cli)
    }
}

fn prepare_capture(scope: &mut dyn Oscilloscope, cli: &Cli, channels: &[u8]) -> Result<()> {
    scope.configure_timebase(MAX_CAPTURE_WINDOW, DEFAULT_SAMPLE_INTERVAL, channels)?;
    println!("Configured oscilloscope");

    // The photodiode signal drops when the exposure ends, so trigger on the
    // falling edge of channel 1
    scope.setup_edge_trigger(1, cli.trigger_level, TriggerSlope::Falling)?;
    println!(
        "Trigger set on channel 1 at {}V (falling edge)",
        cli.trigger_level
    );

    println!("Waiting for trigger...");
    scope.wait_for_trigger(Duration::from_secs_f64(cli.timeout))?;
    println!("Triggered! Downloading waveform...");
    Ok(())
}

fn run_single_point(scope: &mut dyn Oscilloscope, cli: &Cli) -> Result<()> {
    prepare_capture(scope, cli, &[1])?;
    let mut waveform = scope.get_waveform(1)?;

    let metrics = match measure_pulse_width(&waveform) {
        Ok(metrics) => {
            println!(
                "Shutter speed: {:.2} ms ({})",
                metrics.pulse_width_ms(),
                metrics.shutter_speed_fraction()
            );
            waveform = waveform.trim_to_pulse(&metrics, cli.margin)?;
            Some(metrics)
        }
        Err(err) => {
            warn!(error = %err, "pulse_measurement_failed");
            println!("Warning: could not measure pulse: {err}");
            None
        }
    };

    storage::save_waveform_json(&waveform, &cli.output, metrics.as_ref())?;
    println!(
        "Saved {} samples to {}",
        waveform.len(),
        cli.output.display()
    );

    if cli.csv {
        let path = cli.output.with_extension("csv");
        storage::save_waveform_csv(&waveform, &path)?;
        println!("Saved CSV to {}", path.display());
    }

    if cli.plot {
        let path = plot_path(&cli.output);
        plot::save_waveform_plot(&waveform, &path)?;
        println!("Saved plot to {}", path.display());
    }
    Ok(())
}

fn run_three_point(scope: &mut dyn Oscilloscope, cli: &Cli) -> Result<()> {
    let config = ThreePointConfig {
        orientation: cli.orientation.into(),
        ..ThreePointConfig::default()
    };
    let channels = [
        config.left_channel,
        config.center_channel,
        config.right_channel,
    ];

    prepare_capture(scope, cli, &channels)?;
    let waveforms = scope.get_waveforms(&channels)?;

    let metrics =
        measure_three_point(&waveforms, &config).context("three-point measurement failed")?;

    println!(
        "Shutter speed (center): {:.2} ms ({})",
        metrics.center.pulse_width_ms(),
        metrics.center.shutter_speed_fraction()
    );
    println!(
        "Travel time: {:.2} ms, velocity: {:.2} m/s, uniformity: {:.1}%",
        metrics.shutter_travel_time_ms(),
        metrics.shutter_velocity_m_per_s(),
        metrics.timing_uniformity()
    );

    // Trim each channel to its own pulse before storing
    let (first_ch, center_ch, last_ch) = config.ordered_channels();
    let mut trimmed = BTreeMap::new();
    for (channel, channel_metrics) in [
        (first_ch, &metrics.first),
        (center_ch, &metrics.center),
        (last_ch, &metrics.last),
    ] {
        let waveform: &Waveform = &waveforms[&channel];
        trimmed.insert(channel, waveform.trim_to_pulse(channel_metrics, cli.margin)?);
    }

    storage::save_three_point_json(&trimmed, &cli.output, &config, Some(&metrics))?;
    println!("Saved three-point capture to {}", cli.output.display());

    if cli.plot {
        let path = plot_path(&cli.output);
        plot::save_three_point_plot(&trimmed, &path, &config)?;
        println!("Saved plot to {}", path.display());
    }
    Ok(())
}

fn plot_path(output: &Path) -> PathBuf {
    output.with_extension("png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_argument_maps_to_analysis_type() {
        let cli = Cli::try_parse_from(["shutterscope", "--mock", "--orientation", "vertical"])
            .unwrap();
        assert_eq!(Orientation::from(cli.orientation), Orientation::Vertical);

        let cli = Cli::try_parse_from(["shutterscope", "--mock"]).unwrap();
        assert_eq!(Orientation::from(cli.orientation), Orientation::Horizontal);
    }
}
