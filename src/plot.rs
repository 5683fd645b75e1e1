//! PNG rendering of captured waveforms
//!
//! Renders single-point and three-point captures with time in milliseconds on
//! the x axis and a dashed marker at t = 0 for the trigger event. Three-point
//! traces use the DS1000Z front-panel channel colors, darkened enough to read
//! on a white background.

use std::collections::BTreeMap;
use std::path::Path;

use plotters::prelude::*;
use thiserror::Error;

use crate::analysis::three_point::ThreePointConfig;
use crate::waveform::Waveform;

/// Errors from plot rendering
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("plot rendering failed: {0}")]
    Render(String),
}

const PLOT_SIZE: (u32, u32) = (1200, 500);

/// DS1000Z channel colors (dark yellow, cyan, magenta)
const CHANNEL_COLORS: [RGBColor; 3] = [
    RGBColor(0xD4, 0xAA, 0x00),
    RGBColor(0x00, 0xCC, 0xCC),
    RGBColor(0xCC, 0x00, 0xCC),
];

fn render_error<E: std::fmt::Display>(err: E) -> PlotError {
    PlotError::Render(err.to_string())
}

/// Axis bounds over a set of waveforms, with a little vertical headroom
fn bounds<'a>(waveforms: impl Iterator<Item = &'a Waveform>) -> ((f64, f64), (f64, f64)) {
    let mut t_min = f64::INFINITY;
    let mut t_max = f64::NEG_INFINITY;
    let mut v_min = f64::INFINITY;
    let mut v_max = f64::NEG_INFINITY;

    for waveform in waveforms {
        t_min = t_min.min(waveform.start_time() * 1000.0);
        t_max = t_max.max((waveform.start_time() + waveform.duration()) * 1000.0);
        for &v in waveform.voltages() {
            v_min = v_min.min(v);
            v_max = v_max.max(v);
        }
    }

    // Flat traces still need a visible y range
    if (v_max - v_min).abs() < 1e-9 {
        v_min -= 0.5;
        v_max += 0.5;
    }
    let headroom = (v_max - v_min) * 0.05;
    ((t_min, t_max), (v_min - headroom, v_max + headroom))
}

fn trace(waveform: &Waveform) -> Vec<(f64, f64)> {
    waveform
        .times()
        .into_iter()
        .map(|t| t * 1000.0)
        .zip(waveform.voltages().iter().copied())
        .collect()
}

fn draw_traces(
    path: &Path,
    caption: &str,
    traces: &[(String, RGBColor, Vec<(f64, f64)>)],
    (t_range, v_range): ((f64, f64), (f64, f64)),
) -> Result<(), PlotError> {
    let root = BitMapBackend::new(path, PLOT_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(caption, ("sans-serif", 24))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(t_range.0..t_range.1, v_range.0..v_range.1)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc("Time (ms)")
        .y_desc("Voltage (V)")
        .light_line_style(BLACK.mix(0.08))
        .draw()
        .map_err(render_error)?;

    // Trigger marker at t = 0
    if t_range.0 < 0.0 && t_range.1 > 0.0 {
        chart
            .draw_series(LineSeries::new(
                vec![(0.0, v_range.0), (0.0, v_range.1)],
                RED.mix(0.6),
            ))
            .map_err(render_error)?
            .label("Trigger")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.mix(0.6)));
    }

    for (label, color, points) in traces {
        let color = *color;
        chart
            .draw_series(LineSeries::new(points.iter().copied(), &color))
            .map_err(render_error)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .border_style(BLACK.mix(0.2))
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    Ok(())
}

/// Render a single-point capture to a PNG file
pub fn save_waveform_plot(waveform: &Waveform, path: &Path) -> Result<(), PlotError> {
    let ranges = bounds(std::iter::once(waveform));
    let traces = vec![("Photodiode".to_string(), CHANNEL_COLORS[0], trace(waveform))];
    draw_traces(path, "Single-Point Shutter Measurement", &traces, ranges)?;
    tracing::info!(path = %path.display(), "plot_saved");
    Ok(())
}

/// Render a three-point capture to a PNG file, one trace per channel
///
/// Traces are labelled by the travel order from `config`, matching the labels
/// in the persisted document.
pub fn save_three_point_plot(
    waveforms: &BTreeMap<u8, Waveform>,
    path: &Path,
    config: &ThreePointConfig,
) -> Result<(), PlotError> {
    let ranges = bounds(waveforms.values());
    let (first_ch, center_ch, last_ch) = config.ordered_channels();
    let traces: Vec<_> = waveforms
        .iter()
        .enumerate()
        .map(|(idx, (&channel, waveform))| {
            let label = if channel == first_ch {
                "First".to_string()
            } else if channel == center_ch {
                "Center".to_string()
            } else if channel == last_ch {
                "Last".to_string()
            } else {
                format!("Channel {channel}")
            };
            (
                label,
                CHANNEL_COLORS[idx % CHANNEL_COLORS.len()],
                trace(waveform),
            )
        })
        .collect();
    draw_traces(path, "Three-Point Shutter Measurement", &traces, ranges)?;
    tracing::info!(path = %path.display(), channels = waveforms.len(), "plot_saved");
    Ok(())
}
