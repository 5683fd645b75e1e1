//! E2E tests for three-point shutter travel analysis
//!
//! Builds three-channel captures the way the scope hands them over (shared
//! trigger-relative time origin) and checks the derived travel, velocity and
//! uniformity figures plus the orientation contract.

use std::collections::BTreeMap;

use shutterscope::waveform::Waveform;
use shutterscope::{measure_three_point, Orientation, ThreePointConfig, ThreePointError};

/// Build a channel with `lead` quiet samples, then `width` samples of pulse
fn channel(lead: usize, width: usize, total: usize) -> Waveform {
    let mut voltages = vec![0.0; lead];
    voltages.extend(vec![2.5; width]);
    voltages.extend(vec![0.0; total - lead - width]);
    Waveform::new(voltages, 1e6, -(total as f64) / 1e6).unwrap()
}

/// Horizontal travel: channel 1 fires first, 100µs between sensors
fn horizontal_capture() -> BTreeMap<u8, Waveform> {
    let mut map = BTreeMap::new();
    map.insert(1, channel(100, 500, 1000));
    map.insert(2, channel(200, 500, 1000));
    map.insert(3, channel(300, 500, 1000));
    map
}

#[test]
fn test_travel_time_and_delays() {
    let metrics = measure_three_point(&horizontal_capture(), &ThreePointConfig::default()).unwrap();

    assert!((metrics.first_to_center_delay_s - 100e-6).abs() < 2e-6);
    assert!((metrics.center_to_last_delay_s - 100e-6).abs() < 2e-6);
    assert!((metrics.shutter_travel_time_s - 200e-6).abs() < 2e-6);
    assert!(
        (metrics.shutter_travel_time_s
            - (metrics.first_to_center_delay_s + metrics.center_to_last_delay_s))
            .abs()
            < 1e-12
    );
}

#[test]
fn test_velocity_matches_spacing_over_travel_time() {
    let metrics = measure_three_point(&horizontal_capture(), &ThreePointConfig::default()).unwrap();

    let expected = (metrics.sensor_spacing_mm() / 1000.0) / metrics.shutter_travel_time_s;
    assert_eq!(metrics.shutter_velocity_m_per_s(), expected);
    assert_eq!(metrics.sensor_spacing_mm(), 36.0);
}

#[test]
fn test_velocity_zero_when_no_travel() {
    let mut map = BTreeMap::new();
    for ch in 1u8..=3 {
        map.insert(ch, channel(100, 500, 1000));
    }
    let metrics = measure_three_point(&map, &ThreePointConfig::default()).unwrap();

    assert_eq!(metrics.shutter_travel_time_s, 0.0);
    assert_eq!(metrics.shutter_velocity_m_per_s(), 0.0);
}

#[test]
fn test_uniformity_identical_widths_is_exactly_100() {
    let metrics = measure_three_point(&horizontal_capture(), &ThreePointConfig::default()).unwrap();
    assert_eq!(metrics.timing_uniformity(), 100.0);
}

#[test]
fn test_uniformity_below_100_for_differing_widths() {
    let mut map = BTreeMap::new();
    map.insert(1, channel(100, 450, 1000));
    map.insert(2, channel(200, 500, 1000));
    map.insert(3, channel(300, 550, 1000));
    let metrics = measure_three_point(&map, &ThreePointConfig::default()).unwrap();

    let uniformity = metrics.timing_uniformity();
    assert!(uniformity < 100.0);
    assert!(uniformity > 0.0);
}

#[test]
fn test_orientation_swap_relabels_rather_than_flipping_signs() {
    // Channel 3 fires first, as a vertical (top-to-bottom) run produces
    let mut map = BTreeMap::new();
    map.insert(1, channel(300, 500, 1000));
    map.insert(2, channel(200, 500, 1000));
    map.insert(3, channel(100, 500, 1000));

    let vertical = ThreePointConfig {
        orientation: Orientation::Vertical,
        ..ThreePointConfig::default()
    };
    let metrics = measure_three_point(&map, &vertical).unwrap();

    // "first" is the right channel's pulse under vertical orientation
    assert!(metrics.first_to_center_delay_s > 0.0);
    assert!(metrics.center_to_last_delay_s > 0.0);
    assert_eq!(metrics.sensor_spacing_mm(), 24.0);

    // The same data claimed as horizontal is an ordering error, not a
    // negative travel time
    let horizontal = ThreePointConfig::default();
    match measure_three_point(&map, &horizontal) {
        Err(ThreePointError::InconsistentPulseOrder { .. }) => {}
        other => panic!("expected InconsistentPulseOrder, got {other:?}"),
    }
}

#[test]
fn test_channel_failure_carries_channel_id() {
    let mut map = horizontal_capture();
    map.insert(3, Waveform::new(vec![0.0; 1000], 1e6, 0.0).unwrap());

    match measure_three_point(&map, &ThreePointConfig::default()) {
        Err(ThreePointError::ChannelPulse { channel, .. }) => assert_eq!(channel, 3),
        other => panic!("expected ChannelPulse for channel 3, got {other:?}"),
    }
}

#[test]
fn test_no_partial_result_on_missing_channel() {
    let mut map = horizontal_capture();
    map.remove(&2);

    assert!(matches!(
        measure_three_point(&map, &ThreePointConfig::default()),
        Err(ThreePointError::MissingChannel(2))
    ));
}
