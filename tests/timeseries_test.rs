//! Sliding window behavior of TimeSeries

use empire_utils::models::SeriesSample;
use empire_utils::timeseries::{Bucket, TimeSeries};

fn bucket(time_anchor_ms: i64, value: f64) -> Bucket {
    Bucket { time_anchor_ms, value }
}

#[test]
fn test_accumulates_into_anchored_buckets() {
    let mut series = TimeSeries::new(60_000, 3);
    let events = [
        SeriesSample::new(0, 5.0),
        SeriesSample::new(30_000, 3.0),
        SeriesSample::new(90_000, 2.0),
    ];

    assert!(series.add_samples(&events, Some(90_000)));
    assert_eq!(
        series.buckets,
        vec![bucket(-60_000, 0.0), bucket(0, 8.0), bucket(60_000, 2.0)]
    );
}

#[test]
fn test_reference_defaults_to_latest_event() {
    let mut series = TimeSeries::new(1_000, 2);
    let changed = series.add_samples(&[SeriesSample::new(4_200, 1.0), SeriesSample::new(3_100, 2.0)], None);
    assert!(changed);
    assert_eq!(series.buckets, vec![bucket(3_000, 2.0), bucket(4_000, 1.0)]);
}

#[test]
fn test_events_outside_window_are_dropped() {
    let mut series = TimeSeries::new(1_000, 2);
    let changed = series.add_samples(
        &[SeriesSample::new(-5_000, 7.0), SeriesSample::new(9_000, 7.0)],
        Some(1_500),
    );
    // only the window seeding counts as a change
    assert!(changed);
    assert_eq!(series.total(), 0.0);
    assert!(!series.add_samples(&[SeriesSample::new(-5_000, 7.0)], Some(1_500)));
}

#[test]
fn test_window_stays_contiguous_while_sliding() {
    let mut series = TimeSeries::new(500, 4);
    for now in (0..20_000).step_by(730) {
        let _ = series.add_samples(&[SeriesSample::new(now, 1.0)], Some(now));

        assert_eq!(series.buckets.len(), 4);
        let last = series.buckets.last().map(|b| b.time_anchor_ms);
        assert_eq!(last, Some(series.anchor_for(now)));
        for pair in series.buckets.windows(2) {
            assert_eq!(pair[1].time_anchor_ms - pair[0].time_anchor_ms, 500);
        }
    }
}

#[test]
fn test_repeated_advance_reports_no_change() {
    let mut series = TimeSeries::new(60_000, 5);
    let _ = series.add_samples(&[SeriesSample::new(125_000, 3.0)], None);
    let before = series.clone();

    assert!(!series.add_samples(&[], Some(125_000)));
    assert_eq!(series, before);
}

#[test]
fn test_serializes_with_camel_case_fields() {
    let mut series = TimeSeries::new(1_000, 1);
    let _ = series.add_samples(&[SeriesSample::new(2_500, 1.5)], None);
    let json = serde_json::to_value(&series).unwrap();

    assert_eq!(json["durationMs"], 1_000);
    assert_eq!(json["buckets"][0]["timeAnchorMs"], 2_000);
    assert_eq!(json["buckets"][0]["value"], 1.5);
}
