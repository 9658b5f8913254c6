//! Compaction, classification and bar computation.
//!
//! Run with: cargo test --test timeline_test

mod common;

use common::{HOUR, NOW, p};
use uptime_timeline::timeline::{
    BarStatus, Period, PointSeries, Repartition, Status, StatusClassifier, average_uptime,
    bar_periods, build_bars, compact, repartition, status_label, window_label,
};

fn binary() -> StatusClassifier {
    StatusClassifier::new("binary_sensor.door", None, None)
}

fn assert_sums_to_100(r: &Repartition) {
    assert!((r.ok + r.ko + r.none - 100.0).abs() < 1e-9, "{r:?}");
}

#[test]
fn compact_keeps_first_of_each_run() {
    let series = compact(vec![
        p(0, "off"),
        p(10, "off"),
        p(20, "off"),
        p(30, "on"),
        p(40, "on"),
        p(50, "off"),
    ]);
    assert_eq!(series.points(), &[p(0, "off"), p(30, "on"), p(50, "off")]);
}

#[test]
fn compact_is_idempotent_and_has_no_adjacent_duplicates() {
    let raw = vec![
        p(0, "on"),
        p(1, "on"),
        p(2, "unavailable"),
        p(3, "on"),
        p(4, "on"),
        p(5, "off"),
        p(6, "off"),
    ];
    let once = compact(raw);
    let twice = compact(once.points().to_vec());
    assert_eq!(once, twice);
    assert!(once.points().windows(2).all(|w| w[0].y != w[1].y));
}

#[test]
fn compact_handles_empty_and_single() {
    assert!(compact(Vec::new()).is_empty());
    assert_eq!(compact(vec![p(7, "on")]).points(), &[p(7, "on")]);
}

#[test]
fn point_series_deserialization_recompacts() {
    let series: PointSeries =
        serde_json::from_str(r#"[{"x":1,"y":"on"},{"x":2,"y":"on"},{"x":3,"y":"off"}]"#).unwrap();
    assert_eq!(series.points(), &[p(1, "on"), p(3, "off")]);
}

#[test]
fn classify_without_overrides_uses_binary_sensor_domain() {
    let c = binary();
    assert_eq!(c.classify(Some("on")), Status::Ok);
    assert_eq!(c.classify(Some("off")), Status::Ko);
    assert_eq!(c.classify(Some("unavailable")), Status::Unknown);
    assert_eq!(c.classify(None), Status::Unknown);

    let sensor = StatusClassifier::new("sensor.ping", None, None);
    assert_eq!(sensor.classify(Some("on")), Status::Unknown);
}

#[test]
fn classify_with_only_ko_treats_everything_else_as_ok() {
    let c = StatusClassifier::new("sensor.router", None, Some("offline".to_string()));
    assert_eq!(c.classify(Some("offline")), Status::Ko);
    assert_eq!(c.classify(Some("online")), Status::Ok);
    assert_eq!(c.classify(Some("rebooting")), Status::Ok);
}

#[test]
fn classify_with_only_ok_treats_everything_else_as_ko() {
    let c = StatusClassifier::new("binary_sensor.door", Some("off".to_string()), None);
    assert_eq!(c.classify(Some("off")), Status::Ok);
    assert_eq!(c.classify(Some("on")), Status::Ko);
    assert_eq!(c.classify(None), Status::Unknown);
}

#[test]
fn classify_with_both_overrides() {
    let c = StatusClassifier::new(
        "sensor.nas",
        Some("up".to_string()),
        Some("down".to_string()),
    );
    assert_eq!(c.classify(Some("up")), Status::Ok);
    assert_eq!(c.classify(Some("down")), Status::Ko);
    assert_eq!(c.classify(Some("degraded")), Status::Ko);
}

#[test]
fn repartition_weights_states_by_duration() {
    let series = compact(vec![p(0, "off"), p(100, "on"), p(300, "off")]);
    let r = repartition(&series, Period { from: 0, to: 400 }, &binary());
    assert_eq!(
        r,
        Repartition {
            ok: 50.0,
            ko: 50.0,
            none: 0.0
        }
    );
}

#[test]
fn repartition_uses_state_active_before_the_period() {
    let series = compact(vec![p(0, "on"), p(1_500, "off")]);
    let r = repartition(&series, Period { from: 1_000, to: 2_000 }, &binary());
    assert_eq!(r.ok, 50.0);
    assert_eq!(r.ko, 50.0);
    assert_sums_to_100(&r);
}

#[test]
fn repartition_extends_last_point_when_all_history_precedes_period() {
    let series = compact(vec![p(0, "off"), p(10, "on")]);
    let r = repartition(&series, Period { from: 1_000, to: 2_000 }, &binary());
    assert_eq!(r.ok, 100.0);
    assert_eq!(r.none, 0.0);
}

#[test]
fn repartition_is_none_when_period_precedes_history() {
    let series = compact(vec![p(1_000, "on")]);
    let r = repartition(&series, Period { from: 0, to: 500 }, &binary());
    assert_eq!(r, Repartition::NONE);
}

#[test]
fn repartition_counts_time_before_first_point_as_none() {
    let series = compact(vec![p(1_500, "on")]);
    let r = repartition(&series, Period { from: 1_000, to: 2_000 }, &binary());
    assert_eq!(r.ok, 50.0);
    assert_eq!(r.ko, 0.0);
    assert_eq!(r.none, 50.0);
}

#[test]
fn repartition_of_empty_series_is_none() {
    let r = repartition(&PointSeries::default(), Period { from: 0, to: 10 }, &binary());
    assert_eq!(r, Repartition::NONE);
}

#[test]
fn repartitions_always_sum_to_100() {
    let series = compact(vec![
        p(3, "on"),
        p(17, "off"),
        p(29, "unknown"),
        p(31, "on"),
        p(97, "off"),
    ]);
    let c = binary();
    for from in (0..120).step_by(7) {
        for len in [1, 3, 11, 50] {
            let r = repartition(&series, Period { from, to: from + len }, &c);
            assert_sums_to_100(&r);
        }
    }
}

#[test]
fn bar_periods_tile_the_window() {
    let periods = bar_periods(24.0, 24, NOW);
    assert_eq!(periods.len(), 24);
    assert_eq!(periods[0].from, NOW - 24 * HOUR + 1);
    assert_eq!(periods[23].to, NOW);
    for pair in periods.windows(2) {
        assert_eq!(pair[1].from, pair[0].to + 1);
    }
    for period in &periods {
        assert_eq!(period.to - period.from, HOUR - 1);
    }
}

#[test]
fn bar_periods_tile_when_window_is_not_divisible() {
    let periods = bar_periods(1.0, 7, NOW);
    assert_eq!(periods.len(), 7);
    assert_eq!(periods[0].from, NOW - HOUR + 1);
    assert_eq!(periods[6].to, NOW);
    assert!(periods.windows(2).all(|w| w[1].from == w[0].to + 1));
}

#[test]
fn build_bars_returns_one_repartition_per_bar() {
    let series = compact(vec![p(NOW - 30 * HOUR, "off"), p(NOW - 6 * HOUR, "on")]);
    let bars = build_bars(&series, 24.0, 12, NOW, &binary());
    assert_eq!(bars.len(), 12);

    // Bars of two hours; the last three are fully "on"
    assert_eq!(bars[0].1.ko, 100.0);
    assert_eq!(bars[11].1.ok, 100.0);
    assert_eq!(bars[9].1.ok, 100.0);
    assert!(bars.iter().all(|(_, r)| (r.ok + r.ko + r.none - 100.0).abs() < 1e-9));

    let empty = build_bars(&PointSeries::default(), 24.0, 5, NOW, &binary());
    assert!(empty.iter().all(|(_, r)| *r == Repartition::NONE));
}

#[test]
fn bar_status_follows_severity() {
    let mixed = Repartition::from_percentages(60.0, 40.0);
    assert_eq!(BarStatus::from_repartition(&Repartition::NONE, 50.0), BarStatus::None);
    assert_eq!(
        BarStatus::from_repartition(&Repartition::from_percentages(100.0, 0.0), 50.0),
        BarStatus::Ok
    );
    assert_eq!(BarStatus::from_repartition(&mixed, 30.0), BarStatus::Ko);
    assert_eq!(BarStatus::from_repartition(&mixed, 50.0), BarStatus::Half);
}

#[test]
fn average_uptime_is_mean_of_ok() {
    let bars = [
        Repartition::from_percentages(100.0, 0.0),
        Repartition::from_percentages(50.0, 50.0),
        Repartition::NONE,
    ];
    assert_eq!(average_uptime(&bars), 50.0);
    assert_eq!(average_uptime(&[]), 0.0);
}

#[test]
fn window_labels() {
    assert_eq!(window_label(1.0), "1 hour ago");
    assert_eq!(window_label(12.0), "12 hours ago");
    assert_eq!(window_label(24.0), "1 day ago");
    assert_eq!(window_label(72.0), "3 days ago");
    assert_eq!(window_label(168.0), "1 week ago");
    assert_eq!(window_label(336.0), "2 weeks ago");
}

#[test]
fn status_labels_use_aliases() {
    let c = binary();
    assert_eq!(status_label(Some("on"), &c, Some("Open"), Some("Closed")), "Open");
    assert_eq!(status_label(Some("off"), &c, Some("Open"), Some("Closed")), "Closed");
    assert_eq!(status_label(Some("off"), &c, Some("Open"), None), "off");
    assert_eq!(status_label(Some("unavailable"), &c, None, None), "Unknown");
    assert_eq!(status_label(None, &c, None, None), "Unknown");
}
