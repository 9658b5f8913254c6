//! Splits the look-back window into bars and computes the time-weighted
//! ok/ko/none repartition of each bar.

use serde::Serialize;
use utoipa::ToSchema;

use crate::timeline::classify::{Status, StatusClassifier};
use crate::timeline::point::{Point, PointSeries};

pub const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Closed interval of epoch millis covered by one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Period {
    pub from: i64,
    pub to: i64,
}

/// Percentage of a period spent ok, ko or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Repartition {
    pub ok: f64,
    pub ko: f64,
    pub none: f64,
}

impl Repartition {
    pub const NONE: Self = Self {
        ok: 0.0,
        ko: 0.0,
        none: 100.0,
    };

    /// `none` is always the complement so the three sum to exactly 100.
    #[must_use]
    pub fn from_percentages(ok: f64, ko: f64) -> Self {
        Self {
            ok,
            ko,
            none: 100.0 - (ok + ko),
        }
    }
}

/// Total window length in millis.
#[must_use]
pub fn window_millis(hours_to_show: f64) -> i64 {
    (hours_to_show * MILLIS_PER_HOUR).round() as i64
}

/// Periods of all bars, oldest first, the last one ending at `now`.
///
/// Boundaries are computed as `now - T * k / n` in integer arithmetic so that
/// consecutive bars always touch (`next.from == prev.to + 1`) and the whole
/// set covers `[now - T + 1, now]`, even when `T` is not a multiple of `n`.
#[must_use]
pub fn bar_periods(hours_to_show: f64, bar_count: usize, now: i64) -> Vec<Period> {
    let total = i128::from(window_millis(hours_to_show));
    let count = bar_count as i128;
    let boundary = |bars_after: usize| -> i64 {
        // Millis between the bar's end and now
        let offset = total * bars_after as i128 / count;
        now - offset as i64
    };

    (0..bar_count)
        .map(|index| {
            let to = boundary(bar_count - 1 - index);
            let from = boundary(bar_count - index) + 1;
            Period { from, to }
        })
        .collect()
}

/// Repartition of `period` according to `series`.
///
/// The state in force at `from` is taken from the last point before the
/// period. If every point precedes the period, the newest one is assumed to
/// hold for the whole period. Time before the first known point counts as
/// `none`.
#[must_use]
pub fn repartition(
    series: &PointSeries,
    period: Period,
    classifier: &StatusClassifier,
) -> Repartition {
    let points = series.points();
    if points.is_empty() {
        return Repartition::NONE;
    }

    // Same tie-breaks as a forward scan: first `x >= from`, first `x > to`
    let first = points.partition_point(|p| p.x < period.from);
    let last = points.partition_point(|p| p.x <= period.to);

    let useful: &[Point] = if first == points.len() {
        &points[points.len() - 1..]
    } else if first == 0 && last == 0 {
        return Repartition::NONE;
    } else {
        &points[first.saturating_sub(1)..last]
    };

    let mut ok = 0_i64;
    let mut ko = 0_i64;
    for (i, point) in useful.iter().enumerate() {
        let upper = useful.get(i + 1).map_or(period.to, |next| next.x);
        let lower = point.x.max(period.from);
        let amount = upper - lower;

        match classifier.classify(Some(&point.y)) {
            Status::Ok => ok += amount,
            Status::Ko => ko += amount,
            Status::Unknown => {}
        }
    }

    let total = (period.to - period.from) as f64;
    if total <= 0.0 {
        return Repartition::NONE;
    }
    Repartition::from_percentages(ok as f64 / total * 100.0, ko as f64 / total * 100.0)
}

/// One repartition per bar, oldest first.
#[must_use]
pub fn build_bars(
    series: &PointSeries,
    hours_to_show: f64,
    bar_count: usize,
    now: i64,
    classifier: &StatusClassifier,
) -> Vec<(Period, Repartition)> {
    bar_periods(hours_to_show, bar_count, now)
        .into_iter()
        .map(|period| (period, repartition(series, period, classifier)))
        .collect()
}
