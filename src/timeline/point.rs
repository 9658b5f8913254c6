use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A state observation: state `y` held from epoch millis `x` until the next
/// point (or now).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Point {
    pub x: i64,
    pub y: String,
}

impl Point {
    #[must_use]
    pub fn new(x: i64, y: impl Into<String>) -> Self {
        Self { x, y: y.into() }
    }
}

/// Canonical, time-ordered, run-length-compacted sequence of points.
///
/// No two adjacent points share a state. The only way to build one is through
/// [`compact`], and deserialization goes through it too, so anything read back
/// from storage holds the same invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(from = "Vec<Point>", into = "Vec<Point>")]
#[schema(value_type = Vec<Point>)]
pub struct PointSeries(Vec<Point>);

impl PointSeries {
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

impl From<Vec<Point>> for PointSeries {
    fn from(points: Vec<Point>) -> Self {
        compact(points)
    }
}

impl From<PointSeries> for Vec<Point> {
    fn from(series: PointSeries) -> Self {
        series.0
    }
}

/// Collapse consecutive duplicate states.
///
/// A point is kept only when its state differs from the last *kept* point, so
/// a run of any length collapses to its first observation.
#[must_use]
pub fn compact(points: impl IntoIterator<Item = Point>) -> PointSeries {
    let mut kept: Vec<Point> = Vec::new();
    for point in points {
        if kept.last().is_some_and(|last| last.y == point.y) {
            continue;
        }
        kept.push(point);
    }
    PointSeries(kept)
}

/// Live state of a sensor as reported by the history source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorState {
    pub state: String,
    /// Epoch millis of the last state change
    pub last_changed: i64,
}
