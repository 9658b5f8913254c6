pub mod bucket;
pub mod classify;
pub mod point;
pub mod summary;

pub use bucket::{Period, Repartition, bar_periods, build_bars, repartition, window_millis};
pub use classify::{Status, StatusClassifier};
pub use point::{Point, PointSeries, SensorState, compact};
pub use summary::{BarStatus, average_uptime, status_label, window_label};
