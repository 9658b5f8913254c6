use async_trait::async_trait;

use crate::error::AppResult;
use crate::timeline::{Point, SensorState};

/// Where raw state history and live sensor state come from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// State changes of `entity_id` between `from` and `to` (epoch millis),
    /// oldest first. An empty result means no change in range.
    async fn fetch_history(&self, entity_id: &str, from: i64, to: i64) -> AppResult<Vec<Point>>;

    /// Current state of `entity_id`, or `None` if the entity does not exist.
    async fn current_state(&self, entity_id: &str) -> AppResult<Option<SensorState>>;
}
