use chrono::DateTime;
use serde::Deserialize;

use crate::timeline::{Point, SensorState};

/// Response from `/api/history/period/{start}`: one list of states per
/// requested entity.
pub type HistoryResponse = Vec<Vec<HistoryState>>;

/// A state row as returned with `minimal_response`.
///
/// Only the first row of each list carries `entity_id` and attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryState {
    pub state: String,
    pub last_changed: String,
    #[serde(default)]
    pub entity_id: Option<String>,
}

impl HistoryState {
    #[must_use]
    pub fn to_point(&self) -> Option<Point> {
        parse_timestamp(&self.last_changed).map(|x| Point::new(x, self.state.clone()))
    }
}

/// Response from `/api/states/{entity_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    pub last_changed: String,
}

impl EntityState {
    #[must_use]
    pub fn to_sensor_state(&self) -> Option<SensorState> {
        parse_timestamp(&self.last_changed).map(|last_changed| SensorState {
            state: self.state.clone(),
            last_changed,
        })
    }
}

/// RFC 3339 timestamp to epoch millis.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.timestamp_millis())
}
