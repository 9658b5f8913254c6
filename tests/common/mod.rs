//! Fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use uptime_timeline::common::Clock;
use uptime_timeline::error::{AppError, AppResult};
use uptime_timeline::services::KeyValueStore;
use uptime_timeline::sync::HistorySource;
use uptime_timeline::timeline::{Point, SensorState};

pub const HOUR: i64 = 3_600_000;
pub const NOW: i64 = 1_700_000_000_000;
pub const DOOR: &str = "binary_sensor.door";

pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.0.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// History source backed by a fixed list of state changes.
#[derive(Default)]
pub struct FakeSource {
    history: Mutex<Vec<Point>>,
    sensor: Mutex<Option<SensorState>>,
    calls: Mutex<Vec<(i64, i64)>>,
    fail: AtomicBool,
    /// When set, `fetch_history` signals `entered` and waits for `release`
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeSource {
    pub fn new(history: Vec<Point>, sensor: Option<SensorState>) -> Self {
        Self {
            history: Mutex::new(history),
            sensor: Mutex::new(sensor),
            ..Self::default()
        }
    }

    pub fn with_gate(mut self, entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        self.gate = Some((entered, release));
        self
    }

    pub fn push(&self, point: Point) {
        self.history.lock().unwrap().push(point);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(i64, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HistorySource for FakeSource {
    async fn fetch_history(&self, _entity_id: &str, from: i64, to: i64) -> AppResult<Vec<Point>> {
        self.calls.lock().unwrap().push((from, to));

        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::HistorySource("HTTP 502: upstream down".to_string()));
        }

        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.x >= from && p.x < to)
            .cloned()
            .collect())
    }

    async fn current_state(&self, _entity_id: &str) -> AppResult<Option<SensorState>> {
        Ok(self.sensor.lock().unwrap().clone())
    }
}

/// Store whose reads and writes always fail.
pub struct BrokenStore;

#[async_trait]
impl KeyValueStore for BrokenStore {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::Internal("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: String) -> AppResult<()> {
        Err(AppError::Internal("connection refused".to_string()))
    }
}

pub fn sensor(state: &str, last_changed: i64) -> SensorState {
    SensorState {
        state: state.to_string(),
        last_changed,
    }
}

pub fn p(x: i64, y: &str) -> Point {
    Point::new(x, y)
}
