//! Incremental history updates for entity timelines.
//!
//! One update cycle per entity:
//!
//! 1. load the cached snapshot
//! 2. decide between a full fetch (no cache, or the window grew) and an
//!    incremental fetch from `last_fetched`
//! 3. skip the cycle if the last fetch is less than 10 s old
//! 4. fetch `[from, now)` from the history source and append to the cache
//! 5. trim to the window, keeping one point before it
//! 6. compact, persist, publish
//!
//! Cycles for the same entity never overlap: a trigger that arrives while
//! one is running is dropped. A failed fetch leaves the cached snapshot as
//! is; the next trigger retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::common::Clock;
use crate::error::AppResult;
use crate::services::{CacheSnapshot, CacheStore};
use crate::sync::source::HistorySource;
use crate::timeline::{Point, PointSeries, SensorState, compact, window_millis};

/// Minimum age of the last fetch before the history source is queried again.
pub const MIN_FETCH_INTERVAL_MS: i64 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// A new snapshot was built and published.
    Updated(Arc<CacheSnapshot>),
    /// The last fetch is too recent; carries the cached snapshot, if any.
    RateLimited(Option<Arc<CacheSnapshot>>),
    /// Another cycle for the entity is running; carries the last published snapshot.
    InFlight(Option<Arc<CacheSnapshot>>),
}

impl UpdateOutcome {
    #[must_use]
    pub fn snapshot(&self) -> Option<&Arc<CacheSnapshot>> {
        match self {
            Self::Updated(snapshot) => Some(snapshot),
            Self::RateLimited(snapshot) | Self::InFlight(snapshot) => snapshot.as_ref(),
        }
    }

    #[must_use]
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    pub fetch_everything: bool,
    /// Start of the range to request
    pub from: i64,
    /// Oldest instant shown by the timeline
    pub window_start: i64,
}

impl FetchPlan {
    #[must_use]
    pub fn new(previous: Option<&CacheSnapshot>, hours_to_show: f64, now: i64) -> Self {
        let window_start = now - window_millis(hours_to_show);
        match previous {
            Some(snapshot) if snapshot.hours_to_show >= hours_to_show => Self {
                fetch_everything: false,
                from: snapshot.last_fetched,
                window_start,
            },
            _ => Self {
                fetch_everything: true,
                from: window_start,
                window_start,
            },
        }
    }

    #[must_use]
    pub fn is_too_recent(&self, now: i64) -> bool {
        now - self.from < MIN_FETCH_INTERVAL_MS
    }
}

/// Drop points that no longer matter for the window.
///
/// Keeps everything from the last point at or before `window_start` onward,
/// so the oldest bar knows which state it starts in.
#[must_use]
pub fn trim_to_window(mut points: Vec<Point>, window_start: i64) -> Vec<Point> {
    match points.iter().position(|p| p.x > window_start) {
        Some(0) => points,
        Some(index) => points.split_off(index - 1),
        // Every point precedes the window: only the newest still applies.
        // Keeping more than that changes no bar, since the repartition of a
        // period after all points only looks at the last one.
        None => points.pop().into_iter().collect(),
    }
}

/// Build the next snapshot from the previous one and freshly fetched points.
///
/// With no history at all, the sensor's own state seeds the series so it is
/// never empty once the sensor exists.
#[must_use]
pub fn merge_history(
    previous: Option<&CacheSnapshot>,
    plan: &FetchPlan,
    fetched: Vec<Point>,
    sensor: &SensorState,
    hours_to_show: f64,
    now: i64,
) -> CacheSnapshot {
    let raw = match previous {
        Some(snapshot) if !plan.fetch_everything => {
            let mut points = snapshot.points.points().to_vec();
            points.extend(fetched);
            points
        }
        _ => fetched,
    };

    let series = compact(trim_to_window(raw, plan.window_start));
    if series.is_empty() {
        let seed = Point::new(sensor.last_changed, sensor.state.clone());
        return CacheSnapshot::new(PointSeries::from(vec![seed]), now, hours_to_show);
    }
    CacheSnapshot::new(series, now, hours_to_show)
}

#[derive(Default)]
struct EntitySlot {
    in_flight: tokio::sync::Mutex<()>,
    current: RwLock<Option<Arc<CacheSnapshot>>>,
}

impl EntitySlot {
    fn current(&self) -> Option<Arc<CacheSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, snapshot: Arc<CacheSnapshot>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

pub struct HistoryUpdater {
    source: Arc<dyn HistorySource>,
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Arc<EntitySlot>>>,
}

impl HistoryUpdater {
    pub fn new(source: Arc<dyn HistorySource>, cache: CacheStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            cache,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn source(&self) -> &Arc<dyn HistorySource> {
        &self.source
    }

    #[must_use]
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    fn slot(&self, entity_id: &str) -> Arc<EntitySlot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(entity_id.to_string()).or_default().clone()
    }

    fn existing_slot(&self, entity_id: &str) -> Option<Arc<EntitySlot>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(entity_id).cloned()
    }

    /// Number of entities that went through at least one update cycle.
    #[must_use]
    pub fn tracked_entities(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Latest snapshot for `entity_id`: the one published in this process,
    /// else whatever the cache holds. Does not start tracking the entity.
    pub async fn snapshot(&self, entity_id: &str) -> Option<Arc<CacheSnapshot>> {
        if let Some(current) = self.existing_slot(entity_id).and_then(|slot| slot.current()) {
            return Some(current);
        }
        self.cache.load(entity_id).await.map(Arc::new)
    }

    /// Run one update cycle for `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::HistorySource` if the history fetch fails. Nothing
    /// is persisted in that case.
    pub async fn update(
        &self,
        entity_id: &str,
        hours_to_show: f64,
        sensor: &SensorState,
    ) -> AppResult<UpdateOutcome> {
        let slot = self.slot(entity_id);
        let Ok(_guard) = slot.in_flight.try_lock() else {
            tracing::debug!(entity_id = %entity_id, "Update already in flight, dropping trigger");
            return Ok(UpdateOutcome::InFlight(slot.current()));
        };

        let previous = self.cache.load(entity_id).await;

        // Read once, before the fetch suspends
        let now = self.clock.now_millis();
        let plan = FetchPlan::new(previous.as_ref(), hours_to_show, now);

        if plan.is_too_recent(now) {
            tracing::debug!(
                entity_id = %entity_id,
                last_fetched = plan.from,
                "Skipping update, last fetch too recent"
            );
            let previous = previous.map(Arc::new);
            if let Some(snapshot) = &previous {
                slot.publish(snapshot.clone());
            }
            return Ok(UpdateOutcome::RateLimited(previous));
        }

        if plan.fetch_everything {
            tracing::info!(entity_id = %entity_id, hours_to_show, "Fetching full history window");
        } else {
            tracing::debug!(entity_id = %entity_id, from = plan.from, "Fetching recent history");
        }

        let fetched = self.source.fetch_history(entity_id, plan.from, now).await?;
        let fetched_count = fetched.len();

        let snapshot = Arc::new(merge_history(
            previous.as_ref(),
            &plan,
            fetched,
            sensor,
            hours_to_show,
            now,
        ));

        // The stored snapshot stays at the previous cycle on write failure
        if let Err(e) = self.cache.save(entity_id, &snapshot).await {
            tracing::warn!(entity_id = %entity_id, error = %e, "Failed to persist snapshot");
        }
        slot.publish(snapshot.clone());

        tracing::debug!(
            entity_id = %entity_id,
            fetched = fetched_count,
            points = snapshot.points.len(),
            "Timeline updated"
        );
        Ok(UpdateOutcome::Updated(snapshot))
    }
}
