use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::common::AppState;
use crate::config::{TimelineConfig, TimelineDefaults, validate_entity_id};
use crate::error::{AppError, AppResult};
use crate::services::CacheSnapshot;
use crate::timeline::{
    BarStatus, PointSeries, SensorState, Status, StatusClassifier, average_uptime, build_bars,
    status_label, window_label,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimelineQuery {
    /// Window length in hours (default from `TIMELINE_HOURS_TO_SHOW`)
    pub hours_to_show: Option<f64>,
    /// Number of bars (default from `TIMELINE_BAR_AMOUNT`)
    pub bar_amount: Option<usize>,
    /// State counted as ok
    pub ok: Option<String>,
    /// State counted as ko
    pub ko: Option<String>,
    /// Minimum ko percentage for a bar to be reported as ko
    pub severity: Option<f64>,
    /// Label shown instead of the raw state when ok
    pub alias_ok: Option<String>,
    /// Label shown instead of the raw state when ko
    pub alias_ko: Option<String>,
}

impl TimelineQuery {
    /// Merge over the configured defaults and validate.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the result is out of range.
    pub fn into_config(self, entity_id: &str, defaults: &TimelineDefaults) -> AppResult<TimelineConfig> {
        let base = TimelineConfig::from_defaults(entity_id, defaults);
        TimelineConfig {
            entity: base.entity,
            hours_to_show: self.hours_to_show.unwrap_or(base.hours_to_show),
            bar_amount: self.bar_amount.unwrap_or(base.bar_amount),
            ok: self.ok.or(base.ok),
            ko: self.ko.or(base.ko),
            severity: self.severity.unwrap_or(base.severity),
            alias_ok: self.alias_ok,
            alias_ko: self.alias_ko,
        }
        .validate()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BarResponse {
    /// First millisecond covered by the bar
    pub from: i64,
    /// Last millisecond covered by the bar
    pub to: i64,
    pub ok: f64,
    pub ko: f64,
    pub none: f64,
    pub status: BarStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentStatus {
    /// Raw state, null when the sensor is unknown
    pub state: Option<String>,
    pub status: Status,
    pub label: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResponse {
    pub entity_id: String,
    pub hours_to_show: f64,
    /// Footer label for the oldest bar, e.g. "1 day ago"
    pub window_label: String,
    /// Mean ok percentage over all bars
    pub average_uptime: f64,
    pub current: CurrentStatus,
    pub last_fetched: Option<i64>,
    pub last_changed: Option<i64>,
    /// True when this request produced a new snapshot
    pub refreshed: bool,
    /// Oldest bar first
    pub bars: Vec<BarResponse>,
}

/// Run an update cycle, falling back to the cached snapshot when the sensor
/// is missing or the history source fails.
async fn refreshed_snapshot(
    state: &AppState,
    config: &TimelineConfig,
    sensor: Option<&SensorState>,
) -> (Option<Arc<CacheSnapshot>>, bool) {
    let updater = &state.updater;
    let Some(sensor) = sensor else {
        return (updater.snapshot(&config.entity).await, false);
    };

    match updater.update(&config.entity, config.hours_to_show, sensor).await {
        Ok(outcome) => {
            let refreshed = outcome.is_updated();
            match outcome.snapshot() {
                Some(snapshot) => (Some(snapshot.clone()), refreshed),
                None => (updater.snapshot(&config.entity).await, refreshed),
            }
        }
        Err(e) => {
            tracing::warn!(
                entity_id = %config.entity,
                error = %e,
                "History update failed, serving cached timeline"
            );
            (updater.snapshot(&config.entity).await, false)
        }
    }
}

/// Uptime bars for an entity
///
/// Refreshes the entity's cached history (at most once every 10 seconds)
/// and splits the window into bars with their ok/ko/none repartition.
#[utoipa::path(
    get,
    path = "/api/timelines/{entity_id}",
    params(
        ("entity_id" = String, Path, description = "Entity id, e.g. binary_sensor.door"),
        TimelineQuery,
    ),
    responses(
        (status = 200, description = "Timeline computed", body = TimelineResponse),
        (status = 400, description = "Invalid timeline parameters"),
    ),
    tag = "timelines"
)]
pub async fn get_timeline(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> AppResult<Json<TimelineResponse>> {
    let config = query.into_config(&entity_id, &state.config.timeline)?;

    let sensor = match state.updater.source().current_state(&config.entity).await {
        Ok(sensor) => sensor,
        Err(e) => {
            tracing::warn!(entity_id = %config.entity, error = %e, "Failed to read sensor state");
            None
        }
    };

    let (snapshot, refreshed) = refreshed_snapshot(&state, &config, sensor.as_ref()).await;

    let classifier = StatusClassifier::new(&config.entity, config.ok.clone(), config.ko.clone());
    let empty = PointSeries::default();
    let series = snapshot.as_ref().map_or(&empty, |s| &s.points);
    let now = state.updater.now_millis();

    let bars = build_bars(series, config.hours_to_show, config.bar_amount, now, &classifier);
    let average = average_uptime(bars.iter().map(|(_, r)| r));

    let raw_state = sensor.map(|s| s.state);
    let current = CurrentStatus {
        status: classifier.classify(raw_state.as_deref()),
        label: status_label(
            raw_state.as_deref(),
            &classifier,
            config.alias_ok.as_deref(),
            config.alias_ko.as_deref(),
        ),
        state: raw_state,
    };

    let bars = bars
        .into_iter()
        .map(|(period, repartition)| BarResponse {
            from: period.from,
            to: period.to,
            ok: repartition.ok,
            ko: repartition.ko,
            none: repartition.none,
            status: BarStatus::from_repartition(&repartition, config.severity),
        })
        .collect();

    Ok(Json(TimelineResponse {
        entity_id: config.entity.clone(),
        hours_to_show: config.hours_to_show,
        window_label: window_label(config.hours_to_show),
        average_uptime: average,
        current,
        last_fetched: snapshot.as_ref().map(|s| s.last_fetched),
        last_changed: snapshot.as_ref().and_then(|s| s.last_changed),
        refreshed,
        bars,
    }))
}

/// Cached points for an entity
///
/// Returns the canonical state-change series as last stored, without
/// triggering an update.
#[utoipa::path(
    get,
    path = "/api/timelines/{entity_id}/points",
    params(
        ("entity_id" = String, Path, description = "Entity id, e.g. binary_sensor.door"),
    ),
    responses(
        (status = 200, description = "Cached snapshot", body = CacheSnapshot),
        (status = 400, description = "Malformed entity id"),
        (status = 404, description = "Nothing cached for this entity"),
    ),
    tag = "timelines"
)]
pub async fn get_points(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> AppResult<Json<CacheSnapshot>> {
    validate_entity_id(&entity_id)?;

    let snapshot = state
        .updater
        .snapshot(&entity_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No cached history for '{entity_id}'")))?;

    Ok(Json(snapshot.as_ref().clone()))
}
