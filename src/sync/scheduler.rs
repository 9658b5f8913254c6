use futures::future::join_all;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

use crate::common::AppState;
use crate::error::AppResult;
use crate::sync::updater::UpdateOutcome;

/// Refresh the configured entities on a fixed interval.
///
/// Disabled when `TIMELINE_UPDATE_INTERVAL_SECONDS` is 0 or no entity is
/// listed. A failed refresh is not retried before the next tick.
pub async fn run_timeline_refresh(state: AppState) {
    let interval_secs = state.config.timeline.update_interval_seconds;
    let entities = state.config.timeline_entities.clone();

    if interval_secs == 0 || entities.is_empty() {
        tracing::info!("Background timeline refresh disabled");
        return;
    }

    tracing::info!(
        interval_secs,
        entities = entities.len(),
        "Starting timeline refresh scheduler"
    );

    let mut ticker = interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // First tick completes immediately
        ticker.tick().await;

        let state = &state;
        let results = join_all(entities.iter().map(|entity_id| async move {
            let result = refresh_entity(state, entity_id).await;
            if let Err(e) = &result {
                tracing::warn!(entity_id = %entity_id, error = %e, "Timeline refresh failed");
            }
            result
        }))
        .await;

        let updated = results
            .iter()
            .filter(|r| matches!(r, Ok(Some(outcome)) if outcome.is_updated()))
            .count();
        tracing::debug!(updated, total = entities.len(), "Timeline refresh tick done");
    }
}

/// One update cycle for `entity_id` with the default window.
///
/// Returns `Ok(None)` when the sensor does not exist.
///
/// # Errors
///
/// Returns `AppError::HistorySource` if the sensor lookup or the history
/// fetch fails.
pub async fn refresh_entity(state: &AppState, entity_id: &str) -> AppResult<Option<UpdateOutcome>> {
    let Some(sensor) = state.updater.source().current_state(entity_id).await? else {
        tracing::debug!(entity_id = %entity_id, "Sensor not found, skipping refresh");
        return Ok(None);
    };

    state
        .updater
        .update(entity_id, state.config.timeline.hours_to_show, &sensor)
        .await
        .map(Some)
}
