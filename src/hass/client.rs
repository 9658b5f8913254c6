use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::error::{AppError, AppResult};
use crate::hass::models::{EntityState, HistoryResponse};
use crate::sync::HistorySource;
use crate::timeline::{Point, SensorState};

/// Home Assistant REST API client.
pub struct HassClient {
    http_client: Client,
    base_url: Url,
    token: String,
}

fn iso_timestamp(millis: i64) -> AppResult<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .ok_or_else(|| AppError::Internal(format!("Timestamp out of range: {millis}")))
}

impl HassClient {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be built, and
    /// `AppError::Config` if `HASS_BASE_URL` is not a usable base URL.
    pub fn new(config: &Config) -> AppResult<Self> {
        let base_url = Url::parse(&config.hass_base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                ConfigError::Invalid(format!("HASS_BASE_URL is not a base URL: {}", config.hass_base_url))
            })?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.hass_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
            token: config.hass_token.clone(),
        })
    }

    /// Append `segments` to the base URL, each percent-encoded as a single
    /// path segment.
    pub fn api_url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::Internal("Home Assistant URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url, query: &[(&str, &str)]) -> AppResult<Response> {
        self.http_client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::HistorySource(format!("Request failed: {e}")))
    }

    async fn ensure_success(response: Response) -> AppResult<Response> {
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::HistorySource("Rate limited (429)".to_string()));
        }

        if !response.status().is_success() {
            return Err(AppError::HistorySource(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl HistorySource for HassClient {
    async fn fetch_history(&self, entity_id: &str, from: i64, to: i64) -> AppResult<Vec<Point>> {
        let start = iso_timestamp(from)?;
        let url = self.api_url(&["api", "history", "period", &start])?;
        let end_time = iso_timestamp(to)?;

        let response = self
            .get(
                url,
                &[
                    ("filter_entity_id", entity_id),
                    ("end_time", end_time.as_str()),
                    ("minimal_response", ""),
                    ("no_attributes", ""),
                ],
            )
            .await?;
        let response = Self::ensure_success(response).await?;

        let text = response
            .text()
            .await
            .map_err(|e| AppError::HistorySource(format!("Failed to get response text: {e}")))?;

        let history: HistoryResponse = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse history response"
            );
            AppError::HistorySource(format!("Failed to parse response: {e}"))
        })?;

        let rows = history.into_iter().next().unwrap_or_default();
        let total = rows.len();
        let points: Vec<Point> = rows.iter().filter_map(|row| row.to_point()).collect();

        if points.len() < total {
            tracing::warn!(
                entity_id = %entity_id,
                skipped = total - points.len(),
                "Skipped history rows with unparsable timestamps"
            );
        }

        Ok(points)
    }

    async fn current_state(&self, entity_id: &str) -> AppResult<Option<SensorState>> {
        let url = self.api_url(&["api", "states", entity_id])?;

        let response = self.get(url, &[]).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::ensure_success(response).await?;

        let entity: EntityState = response
            .json()
            .await
            .map_err(|e| AppError::HistorySource(format!("Failed to parse response: {e}")))?;

        let sensor = entity.to_sensor_state();
        if sensor.is_none() {
            tracing::warn!(
                entity_id = %entity.entity_id,
                last_changed = %entity.last_changed,
                "Entity state has an unparsable last_changed"
            );
        }
        Ok(sensor)
    }
}
