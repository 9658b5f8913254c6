use serde::Serialize;
use utoipa::ToSchema;

use crate::timeline::bucket::Repartition;
use crate::timeline::classify::{Status, StatusClassifier};

const UNKNOWN_LABEL: &str = "Unknown";

/// Dominant status of a bar, used by renderers to pick a color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BarStatus {
    Ok,
    Ko,
    Half,
    None,
}

impl BarStatus {
    /// `severity` is the minimum ko percentage for the bar to count as ko.
    #[must_use]
    pub fn from_repartition(repartition: &Repartition, severity: f64) -> Self {
        if repartition.none == 100.0 {
            Self::None
        } else if repartition.ok == 100.0 {
            Self::Ok
        } else if repartition.ko >= severity {
            Self::Ko
        } else {
            Self::Half
        }
    }
}

/// Mean ok percentage over all bars.
#[must_use]
pub fn average_uptime<'a>(repartitions: impl IntoIterator<Item = &'a Repartition>) -> f64 {
    let (sum, count) = repartitions
        .into_iter()
        .fold((0.0, 0_usize), |(sum, count), r| (sum + r.ok, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Human label for the start of the window, e.g. `"2 days ago"`.
#[must_use]
pub fn window_label(hours_to_show: f64) -> String {
    fn plural(amount: f64, unit: &str) -> String {
        if amount == 1.0 {
            format!("{amount} {unit} ago")
        } else {
            format!("{amount} {unit}s ago")
        }
    }

    if hours_to_show == 0.0 {
        "Now".to_string()
    } else if hours_to_show % 168.0 == 0.0 {
        plural(hours_to_show / 168.0, "week")
    } else if hours_to_show % 24.0 == 0.0 {
        plural(hours_to_show / 24.0, "day")
    } else {
        plural(hours_to_show, "hour")
    }
}

/// Text shown for the sensor's live state.
#[must_use]
pub fn status_label(
    state: Option<&str>,
    classifier: &StatusClassifier,
    alias_ok: Option<&str>,
    alias_ko: Option<&str>,
) -> String {
    let Some(raw) = state else {
        return UNKNOWN_LABEL.to_string();
    };

    match (classifier.classify(Some(raw)), alias_ok, alias_ko) {
        (Status::Ok, Some(alias), _) | (Status::Ko, _, Some(alias)) => alias.to_string(),
        (Status::Unknown, _, _) => UNKNOWN_LABEL.to_string(),
        _ => raw.to_string(),
    }
}
