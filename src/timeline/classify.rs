use serde::Serialize;
use utoipa::ToSchema;

/// Entity domain whose `on`/`off` states are understood without configuration.
const BINARY_SENSOR_DOMAIN: &str = "binary_sensor";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Ko,
    Unknown,
}

/// Maps raw state strings to [`Status`] using the configured ok/ko values.
///
/// When only one of `ok`/`ko` is configured, every other state falls on the
/// opposite side. With neither configured, only `binary_sensor` entities get
/// a mapping (`on` is ok, `off` is ko).
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    ok: Option<String>,
    ko: Option<String>,
    binary_sensor: bool,
}

impl StatusClassifier {
    #[must_use]
    pub fn new(entity_id: &str, ok: Option<String>, ko: Option<String>) -> Self {
        Self {
            ok,
            ko,
            binary_sensor: entity_id.starts_with(BINARY_SENSOR_DOMAIN),
        }
    }

    #[must_use]
    pub fn classify(&self, state: Option<&str>) -> Status {
        let Some(state) = state else {
            return Status::Unknown;
        };

        if self.ok.as_deref() == Some(state) {
            return Status::Ok;
        }
        if self.ko.as_deref() == Some(state) {
            return Status::Ko;
        }

        match (&self.ok, &self.ko) {
            (None, None) if self.binary_sensor => match state {
                "on" => Status::Ok,
                "off" => Status::Ko,
                _ => Status::Unknown,
            },
            (None, None) => Status::Unknown,
            (None, Some(_)) => Status::Ok,
            (Some(_), _) => Status::Ko,
        }
    }
}
