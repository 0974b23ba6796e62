use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// one device as returned by `GET 1/devices`
///
/// the cloud api returns many more fields (firmware, users, offsets...),
/// serde drops everything we do not name here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    /// latest reading per sensor kind
    #[serde(default)]
    pub newest_events: NewestEvents,
}

/// newest event per sensor kind, keyed the way the api keys them
///
/// older remo models have no illumination or motion sensor, so every
/// kind is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewestEvents {
    /// temperature in celsius
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub te: Option<SensorEvent>,
    /// relative humidity (0-100%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hu: Option<SensorEvent>,
    /// illumination (0-255ish)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub il: Option<SensorEvent>,
    /// motion - only `created_at` is meaningful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mo: Option<SensorEvent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    pub val: f64,
    pub created_at: DateTime<Utc>,
}

/// payload pushed in from the companion side-channel
///
/// opaque apart from the date, which the widget shows as "Updated at ...".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryPayload {
    pub date: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AuxiliaryPayload {
    pub fn new(date: impl Into<String>) -> Self {
        Self { date: date.into(), extra: serde_json::Map::new() }
    }
}

/// what the renderer reads
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// last successfully parsed device list, `None` until the first success
    pub devices: Option<Vec<DeviceRecord>>,
    /// last payload pushed through the auxiliary channel
    pub auxiliary: Option<AuxiliaryPayload>,
}

impl Snapshot {
    #[allow(dead_code)]
    pub fn has_data(&self) -> bool {
        self.devices.is_some()
    }
}
