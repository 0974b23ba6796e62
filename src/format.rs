//! ==============================================================================
//! format.rs - sensor value formatting
//! ==============================================================================
//!
//! purpose:
//!     turns raw readings from the cloud api into the short strings the
//!     widget shows. pure functions, no state, no io.
//!
//! relationships:
//!     - used by: widget.rs (one call per widget row)
//!     - used by: main.rs (sensor log line when show_sensor_data is on)
//!
//! ==============================================================================

use chrono::{DateTime, Datelike, TimeDelta, TimeZone, Timelike, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum HourFormat {
    #[serde(rename = "12h")]
    H12,
    #[default]
    #[serde(rename = "24h")]
    H24,
}

/// bucket an illumination reading, e.g. `Dim (100)`
pub fn illumination_label(value: f64) -> String {
    let bucket = if value <= 50.0 {
        "Dark"
    } else if value <= 127.0 {
        "Dim"
    } else if value <= 205.0 {
        "Medium"
    } else {
        "Light"
    };
    format!("{} ({})", bucket, value)
}

pub fn temperature_label(celsius: f64, unit: TemperatureUnit) -> String {
    match unit {
        TemperatureUnit::Celsius => format!("{}°C", celsius),
        TemperatureUnit::Fahrenheit => format!("{}°F", celsius * 1.8 + 32.0),
    }
}

pub fn humidity_label(value: f64) -> String {
    format!("{}%", value)
}

/// `HH:MM`, or `HH:MM a.m.`/`HH:MM p.m.` on the 12 hour clock
///
/// the a.m./p.m. suffix is decided from the 24h hour, so 12 is p.m. and
/// 0 prints as 12 a.m.
pub fn time_label(hour: u32, minute: u32, format: HourFormat) -> String {
    match format {
        HourFormat::H24 => format!("{:02}:{:02}", hour, minute),
        HourFormat::H12 => {
            let suffix = if hour < 12 { "a.m." } else { "p.m." };
            let h = match hour % 12 {
                0 => 12,
                h => h,
            };
            format!("{:02}:{:02} {}", h, minute, suffix)
        }
    }
}

/// `M/D <time>` for the last motion event, in the given time zone
///
/// `offset_seconds` is added to the reported timestamp first; the sensor
/// clock drifts on some units.
pub fn motion_label<Tz: TimeZone>(
    created_at: DateTime<Utc>,
    offset_seconds: i64,
    format: HourFormat,
    tz: &Tz,
) -> String {
    let shifted = TimeDelta::try_seconds(offset_seconds)
        .and_then(|delta| created_at.checked_add_signed(delta))
        .unwrap_or(created_at);
    let local = shifted.with_timezone(tz);
    format!(
        "{}/{} {}",
        local.month(),
        local.day(),
        time_label(local.hour(), local.minute(), format)
    )
}
