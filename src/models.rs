//! Data models for the hydroponics monitor.
//!
//! A [`Reading`] mirrors one snapshot written by the device firmware under
//! `<device>/current` or `<device>/daily_readings/<push-id>`. Every sensor
//! field is optional: an absent or non-numeric field is "unknown", never
//! zero, as far as scoring and threshold checks are concerned.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---

/// Sensor parameters understood by the analytics core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Parameter {
    Ph,
    Tds,
    WaterTemperature,
    AirTemperature,
    AirHumidity,
    Light,
    SystemScore,
}

impl Parameter {
    // ---
    /// Parameters checked against thresholds by the notification generator.
    pub const MONITORED: [Parameter; 5] = [
        Parameter::Ph,
        Parameter::Tds,
        Parameter::WaterTemperature,
        Parameter::AirTemperature,
        Parameter::AirHumidity,
    ];

    /// Human readable label used in notification messages.
    pub fn label(&self) -> &'static str {
        match self {
            Parameter::Ph => "pH",
            Parameter::Tds => "TDS",
            Parameter::WaterTemperature => "Water Temperature",
            Parameter::AirTemperature => "Air Temperature",
            Parameter::AirHumidity => "Humidity",
            Parameter::Light => "Light",
            Parameter::SystemScore => "System Score",
        }
    }

    /// pH is shown with two decimals, everything else as whole numbers.
    pub fn format_value(&self, value: f64) -> String {
        match self {
            Parameter::Ph => format!("{:.2}", value),
            _ => format!("{:.0}", value),
        }
    }

    /// Value of this parameter in a reading, if known.
    pub fn value_in(&self, reading: &Reading) -> Option<f64> {
        match self {
            Parameter::Ph => reading.ph,
            Parameter::Tds => reading.tds,
            Parameter::WaterTemperature => reading.water_temperature,
            Parameter::AirTemperature => reading.air_temperature,
            Parameter::AirHumidity => reading.air_humidity,
            Parameter::Light => reading.ldr,
            Parameter::SystemScore => reading.system_score,
        }
    }

    /// Daily mean of this parameter.
    pub fn average_in(&self, day: &DayAverage) -> f64 {
        match self {
            Parameter::Ph => day.avg_ph,
            Parameter::Tds => day.avg_tds,
            Parameter::WaterTemperature => day.avg_water_temp,
            Parameter::AirTemperature => day.avg_air_temp,
            Parameter::AirHumidity => day.avg_humidity,
            Parameter::Light => day.avg_light,
            Parameter::SystemScore => day.avg_system_score,
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One snapshot of sensor values as stored by the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    // ---
    #[serde(
        rename = "pH",
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub ph: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub tds: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub water_temperature: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub air_temperature: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub air_humidity: Option<f64>,

    /// Light-dependent resistor reading.
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub ldr: Option<f64>,

    /// Ultrasonic distance to the water surface, in cm.
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,

    /// Score stamped onto readings transferred to the daily history.
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub system_score: Option<f64>,

    /// Time string embedded by the firmware.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Calendar date (`YYYY-MM-DD`) on history entries.
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Reading {
    // ---
    /// Decode a store snapshot. Anything that is not an object yields `None`.
    pub fn from_snapshot(value: &Value) -> Option<Reading> {
        // ---
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// The embedded time string, preferring `time` over `timestamp`.
    pub fn time_text(&self) -> Option<&str> {
        self.time.as_deref().or(self.timestamp.as_deref())
    }
}

/// Parse a JSON value as a finite number. Numeric strings are accepted;
/// anything else is treated as missing.
pub fn parse_number(value: &Value) -> Option<f64> {
    // ---
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_number(&value))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Per-day arithmetic means of the history readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayAverage {
    // ---
    pub date: String,
    #[serde(rename = "avgPH")]
    pub avg_ph: f64,
    #[serde(rename = "avgTDS")]
    pub avg_tds: f64,
    #[serde(rename = "avgWaterTemp")]
    pub avg_water_temp: f64,
    #[serde(rename = "avgAirTemp")]
    pub avg_air_temp: f64,
    #[serde(rename = "avgHumidity")]
    pub avg_humidity: f64,
    #[serde(rename = "avgLight")]
    pub avg_light: f64,
    #[serde(rename = "avgSystemScore")]
    pub avg_system_score: f64,
    #[serde(rename = "readingsCount")]
    pub readings_count: usize,
}

/// Kind of an alert shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Critical,
    Warning,
}

/// A threshold violation raised from the latest reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    // ---
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub parameter: String,
    pub value: String,
    pub timestamp: String,
    pub read: bool,
}

/// Water reservoir fill level derived from the distance sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WaterLevel {
    Full,
    ThreeQuarters,
    Empty,
}

impl WaterLevel {
    // ---
    /// Classify a distance reading. Only the exact whole-centimetre values
    /// reported by the level sensor map to a filled state.
    pub fn from_distance(distance: Option<f64>) -> WaterLevel {
        // ---
        match distance {
            Some(d) if d == 2.0 || d == 3.0 || d == 4.0 => WaterLevel::Full,
            Some(d) if d == 5.0 || d == 6.0 => WaterLevel::ThreeQuarters,
            _ => WaterLevel::Empty,
        }
    }

    pub fn percentage(&self) -> u8 {
        match self {
            WaterLevel::Full => 100,
            WaterLevel::ThreeQuarters => 75,
            WaterLevel::Empty => 0,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            WaterLevel::Full => "Full",
            WaterLevel::ThreeQuarters => "75% Full",
            WaterLevel::Empty => "Empty",
        }
    }
}
