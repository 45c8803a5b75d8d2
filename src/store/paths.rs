//! Store paths scoped to one device.
//!
//! Every path the service touches lives under the device identifier (the
//! POP code printed on the unit), e.g. `ABC123/current`.

// ---

/// Characters the hosted store forbids in keys.
const FORBIDDEN: [char; 6] = ['.', '#', '$', '[', ']', '/'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    device: String,
}

impl DevicePaths {
    // ---
    /// Scope paths to `device`. Returns `None` for an empty code or one
    /// that cannot be used as a store key.
    pub fn new(device: &str) -> Option<Self> {
        // ---
        let device = device.trim();
        if !is_valid_key(device) {
            return None;
        }
        Some(Self {
            device: device.to_string(),
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Latest reading written by the firmware.
    pub fn current(&self) -> String {
        format!("{}/current", self.device)
    }

    /// Pump state reported by the firmware.
    pub fn pump_status(&self) -> String {
        format!("{}/pumpStatus", self.device)
    }

    pub fn pump_command(&self) -> String {
        format!("{}/pumpCommand", self.device)
    }

    pub fn pump_duration(&self) -> String {
        format!("{}/pumpDuration", self.device)
    }

    /// Readings transferred into the daily history.
    pub fn daily_readings(&self) -> String {
        format!("{}/daily_readings", self.device)
    }

    /// Number of transfers made on `date` (`YYYY-MM-DD`).
    pub fn daily_count(&self, date: &str) -> String {
        format!("{}/daily_readings_count/{}", self.device, date)
    }

    pub fn score_history(&self) -> String {
        format!("{}/system_score_history", self.device)
    }
}

/// True when `key` is non-empty and free of forbidden characters.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(&FORBIDDEN[..]) && !key.chars().any(char::is_control)
}
