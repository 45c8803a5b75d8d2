//! Commands sent back to the device: pump control, daily transfers and
//! device code validation.

use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::dashboard::Dashboard;
use crate::models::parse_number;
use crate::settings::{Settings, SettingsService};
use crate::store::{DevicePaths, RealtimeStore, StoreError};

// ---

pub const MIN_PUMP_MINUTES: u32 = 1;
pub const MAX_PUMP_MINUTES: u32 = 60;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("No current reading available")]
    NoReading,

    #[error("Daily transfer limit of {limit} reached")]
    DailyLimitReached { limit: u32 },

    #[error("Invalid device code")]
    InvalidDeviceCode,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Settings(#[from] anyhow::Error),
}

/// Result of a successful daily transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub key: String,
    pub date: String,
    pub system_score: Option<f64>,
    pub transfers_today: u32,
    pub remaining: u32,
}

/// Pump command as written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpCommand {
    pub on: bool,
    pub minutes: Option<u32>,
}

pub struct Control {
    store: Arc<dyn RealtimeStore>,
    paths: DevicePaths,
    dashboard: Arc<Dashboard>,
    max_daily_transfers: u32,
}

impl Control {
    // ---
    pub fn new(
        store: Arc<dyn RealtimeStore>,
        paths: DevicePaths,
        dashboard: Arc<Dashboard>,
        max_daily_transfers: u32,
    ) -> Self {
        Self {
            store,
            paths,
            dashboard,
            max_daily_transfers,
        }
    }

    /// Flip the pump relative to its last mirrored status.
    pub async fn toggle_pump(&self) -> Result<PumpCommand, ControlError> {
        // ---
        let on = !self.dashboard.pump_on().await;
        self.store
            .write_once(&self.paths.pump_command(), Value::Bool(on))
            .await?;

        tracing::info!("Pump toggled {}", if on { "ON" } else { "OFF" });
        Ok(PumpCommand { on, minutes: None })
    }

    /// Run the pump for `minutes`, clamped to 1..=60.
    pub async fn run_pump(&self, minutes: u32) -> Result<PumpCommand, ControlError> {
        // ---
        let minutes = clamp_minutes(minutes);
        self.store
            .write_once(&self.paths.pump_command(), Value::Bool(true))
            .await?;
        self.store
            .write_once(&self.paths.pump_duration(), json!(minutes))
            .await?;

        tracing::info!("Pump started for {} minute(s)", minutes);
        Ok(PumpCommand {
            on: true,
            minutes: Some(minutes),
        })
    }

    /// Copy the current reading into today's history.
    pub async fn transfer_daily(&self) -> Result<TransferReceipt, ControlError> {
        self.transfer_daily_at(Local::now()).await
    }

    pub async fn transfer_daily_at(
        &self,
        now: DateTime<Local>,
    ) -> Result<TransferReceipt, ControlError> {
        // ---
        let date = now.format("%Y-%m-%d").to_string();
        let count_path = self.paths.daily_count(&date);

        let count = self
            .store
            .read_once(&count_path)
            .await?
            .as_ref()
            .and_then(parse_number)
            .map(|n| n.max(0.0) as u32)
            .unwrap_or(0);

        if count >= self.max_daily_transfers {
            tracing::warn!(
                "Daily transfer rejected: {}/{} already sent for {}",
                count,
                self.max_daily_transfers,
                date
            );
            return Err(ControlError::DailyLimitReached {
                limit: self.max_daily_transfers,
            });
        }

        let Some(Value::Object(mut reading)) = self.store.read_once(&self.paths.current()).await?
        else {
            return Err(ControlError::NoReading);
        };

        let score = self.dashboard.latest_score();
        reading.insert("date".to_string(), Value::String(date.clone()));
        if let Some(score) = score {
            reading.insert("systemScore".to_string(), json!(score));
        }

        let key = self
            .store
            .push(&self.paths.daily_readings(), Value::Object(reading))
            .await?;

        if let Some(score) = score {
            self.store
                .push(
                    &self.paths.score_history(),
                    json!({
                        "date": date,
                        "timestamp": now.to_rfc3339(),
                        "score": score,
                    }),
                )
                .await?;
        }

        let transfers_today = count + 1;
        self.store
            .write_once(&count_path, json!(transfers_today))
            .await?;

        tracing::info!(
            "Daily transfer {}/{} stored as {}",
            transfers_today,
            self.max_daily_transfers,
            key
        );

        Ok(TransferReceipt {
            key,
            date,
            system_score: score,
            transfers_today,
            remaining: self.max_daily_transfers.saturating_sub(transfers_today),
        })
    }
}

/// Check a device (POP) code against the store's top-level keys and
/// remember it on success.
pub async fn validate_device_code(
    store: &dyn RealtimeStore,
    settings: &SettingsService,
    code: &str,
) -> Result<Settings, ControlError> {
    // ---
    let code = code.trim();
    if code.is_empty() {
        return Err(ControlError::InvalidDeviceCode);
    }

    let devices = store.child_keys("").await?;
    if !devices.iter().any(|d| d == code) {
        tracing::warn!("Unknown device code '{}'", code);
        return Err(ControlError::InvalidDeviceCode);
    }

    tracing::info!("Device code '{}' validated", code);
    Ok(settings.set_device_code(code).await?)
}

pub fn clamp_minutes(minutes: u32) -> u32 {
    minutes.clamp(MIN_PUMP_MINUTES, MAX_PUMP_MINUTES)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::analytics::{NotificationPreferences, ThresholdSet};
    use crate::settings::MemoryKeyValueStore;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    struct Fixture {
        store: Arc<MemoryStore>,
        dashboard: Arc<Dashboard>,
        control: Control,
    }

    fn fixture(tree: Value) -> Fixture {
        // ---
        let store = Arc::new(MemoryStore::with_tree(tree));
        let dashboard = Arc::new(Dashboard::new(
            ThresholdSet::default(),
            NotificationPreferences::default(),
        ));
        let control = Control::new(
            store.clone(),
            DevicePaths::new("POP1").unwrap(),
            dashboard.clone(),
            4,
        );
        Fixture {
            store,
            dashboard,
            control,
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()
    }

    fn current() -> Value {
        json!({ "pH": 6.0, "tds": 900, "waterTemperature": 20, "airTemperature": 22,
                "airHumidity": 60, "ldr": 3000 })
    }

    #[test]
    fn test_pump_minutes_are_clamped() {
        assert_eq!(clamp_minutes(0), 1);
        assert_eq!(clamp_minutes(15), 15);
        assert_eq!(clamp_minutes(90), 60);
    }

    #[tokio::test]
    async fn test_toggle_writes_negated_status() {
        // ---
        let f = fixture(json!({}));
        assert!(f.control.toggle_pump().await.unwrap().on);
        assert_eq!(f.store.snapshot()["POP1"]["pumpCommand"], json!(true));

        f.dashboard.apply_pump_status(&json!(true)).await;
        assert!(!f.control.toggle_pump().await.unwrap().on);
        assert_eq!(f.store.snapshot()["POP1"]["pumpCommand"], json!(false));
    }

    #[tokio::test]
    async fn test_run_pump_writes_command_and_duration() {
        // ---
        let f = fixture(json!({}));
        let command = f.control.run_pump(120).await.unwrap();

        assert_eq!(command.minutes, Some(60));
        let device = &f.store.snapshot()["POP1"];
        assert_eq!(device["pumpCommand"], json!(true));
        assert_eq!(device["pumpDuration"], json!(60));
    }

    #[tokio::test]
    async fn test_transfer_stamps_date_and_score() {
        // ---
        let f = fixture(json!({ "POP1": { "current": current() } }));
        f.dashboard.apply_current(&current()).await;

        let receipt = f.control.transfer_daily_at(noon()).await.unwrap();
        assert_eq!(receipt.date, "2024-03-05");
        assert_eq!(receipt.system_score, Some(10.0));
        assert_eq!(receipt.transfers_today, 1);
        assert_eq!(receipt.remaining, 3);

        let device = f.store.snapshot()["POP1"].clone();
        let stored = &device["daily_readings"][&receipt.key];
        assert_eq!(stored["date"], json!("2024-03-05"));
        assert_eq!(stored["systemScore"], json!(10.0));
        assert_eq!(stored["pH"], json!(6.0));
        assert_eq!(device["daily_readings_count"]["2024-03-05"], json!(1));

        let history = device["system_score_history"].as_object().unwrap();
        assert_eq!(history.len(), 1);
        let entry = history.values().next().unwrap();
        assert_eq!(entry["score"], json!(10.0));
        assert_eq!(entry["date"], json!("2024-03-05"));
    }

    #[tokio::test]
    async fn test_transfer_without_score_skips_history() {
        // ---
        let f = fixture(json!({ "POP1": { "current": current() } }));
        let receipt = f.control.transfer_daily_at(noon()).await.unwrap();

        assert_eq!(receipt.system_score, None);
        assert!(f.store.snapshot()["POP1"].get("system_score_history").is_none());
    }

    #[tokio::test]
    async fn test_transfer_limit_per_day() {
        // ---
        let f = fixture(json!({
            "POP1": { "current": current(), "daily_readings_count": { "2024-03-05": 4 } }
        }));

        let err = f.control.transfer_daily_at(noon()).await.unwrap_err();
        assert!(matches!(err, ControlError::DailyLimitReached { limit: 4 }));

        let next_day = Local.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap();
        assert!(f.control.transfer_daily_at(next_day).await.is_ok());
    }

    #[tokio::test]
    async fn test_transfer_requires_current_reading() {
        // ---
        let f = fixture(json!({}));
        let err = f.control.transfer_daily_at(noon()).await.unwrap_err();
        assert!(matches!(err, ControlError::NoReading));
    }

    #[tokio::test]
    async fn test_device_code_validation() {
        // ---
        let store = MemoryStore::with_tree(json!({ "POP1": { "current": {} }, "POP2": {"x": 1} }));
        let settings = SettingsService::load(Arc::new(MemoryKeyValueStore::default()))
            .await
            .unwrap();

        let saved = validate_device_code(&store, &settings, "  POP2 ").await.unwrap();
        assert_eq!(saved.device_code.as_deref(), Some("POP2"));
        assert!(saved.onboarding_seen);

        for bad in ["", "   ", "POP9"] {
            let err = validate_device_code(&store, &settings, bad).await.unwrap_err();
            assert!(matches!(err, ControlError::InvalidDeviceCode));
        }
        assert_eq!(settings.current().await.device_code.as_deref(), Some("POP2"));
    }
}
