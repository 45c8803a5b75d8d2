//! Live dashboard state fed by store subscriptions.
//!
//! Three feeds drive it: the device's current reading, its pump status and
//! its daily reading history. Every snapshot triggers a synchronous
//! recomputation of whatever depends on it; a newer snapshot simply
//! replaces the results of an older one.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::analytics::{
    correlate, daily, notifications, trend_for, Correlation, NotificationGenerator,
    NotificationPreferences, NotificationTab, ParameterTrend, ScoreBreakdown, ScoreCalculator,
    ScoreReport, SortOrder, ThresholdSet,
};
use crate::models::{DayAverage, Notification, Parameter, Reading, WaterLevel};
use crate::store::{DevicePaths, RealtimeStore};

// ---

/// Which store feed a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Current,
    PumpStatus,
    History,
}

#[derive(Debug, Clone, Default)]
struct State {
    latest: Option<Reading>,
    breakdown: Option<ScoreBreakdown>,
    notifications: Vec<Notification>,
    history: Vec<Reading>,
    days: Vec<DayAverage>,
    pump_on: bool,
    last_error: Option<String>,
}

/// The current reading with its score.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentView {
    pub reading: Reading,
    pub score: ScoreReport,
    pub water_level: WaterLevel,
    pub water_level_status: &'static str,
    pub water_level_percentage: u8,
}

/// Connection and pump status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub pump_on: bool,
    pub has_reading: bool,
    pub history_readings: usize,
    pub last_error: Option<String>,
}

pub struct Dashboard {
    state: RwLock<State>,
    score: ScoreCalculator,
    generator: RwLock<NotificationGenerator>,
}

impl Dashboard {
    // ---
    pub fn new(thresholds: ThresholdSet, preferences: NotificationPreferences) -> Self {
        Self {
            state: RwLock::new(State::default()),
            score: ScoreCalculator::new(),
            generator: RwLock::new(NotificationGenerator::new(thresholds, preferences)),
        }
    }

    /// Route a snapshot to the recomputation for its feed.
    pub async fn apply(&self, feed: Feed, snapshot: &Value) {
        match feed {
            Feed::Current => self.apply_current(snapshot).await,
            Feed::PumpStatus => self.apply_pump_status(snapshot).await,
            Feed::History => self.apply_history(snapshot).await,
        }
    }

    /// New current reading: rescore and regenerate notifications.
    pub async fn apply_current(&self, snapshot: &Value) {
        // ---
        let reading = Reading::from_snapshot(snapshot);
        let generator = self.generator.read().await;
        let mut state = self.state.write().await;

        match reading {
            Some(reading) => {
                let breakdown = self.score.recompute(&reading);
                state.notifications = generator.generate(&reading, &state.notifications);
                state.breakdown = Some(breakdown);
                state.latest = Some(reading);
            }
            None => {
                tracing::warn!("Current reading is empty");
                state.notifications = generator.generate(&Reading::default(), &state.notifications);
                state.breakdown = None;
                state.latest = None;
            }
        }
        state.last_error = None;
    }

    pub async fn apply_pump_status(&self, snapshot: &Value) {
        // ---
        let on = snapshot.as_bool().unwrap_or(false);
        tracing::info!("Pump is {}", if on { "ON" } else { "OFF" });
        self.state.write().await.pump_on = on;
    }

    /// New history snapshot: re-derive the daily averages.
    ///
    /// The history node maps push keys to readings; push keys sort in
    /// insertion order, so the readings keep their chronological order.
    pub async fn apply_history(&self, snapshot: &Value) {
        // ---
        let history: Vec<Reading> = snapshot
            .as_object()
            .map(|entries| entries.values().filter_map(Reading::from_snapshot).collect())
            .unwrap_or_default();
        let days = daily::aggregate(&history, None);

        tracing::debug!(
            "History updated: {} readings over {} days",
            history.len(),
            days.len()
        );

        let mut state = self.state.write().await;
        state.history = history;
        state.days = days;
    }

    /// Remember a store failure for the status endpoint.
    pub async fn record_error(&self, message: impl Into<String>) {
        self.state.write().await.last_error = Some(message.into());
    }

    pub async fn set_preferences(&self, preferences: NotificationPreferences) {
        self.generator.write().await.set_preferences(preferences);
    }

    // ---

    pub async fn current(&self) -> Option<CurrentView> {
        // ---
        let state = self.state.read().await;
        let reading = state.latest.clone()?;
        let breakdown = state.breakdown.unwrap_or_default();
        let level = WaterLevel::from_distance(reading.distance);

        Some(CurrentView {
            score: ScoreReport::new(&reading, breakdown),
            water_level: level,
            water_level_status: level.status(),
            water_level_percentage: level.percentage(),
            reading,
        })
    }

    pub async fn status(&self) -> StatusView {
        let state = self.state.read().await;
        StatusView {
            pump_on: state.pump_on,
            has_reading: state.latest.is_some(),
            history_readings: state.history.len(),
            last_error: state.last_error.clone(),
        }
    }

    pub async fn pump_on(&self) -> bool {
        self.state.read().await.pump_on
    }

    pub async fn notifications(&self, tab: Option<NotificationTab>) -> Vec<Notification> {
        let state = self.state.read().await;
        match tab {
            Some(tab) => notifications::filter_tab(&state.notifications, tab),
            None => state.notifications.clone(),
        }
    }

    /// Dismiss a notification. Returns `false` for an unknown id.
    pub async fn mark_read(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        notifications::mark_read(&mut state.notifications, id)
    }

    /// Daily averages, optionally limited to the most recent `limit` days.
    pub async fn daily(&self, order: Option<SortOrder>, limit: Option<usize>) -> Vec<DayAverage> {
        // ---
        let state = self.state.read().await;
        let mut days = match limit {
            Some(n) => daily::latest(&state.days, n),
            None => state.days.clone(),
        };
        if let Some(order) = order {
            daily::sort(&mut days, order);
        }
        days
    }

    pub async fn trend(&self, parameter: Parameter, limit: usize) -> ParameterTrend {
        let state = self.state.read().await;
        trend_for(parameter, &daily::latest(&state.days, limit))
    }

    pub async fn correlation(&self, x: Parameter, y: Parameter, limit: usize) -> Correlation {
        let state = self.state.read().await;
        correlate(x, y, &daily::latest(&state.days, limit))
    }

    /// Latest system score total, if a reading has been scored.
    pub fn latest_score(&self) -> Option<f64> {
        self.score.latest()
    }

    /// Observe score totals as they are recomputed.
    pub fn subscribe_score(&self) -> watch::Receiver<Option<f64>> {
        self.score.subscribe()
    }
}

/// Subscribe the dashboard to the device's feeds.
///
/// Each feed runs in its own task; aborting the handles releases the
/// subscriptions.
pub fn spawn_listeners(
    dashboard: Arc<Dashboard>,
    store: Arc<dyn RealtimeStore>,
    paths: &DevicePaths,
) -> Vec<JoinHandle<()>> {
    // ---
    [
        (Feed::Current, paths.current()),
        (Feed::PumpStatus, paths.pump_status()),
        (Feed::History, paths.daily_readings()),
    ]
    .into_iter()
    .map(|(feed, path)| tokio::spawn(listen(dashboard.clone(), store.clone(), feed, path)))
    .collect()
}

async fn listen(
    dashboard: Arc<Dashboard>,
    store: Arc<dyn RealtimeStore>,
    feed: Feed,
    path: String,
) {
    // ---
    let mut subscription = match store.subscribe(&path).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!("Failed to subscribe to {}: {}", path, e);
            dashboard.record_error(format!("Failed to subscribe to {}: {}", path, e)).await;
            return;
        }
    };
    tracing::info!("Subscribed to {} ({:?})", path, feed);

    while let Some(item) = subscription.next().await {
        match item {
            Ok(snapshot) => dashboard.apply(feed, &snapshot).await,
            Err(e) => {
                tracing::error!("{} feed error: {}", path, e);
                dashboard.record_error(format!("{}: {}", path, e)).await;
            }
        }
    }

    tracing::warn!("Subscription to {} ended", path);
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn dashboard() -> Dashboard {
        Dashboard::new(ThresholdSet::default(), NotificationPreferences::default())
    }

    fn optimal() -> Value {
        json!({
            "pH": 6.0, "tds": 900, "waterTemperature": 20, "airTemperature": 22,
            "airHumidity": 60, "ldr": 3000, "distance": 3, "time": "09:15:00"
        })
    }

    #[tokio::test]
    async fn test_current_reading_is_scored() {
        // ---
        let dashboard = dashboard();
        let mut scores = dashboard.subscribe_score();

        dashboard.apply_current(&optimal()).await;

        let view = dashboard.current().await.unwrap();
        assert_eq!(view.score.breakdown.total, 10.0);
        assert_eq!(view.water_level, WaterLevel::Full);
        assert_eq!(*scores.borrow_and_update(), Some(10.0));
        assert_eq!(dashboard.latest_score(), Some(10.0));
        assert!(dashboard.notifications(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_current_clears_view() {
        // ---
        let dashboard = dashboard();
        dashboard.apply_current(&optimal()).await;
        dashboard.apply_current(&Value::Null).await;

        assert!(dashboard.current().await.is_none());
        assert!(!dashboard.status().await.has_reading);
    }

    #[tokio::test]
    async fn test_notifications_follow_latest_reading() {
        // ---
        let dashboard = dashboard();
        let mut low = optimal();
        low["pH"] = json!(5.2);

        dashboard.apply_current(&low).await;
        let alerts = dashboard.notifications(Some(NotificationTab::Warning)).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message, "pH Too Low");
        assert_eq!(alerts[0].timestamp, "9:15 AM");

        dashboard.apply_current(&optimal()).await;
        assert!(dashboard.notifications(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_notifications_move_to_history() {
        // ---
        let dashboard = dashboard();
        let mut high = optimal();
        high["tds"] = json!(1500);
        dashboard.apply_current(&high).await;

        let id = dashboard.notifications(None).await[0].id.clone();
        assert!(dashboard.mark_read(&id).await);
        assert!(!dashboard.mark_read("nope").await);

        dashboard.apply_current(&optimal()).await;
        let history = dashboard.notifications(Some(NotificationTab::History)).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
    }

    #[tokio::test]
    async fn test_disabled_preferences_suppress_new_alerts() {
        // ---
        let dashboard = dashboard();
        dashboard
            .set_preferences(NotificationPreferences { enabled: false })
            .await;
        let mut low = optimal();
        low["pH"] = json!(4.0);

        dashboard.apply_current(&low).await;
        assert!(dashboard.notifications(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_history_produces_daily_averages_and_trends() {
        // ---
        let dashboard = dashboard();
        dashboard
            .apply_history(&json!({
                "-A": { "date": "2024-01-01", "pH": 5.8, "systemScore": 8 },
                "-B": { "date": "2024-01-01", "pH": 6.0, "systemScore": 9 },
                "-C": { "date": "2024-01-02", "pH": 6.2, "systemScore": 10 },
                "-D": { "date": "2024-01-03", "pH": 6.4 }
            }))
            .await;

        let days = dashboard.daily(Some(SortOrder::Desc), None).await;
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date, "2024-01-03");
        assert_eq!(days[2].readings_count, 2);
        assert!((days[2].avg_ph - 5.9).abs() < 1e-9);
        assert_eq!(days[2].avg_system_score, 8.5);

        let recent = dashboard.daily(None, Some(2)).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].date, "2024-01-02");

        let trend = dashboard.trend(Parameter::Ph, 30).await;
        assert_eq!(trend.samples, 3);
        assert_eq!(trend.direction, crate::analytics::TrendDirection::Rising);

        assert_eq!(dashboard.status().await.history_readings, 4);
    }

    #[tokio::test]
    async fn test_pump_status_snapshot() {
        // ---
        let dashboard = dashboard();
        dashboard.apply(Feed::PumpStatus, &json!(true)).await;
        assert!(dashboard.pump_on().await);
        dashboard.apply(Feed::PumpStatus, &Value::Null).await;
        assert!(!dashboard.pump_on().await);
    }

    #[tokio::test]
    async fn test_listeners_follow_store_updates() {
        // ---
        let store = Arc::new(MemoryStore::new());
        let dashboard = Arc::new(dashboard());
        let paths = DevicePaths::new("POP1").unwrap();

        let handles = spawn_listeners(dashboard.clone(), store.clone(), &paths);
        store.write_once(&paths.current(), optimal()).await.unwrap();
        store.write_once(&paths.pump_status(), json!(true)).await.unwrap();

        let mut scores = dashboard.subscribe_score();
        let scored = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if *scores.borrow_and_update() == Some(10.0) {
                    break;
                }
                scores.changed().await.unwrap();
            }
        })
        .await;
        assert!(scored.is_ok(), "score was never published");

        let pump = tokio::time::timeout(Duration::from_secs(2), async {
            while !dashboard.pump_on().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(pump.is_ok(), "pump status never arrived");

        for handle in handles {
            handle.abort();
        }
    }
}
