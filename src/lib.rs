//! Backend for a hydroponics monitoring dashboard.
//!
//! The service mirrors one device's subtree of a realtime JSON store,
//! derives a system score, threshold notifications and daily history
//! analytics from it, and exposes everything together with pump control
//! over an HTTP API.
//!
//! Module boundaries:
//! - `analytics`: pure scoring, threshold, trend, correlation and
//!   aggregation logic
//! - `store`: the realtime store seam and its Firebase and in-memory
//!   implementations
//! - `dashboard`: live state recomputed on every store snapshot
//! - `control`: commands written back to the device
//! - `settings`: persisted user settings
//! - `routes`: the HTTP gateway

use std::sync::Arc;

use axum::Router;
use tokio::task::JoinHandle;

pub mod analytics;
pub mod config;
pub mod control;
pub mod dashboard;
pub mod models;
pub mod routes;
pub mod schema;
pub mod settings;
pub mod store;

pub use config::Config;
pub use routes::AppState;

use analytics::ThresholdSet;
use control::Control;
use dashboard::Dashboard;
use settings::SettingsService;
use store::{DevicePaths, RealtimeStore};

// ---

/// Tunables that shape the app beyond its collaborators.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub thresholds: ThresholdSet,
    pub max_daily_transfers: u32,
    pub history_days: u32,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            thresholds: ThresholdSet::default(),
            max_daily_transfers: 4,
            history_days: 30,
        }
    }
}

/// A wired application: the HTTP router plus the store listener tasks
/// feeding it.
pub struct App {
    pub router: Router,
    pub state: AppState,
    pub listeners: Vec<JoinHandle<()>>,
}

impl App {
    /// Build the dashboard, subscribe it to `paths` and mount the routes.
    pub async fn start(
        store: Arc<dyn RealtimeStore>,
        settings: Arc<SettingsService>,
        paths: DevicePaths,
        options: AppOptions,
    ) -> App {
        // ---
        let preferences = settings.current().await.notification_preferences();
        let dashboard = Arc::new(Dashboard::new(options.thresholds, preferences));
        let control = Arc::new(Control::new(
            store.clone(),
            paths.clone(),
            dashboard.clone(),
            options.max_daily_transfers,
        ));

        let listeners = dashboard::spawn_listeners(dashboard.clone(), store.clone(), &paths);
        tracing::info!(
            "Listening to device '{}' ({} feeds)",
            paths.device(),
            listeners.len()
        );

        let state = AppState {
            dashboard,
            control,
            store,
            settings,
            paths,
            history_days: options.history_days,
        };

        App {
            router: routes::router(state.clone()),
            state,
            listeners,
        }
    }

    /// Stop the store listeners.
    pub fn shutdown(&self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}
