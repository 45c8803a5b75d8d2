//! User settings and their persistence.
//!
//! Settings are an explicit object handed to the components that need them.
//! Where they are stored is up to the injected [`KeyValueStore`]: memory for
//! tests and throwaway runs, PostgreSQL when `DATABASE_URL` is set.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::analytics::NotificationPreferences;

// ---

const KEY_DEVICE_CODE: &str = "device_code";
const KEY_ONBOARDING_SEEN: &str = "onboarding_seen";
const KEY_NOTIFICATIONS_ENABLED: &str = "notifications_enabled";

/// String key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Settings rows in the `app_settings` table.
#[derive(Debug, Clone)]
pub struct PgKeyValueStore {
    pool: PgPool,
}

impl PgKeyValueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    // ---
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM app_settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read setting '{}'", key))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to write setting '{}'", key))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM app_settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to remove setting '{}'", key))?;
        Ok(())
    }
}

/// Persisted user settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Device (POP) code accepted at the last successful validation.
    pub device_code: Option<String>,
    pub onboarding_seen: bool,
    pub notifications_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_code: None,
            onboarding_seen: false,
            notifications_enabled: true,
        }
    }
}

impl Settings {
    pub fn notification_preferences(&self) -> NotificationPreferences {
        NotificationPreferences {
            enabled: self.notifications_enabled,
        }
    }
}

/// Partial update accepted by `PUT /settings`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub onboarding_seen: Option<bool>,
    pub notifications_enabled: Option<bool>,
}

/// Cached settings backed by a [`KeyValueStore`].
pub struct SettingsService {
    kv: Arc<dyn KeyValueStore>,
    current: RwLock<Settings>,
}

impl SettingsService {
    // ---
    /// Load settings from `kv`, falling back to defaults for missing keys.
    pub async fn load(kv: Arc<dyn KeyValueStore>) -> Result<Self> {
        // ---
        let defaults = Settings::default();
        let flag = |raw: Option<String>, default: bool| {
            raw.map(|v| v == "true").unwrap_or(default)
        };

        let settings = Settings {
            device_code: kv.get(KEY_DEVICE_CODE).await?,
            onboarding_seen: flag(kv.get(KEY_ONBOARDING_SEEN).await?, defaults.onboarding_seen),
            notifications_enabled: flag(
                kv.get(KEY_NOTIFICATIONS_ENABLED).await?,
                defaults.notifications_enabled,
            ),
        };
        tracing::debug!("Settings loaded: {:?}", settings);

        Ok(Self {
            kv,
            current: RwLock::new(settings),
        })
    }

    pub async fn current(&self) -> Settings {
        self.current.read().await.clone()
    }

    /// Apply a partial update and persist the changed keys.
    pub async fn update(&self, update: SettingsUpdate) -> Result<Settings> {
        // ---
        let mut current = self.current.write().await;

        if let Some(seen) = update.onboarding_seen {
            self.kv.set(KEY_ONBOARDING_SEEN, bool_text(seen)).await?;
            current.onboarding_seen = seen;
        }
        if let Some(enabled) = update.notifications_enabled {
            self.kv.set(KEY_NOTIFICATIONS_ENABLED, bool_text(enabled)).await?;
            current.notifications_enabled = enabled;
        }

        Ok(current.clone())
    }

    /// Remember a validated device code. Onboarding is implicitly done.
    pub async fn set_device_code(&self, code: &str) -> Result<Settings> {
        // ---
        let mut current = self.current.write().await;
        self.kv.set(KEY_DEVICE_CODE, code).await?;
        self.kv.set(KEY_ONBOARDING_SEEN, bool_text(true)).await?;
        current.device_code = Some(code.to_string());
        current.onboarding_seen = true;
        Ok(current.clone())
    }

    /// Forget the device code. Onboarding stays marked as seen.
    pub async fn clear_device_code(&self) -> Result<Settings> {
        let mut current = self.current.write().await;
        self.kv.remove(KEY_DEVICE_CODE).await?;
        current.device_code = None;
        Ok(current.clone())
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn memory() -> Arc<dyn KeyValueStore> {
        Arc::new(MemoryKeyValueStore::default())
    }

    #[tokio::test]
    async fn test_defaults_when_store_is_empty() {
        // ---
        let service = SettingsService::load(memory()).await.unwrap();
        assert_eq!(service.current().await, Settings::default());
        assert!(service.current().await.notification_preferences().enabled);
    }

    #[tokio::test]
    async fn test_updates_persist_across_reload() {
        // ---
        let kv = memory();
        let service = SettingsService::load(kv.clone()).await.unwrap();

        let updated = service
            .update(SettingsUpdate {
                onboarding_seen: None,
                notifications_enabled: Some(false),
            })
            .await
            .unwrap();
        assert!(!updated.notifications_enabled);
        assert!(!updated.onboarding_seen);

        service.set_device_code("POP-7").await.unwrap();

        let reloaded = SettingsService::load(kv).await.unwrap().current().await;
        assert_eq!(reloaded.device_code.as_deref(), Some("POP-7"));
        assert!(reloaded.onboarding_seen);
        assert!(!reloaded.notifications_enabled);
    }

    #[tokio::test]
    async fn test_clear_device_code_keeps_onboarding() {
        // ---
        let kv = memory();
        let service = SettingsService::load(kv.clone()).await.unwrap();
        service.set_device_code("POP-7").await.unwrap();

        let cleared = service.clear_device_code().await.unwrap();
        assert_eq!(cleared.device_code, None);
        assert!(cleared.onboarding_seen);
        assert_eq!(kv.get(KEY_DEVICE_CODE).await.unwrap(), None);
    }
}
