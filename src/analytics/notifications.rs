//! Threshold notifications derived from the latest reading.
//!
//! The unread set is rebuilt from scratch on every reading. Notifications
//! the user has already read are carried over; unread ones whose condition
//! has cleared are dropped rather than kept as "resolved".

use chrono::{DateTime, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

use super::thresholds::{evaluate, Direction, Severity, ThresholdSet};
use crate::models::{Notification, NotificationType, Parameter, Reading};

// ---

/// User-facing notification switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Notification list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationTab {
    Critical,
    Warning,
    History,
}

/// Builds notifications for one device's thresholds and preferences.
#[derive(Debug, Clone)]
pub struct NotificationGenerator {
    thresholds: ThresholdSet,
    preferences: NotificationPreferences,
}

impl NotificationGenerator {
    // ---
    pub fn new(thresholds: ThresholdSet, preferences: NotificationPreferences) -> Self {
        Self {
            thresholds,
            preferences,
        }
    }

    pub fn set_preferences(&mut self, preferences: NotificationPreferences) {
        self.preferences = preferences;
    }

    /// Fresh notifications for `latest` followed by the read ones from
    /// `previous`. With notifications disabled only the read history is kept.
    pub fn generate(&self, latest: &Reading, previous: &[Notification]) -> Vec<Notification> {
        // ---
        if self.preferences.enabled {
            generate(latest, &self.thresholds, previous)
        } else {
            merge(Vec::new(), previous)
        }
    }
}

/// Evaluate every monitored parameter and merge with the read history.
pub fn generate(
    latest: &Reading,
    thresholds: &ThresholdSet,
    previous: &[Notification],
) -> Vec<Notification> {
    // ---
    let timestamp = format_clock(latest.time_text());
    let mut fresh = Vec::new();

    for parameter in Parameter::MONITORED {
        let Some(rule) = thresholds.rule_for(parameter) else {
            continue;
        };
        let Some(value) = parameter.value_in(latest) else {
            continue;
        };

        let result = evaluate(parameter, Some(value), rule);
        let kind = match result.severity {
            Severity::Critical => NotificationType::Critical,
            Severity::Warning => NotificationType::Warning,
            Severity::Normal => continue,
        };
        let side = match result.direction {
            Direction::Low => "Too Low",
            Direction::High => "Too High",
            Direction::None => continue,
        };

        fresh.push(Notification {
            id: Uuid::new_v4().to_string(),
            kind,
            message: format!("{} {}", parameter.label(), side),
            parameter: parameter.label().to_string(),
            value: parameter.format_value(value),
            timestamp: timestamp.clone(),
            read: false,
        });
    }

    if !fresh.is_empty() {
        tracing::info!("{} threshold notification(s) raised", fresh.len());
    }
    merge(fresh, previous)
}

fn merge(mut fresh: Vec<Notification>, previous: &[Notification]) -> Vec<Notification> {
    fresh.extend(previous.iter().filter(|n| n.read).cloned());
    fresh
}

/// Mark a notification as read. Returns `false` if no such id exists.
pub fn mark_read(notifications: &mut [Notification], id: &str) -> bool {
    // ---
    match notifications.iter_mut().find(|n| n.id == id) {
        Some(notification) => {
            notification.read = true;
            true
        }
        None => false,
    }
}

/// Notifications shown under a tab: unread critical, unread warning, or
/// everything already read.
pub fn filter_tab(notifications: &[Notification], tab: NotificationTab) -> Vec<Notification> {
    // ---
    notifications
        .iter()
        .filter(|n| match tab {
            NotificationTab::Critical => n.kind == NotificationType::Critical && !n.read,
            NotificationTab::Warning => n.kind == NotificationType::Warning && !n.read,
            NotificationTab::History => n.read,
        })
        .cloned()
        .collect()
}

/// Render the reading's embedded time as a 12-hour clock, e.g. `2:05 PM`.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, bare `HH:MM[:SS]` and unix
/// epoch seconds or milliseconds. Anything else is returned unchanged.
pub fn format_clock(raw: Option<&str>) -> String {
    // ---
    const CLOCK: &str = "%-I:%M %p";

    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return "--".to_string();
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(CLOCK).to_string();
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format(CLOCK).to_string();
        }
    }
    for pattern in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(raw, pattern) {
            return t.format(CLOCK).to_string();
        }
    }
    if let Ok(epoch) = raw.parse::<i64>() {
        let seconds = if epoch > 100_000_000_000 { epoch / 1000 } else { epoch };
        if let Some(dt) = DateTime::from_timestamp(seconds, 0) {
            return dt.format(CLOCK).to_string();
        }
    }

    raw.to_string()
}
