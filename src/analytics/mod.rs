//! Sensor analytics: thresholds, scoring, daily aggregation, trends and
//! notifications.
//!
//! Everything in here is synchronous and total. Missing or malformed
//! inputs degrade to "no points", "no notification" or a zeroed fit.

pub mod correlation;
pub mod daily;
pub mod notifications;
pub mod score;
pub mod thresholds;
pub mod trend;

pub use correlation::{correlate, pearson, Correlation, CorrelationKind};
pub use daily::{aggregate, SortOrder};
pub use notifications::{NotificationGenerator, NotificationPreferences, NotificationTab};
pub use score::{score, ScoreBreakdown, ScoreCalculator, ScoreReport, ScoreStatus};
pub use thresholds::{evaluate, Direction, Evaluation, Severity, ThresholdRule, ThresholdSet};
pub use trend::{fit_trend, trend_for, ParameterTrend, TrendDirection, TrendFit};
