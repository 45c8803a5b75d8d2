//! Threshold checking for the monitored sensor parameters.
//!
//! Each parameter carries a [`ThresholdRule`] with optional critical and
//! warning bounds. Critical bounds are always checked first, so a value
//! outside them is critical even when a warning bound is tighter.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::models::Parameter;

// ---

/// Severity of a threshold check, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

/// Which side of the range a value fell out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    None,
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub severity: Severity,
    pub direction: Direction,
}

impl Evaluation {
    pub const NORMAL: Evaluation = Evaluation {
        severity: Severity::Normal,
        direction: Direction::None,
    };

    pub fn is_normal(&self) -> bool {
        self.severity == Severity::Normal
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    fn check(&self, value: f64) -> Direction {
        // ---
        match (self.min, self.max) {
            (Some(min), _) if value < min => Direction::Low,
            (_, Some(max)) if value > max => Direction::High,
            _ => Direction::None,
        }
    }
}

/// Critical and warning bounds for one parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Bounds>,
}

impl ThresholdRule {
    pub fn new(critical: Bounds, warning: Bounds) -> Self {
        Self {
            critical: Some(critical),
            warning: Some(warning),
        }
    }
}

/// Classify a parsed value against a rule.
///
/// An unknown value is `normal`: missing data never raises an alert.
pub fn evaluate(parameter: Parameter, value: Option<f64>, rule: &ThresholdRule) -> Evaluation {
    // ---
    let Some(value) = value.filter(|v| !v.is_nan()) else {
        tracing::trace!("{}: no value, skipping threshold check", parameter);
        return Evaluation::NORMAL;
    };

    let levels = [
        (Severity::Critical, rule.critical),
        (Severity::Warning, rule.warning),
    ];

    for (severity, bounds) in levels {
        let Some(bounds) = bounds else { continue };
        let direction = bounds.check(value);
        if direction != Direction::None {
            return Evaluation {
                severity,
                direction,
            };
        }
    }

    Evaluation::NORMAL
}

/// Threshold rules for every monitored parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdSet {
    pub ph: ThresholdRule,
    pub tds: ThresholdRule,
    pub water_temperature: ThresholdRule,
    pub air_temperature: ThresholdRule,
    pub air_humidity: ThresholdRule,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        // Warning bounds match the optimal ranges used by the system score.
        Self {
            ph: ThresholdRule::new(Bounds::new(5.0, 7.0), Bounds::new(5.5, 6.5)),
            tds: ThresholdRule::new(Bounds::new(600.0, 1200.0), Bounds::new(800.0, 1000.0)),
            water_temperature: ThresholdRule::new(Bounds::new(10.0, 30.0), Bounds::new(15.5, 24.0)),
            air_temperature: ThresholdRule::new(Bounds::new(15.0, 32.0), Bounds::new(20.0, 25.0)),
            air_humidity: ThresholdRule::new(Bounds::new(30.0, 85.0), Bounds::new(50.0, 70.0)),
        }
    }
}

impl ThresholdSet {
    // ---
    /// Rule for a monitored parameter; `None` for parameters without one.
    pub fn rule_for(&self, parameter: Parameter) -> Option<&ThresholdRule> {
        match parameter {
            Parameter::Ph => Some(&self.ph),
            Parameter::Tds => Some(&self.tds),
            Parameter::WaterTemperature => Some(&self.water_temperature),
            Parameter::AirTemperature => Some(&self.air_temperature),
            Parameter::AirHumidity => Some(&self.air_humidity),
            Parameter::Light | Parameter::SystemScore => None,
        }
    }

    /// Load thresholds from a JSON file. Parameters missing from the file
    /// keep their built-in rules.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        // ---
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read thresholds file '{}'", path.display()))?;
        let set = serde_json::from_str(&text)
            .with_context(|| format!("Invalid thresholds file '{}'", path.display()))?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    fn ph_rule() -> ThresholdRule {
        ThresholdRule::new(Bounds::new(5.0, 7.0), Bounds::new(5.5, 6.5))
    }

    fn eval(value: f64) -> Evaluation {
        evaluate(Parameter::Ph, Some(value), &ph_rule())
    }

    #[test]
    fn test_missing_value_is_normal() {
        // ---
        assert_eq!(evaluate(Parameter::Ph, None, &ph_rule()), Evaluation::NORMAL);
        assert_eq!(
            evaluate(Parameter::Ph, None, &ThresholdRule::default()),
            Evaluation::NORMAL
        );
    }

    #[test]
    fn test_inside_warning_range_is_normal() {
        // ---
        assert!(eval(6.0).is_normal());
        assert!(eval(5.5).is_normal(), "bounds are inclusive");
        assert!(eval(6.5).is_normal(), "bounds are inclusive");
    }

    #[test]
    fn test_warning_levels() {
        // ---
        assert_eq!(
            eval(5.2),
            Evaluation {
                severity: Severity::Warning,
                direction: Direction::Low
            }
        );
        assert_eq!(
            eval(6.8),
            Evaluation {
                severity: Severity::Warning,
                direction: Direction::High
            }
        );
    }

    #[test]
    fn test_critical_levels() {
        // ---
        assert_eq!(
            eval(4.2),
            Evaluation {
                severity: Severity::Critical,
                direction: Direction::Low
            }
        );
        assert_eq!(
            eval(7.4),
            Evaluation {
                severity: Severity::Critical,
                direction: Direction::High
            }
        );
    }

    #[test]
    fn test_critical_checked_before_tighter_warning() {
        // ---
        // Misconfigured rule: warning.min below critical.min. Critical still wins.
        let rule = ThresholdRule::new(Bounds::new(6.0, 7.0), Bounds::new(5.0, 8.0));
        let result = evaluate(Parameter::Ph, Some(5.5), &rule);
        assert_eq!(result.severity, Severity::Critical);
        assert_eq!(result.direction, Direction::Low);
    }

    #[test]
    fn test_partial_rules() {
        // ---
        let only_warning_max = ThresholdRule {
            critical: None,
            warning: Some(Bounds {
                min: None,
                max: Some(1000.0),
            }),
        };

        assert!(evaluate(Parameter::Tds, Some(10.0), &only_warning_max).is_normal());
        assert_eq!(
            evaluate(Parameter::Tds, Some(1001.0), &only_warning_max).severity,
            Severity::Warning
        );
    }

    #[test]
    fn test_snapshot_values_parse_or_fall_back_to_normal() {
        // ---
        let rule = ph_rule();
        let ph_of = |snapshot: serde_json::Value| {
            let reading = crate::models::Reading::from_snapshot(&snapshot).unwrap_or_default();
            evaluate(Parameter::Ph, Parameter::Ph.value_in(&reading), &rule)
        };

        assert_eq!(ph_of(json!({ "pH": "4.1" })).severity, Severity::Critical);
        assert!(ph_of(json!({ "pH": "acidic" })).is_normal());
        assert!(ph_of(json!({ "pH": null })).is_normal());
        assert!(ph_of(json!({ "tds": 900 })).is_normal());
    }

    #[test]
    fn test_partial_threshold_file_keeps_defaults() {
        // ---
        let set: ThresholdSet = serde_json::from_value(json!({
            "tds": { "warning": { "min": 700, "max": 1100 } }
        }))
        .unwrap();

        assert_eq!(set.ph, ThresholdSet::default().ph);
        assert_eq!(set.tds.critical, None);
        assert_eq!(set.tds.warning, Some(Bounds::new(700.0, 1100.0)));
    }

    #[test]
    fn test_light_has_no_rule() {
        // ---
        let set = ThresholdSet::default();
        assert!(set.rule_for(Parameter::Light).is_none());
        for parameter in Parameter::MONITORED {
            assert!(set.rule_for(parameter).is_some(), "{} has a rule", parameter);
        }
    }
}
