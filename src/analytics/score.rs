//! Weighted system health score.
//!
//! Six readings contribute points against fixed optimal ranges:
//!
//! | Parameter   | In range | Out of range | Optimal range  |
//! |-------------|----------|--------------|----------------|
//! | pH          | 2        | 1            | 5.5 – 6.5      |
//! | TDS         | 2        | 1            | 800 – 1000 ppm |
//! | Water temp  | 1        | 0.5          | 15.5 – 24 °C   |
//! | Air temp    | 2        | 1            | 20 – 25 °C     |
//! | Humidity    | 2        | 1            | 50 – 70 %      |
//! | Light (LDR) | 1        | 0.5          | 2500 – 4000    |
//!
//! A missing reading contributes 0 points. The total ranges over 0..=10.

use serde::Serialize;
use tokio::sync::watch;

use crate::models::Reading;

// ---

pub const MAX_SCORE: f64 = 10.0;

/// Points for one parameter: full inside `[min, max]`, partial outside,
/// zero when unknown.
#[derive(Debug, Clone, Copy)]
struct Band {
    min: f64,
    max: f64,
    full: f64,
    partial: f64,
}

impl Band {
    fn points(&self, value: Option<f64>) -> f64 {
        match value {
            None => 0.0,
            Some(v) if v >= self.min && v <= self.max => self.full,
            Some(_) => self.partial,
        }
    }
}

const PH: Band = Band {
    min: 5.5,
    max: 6.5,
    full: 2.0,
    partial: 1.0,
};
const TDS: Band = Band {
    min: 800.0,
    max: 1000.0,
    full: 2.0,
    partial: 1.0,
};
const WATER_TEMP: Band = Band {
    min: 15.5,
    max: 24.0,
    full: 1.0,
    partial: 0.5,
};
const AIR_TEMP: Band = Band {
    min: 20.0,
    max: 25.0,
    full: 2.0,
    partial: 1.0,
};
const HUMIDITY: Band = Band {
    min: 50.0,
    max: 70.0,
    full: 2.0,
    partial: 1.0,
};
const LIGHT: Band = Band {
    min: 2500.0,
    max: 4000.0,
    full: 1.0,
    partial: 0.5,
};

/// Points per parameter plus their sum.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub ph: f64,
    pub tds: f64,
    pub water_temp: f64,
    pub air_temp: f64,
    pub humidity: f64,
    pub light_intensity: f64,
    pub total: f64,
}

/// Score a reading.
pub fn score(reading: &Reading) -> ScoreBreakdown {
    // ---
    let mut breakdown = ScoreBreakdown {
        ph: PH.points(reading.ph),
        tds: TDS.points(reading.tds),
        water_temp: WATER_TEMP.points(reading.water_temperature),
        air_temp: AIR_TEMP.points(reading.air_temperature),
        humidity: HUMIDITY.points(reading.air_humidity),
        light_intensity: LIGHT.points(reading.ldr),
        total: 0.0,
    };
    breakdown.total = breakdown.ph
        + breakdown.tds
        + breakdown.water_temp
        + breakdown.air_temp
        + breakdown.humidity
        + breakdown.light_intensity;
    breakdown
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScoreStatus {
    Excellent,
    Good,
    Critical,
}

impl ScoreStatus {
    // ---
    pub fn from_total(total: f64) -> Self {
        if total >= 8.0 {
            ScoreStatus::Excellent
        } else if total >= 6.0 {
            ScoreStatus::Good
        } else {
            ScoreStatus::Critical
        }
    }

    /// Color name shown next to the score.
    pub fn color(&self) -> &'static str {
        match self {
            ScoreStatus::Excellent => "green",
            ScoreStatus::Good => "yellow",
            ScoreStatus::Critical => "red",
        }
    }

    pub fn color_hex(&self) -> &'static str {
        match self {
            ScoreStatus::Excellent => "#4ade80",
            ScoreStatus::Good => "#facc15",
            ScoreStatus::Critical => "#ef4444",
        }
    }
}

impl std::fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreStatus::Excellent => write!(f, "Excellent"),
            ScoreStatus::Good => write!(f, "Good"),
            ScoreStatus::Critical => write!(f, "Critical"),
        }
    }
}

/// Emoji bands differ from the status bands: the neutral face starts at 5.
pub fn emoji(total: f64) -> &'static str {
    if total >= 8.0 {
        "😄"
    } else if total >= 5.0 {
        "😐"
    } else {
        "😟"
    }
}

/// Remediation hints for every parameter below its maximum points.
pub fn improvement_tips(reading: &Reading, breakdown: &ScoreBreakdown) -> Vec<String> {
    // ---
    fn current(value: Option<f64>, decimals: usize, unit: &str) -> String {
        value
            .map(|v| format!(", current: {:.*}{}", decimals, v, unit))
            .unwrap_or_default()
    }

    let mut tips = Vec::new();

    if breakdown.ph < PH.full {
        tips.push(format!(
            "Adjust pH levels to optimal range (5.5-6.5){}",
            current(reading.ph, 1, "")
        ));
    }
    if breakdown.tds < TDS.full {
        tips.push(format!(
            "Adjust nutrient concentration to 800-1000 ppm{}",
            current(reading.tds, 0, " ppm")
        ));
    }
    if breakdown.water_temp < WATER_TEMP.full {
        tips.push(format!(
            "Adjust water temperature to 15.5-24°C{}",
            current(reading.water_temperature, 1, "°C")
        ));
    }
    if breakdown.air_temp < AIR_TEMP.full {
        tips.push(format!(
            "Adjust air temperature to 20-25°C{}",
            current(reading.air_temperature, 1, "°C")
        ));
    }
    if breakdown.humidity < HUMIDITY.full {
        tips.push(format!(
            "Adjust humidity to 50-70%{}",
            current(reading.air_humidity, 1, "%")
        ));
    }
    if breakdown.light_intensity < LIGHT.full {
        tips.push(format!(
            "Adjust light intensity to 2500-4000{}",
            current(reading.ldr, 0, "")
        ));
    }

    tips
}

/// Everything the dashboard shows about the current score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub breakdown: ScoreBreakdown,
    pub status: ScoreStatus,
    pub color: &'static str,
    pub color_hex: &'static str,
    pub emoji: &'static str,
    pub tips: Vec<String>,
}

impl ScoreReport {
    pub fn new(reading: &Reading, breakdown: ScoreBreakdown) -> Self {
        // ---
        let status = ScoreStatus::from_total(breakdown.total);
        Self {
            breakdown,
            status,
            color: status.color(),
            color_hex: status.color_hex(),
            emoji: emoji(breakdown.total),
            tips: improvement_tips(reading, &breakdown),
        }
    }
}

/// Scores readings and publishes each new total to its observers.
#[derive(Debug)]
pub struct ScoreCalculator {
    tx: watch::Sender<Option<f64>>,
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreCalculator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Score `reading` and notify observers of the new total.
    pub fn recompute(&self, reading: &Reading) -> ScoreBreakdown {
        // ---
        let breakdown = score(reading);
        tracing::debug!("System score recomputed: {:.1}/{}", breakdown.total, MAX_SCORE);
        self.tx.send_replace(Some(breakdown.total));
        breakdown
    }

    /// Observe score totals. The receiver starts at the latest value.
    pub fn subscribe(&self) -> watch::Receiver<Option<f64>> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> Option<f64> {
        *self.tx.borrow()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn optimal_reading() -> Reading {
        Reading {
            ph: Some(6.0),
            tds: Some(900.0),
            water_temperature: Some(20.0),
            air_temperature: Some(22.0),
            air_humidity: Some(60.0),
            ldr: Some(3000.0),
            ..Reading::default()
        }
    }

    #[test]
    fn test_optimal_reading_scores_ten() {
        // ---
        let breakdown = score(&optimal_reading());
        assert_eq!(breakdown.total, 10.0);
        assert_eq!(ScoreStatus::from_total(breakdown.total), ScoreStatus::Excellent);
        assert!(improvement_tips(&optimal_reading(), &breakdown).is_empty());
    }

    #[test]
    fn test_empty_reading_scores_zero() {
        // ---
        let breakdown = score(&Reading::default());
        assert_eq!(breakdown, ScoreBreakdown::default());
        assert_eq!(ScoreStatus::from_total(breakdown.total), ScoreStatus::Critical);
    }

    #[test]
    fn test_out_of_range_gets_partial_points() {
        // ---
        let reading = Reading {
            ph: Some(7.2),
            tds: Some(400.0),
            water_temperature: Some(28.0),
            air_temperature: Some(30.0),
            air_humidity: Some(90.0),
            ldr: Some(1200.0),
            ..Reading::default()
        };
        let breakdown = score(&reading);

        assert_eq!(breakdown.ph, 1.0);
        assert_eq!(breakdown.tds, 1.0);
        assert_eq!(breakdown.water_temp, 0.5);
        assert_eq!(breakdown.air_temp, 1.0);
        assert_eq!(breakdown.humidity, 1.0);
        assert_eq!(breakdown.light_intensity, 0.5);
        assert_eq!(breakdown.total, 5.0);
    }

    #[test]
    fn test_zero_value_is_known_not_missing() {
        // ---
        let reading = Reading {
            ph: Some(0.0),
            ..Reading::default()
        };
        assert_eq!(score(&reading).ph, 1.0);
    }

    #[test]
    fn test_range_edges_are_inclusive() {
        // ---
        let reading = Reading {
            ph: Some(5.5),
            tds: Some(1000.0),
            water_temperature: Some(15.5),
            air_temperature: Some(25.0),
            air_humidity: Some(50.0),
            ldr: Some(4000.0),
            ..Reading::default()
        };
        assert_eq!(score(&reading).total, 10.0);
    }

    #[test]
    fn test_status_and_color_bands() {
        // ---
        assert_eq!(ScoreStatus::from_total(8.0), ScoreStatus::Excellent);
        assert_eq!(ScoreStatus::from_total(7.5), ScoreStatus::Good);
        assert_eq!(ScoreStatus::from_total(6.0), ScoreStatus::Good);
        assert_eq!(ScoreStatus::from_total(5.5), ScoreStatus::Critical);

        assert_eq!(ScoreStatus::Excellent.color(), "green");
        assert_eq!(ScoreStatus::Good.color(), "yellow");
        assert_eq!(ScoreStatus::Critical.color(), "red");
        assert_eq!(ScoreStatus::Good.to_string(), "Good");
    }

    #[test]
    fn test_emoji_bands() {
        // ---
        assert_eq!(emoji(9.0), "😄");
        assert_eq!(emoji(5.0), "😐");
        assert_eq!(emoji(4.5), "😟");
    }

    #[test]
    fn test_tips_name_range_and_current_value() {
        // ---
        let reading = Reading {
            ph: Some(7.04),
            tds: Some(900.0),
            ..optimal_reading()
        };
        let tips = improvement_tips(&reading, &score(&reading));

        assert_eq!(tips, vec!["Adjust pH levels to optimal range (5.5-6.5), current: 7.0"]);
    }

    #[test]
    fn test_tips_without_current_value() {
        // ---
        let reading = Reading {
            ldr: None,
            ..optimal_reading()
        };
        let tips = improvement_tips(&reading, &score(&reading));

        assert_eq!(tips, vec!["Adjust light intensity to 2500-4000"]);
    }

    #[test]
    fn test_report_bundles_status() {
        // ---
        let report = ScoreReport::new(&Reading::default(), ScoreBreakdown::default());
        assert_eq!(report.status, ScoreStatus::Critical);
        assert_eq!(report.color_hex, "#ef4444");
        assert_eq!(report.tips.len(), 6);
    }

    #[test]
    fn test_report_status_serializes_as_display_name() {
        // ---
        let breakdown = ScoreBreakdown {
            total: 10.0,
            ..ScoreBreakdown::default()
        };
        let json = serde_json::to_value(ScoreReport::new(&Reading::default(), breakdown)).unwrap();
        assert_eq!(json["status"], "Excellent");
        assert_eq!(json["colorHex"], "#4ade80");

        for (total, name) in [(7.0, "Good"), (2.0, "Critical")] {
            let status = ScoreStatus::from_total(total);
            assert_eq!(serde_json::to_value(status).unwrap(), name);
            assert_eq!(status.to_string(), name);
        }
    }

    #[test]
    fn test_calculator_notifies_observers() {
        // ---
        let calculator = ScoreCalculator::new();
        let mut rx = calculator.subscribe();
        assert_eq!(*rx.borrow(), None);

        calculator.recompute(&optimal_reading());

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Some(10.0));
        assert_eq!(calculator.latest(), Some(10.0));

        calculator.recompute(&Reading::default());
        assert_eq!(*rx.borrow_and_update(), Some(0.0));
    }
}
