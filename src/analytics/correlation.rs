//! Pearson correlation between two parameters.

use serde::Serialize;

use crate::models::{DayAverage, Parameter};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationKind {
    Positive,
    Negative,
    Neutral,
}

impl CorrelationKind {
    pub fn from_coefficient(r: f64) -> Self {
        if r > 0.0 {
            CorrelationKind::Positive
        } else if r < 0.0 {
            CorrelationKind::Negative
        } else {
            CorrelationKind::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub x: Parameter,
    pub y: Parameter,
    pub coefficient: f64,
    pub kind: CorrelationKind,
    pub samples: usize,
}

/// Pearson correlation coefficient of paired samples.
///
/// Returns 0 when either side has no variance, which also covers fewer
/// than two points.
pub fn pearson(points: &[(f64, f64)]) -> f64 {
    // ---
    if points.is_empty() {
        return 0.0;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return 0.0;
    }

    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

/// Correlate two parameters across the same set of days.
pub fn correlate(x: Parameter, y: Parameter, days: &[DayAverage]) -> Correlation {
    // ---
    let points: Vec<(f64, f64)> = days
        .iter()
        .map(|d| (x.average_in(d), y.average_in(d)))
        .collect();
    let coefficient = pearson(&points);

    Correlation {
        x,
        y,
        coefficient,
        kind: CorrelationKind::from_coefficient(coefficient),
        samples: points.len(),
    }
}
