//! Per-day averages over the reading history.
//!
//! Readings are grouped by their `date` string exactly as stored, without
//! any timezone handling. Unlike the score and threshold checks, a missing
//! field counts as 0 towards the day's mean.

use std::collections::HashMap;

use serde::Deserialize;

use crate::models::{DayAverage, Reading};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Default)]
struct Sums {
    ph: f64,
    tds: f64,
    water_temp: f64,
    air_temp: f64,
    humidity: f64,
    light: f64,
    system_score: f64,
    count: usize,
}

impl Sums {
    fn add(&mut self, r: &Reading) {
        self.ph += r.ph.unwrap_or(0.0);
        self.tds += r.tds.unwrap_or(0.0);
        self.water_temp += r.water_temperature.unwrap_or(0.0);
        self.air_temp += r.air_temperature.unwrap_or(0.0);
        self.humidity += r.air_humidity.unwrap_or(0.0);
        self.light += r.ldr.unwrap_or(0.0);
        self.system_score += r.system_score.unwrap_or(0.0);
        self.count += 1;
    }

    fn into_average(self, date: String) -> DayAverage {
        let n = self.count as f64;
        DayAverage {
            date,
            avg_ph: self.ph / n,
            avg_tds: self.tds / n,
            avg_water_temp: self.water_temp / n,
            avg_air_temp: self.air_temp / n,
            avg_humidity: self.humidity / n,
            avg_light: self.light / n,
            avg_system_score: self.system_score / n,
            readings_count: self.count,
        }
    }
}

/// Average readings per date.
///
/// Days come out in order of first appearance unless `order` asks for a
/// chronological sort. Readings without a date are ignored.
pub fn aggregate(readings: &[Reading], order: Option<SortOrder>) -> Vec<DayAverage> {
    // ---
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Sums)> = Vec::new();

    for reading in readings {
        let Some(date) = reading.date.as_deref() else {
            tracing::trace!("Skipping history reading without a date");
            continue;
        };
        let slot = *index.entry(date).or_insert_with(|| {
            groups.push((date.to_string(), Sums::default()));
            groups.len() - 1
        });
        groups[slot].1.add(reading);
    }

    let mut days: Vec<DayAverage> = groups
        .into_iter()
        .map(|(date, sums)| sums.into_average(date))
        .collect();

    if let Some(order) = order {
        sort(&mut days, order);
    }
    days
}

/// Sort days by date. `YYYY-MM-DD` strings sort chronologically as text.
pub fn sort(days: &mut [DayAverage], order: SortOrder) {
    match order {
        SortOrder::Asc => days.sort_by(|a, b| a.date.cmp(&b.date)),
        SortOrder::Desc => days.sort_by(|a, b| b.date.cmp(&a.date)),
    }
}

/// The most recent `limit` days, returned oldest first for charting.
pub fn latest(days: &[DayAverage], limit: usize) -> Vec<DayAverage> {
    // ---
    let mut sorted = days.to_vec();
    sort(&mut sorted, SortOrder::Asc);
    let skip = sorted.len().saturating_sub(limit);
    sorted.split_off(skip)
}
