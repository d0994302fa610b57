//! Hourly aggregation of raw readings

use crate::reading::{Quantity, RawReading};
use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Average, maximum and minimum of one quantity over one bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantityStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

/// Statistics for one clock hour.
///
/// `avg` is the hour's mean power; with a uniform sampling interval of at
/// most an hour it is also the hour's energy in matching units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyRecord {
    /// Start of the hour (minutes and seconds are zero)
    pub hour_start: NaiveDateTime,
    /// Display label, `dd/mm/yyyy HH:00`
    pub label: String,
    pub active: QuantityStats,
    pub inductive: QuantityStats,
    pub capacitive: QuantityStats,
    /// Readings that fell into this hour
    pub samples: usize,
}

impl HourlyRecord {
    pub fn stats(&self, quantity: Quantity) -> &QuantityStats {
        match quantity {
            Quantity::Active => &self.active,
            Quantity::Inductive => &self.inductive,
            Quantity::Capacitive => &self.capacitive,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    sum: f64,
    max: f64,
    min: f64,
}

impl Accumulator {
    fn new(value: f64) -> Self {
        Self {
            sum: value,
            max: value,
            min: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.max = self.max.max(value);
        self.min = self.min.min(value);
    }

    fn finish(&self, count: usize) -> QuantityStats {
        // Float summation can land a hair outside the observed range
        let avg = (self.sum / count as f64).clamp(self.min, self.max);
        QuantityStats {
            avg,
            max: self.max,
            min: self.min,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: usize,
    quantities: [Accumulator; 3],
}

/// Truncate an instant to the start of its hour
pub fn hour_start(ts: NaiveDateTime) -> NaiveDateTime {
    let into_hour = i64::from(ts.minute() * 60 + ts.second());
    ts - Duration::seconds(into_hour) - Duration::nanoseconds(i64::from(ts.nanosecond()))
}

/// Display label for an hour bucket
pub fn hour_label(hour: NaiveDateTime) -> String {
    hour.format("%d/%m/%Y %H:00").to_string()
}

/// Group readings by clock hour and compute avg/max/min per quantity.
///
/// Returns records sorted ascending by `hour_start`, one per distinct hour.
/// Input order does not matter.
pub fn aggregate_hourly(readings: &[RawReading]) -> Vec<HourlyRecord> {
    let mut buckets: BTreeMap<NaiveDateTime, Bucket> = BTreeMap::new();

    for reading in readings {
        let values = Quantity::ALL.map(|q| reading.get(q));
        buckets
            .entry(hour_start(reading.timestamp))
            .and_modify(|bucket| {
                bucket.count += 1;
                for (acc, value) in bucket.quantities.iter_mut().zip(values) {
                    acc.add(value);
                }
            })
            .or_insert_with(|| Bucket {
                count: 1,
                quantities: values.map(Accumulator::new),
            });
    }

    tracing::debug!(
        readings = readings.len(),
        hours = buckets.len(),
        "aggregated hourly"
    );

    buckets
        .into_iter()
        .map(|(hour, bucket)| {
            let [active, inductive, capacitive] =
                bucket.quantities.map(|acc| acc.finish(bucket.count));
            HourlyRecord {
                hour_start: hour,
                label: hour_label(hour),
                active,
                inductive,
                capacitive,
                samples: bucket.count,
            }
        })
        .collect()
}

/// Totals and peak for one quantity across a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantitySummary {
    pub quantity: Quantity,
    /// Sum of hourly averages (energy over the whole series)
    pub total: f64,
    /// Highest hourly average
    pub peak: f64,
    pub peak_hour: NaiveDateTime,
}

/// Overview of an hourly series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub first_hour: NaiveDateTime,
    pub last_hour: NaiveDateTime,
    pub hours: usize,
    /// Hours fed by more readings than the most common bucket size,
    /// typically from overlapping source files
    pub oversized_hours: usize,
    pub quantities: Vec<QuantitySummary>,
}

/// Summarize a sorted hourly series; `None` for an empty one
pub fn summarize(hourly: &[HourlyRecord]) -> Option<SeriesSummary> {
    let first = hourly.first()?;
    let last = hourly.last()?;

    let quantities = Quantity::ALL
        .iter()
        .map(|&quantity| {
            let mut peak = first;
            let mut total = 0.0;
            for record in hourly {
                let avg = record.stats(quantity).avg;
                total += avg;
                if avg > peak.stats(quantity).avg {
                    peak = record;
                }
            }
            QuantitySummary {
                quantity,
                total,
                peak: peak.stats(quantity).avg,
                peak_hour: peak.hour_start,
            }
        })
        .collect();

    let mut size_counts: BTreeMap<usize, usize> = BTreeMap::new();
    for record in hourly {
        *size_counts.entry(record.samples).or_default() += 1;
    }
    let typical = size_counts
        .iter()
        .max_by_key(|(size, count)| (**count, std::cmp::Reverse(**size)))
        .map(|(size, _)| *size)
        .unwrap_or(0);
    let oversized_hours = hourly.iter().filter(|r| r.samples > typical).count();

    Some(SeriesSummary {
        first_hour: first.hour_start,
        last_hour: last.hour_start,
        hours: hourly.len(),
        oversized_hours,
        quantities,
    })
}
