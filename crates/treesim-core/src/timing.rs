//! Opt-in phase timing for command runs.
//!
//! A [`Timings`] recorder is owned by the caller and passed to whatever
//! needs to be measured; there is no process-wide sample buffer.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde_json::json;

use crate::config::is_truthy;

/// Returns true when `TREESIM_TIMING` enables timing collection.
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("TREESIM_TIMING")
        .ok()
        .is_some_and(|value| is_truthy(&value))
}

/// Records named durations when enabled; a no-op otherwise.
#[derive(Debug, Default)]
pub struct Timings {
    enabled: bool,
    samples: Vec<(String, Duration)>,
}

impl Timings {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            samples: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `f`, recording its wall time under `name`.
    pub fn timed<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> R {
        if !self.enabled {
            return f();
        }
        let started = Instant::now();
        let result = f();
        self.record(name, started.elapsed());
        result
    }

    /// Record an externally measured duration.
    pub fn record(&mut self, name: &str, elapsed: Duration) {
        if self.enabled {
            self.samples.push((name.to_string(), elapsed));
        }
    }

    /// Group samples by name, sorted by name.
    #[must_use]
    pub fn report(&self) -> TimingReport {
        let mut grouped: BTreeMap<&str, Vec<Duration>> = BTreeMap::new();
        for (name, elapsed) in &self.samples {
            grouped.entry(name).or_default().push(*elapsed);
        }

        let operations = grouped
            .into_iter()
            .map(|(name, mut values)| {
                values.sort_unstable();
                OpTiming {
                    name: name.to_string(),
                    count: values.len(),
                    total: values.iter().sum(),
                    p50: percentile(&values, 50),
                    p95: percentile(&values, 95),
                }
            })
            .collect();

        TimingReport { operations }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReport {
    pub operations: Vec<OpTiming>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpTiming {
    pub name: String,
    pub count: usize,
    pub total: Duration,
    pub p50: Duration,
    pub p95: Duration,
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let operations: Vec<_> = self
            .operations
            .iter()
            .map(|op| {
                json!({
                    "name": op.name,
                    "count": op.count,
                    "total_us": op.total.as_micros(),
                    "p50_us": op.p50.as_micros(),
                    "p95_us": op.p95.as_micros(),
                })
            })
            .collect();
        json!({ "operations": operations })
    }

    #[must_use]
    pub fn display_table(&self) -> String {
        if self.operations.is_empty() {
            return "No timing samples recorded.".to_string();
        }

        let mut out = String::new();
        out.push_str("operation                count      total      p50      p95\n");
        out.push_str("------------------------------------------------------------\n");
        for op in &self.operations {
            let _ = writeln!(
                out,
                "{:<24} {:>6} {:>10} {:>8} {:>8}",
                op.name,
                op.count,
                format_duration(op.total),
                format_duration(op.p50),
                format_duration(op.p95)
            );
        }
        out
    }
}

fn percentile(sorted: &[Duration], pct: usize) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct.min(100) * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros >= 1_000_000 {
        format!("{}.{:03}s", micros / 1_000_000, (micros % 1_000_000) / 1_000)
    } else if micros >= 1_000 {
        format!("{}.{:03}ms", micros / 1_000, micros % 1_000)
    } else {
        format!("{micros}µs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_recorder_keeps_nothing() {
        let mut timings = Timings::new(false);
        assert_eq!(timings.timed("parse", || 7_u8), 7);
        timings.record("compare", Duration::from_millis(3));
        assert!(timings.report().is_empty());
    }

    #[test]
    fn enabled_recorder_groups_by_name() {
        let mut timings = Timings::new(true);
        timings.record("parse", Duration::from_micros(3_000));
        timings.record("parse", Duration::from_micros(1_000));
        timings.record("parse", Duration::from_micros(2_000));
        timings.record("compare", Duration::from_micros(5_000));

        let report = timings.report();
        assert_eq!(report.operations.len(), 2);
        assert_eq!(report.operations[0].name, "compare");

        let parse = &report.operations[1];
        assert_eq!(parse.count, 3);
        assert_eq!(parse.total, Duration::from_micros(6_000));
        assert_eq!(parse.p50, Duration::from_micros(2_000));
        assert_eq!(parse.p95, Duration::from_micros(3_000));
    }

    #[test]
    fn timed_returns_closure_value_and_records() {
        let mut timings = Timings::new(true);
        let value = timings.timed("render", || 42_u8);
        assert_eq!(value, 42);
        assert_eq!(timings.report().operations[0].count, 1);
    }

    #[test]
    fn table_and_json_have_expected_fields() {
        let mut timings = Timings::new(true);
        timings.record("batch.compare", Duration::from_micros(1_500));
        let report = timings.report();

        let table = report.display_table();
        assert!(table.contains("operation"));
        assert!(table.contains("batch.compare"));
        assert!(table.contains("1.500ms"));

        let json = report.to_json();
        let op = &json["operations"][0];
        assert_eq!(op["name"], "batch.compare");
        assert_eq!(op["count"], 1);
        assert_eq!(op["total_us"], 1_500);
    }

    #[test]
    fn format_duration_picks_unit() {
        assert_eq!(format_duration(Duration::from_micros(12)), "12µs");
        assert_eq!(format_duration(Duration::from_micros(2_345)), "2.345ms");
        assert_eq!(format_duration(Duration::from_millis(1_250)), "1.250s");
    }
}
