//! Per-second outcome counters.
//!
//! Each outcome label owns one ordered series of `second -> count` buckets.
//! Counts only ever grow. Labels live in separate `DashMap` entries, so a
//! snapshot is consistent within one label but not across labels.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// What happened to a request at the admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Admitted,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Rejected => "rejected",
        }
    }
}

/// Count for one wall-clock second (unix timestamp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub second: i64,
    pub count: u64,
}

/// Dense view of the series over an inclusive `[from, to]` window.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub title: String,
    pub from: i64,
    pub to: i64,
    pub series: BTreeMap<Outcome, Vec<Bucket>>,
}

impl Snapshot {
    /// Every second of the window, oldest first. Empty when `from > to`.
    pub fn seconds(&self) -> Vec<i64> {
        (self.from..=self.to).collect()
    }

    pub fn series(&self, outcome: Outcome) -> Option<&[Bucket]> {
        self.series.get(&outcome).map(Vec::as_slice)
    }

    pub fn count(&self, outcome: Outcome, second: i64) -> Option<u64> {
        self.series(outcome)?
            .iter()
            .find(|b| b.second == second)
            .map(|b| b.count)
    }
}

pub struct Stats {
    title: String,
    start: i64,
    series: DashMap<Outcome, BTreeMap<i64, u64>>,
}

impl Stats {
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_start(title, Utc::now())
    }

    pub fn with_start(title: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            start: start.timestamp(),
            series: DashMap::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn record(&self, outcome: Outcome, at: DateTime<Utc>) {
        let second = at.timestamp();
        let mut series = self.series.entry(outcome).or_default();
        *series.entry(second).or_insert(0) += 1;
        tracing::trace!(outcome = outcome.as_str(), second, "Outcome recorded");
    }

    pub fn record_now(&self, outcome: Outcome) {
        self.record(outcome, Utc::now());
    }

    /// Dense counts for every known label over `[from, to]`, truncated to seconds.
    pub fn snapshot(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Snapshot {
        self.snapshot_seconds(from.timestamp(), to.timestamp())
    }

    /// Window from `start` to the last completed second.
    pub fn snapshot_to_now(&self) -> Snapshot {
        let to = Utc::now() - TimeDelta::seconds(1);
        self.snapshot_seconds(self.start, to.timestamp())
    }

    fn snapshot_seconds(&self, from: i64, to: i64) -> Snapshot {
        let mut series = BTreeMap::new();
        for entry in self.series.iter() {
            let buckets = (from..=to)
                .map(|second| Bucket {
                    second,
                    count: entry.value().get(&second).copied().unwrap_or(0),
                })
                .collect();
            series.insert(*entry.key(), buckets);
        }

        Snapshot {
            title: self.title.clone(),
            from,
            to,
            series,
        }
    }

    /// Lifetime total per known label.
    pub fn totals(&self) -> BTreeMap<Outcome, u64> {
        self.series
            .iter()
            .map(|entry| (*entry.key(), entry.value().values().sum()))
            .collect()
    }
}
