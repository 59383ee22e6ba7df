//! Perf counters, enabled with `UMBRELLA_PERF=1`, and logging setup.
//!
//! Counters are aggregated per label and summarised through `tracing` every
//! few hundred samples, so they land wherever the log output goes.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::info;

pub mod logging;

const DURATION_REPORT_EVERY: u64 = 200;
const BYTES_REPORT_EVERY: u64 = 500;

pub(crate) fn env_truthy(var: &str) -> Option<bool> {
    std::env::var(var).map(|v| v != "0" && !v.is_empty()).ok()
}

static PERF_ENABLED: Lazy<bool> = Lazy::new(|| env_truthy("UMBRELLA_PERF").unwrap_or(false));

static STATS: Lazy<Mutex<HashMap<&'static str, PerfStat>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static GAUGES: Lazy<Mutex<HashMap<&'static str, GaugeStat>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Default)]
struct GaugeStat {
    last: u64,
    samples: u64,
}

#[derive(Default)]
struct PerfStat {
    total_ns: u128,
    max_ns: u128,
    count: u64,
    total_bytes: u128,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn enabled() -> bool {
    *PERF_ENABLED
}

pub fn record_duration(label: &'static str, duration: Duration) {
    if !enabled() {
        return;
    }
    let mut stats = lock(&STATS);
    let entry = stats.entry(label).or_default();
    entry.count += 1;
    let nanos = duration.as_nanos();
    entry.total_ns += nanos;
    entry.max_ns = entry.max_ns.max(nanos);
    if entry.count % DURATION_REPORT_EVERY == 0 {
        report(label, entry);
    }
}

pub fn record_bytes(label: &'static str, bytes: usize) {
    if !enabled() {
        return;
    }
    let mut stats = lock(&STATS);
    let entry = stats.entry(label).or_default();
    entry.total_bytes += bytes as u128;
    entry.count += 1;
    if entry.count % BYTES_REPORT_EVERY == 0 {
        report(label, entry);
    }
}

/// Latest value of a level-style metric such as the scrollback size.
pub fn record_gauge(label: &'static str, value: u64) {
    if !enabled() {
        return;
    }
    let mut gauges = lock(&GAUGES);
    let entry = gauges.entry(label).or_default();
    entry.last = value;
    entry.samples = entry.samples.saturating_add(1);
    if entry.samples % DURATION_REPORT_EVERY == 0 {
        info!(
            target: "umbrella::perf",
            label,
            gauge = entry.last,
            samples = entry.samples,
            "perf gauge"
        );
    }
}

fn report(label: &'static str, stat: &PerfStat) {
    let avg_us = if stat.count > 0 {
        (stat.total_ns / u128::from(stat.count)) as f64 / 1_000.0
    } else {
        0.0
    };
    let max_us = stat.max_ns as f64 / 1_000.0;
    let kib = stat.total_bytes as f64 / 1024.0;
    info!(
        target: "umbrella::perf",
        label,
        count = stat.count,
        avg_us,
        max_us,
        kib,
        "perf summary"
    );
}

/// Records the time between creation and drop under `label`.
pub struct PerfGuard {
    label: &'static str,
    start: Instant,
}

impl PerfGuard {
    pub fn new(label: &'static str) -> Option<Self> {
        if !enabled() {
            return None;
        }
        Some(Self {
            label,
            start: Instant::now(),
        })
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        record_duration(self.label, self.start.elapsed());
    }
}
