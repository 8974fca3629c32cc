use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A header that could not be cataloged, with the reason.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HeaderFailure {
    pub header: String,
    pub error: String,
}

/// Summary of one run: what was scanned, what failed and how long it took.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub total_duration: Duration,
    pub phase_durations: BTreeMap<String, Duration>,
    pub headers_scanned: usize,
    pub headers_failed: usize,
    pub failures: Vec<HeaderFailure>,
    pub classes_found: usize,
    pub classes_cataloged: usize,
    pub empty_catalogs: usize,
    pub methods: usize,
    pub compound_methods: usize,
    pub data_members: usize,
    pub undecodable_signatures: usize,
    pub oracle_lookups: usize,
    pub diagnostics: Vec<String>,
    pub headers_per_second: f64,
    pub peak_memory_mb: f64,
}

impl ScanReport {
    pub fn log(&self) {
        info!("Catalog summary:");
        info!("  Total duration: {:?}", self.total_duration);
        for (phase, duration) in &self.phase_durations {
            info!("    {}: {:?}", phase, duration);
        }
        info!(
            "  Headers: {} scanned, {} failed ({:.1}/sec)",
            self.headers_scanned, self.headers_failed, self.headers_per_second
        );
        for failure in &self.failures {
            info!("    {}: {}", failure.header, failure.error);
        }
        info!(
            "  Classes: {} found, {} cataloged, {} with an empty catalog",
            self.classes_found, self.classes_cataloged, self.empty_catalogs
        );
        info!(
            "  Accessors: {} methods ({} compound), {} data members",
            self.methods, self.compound_methods, self.data_members
        );
        if self.undecodable_signatures > 0 {
            info!("  Undecodable signatures skipped: {}", self.undecodable_signatures);
        }
        for diagnostic in &self.diagnostics {
            warn!("  {}", diagnostic);
        }
        if self.peak_memory_mb > 0.0 {
            info!("  Peak memory: {:.1} MB", self.peak_memory_mb);
        }
    }
}

#[derive(Debug)]
pub struct MetricsCollector {
    start_time: Instant,
    phase_timers: HashMap<String, Instant>,
    phase_durations: BTreeMap<String, Duration>,
    headers_scanned: usize,
    failures: Vec<HeaderFailure>,
    classes_found: usize,
    classes_cataloged: usize,
    empty_catalogs: usize,
    methods: usize,
    compound_methods: usize,
    data_members: usize,
    undecodable_signatures: usize,
    oracle_lookups: usize,
    diagnostics: Vec<String>,
    peak_memory_mb: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_timers: HashMap::new(),
            phase_durations: BTreeMap::new(),
            headers_scanned: 0,
            failures: Vec::new(),
            classes_found: 0,
            classes_cataloged: 0,
            empty_catalogs: 0,
            methods: 0,
            compound_methods: 0,
            data_members: 0,
            undecodable_signatures: 0,
            oracle_lookups: 0,
            diagnostics: Vec::new(),
            peak_memory_mb: 0.0,
        }
    }

    pub fn start_phase(&mut self, phase: &str) {
        debug!("Starting phase: {}", phase);
        self.phase_timers.insert(phase.to_string(), Instant::now());
    }

    pub fn end_phase(&mut self, phase: &str) {
        if let Some(start_time) = self.phase_timers.remove(phase) {
            let duration = start_time.elapsed();
            *self.phase_durations.entry(phase.to_string()).or_default() += duration;
            debug!("Phase {} completed in {:?}", phase, duration);
        }
        self.update_memory_usage();
    }

    pub fn record_header(&mut self) {
        self.headers_scanned += 1;
    }

    pub fn record_failure(&mut self, header: &str, error: impl ToString) {
        self.failures.push(HeaderFailure {
            header: header.to_string(),
            error: error.to_string(),
        });
    }

    pub fn record_classes_found(&mut self, count: usize) {
        self.classes_found += count;
    }

    pub fn record_entry(&mut self, methods: usize, compound: usize, data_members: usize) {
        self.classes_cataloged += 1;
        if methods == 0 && data_members == 0 {
            self.empty_catalogs += 1;
        }
        self.methods += methods;
        self.compound_methods += compound;
        self.data_members += data_members;
    }

    pub fn record_undecodable(&mut self) {
        self.undecodable_signatures += 1;
    }

    pub fn record_oracle_lookups(&mut self, lookups: usize) {
        self.oracle_lookups = lookups;
    }

    pub fn record_diagnostic(&mut self, diagnostic: impl ToString) {
        self.diagnostics.push(diagnostic.to_string());
    }

    pub fn failures(&self) -> &[HeaderFailure] {
        &self.failures
    }

    pub fn update_memory_usage(&mut self) {
        if let Some(usage) = get_memory_usage() {
            if usage > self.peak_memory_mb {
                self.peak_memory_mb = usage;
            }
        }
    }

    /// Snapshot of the counters so far; the collector keeps running.
    pub fn report(&self) -> ScanReport {
        let total_duration = self.start_time.elapsed();
        let total_seconds = total_duration.as_secs_f64();
        let headers_per_second = if total_seconds > 0.0 {
            self.headers_scanned as f64 / total_seconds
        } else {
            0.0
        };

        ScanReport {
            total_duration,
            phase_durations: self.phase_durations.clone(),
            headers_scanned: self.headers_scanned,
            headers_failed: self.failures.len(),
            failures: self.failures.clone(),
            classes_found: self.classes_found,
            classes_cataloged: self.classes_cataloged,
            empty_catalogs: self.empty_catalogs,
            methods: self.methods,
            compound_methods: self.compound_methods,
            data_members: self.data_members,
            undecodable_signatures: self.undecodable_signatures,
            oracle_lookups: self.oracle_lookups,
            diagnostics: self.diagnostics.clone(),
            headers_per_second,
            peak_memory_mb: self.peak_memory_mb,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
fn get_memory_usage() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let memory_kb: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(memory_kb / 1024.0)
}

#[cfg(not(target_os = "linux"))]
fn get_memory_usage() -> Option<f64> {
    None
}
