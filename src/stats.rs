//! Statistics tracking for the telemetry ingest path.
//!
//! One collector is shared by every connection handler. It tracks line and
//! connection counts, how often each field arrived undefined, and
//! distributions for speed readings and raw line sizes.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::sample::{TelemetrySample, is_defined};

/// Speed readings are recorded in centi-m/s to keep histogram values integral.
const SPEED_SCALE: f64 = 100.0;

/// Thread-safe statistics collector for decoded telemetry.
#[derive(Debug)]
pub struct IngestStats {
    /// Total number of samples decoded and forwarded to the sink
    pub total_samples: AtomicU64,

    /// Blank or whitespace-only lines skipped before decoding
    pub blank_lines: AtomicU64,

    /// Total bytes of raw input read from all connections
    pub bytes_processed: AtomicU64,

    /// Connections accepted by the listener
    pub connections_opened: AtomicU64,

    /// Connections that have finished (EOF or read error)
    pub connections_closed: AtomicU64,

    /// Connections terminated by a read error rather than EOF
    pub read_errors: AtomicU64,

    /// Histogram of defined speed readings, in centi-m/s
    speed_histogram: RwLock<Histogram<u64>>,

    /// Histogram of raw line sizes in bytes
    line_size_histogram: RwLock<Histogram<u64>>,

    /// How often each field arrived undefined, by wire key
    undefined_fields: RwLock<HashMap<&'static str, u64>>,

    /// When stats collection started
    start_time: Instant,
}

impl IngestStats {
    /// Create a new statistics collector.
    pub fn new() -> Self {
        Self {
            total_samples: AtomicU64::new(0),
            blank_lines: AtomicU64::new(0),
            bytes_processed: AtomicU64::new(0),
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            // Speed histogram: 1 centi-m/s to 100 m/s, 3 significant figures
            speed_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 10_000, 3)
                    .expect("Failed to create speed histogram"),
            ),
            // Line size histogram: 1 byte to 10KB
            line_size_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 10_000, 3)
                    .expect("Failed to create line size histogram"),
            ),
            undefined_fields: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a decoded sample.
    pub fn record_sample(&self, sample: &TelemetrySample) {
        self.total_samples.fetch_add(1, Ordering::Relaxed);

        if is_defined(sample.speed_mps) {
            let centi = (sample.speed_mps.abs() * SPEED_SCALE) as u64;
            if let Ok(mut hist) = self.speed_histogram.write() {
                let _ = hist.record(centi.clamp(1, 9_999));
            }
        }

        if let Ok(mut map) = self.undefined_fields.write() {
            for (name, value) in sample.fields() {
                if !is_defined(value) {
                    *map.entry(name).or_insert(0) += 1;
                }
            }
        }
    }

    /// Record a blank line skipped by a connection handler.
    pub fn record_blank_line(&self) {
        self.blank_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one raw line's size in bytes, terminator included.
    pub fn record_line_bytes(&self, bytes: u64) {
        self.bytes_processed.fetch_add(bytes, Ordering::Relaxed);
        if let Ok(mut hist) = self.line_size_histogram.write() {
            let _ = hist.record(bytes.clamp(1, 9_999));
        }
    }

    /// Record an accepted connection.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished connection.
    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection terminated by a read error.
    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of connections currently being handled.
    pub fn active_connections(&self) -> u64 {
        self.connections_opened
            .load(Ordering::Relaxed)
            .saturating_sub(self.connections_closed.load(Ordering::Relaxed))
    }

    /// Get the elapsed time since stats collection started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get the current samples per second rate.
    pub fn samples_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_samples.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Generate a summary report.
    pub fn summary(&self) -> StatsSummary {
        let speed_percentiles = self
            .speed_histogram
            .read()
            .ok()
            .filter(|h| !h.is_empty())
            .map(|h| SpeedPercentiles {
                p50: h.value_at_quantile(0.50) as f64 / SPEED_SCALE,
                p90: h.value_at_quantile(0.90) as f64 / SPEED_SCALE,
                p99: h.value_at_quantile(0.99) as f64 / SPEED_SCALE,
                min: h.min() as f64 / SPEED_SCALE,
                max: h.max() as f64 / SPEED_SCALE,
                mean: h.mean() / SPEED_SCALE,
                count: h.len(),
            });

        let line_size_percentiles = self
            .line_size_histogram
            .read()
            .ok()
            .filter(|h| !h.is_empty())
            .map(|h| HistogramPercentiles {
                p50: h.value_at_quantile(0.50),
                p90: h.value_at_quantile(0.90),
                p99: h.value_at_quantile(0.99),
                min: h.min(),
                max: h.max(),
                mean: h.mean(),
            });

        let undefined_fields = self
            .undefined_fields
            .read()
            .map(|m| m.iter().map(|(k, v)| (k.to_string(), *v)).collect())
            .unwrap_or_default();

        StatsSummary {
            elapsed_secs: self.elapsed().as_secs_f64(),
            total_samples: self.total_samples.load(Ordering::Relaxed),
            blank_lines: self.blank_lines.load(Ordering::Relaxed),
            bytes_processed: self.bytes_processed.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            active_connections: self.active_connections(),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            samples_per_second: self.samples_per_second(),
            speed_percentiles,
            line_size_percentiles,
            undefined_fields,
        }
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile values from an integer-valued histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Speed percentiles, converted back to m/s.
///
/// Only samples with a defined speed contribute, so `count` can be lower
/// than the total sample count.
#[derive(Debug, Clone, Serialize)]
pub struct SpeedPercentiles {
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: u64,
}

/// Summary of collected statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub elapsed_secs: f64,
    pub total_samples: u64,
    pub blank_lines: u64,
    pub bytes_processed: u64,
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub active_connections: u64,
    pub read_errors: u64,
    pub samples_per_second: f64,
    pub speed_percentiles: Option<SpeedPercentiles>,
    pub line_size_percentiles: Option<HistogramPercentiles>,
    pub undefined_fields: HashMap<String, u64>,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "               TELEMETRY INGEST STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Runtime: {:.1}s", self.elapsed_secs)?;
        writeln!(f, "Samples: {}", self.total_samples)?;
        writeln!(f, "Blank lines: {}", self.blank_lines)?;
        writeln!(f, "Bytes processed: {} KB", self.bytes_processed / 1024)?;
        writeln!(
            f,
            "Connections: {} opened, {} closed, {} active",
            self.connections_opened, self.connections_closed, self.active_connections
        )?;
        writeln!(f, "Read errors: {}", self.read_errors)?;
        writeln!(f, "Rate: {:.1} samples/sec", self.samples_per_second)?;
        writeln!(f)?;

        if let Some(ref p) = self.speed_percentiles {
            writeln!(f, "Speed Distribution (m/s):")?;
            writeln!(
                f,
                "  Min: {:.2}, Max: {:.2}, Mean: {:.2}",
                p.min, p.max, p.mean
            )?;
            writeln!(
                f,
                "  P50: {:.2}, P90: {:.2}, P99: {:.2}",
                p.p50, p.p90, p.p99
            )?;
            writeln!(f)?;
        }

        if let Some(ref p) = self.line_size_percentiles {
            writeln!(f, "Line Size Distribution (bytes):")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
            writeln!(f)?;
        }

        if !self.undefined_fields.is_empty() {
            writeln!(f, "Undefined Fields:")?;
            let mut fields: Vec<_> = self.undefined_fields.iter().collect();
            fields.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
            for (field, count) in fields {
                writeln!(f, "  {}: {}", field, count)?;
            }
        }

        Ok(())
    }
}
