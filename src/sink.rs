//! Sink abstraction for decoded telemetry.
//!
//! Every connection handler forwards its samples to one shared sink. The
//! sink is injected rather than hard-wired to stdout so the consumer can be
//! swapped: console logging in the binary, a collecting double in tests.

use chrono::Utc;

use crate::sample::TelemetrySample;

/// Consumer of decoded samples.
///
/// Shared across all connection handlers, so implementations must tolerate
/// concurrent calls. Each call is self-contained (one sample in, one unit
/// of output); no ordering is guaranteed across calls from different
/// connections. Implementations should not block for long: their latency
/// directly delays the connection that invoked them.
pub trait TelemetrySink: Send + Sync {
    /// Consume one decoded sample.
    fn accept(&self, sample: &TelemetrySample);
}

/// Sink that prints each sample as one timestamped line on stdout.
///
/// The reference consumer. `println!` takes the stdout lock per call, so
/// lines from concurrent connections never interleave mid-line.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl TelemetrySink for ConsoleSink {
    fn accept(&self, sample: &TelemetrySample) {
        println!("{} {}", Utc::now().to_rfc3339(), sample);
    }
}

/// Sink that discards every sample. Used with `--quiet`.
#[derive(Debug, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn accept(&self, _sample: &TelemetrySample) {}
}
