//! sim-telemetry - A Rust library and server for ingesting vehicle telemetry
//! from a driving simulation.
//!
//! This crate provides:
//! - A total, never-failing decoder for `key=value|...` telemetry lines
//! - An async TCP server with one task per simulation connection
//! - A pluggable sink abstraction for consuming decoded samples
//! - Ingest statistics with HDR histograms and a Prometheus endpoint
//!
//! # Example
//!
//! ```rust
//! use sim_telemetry::{decoder::decode, stats::IngestStats};
//!
//! let line = "speed_mps=12.5|throttle=0.8|brake=0.0|steering=-0.2";
//! let sample = decode(line);
//! assert_eq!(sample.speed_mps, 12.5);
//!
//! let stats = IngestStats::new();
//! stats.record_sample(&sample);
//!
//! println!("{}", stats.summary());
//! ```

pub mod config;
pub mod decoder;
pub mod metrics;
pub mod sample;
pub mod server;
pub mod sink;
pub mod stats;

pub use config::Config;
pub use decoder::decode;
pub use sample::{TelemetrySample, UNDEFINED, is_defined};
pub use server::{DEFAULT_PORT, ServerError, TelemetryServer};
pub use sink::{ConsoleSink, NullSink, TelemetrySink};
pub use stats::{IngestStats, StatsSummary};
