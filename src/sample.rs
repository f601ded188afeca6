//! Data structures representing decoded telemetry.
//!
//! This module defines the core type used throughout the application
//! to represent one vehicle-state sample reported by the simulation.

use serde::Serialize;
use std::fmt;

/// Sentinel for a field that was absent, blank, or unparseable.
///
/// Distinct from a genuine zero reading: a consumer can tell "the car
/// reported 0.0 m/s" apart from "the car did not report speed at all".
pub const UNDEFINED: f64 = f64::NAN;

/// Returns true if the value is a real reading rather than [`UNDEFINED`].
#[inline]
pub fn is_defined(value: f64) -> bool {
    !value.is_nan()
}

/// One vehicle-state sample decoded from a single input line.
///
/// Distances are meters and angles are degrees, matching the units the
/// simulation exports. Every field is always populated: either a finite
/// reading or [`UNDEFINED`], never a silent zero default.
///
/// # Example
///
/// A raw line like:
/// ```text
/// speed_mps=12.5|throttle=0.8|brake=0.0|steering=-0.2|forward_hit_m=30.0
/// ```
///
/// Decodes into a `TelemetrySample` with `speed_mps` 12.5, `throttle` 0.8,
/// `brake` 0.0, `steering` -0.2, `forward_hit_m` 30.0, and the remaining
/// four fields set to [`UNDEFINED`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySample {
    /// Forward speed magnitude in meters per second.
    pub speed_mps: f64,

    /// Throttle input position, nominally in [0, 1].
    pub throttle: f64,

    /// Brake input position, nominally in [0, 1].
    pub brake: f64,

    /// Signed steering input position.
    pub steering: f64,

    /// Forward obstacle-ray hit distance in meters.
    pub forward_hit_m: f64,

    /// Left obstacle-ray hit distance in meters.
    pub left_hit_m: f64,

    /// Right obstacle-ray hit distance in meters.
    pub right_hit_m: f64,

    /// Angle of the rotating scan ray in degrees.
    pub sweep_angle_deg: f64,

    /// Scan-ray hit distance in meters.
    pub sweep_hit_m: f64,
}

impl TelemetrySample {
    /// A sample with every field set to [`UNDEFINED`].
    pub const EMPTY: TelemetrySample = TelemetrySample {
        speed_mps: UNDEFINED,
        throttle: UNDEFINED,
        brake: UNDEFINED,
        steering: UNDEFINED,
        forward_hit_m: UNDEFINED,
        left_hit_m: UNDEFINED,
        right_hit_m: UNDEFINED,
        sweep_angle_deg: UNDEFINED,
        sweep_hit_m: UNDEFINED,
    };

    /// The wire keys of the nine recognized fields, in declaration order.
    pub const FIELD_NAMES: [&'static str; 9] = [
        "speed_mps",
        "throttle",
        "brake",
        "steering",
        "forward_hit_m",
        "left_hit_m",
        "right_hit_m",
        "sweep_angle_deg",
        "sweep_hit_m",
    ];

    /// Returns the nine fields as `(wire key, value)` pairs.
    ///
    /// Used by the stats collector and metrics formatter to iterate the
    /// fields without spelling them out at every call site.
    pub fn fields(&self) -> [(&'static str, f64); 9] {
        [
            ("speed_mps", self.speed_mps),
            ("throttle", self.throttle),
            ("brake", self.brake),
            ("steering", self.steering),
            ("forward_hit_m", self.forward_hit_m),
            ("left_hit_m", self.left_hit_m),
            ("right_hit_m", self.right_hit_m),
            ("sweep_angle_deg", self.sweep_angle_deg),
            ("sweep_hit_m", self.sweep_hit_m),
        ]
    }

    /// Number of fields holding a real reading (not [`UNDEFINED`]).
    pub fn defined_fields(&self) -> usize {
        self.fields().iter().filter(|(_, v)| is_defined(*v)).count()
    }
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "speed={:.2} m/s throttle={:.2} steer={:.2} brake={:.2} rays[m]={:.2},{:.2},{:.2} sweep(angle={:.1},d={:.2})",
            self.speed_mps,
            self.throttle,
            self.steering,
            self.brake,
            self.forward_hit_m,
            self.left_hit_m,
            self.right_hit_m,
            self.sweep_angle_deg,
            self.sweep_hit_m,
        )
    }
}
