//! Decoder for telemetry lines emitted by the simulation's car controller.
//!
//! The line format is a set of `key=value` pairs separated by `|`
//! characters:
//!
//! ```text
//! speed_mps=12.5|throttle=0.8|brake=0.0|steering=-0.2|forward_hit_m=30.0
//! ```
//!
//! Decoding is total: there is no malformed line. A field that is missing,
//! blank, or not a number comes back as the [`UNDEFINED`] sentinel, and the
//! rest of the line still decodes normally. The caller decides what to do
//! with blank lines (the connection handler skips them before decoding).

use nom::{
    IResult, Parser,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::rest,
    sequence::separated_pair,
};
use std::collections::HashMap;

use crate::sample::{TelemetrySample, UNDEFINED};

/// Parse one `key=value` token.
///
/// Splits at the first `=` only, so a value may itself contain `=`
/// characters. Fails for a token with no `=` or with an empty key; such
/// tokens contribute no field.
fn key_value(token: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(take_while1(|c: char| c != '='), char('='), rest).parse(token)
}

/// Decode one telemetry line into a fully-populated [`TelemetrySample`].
///
/// Pure and total: every input, however malformed, yields a valid sample.
/// Key order is not significant, unknown keys are ignored, and a repeated
/// key takes its last value in line order.
///
/// # Example
///
/// ```
/// use sim_telemetry::decoder::decode;
///
/// let sample = decode("speed_mps=10.0|throttle=bogus");
/// assert_eq!(sample.speed_mps, 10.0);
/// assert!(sample.throttle.is_nan());
/// ```
pub fn decode(line: &str) -> TelemetrySample {
    let mut values: HashMap<&str, &str> = HashMap::new();
    for token in line.trim().split('|') {
        if let Ok((_, (key, value))) = key_value(token) {
            values.insert(key, value);
        }
    }

    TelemetrySample {
        speed_mps: numeric_field(&values, "speed_mps"),
        throttle: numeric_field(&values, "throttle"),
        brake: numeric_field(&values, "brake"),
        steering: numeric_field(&values, "steering"),
        forward_hit_m: numeric_field(&values, "forward_hit_m"),
        left_hit_m: numeric_field(&values, "left_hit_m"),
        right_hit_m: numeric_field(&values, "right_hit_m"),
        sweep_angle_deg: numeric_field(&values, "sweep_angle_deg"),
        sweep_hit_m: numeric_field(&values, "sweep_hit_m"),
    }
}

/// Look up a key and parse its value, defaulting to the sentinel.
///
/// Values are trimmed before parsing so `speed_mps= 1.0` still reads as a
/// number; a blank value is treated the same as an absent key.
fn numeric_field(values: &HashMap<&str, &str>, key: &str) -> f64 {
    values
        .get(key)
        .map(|raw| raw.trim())
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or(UNDEFINED)
}
