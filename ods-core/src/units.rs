//! Type-safe wrappers for the quantities on the wire
//!
//! Newtype wrappers around f32/f64 to prevent unit confusion between
//! steering angles, speeds, and media time.
//!
//! All unit types serialize with 4 decimal places to reduce JSON payload size.

use serde::{Deserialize, Serialize};

/// Round f32 to 4 decimal places for compact JSON serialization
fn round4<S: serde::Serializer>(val: &f32, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f32((*val * 10000.0).round() / 10000.0)
}

/// Round f64 to 4 decimal places for compact JSON serialization
fn round4_f64<S: serde::Serializer>(val: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((*val * 10000.0).round() / 10000.0)
}

/// Steering angle in degrees (signed: + = right)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Degrees(#[serde(serialize_with = "round4")] pub f32);

/// Speed in km/h
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KilometersPerHour(#[serde(serialize_with = "round4")] pub f32);

impl KilometersPerHour {
    /// Create a speed, clamping negative input to zero
    pub fn new(value: f32) -> Self {
        Self(value.max(0.0))
    }
}

/// Media time in seconds from the start of playback
///
/// f64 because index derivation divides by a fractional frame duration
/// (e.g. 20/601 s) and must not drift over a full clip.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Seconds(#[serde(serialize_with = "round4_f64")] pub f64);
