//! Linear calibration from raw counts to grams.

use core::fmt;

use crate::error::CalibrationError;

/// Offset and scale mapping raw HX711 counts to grams.
///
/// ```text
/// grams = (raw - offset) / scale
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// raw reading at zero load (tare)
    pub offset: i32,
    /// raw counts per gram
    pub scale: f32,
}

impl Calibration {
    pub const fn new(offset: i32, scale: f32) -> Self {
        Self { offset, scale }
    }

    /// Build a calibration from a zero-load reading and a reading under a
    /// reference weight.
    ///
    /// Fails when the weight is not a finite positive number, when the two
    /// readings are within `epsilon` counts of each other, or when the
    /// resulting scale is not representable.
    pub fn from_readings(
        zero: i32,
        loaded: i32,
        known_weight_grams: f32,
        epsilon: u32,
    ) -> Result<Self, CalibrationError> {
        check_weight(known_weight_grams)?;
        let delta = loaded as i64 - zero as i64;
        if delta.unsigned_abs() <= epsilon as u64 {
            return Err(CalibrationError::Degenerate { zero, loaded });
        }
        let scale = delta as f32 / known_weight_grams;
        check_scale(scale)?;
        Ok(Self {
            offset: zero,
            scale,
        })
    }

    /// Raw counts relative to the offset.
    pub fn tared(&self, raw: i32) -> i32 {
        raw.saturating_sub(self.offset)
    }

    /// Convert a raw reading to grams.
    pub fn to_grams(&self, raw: i32) -> f32 {
        self.tared(raw) as f32 / self.scale
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            offset: 0,
            scale: 1.0,
        }
    }
}

pub(crate) fn check_weight(known_weight_grams: f32) -> Result<(), CalibrationError> {
    if !known_weight_grams.is_finite() || known_weight_grams <= 0.0 {
        return Err(CalibrationError::NonPositiveWeight);
    }
    Ok(())
}

pub(crate) fn check_scale(scale: f32) -> Result<(), CalibrationError> {
    if !scale.is_finite() || scale == 0.0 {
        return Err(CalibrationError::InvalidScale);
    }
    Ok(())
}

/// A calibrated weight in grams.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Weight(pub f32);

impl Weight {
    pub fn grams(&self) -> f32 {
        self.0
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} grams", self.0)
    }
}
