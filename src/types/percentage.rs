// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Percentage type for brightness and volume.
//!
//! Devices report levels on their own scale (a bulb might use 0-255, a
//! speaker 0-100). The hub always exposes percentages and converts at the
//! device boundary with [`Percentage::scaled_from`] and
//! [`Percentage::scale_to`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A level expressed as a percentage (0-100).
///
/// # Examples
///
/// ```
/// use homehub_lib::types::Percentage;
///
/// let half = Percentage::new(50).unwrap();
/// assert_eq!(half.value(), 50);
///
/// assert!(Percentage::new(101).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percentage(u8);

impl Percentage {
    /// 0%.
    pub const MIN: Self = Self(0);

    /// 100%.
    pub const MAX: Self = Self(100);

    /// Creates a new percentage.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: u32::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Creates a percentage from an arbitrary JSON-ish number.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` for negative, fractional-overflow or
    /// values above 100.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_f64(value: f64) -> Result<Self, ValueError> {
        if !(0.0..=100.0).contains(&value) {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                // Informational only, the value is out of range anyway.
                actual: value.max(0.0) as u32,
            });
        }
        Ok(Self(value.round() as u8))
    }

    /// Returns the percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Converts a device level within `[min, max]` to a percentage.
    ///
    /// Levels outside the range are clamped. A degenerate range yields 0%.
    ///
    /// ```
    /// use homehub_lib::types::Percentage;
    ///
    /// assert_eq!(Percentage::scaled_from(128, 1, 255).value(), 50);
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scaled_from(level: u32, min: u32, max: u32) -> Self {
        if max <= min {
            return Self::MIN;
        }
        let level = level.clamp(min, max);
        let pct = f64::from(level - min) * 100.0 / f64::from(max - min);
        Self(pct.round() as u8)
    }

    /// Converts this percentage to a device level within `[min, max]`.
    ///
    /// ```
    /// use homehub_lib::types::Percentage;
    ///
    /// let level = Percentage::new(100).unwrap().scale_to(1, 255);
    /// assert_eq!(level, 255);
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn scale_to(&self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        let span = f64::from(max - min) * f64::from(self.0) / 100.0;
        min + span.round() as u32
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for Percentage {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Percentage> for u8 {
    fn from(value: Percentage) -> Self {
        value.0
    }
}
