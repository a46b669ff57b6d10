// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Overlay opacity.
//!
//! Opacity is purely presentational: changing it never starts a refresh or
//! touches the network.

use std::fmt;

/// Opacity used until the user moves the slider.
pub const DEFAULT_OPACITY: f32 = 0.7;

/// Overlay opacity in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opacity(f32);

impl Opacity {
    /// Clamp `value` into range. NaN maps to the default.
    #[must_use]
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Self(DEFAULT_OPACITY)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    #[must_use]
    pub fn value(self) -> f32 {
        self.0
    }

    /// Percentage rounded to the nearest integer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is clamped to 0..=100")]
    pub fn percent(self) -> u8 {
        (self.0 * 100.0).round() as u8
    }

    /// Alpha channel for tinting the overlay texture.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is clamped to 0..=255")]
    pub fn alpha(self) -> u8 {
        (self.0 * 255.0).round() as u8
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self(DEFAULT_OPACITY)
    }
}

impl From<f32> for Opacity {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Opacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped() {
        assert_eq!(Opacity::new(1.5).value(), 1.0);
        assert_eq!(Opacity::new(-0.2).value(), 0.0);
        assert_eq!(Opacity::new(f32::NAN), Opacity::default());
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(Opacity::new(0.704).percent(), 70);
        assert_eq!(Opacity::new(0.706).percent(), 71);
        assert_eq!(Opacity::new(0.0).percent(), 0);
        assert_eq!(Opacity::new(1.0).to_string(), "100%");
    }

    #[test]
    fn test_alpha() {
        assert_eq!(Opacity::new(1.0).alpha(), 255);
        assert_eq!(Opacity::new(0.0).alpha(), 0);
        assert_eq!(Opacity::new(0.5).alpha(), 128);
    }
}
