// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display identification and geometry.
//!
//! [`DisplayId`] is a lightweight handle identifying a display. Drivers
//! assign these; core treats them as opaque. [`DisplayInfo`] carries the
//! mode the compositor composes against.

use core::fmt;

use crate::geometry::Rect;

/// Identifies a specific display.
///
/// Drivers assign display IDs to distinguish multiple outputs. Core code
/// passes them through without interpreting the value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DisplayId(pub u32);

impl fmt::Debug for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayId({})", self.0)
    }
}

/// The active mode of a display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Which display this mode describes.
    pub id: DisplayId,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Refresh period in nanoseconds.
    pub refresh_nanos: u64,
}

impl DisplayInfo {
    /// The screen bounds in pixels, origin at the top left.
    #[inline]
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }
}

impl Default for DisplayInfo {
    /// A 640x480 display at 60 Hz, the mode used when no driver reports
    /// one.
    fn default() -> Self {
        Self {
            id: DisplayId(0),
            width: 640,
            height: 480,
            refresh_nanos: 16_666_667,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_cover_the_mode() {
        let info = DisplayInfo {
            width: 320,
            height: 240,
            ..DisplayInfo::default()
        };
        assert_eq!(info.bounds(), Rect::new(0, 0, 320, 240));
    }
}
