// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error vocabulary of the runtime.
//!
//! [`ErrorCode`] is the wire vocabulary posted to the client message
//! channel: protocol mistakes become traced no-ops with a `BadValue`
//! style code, allocation failures post `OutOfMemory`, and only codes at
//! or above [`ErrorCode::FatalUnknown`] tear the runtime down.
//! [`ContextError`] covers the one class reported synchronously,
//! failures while constructing a [`Runtime`](crate::runtime::Runtime).

use std::fmt;
use std::io;

/// First code value considered fatal.
const FATAL_BASE: u32 = 0x1000;

/// Error codes posted through the client message channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// No error.
    None,
    /// A command carried an invalid or stale argument and was dropped.
    BadValue,
    /// A buffer slot or byte range was out of bounds.
    BadSlot,
    /// An allocation exceeded the configured budget.
    OutOfMemory,
    /// The worker failed in a way it cannot attribute.
    FatalUnknown,
    /// The graphics driver failed fatally; the runtime is torn down.
    FatalDriver,
}

impl ErrorCode {
    /// The wire value.
    #[must_use]
    pub const fn to_raw(self) -> u32 {
        match self {
            Self::None => 0,
            Self::BadValue => 1,
            Self::BadSlot => 2,
            Self::OutOfMemory => 3,
            Self::FatalUnknown => FATAL_BASE,
            Self::FatalDriver => FATAL_BASE + 1,
        }
    }

    /// Decodes a wire value.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::BadValue),
            2 => Some(Self::BadSlot),
            3 => Some(Self::OutOfMemory),
            0x1000 => Some(Self::FatalUnknown),
            0x1001 => Some(Self::FatalDriver),
            _ => None,
        }
    }

    /// Whether this code tears the runtime down.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        self.to_raw() >= FATAL_BASE
    }
}

/// Synchronous failure while constructing or calling into a runtime.
///
/// Everything else in the system is reported asynchronously through the
/// message channel or resolved locally with a safe default.
#[derive(Debug)]
pub enum ContextError {
    /// The driver's `init_graphics` failed on the worker thread.
    GraphicsInit(&'static str),
    /// The worker thread could not be spawned.
    WorkerSpawn(io::Error),
    /// The worker exited before reporting its init outcome.
    WorkerExited,
    /// The worker declined to create the requested object.
    CreateFailed,
    /// A blocking call outlived its timeout.
    TimedOut,
    /// The runtime is shut down.
    ShutDown,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GraphicsInit(reason) => write!(f, "graphics init failed: {reason}"),
            Self::WorkerSpawn(e) => write!(f, "failed to spawn the worker thread: {e}"),
            Self::WorkerExited => write!(f, "the worker thread exited during startup"),
            Self::CreateFailed => write!(f, "the worker declined the creation request"),
            Self::TimedOut => write!(f, "timed out waiting for the worker"),
            Self::ShutDown => write!(f, "the runtime is shut down"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WorkerSpawn(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_their_wire_values() {
        for code in [
            ErrorCode::None,
            ErrorCode::BadValue,
            ErrorCode::BadSlot,
            ErrorCode::OutOfMemory,
            ErrorCode::FatalUnknown,
            ErrorCode::FatalDriver,
        ] {
            assert_eq!(ErrorCode::from_raw(code.to_raw()), Some(code));
        }
        assert_eq!(ErrorCode::from_raw(0x0fff), None);
    }

    #[test]
    fn only_the_fatal_band_is_fatal() {
        assert!(!ErrorCode::None.is_fatal());
        assert!(!ErrorCode::BadValue.is_fatal());
        assert!(!ErrorCode::OutOfMemory.is_fatal());
        assert!(ErrorCode::FatalUnknown.is_fatal());
        assert!(ErrorCode::FatalDriver.is_fatal());
    }
}
