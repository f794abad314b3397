// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for integration and snapshot operations.
//!
//! Replaces `Result<_, String>` in public APIs with a proper enum so drivers
//! can pattern-match on failure modes (numerical blow-up vs. snapshot I/O)
//! rather than parsing opaque strings. Precondition violations (wrong field
//! representation on entry, `dt <= 0`, non-positive scale factor at
//! construction) are programming errors and fail fast via `assert!` instead
//! of appearing here.

use std::fmt;
use std::io;

/// Errors arising from time integration or snapshot output.
#[derive(Debug)]
pub enum SpectreError {
    /// A non-finite field value or non-positive scale factor was detected at
    /// a step boundary. The integrator performs no recovery; the driver may
    /// abort or dump state for inspection.
    Blowup {
        /// Step index at which the blow-up was detected.
        step: u64,
        /// Which quantity went bad (field name or `"scale factor"`).
        what: &'static str,
    },

    /// Snapshot file creation or write failed. Integrator state is
    /// unaffected; the simulation may continue.
    Snapshot {
        /// Target path of the failed write.
        path: String,
        /// Underlying I/O error.
        source: io::Error,
    },
}

impl fmt::Display for SpectreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blowup { step, what } => {
                write!(f, "numerical blow-up in {what} at step {step}")
            }
            Self::Snapshot { path, source } => {
                write!(f, "snapshot write to {path} failed: {source}")
            }
        }
    }
}

impl std::error::Error for SpectreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Blowup { .. } => None,
            Self::Snapshot { source, .. } => Some(source),
        }
    }
}
