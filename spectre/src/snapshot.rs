// SPDX-License-Identifier: AGPL-3.0-only

//! Snapshot sink: raw binary field dumps.
//!
//! One file per field per snapshot index, named `<field>_<index>.bin` with
//! a 5-digit zero-padded index, containing the N^3 position-space values as
//! contiguous little-endian f64 in row-major order (`z` fastest). No
//! header; the driver records grid metadata in its run report.
//!
//! Field values are dumped in **physical** units, `f = f_pr / (A a^r)`;
//! the energy density comes from [`crate::energy::energy_density`] already
//! in physical units.
//!
//! Write failures are reported to the driver and leave integrator state
//! untouched; a run may continue past a failed dump.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SpectreError;
use crate::field::Field;
use crate::params::ModelParams;

/// Writes indexed snapshot files into one output directory.
pub struct SnapshotWriter {
    dir: PathBuf,
    index: usize,
}

impl SnapshotWriter {
    /// Create the output directory (and parents) and start at index 0.
    ///
    /// # Errors
    ///
    /// [`SpectreError::Snapshot`] if the directory cannot be created.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, SpectreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| SpectreError::Snapshot {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir, index: 0 })
    }

    /// Current snapshot index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Advance to the next snapshot index.
    pub fn advance(&mut self) {
        self.index += 1;
    }

    /// Write one field's values under the current index.
    ///
    /// # Errors
    ///
    /// [`SpectreError::Snapshot`] on create or write failure.
    pub fn write_field(&self, name: &str, values: &[f64]) -> Result<PathBuf, SpectreError> {
        let path = self.dir.join(format!("{name}_{:05}.bin", self.index));
        let wrap = |source: std::io::Error| SpectreError::Snapshot {
            path: path.display().to_string(),
            source,
        };
        let mut file = fs::File::create(&path).map_err(wrap)?;
        file.write_all(&le_bytes(values)).map_err(wrap)?;
        Ok(path)
    }
}

/// Contiguous little-endian byte image of a f64 slice.
#[cfg(target_endian = "little")]
fn le_bytes(values: &[f64]) -> std::borrow::Cow<'_, [u8]> {
    std::borrow::Cow::Borrowed(bytemuck::cast_slice(values))
}

#[cfg(target_endian = "big")]
fn le_bytes(values: &[f64]) -> std::borrow::Cow<'_, [u8]> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    std::borrow::Cow::Owned(out)
}

/// Convert a position-state program field to physical units,
/// `f = f_pr / (A a^r)`.
///
/// The field is not mutated.
#[must_use]
pub fn physical_field(field: &Field, p: &ModelParams, a: f64) -> Vec<f64> {
    let scale = 1.0 / (p.rescale_a * a.powf(p.rescale_r));
    field.position().iter().map(|v| v * scale).collect()
}
