// SPDX-License-Identifier: AGPL-3.0-only

//! Real-to-complex 3D transforms on the Hermitian-packed grid.
//!
//! Built from 1D complex FFTs (rustfft) in three pencil passes:
//!
//! 1. length-N transforms along z, keeping the `z <= N/2` half of each
//!    pencil (the rest is fixed by conjugate symmetry of a real signal);
//! 2. length-N transforms along y within each x-slab of the half-grid;
//! 3. length-N transforms along x, via a transpose scratch buffer so each
//!    pencil is contiguous for the FFT kernel.
//!
//! After the inverse y- and x-passes, each z-pencil of the slab is again
//! Hermitian-symmetric, so the final pass reconstructs the full-length
//! pencil from its stored half before transforming back to position space.
//!
//! Normalization: the forward transform stores raw (unnormalized) DFT
//! coefficients; the inverse divides by N^3 once. A position -> momentum ->
//! position round trip is the identity up to rounding.
//!
//! All passes run in parallel over pencils with per-thread scratch; no two
//! workers touch the same pencil.

use std::sync::Arc;

use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::grid::GridParams;

/// Shared forward/inverse FFT plans for one grid size.
///
/// Created once per run and shared by every field container (the plans are
/// immutable and thread-safe).
pub struct SpectralPlans {
    n: usize,
    nc: usize,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl SpectralPlans {
    /// Plan forward and inverse length-N transforms for `grid`.
    #[must_use]
    pub fn new(grid: &GridParams) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n: grid.n,
            nc: grid.mom_z(),
            fwd: planner.plan_fft_forward(grid.n),
            inv: planner.plan_fft_inverse(grid.n),
        }
    }

    /// Points per dimension these plans were built for.
    #[must_use]
    pub const fn n(&self) -> usize {
        self.n
    }

    fn pencil_scratch(&self, plan: &Arc<dyn Fft<f64>>) -> (Vec<Complex64>, Vec<Complex64>) {
        (
            vec![Complex64::new(0.0, 0.0); self.n],
            vec![Complex64::new(0.0, 0.0); plan.get_inplace_scratch_len()],
        )
    }

    /// Forward R2C transform: `position` (length N^3) into `momentum`
    /// (length N^2 (N/2+1)), unnormalized.
    ///
    /// # Panics
    ///
    /// If the slice lengths do not match the planned grid.
    pub fn forward(&self, position: &[f64], momentum: &mut [Complex64]) {
        let (n, nc) = (self.n, self.nc);
        assert_eq!(position.len(), n * n * n, "position buffer length");
        assert_eq!(momentum.len(), n * n * nc, "momentum buffer length");

        // z-pass: contiguous real pencils -> stored half-spectra.
        position
            .par_chunks(n)
            .zip(momentum.par_chunks_mut(nc))
            .for_each_init(
                || self.pencil_scratch(&self.fwd),
                |(buf, scratch), (src, dst)| {
                    for (b, &v) in buf.iter_mut().zip(src) {
                        *b = Complex64::new(v, 0.0);
                    }
                    self.fwd.process_with_scratch(buf, scratch);
                    dst.copy_from_slice(&buf[..nc]);
                },
            );

        self.pass_y(momentum, &self.fwd);
        self.pass_x(momentum, &self.fwd);
    }

    /// Inverse C2R transform: `momentum` into `position`, divided by N^3.
    ///
    /// The slab is consumed as working storage (its contents afterwards are
    /// intermediate, matching the container contract that the inactive
    /// representation is undefined).
    ///
    /// # Panics
    ///
    /// If the slice lengths do not match the planned grid.
    pub fn inverse(&self, momentum: &mut [Complex64], position: &mut [f64]) {
        let (n, nc) = (self.n, self.nc);
        assert_eq!(position.len(), n * n * n, "position buffer length");
        assert_eq!(momentum.len(), n * n * nc, "momentum buffer length");

        self.pass_x(momentum, &self.inv);
        self.pass_y(momentum, &self.inv);

        // z-pass: rebuild full pencils by conjugate symmetry, transform,
        // keep the real part. Single 1/N^3 normalization lives here.
        let norm = 1.0 / (n * n * n) as f64;
        let slab: &[Complex64] = momentum;
        position
            .par_chunks_mut(n)
            .zip(slab.par_chunks(nc))
            .for_each_init(
                || self.pencil_scratch(&self.inv),
                |(buf, scratch), (dst, src)| {
                    buf[..nc].copy_from_slice(src);
                    for z in nc..n {
                        buf[z] = src[n - z].conj();
                    }
                    self.inv.process_with_scratch(buf, scratch);
                    for (d, b) in dst.iter_mut().zip(buf.iter()) {
                        *d = b.re * norm;
                    }
                },
            );
    }

    /// Transform along y: strided columns within each x-slab.
    fn pass_y(&self, momentum: &mut [Complex64], plan: &Arc<dyn Fft<f64>>) {
        let (n, nc) = (self.n, self.nc);
        momentum.par_chunks_mut(n * nc).for_each_init(
            || self.pencil_scratch(plan),
            |(buf, scratch), slab| {
                for z in 0..nc {
                    for y in 0..n {
                        buf[y] = slab[y * nc + z];
                    }
                    plan.process_with_scratch(buf, scratch);
                    for y in 0..n {
                        slab[y * nc + z] = buf[y];
                    }
                }
            },
        );
    }

    /// Transform along x: gather into a transposed scratch slab so pencils
    /// are contiguous, transform, scatter back.
    fn pass_x(&self, momentum: &mut [Complex64], plan: &Arc<dyn Fft<f64>>) {
        let (n, nc) = (self.n, self.nc);
        let mut t = vec![Complex64::new(0.0, 0.0); n * n * nc];

        {
            let slab: &[Complex64] = momentum;
            t.par_chunks_mut(n).enumerate().for_each_init(
                || vec![Complex64::new(0.0, 0.0); plan.get_inplace_scratch_len()],
                |scratch, (col, pencil)| {
                    for (x, p) in pencil.iter_mut().enumerate() {
                        *p = slab[x * n * nc + col];
                    }
                    plan.process_with_scratch(pencil, scratch);
                },
            );
        }

        momentum
            .par_chunks_mut(n * nc)
            .enumerate()
            .for_each(|(x, slab)| {
                for (col, s) in slab.iter_mut().enumerate() {
                    *s = t[col * n + x];
                }
            });
    }
}
