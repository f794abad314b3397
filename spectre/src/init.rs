// SPDX-License-Identifier: AGPL-3.0-only

//! LatticeEasy-style vacuum fluctuation initializer.
//!
//! Populates a field and its velocity mode by mode with quantum vacuum
//! amplitudes around the driver's homogeneous values: each mode `k` gets a
//! superposition of left- and right-moving waves with Rayleigh-distributed
//! magnitudes of r.m.s. set by `1/sqrt(omega_k)` and uniform phases,
//!
//! ```text
//! f_k    = m1 e^{i th1} + m2 e^{i th2}
//! fdot_k = i omega (m1 e^{i th1} - m2 e^{i th2}) + r adot f_k
//! ```
//!
//! with `omega^2 = k^2 + m_eff^2` evaluated at `a = 1`. The overall
//! normalization is the LatticeEasy fluctuation amplitude
//! `A B N^3 / ((L/len0)^{3/2} sqrt 2)`, where `len0` is the reference box
//! size the mode amplitudes are quoted against (driver-supplied; usually
//! the box side itself).
//!
//! The self-conjugate planes `z = 0` and `z = N/2` are filled in conjugate
//! pairs so the spectrum stays Hermitian; the eight self-conjugate modes
//! take the real part of the two-mover assignment. The zero mode is left
//! to the driver (`Field::set_homogeneous_mode`). Modes with
//! `omega^2 <= 0` (tachyonic at initialization) carry no vacuum amplitude
//! and are left empty.
//!
//! Mode draws come from a private SplitMix64 stream: a fixed visit order
//! and a fixed draw count per mode make one seed pin the entire realization
//! bit-for-bit, so preheating runs and their regression baselines are
//! reproducible.

use std::f64::consts::TAU;

use rustfft::num_complex::Complex64;

use crate::field::Field;
use crate::grid::GridParams;
use crate::params::ModelParams;

/// Floor for the uniform draw feeding the Rayleigh magnitude: a draw of
/// exactly zero would send a single mode's vacuum amplitude to infinity
/// and poison the whole realization through the transform.
const LN_GUARD: f64 = 1e-300;

/// Deterministic draw stream for vacuum mode realizations.
///
/// SplitMix64 over a driver-supplied seed. Every stored mode is visited in
/// a fixed order and consumes exactly two mover draws (four raw words), so
/// the realization depends only on the seed, never on platform or worker
/// count. Statistical quality well beyond the ~2 N^3 draws of an
/// initialization is not required; stability of the stream is.
struct ModeRng {
    state: u64,
}

impl ModeRng {
    const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in [0, 1) from the top 53 bits of one word.
    fn uniform(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// One mover: Rayleigh-distributed magnitude about `rms` with a
    /// uniform phase, the per-wave statistics of a Gaussian vacuum mode.
    fn mover(&mut self, rms: f64) -> Complex64 {
        let mag = rms * (-self.uniform().max(LN_GUARD).ln()).sqrt() / 2.0_f64.sqrt();
        let theta = TAU * self.uniform();
        Complex64::new(mag * theta.cos(), mag * theta.sin())
    }
}

/// Mode-by-mode vacuum initializer with deterministic seeding.
pub struct LatticeInitializer {
    grid: GridParams,
    rescale_r: f64,
    fluctuation_amplitude: f64,
    rng: ModeRng,
}

impl LatticeInitializer {
    /// Create an initializer.
    ///
    /// `len0` is the reference box size of the fluctuation normalization.
    ///
    /// # Panics
    ///
    /// If `len0` is not positive.
    #[must_use]
    pub fn new(p: &ModelParams, grid: GridParams, len0: f64, seed: u64) -> Self {
        assert!(len0 > 0.0, "reference box size must be positive, got {len0}");
        let npts = grid.total_gridpoints() as f64;
        let fluctuation_amplitude =
            p.rescale_a * p.rescale_b * npts / ((grid.len / len0).powf(1.5) * 2.0_f64.sqrt());
        Self {
            grid,
            rescale_r: p.rescale_r,
            fluctuation_amplitude,
            rng: ModeRng::new(seed),
        }
    }

    /// Fill `fld` and `flddot` with a vacuum realization for effective mass
    /// squared `m_eff_sq`, leaving both in momentum representation with the
    /// zero mode empty.
    ///
    /// `adot` is the initial scale-factor velocity entering the conformal
    /// `r adot f` velocity correction.
    pub fn initialize_field(&mut self, fld: &mut Field, flddot: &mut Field, m_eff_sq: f64, adot: f64) {
        fld.clear_momentum();
        flddot.clear_momentum();
        let n = self.grid.n;

        // Interior z: the mirror mode lives in the unstored half, every
        // stored mode is free.
        for x in 0..n {
            for y in 0..n {
                for z in 1..n / 2 {
                    self.set_mode(fld, flddot, m_eff_sq, adot, x, y, z, false);
                }
            }
        }

        // Self-conjugate planes: fill primaries, mirror conjugates.
        for z in [0, n / 2] {
            for x in 0..n {
                for y in 0..n {
                    let mx = (n - x) % n;
                    let my = (n - y) % n;
                    let here = y * n + x;
                    let mirror = my * n + mx;
                    if here == mirror {
                        // Self-conjugate mode; (0,0,0) stays with the driver.
                        if x != 0 || y != 0 || z != 0 {
                            self.set_mode(fld, flddot, m_eff_sq, adot, x, y, z, true);
                        }
                    } else if here < mirror {
                        self.set_mode(fld, flddot, m_eff_sq, adot, x, y, z, false);
                        let src = self.grid.idx_mom(x, y, z);
                        let dst = self.grid.idx_mom(mx, my, z);
                        let (f, fd) = (fld.momentum()[src], flddot.momentum()[src]);
                        fld.momentum_mut()[dst] = f.conj();
                        flddot.momentum_mut()[dst] = fd.conj();
                    }
                }
            }
        }
    }

    /// Draw one mode. `real` marks self-conjugate modes, which take the
    /// real part of the two-mover assignment.
    #[allow(clippy::too_many_arguments)]
    fn set_mode(
        &mut self,
        fld: &mut Field,
        flddot: &mut Field,
        m_eff_sq: f64,
        adot: f64,
        x: usize,
        y: usize,
        z: usize,
        real: bool,
    ) {
        let omega_sq = self.grid.momentum_sq(x, y, z) + m_eff_sq;
        if omega_sq <= 0.0 {
            return;
        }
        let omega = omega_sq.sqrt();
        let rms = self.fluctuation_amplitude / omega.sqrt();

        let m1 = self.rng.mover(rms);
        let m2 = self.rng.mover(rms);

        let f = m1 + m2;
        let i_omega = Complex64::new(0.0, omega);
        let fdot = i_omega * (m1 - m2) + f * (self.rescale_r * adot);

        let idx = self.grid.idx_mom(x, y, z);
        if real {
            fld.momentum_mut()[idx] = Complex64::new(f.re, 0.0);
            flddot.momentum_mut()[idx] = Complex64::new(fdot.re, 0.0);
        } else {
            fld.momentum_mut()[idx] = f;
            flddot.momentum_mut()[idx] = fdot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Representation, SimFields};

    fn init_pair(n: usize, len: f64, m_eff_sq: f64, seed: u64) -> SimFields {
        let grid = GridParams::new(n, len);
        let p = ModelParams::flat();
        let mut fields = SimFields::new(grid);
        let mut init = LatticeInitializer::new(&p, grid, len, seed);
        init.initialize_field(&mut fields.phi, &mut fields.phidot, m_eff_sq, 0.0);
        fields
    }

    #[test]
    fn same_seed_reproduces_realization() {
        let a = init_pair(8, 5.0, 1.0, 42);
        let b = init_pair(8, 5.0, 1.0, 42);
        assert_eq!(a.phi.momentum(), b.phi.momentum());
        assert_eq!(a.phidot.momentum(), b.phidot.momentum());
    }

    #[test]
    fn different_seeds_differ() {
        let a = init_pair(8, 5.0, 1.0, 42);
        let b = init_pair(8, 5.0, 1.0, 43);
        assert_ne!(a.phi.momentum(), b.phi.momentum());
    }

    #[test]
    fn first_visited_mode_follows_the_mover_formula() {
        // The mode visit order starts at (0, 0, 1); replaying the draw
        // stream with the documented two-mover assignment must reproduce
        // that mode of the realization bit-for-bit. This is the contract
        // regression baselines rely on.
        let (n, len, m_eff_sq, seed) = (8, 5.0, 1.0, 42u64);
        let fields = init_pair(n, len, m_eff_sq, seed);
        let g = *fields.phi.grid();

        let p = ModelParams::flat();
        let init = LatticeInitializer::new(&p, g, len, seed);
        let mut rng = ModeRng::new(seed);
        let omega = (g.momentum_sq(0, 0, 1) + m_eff_sq).sqrt();
        let rms = init.fluctuation_amplitude / omega.sqrt();
        let m1 = rng.mover(rms);
        let m2 = rng.mover(rms);

        let got = fields.phi.momentum()[g.idx_mom(0, 0, 1)];
        let expect = m1 + m2;
        assert_eq!(got, expect, "mode (0,0,1): {got} vs {expect}");

        let got_dot = fields.phidot.momentum()[g.idx_mom(0, 0, 1)];
        let expect_dot = Complex64::new(0.0, omega) * (m1 - m2);
        assert_eq!(got_dot, expect_dot, "mode (0,0,1) velocity");
    }

    #[test]
    fn draw_stream_consumption_is_one_mode_per_two_movers() {
        // The second visited mode, (0, 0, 2), must come from draws 3 and 4
        // of the stream: an extra or missing draw anywhere would silently
        // reshuffle every later mode of the realization.
        let (n, len, m_eff_sq, seed) = (8, 5.0, 1.0, 7u64);
        let fields = init_pair(n, len, m_eff_sq, seed);
        let g = *fields.phi.grid();

        let p = ModelParams::flat();
        let init = LatticeInitializer::new(&p, g, len, seed);
        let mut rng = ModeRng::new(seed);
        let rms_of = |z: usize| {
            let omega = (g.momentum_sq(0, 0, z) + m_eff_sq).sqrt();
            init.fluctuation_amplitude / omega.sqrt()
        };
        let _ = rng.mover(rms_of(1));
        let _ = rng.mover(rms_of(1));
        let expect = rng.mover(rms_of(2)) + rng.mover(rms_of(2));

        let got = fields.phi.momentum()[g.idx_mom(0, 0, 2)];
        assert_eq!(got, expect, "mode (0,0,2): {got} vs {expect}");
    }

    #[test]
    fn zero_mode_left_for_driver() {
        let fields = init_pair(8, 5.0, 1.0, 7);
        let zero = fields.phi.momentum()[0];
        assert!(zero.norm_sqr() < 1e-30, "zero mode = {zero}");
    }

    #[test]
    fn self_conjugate_planes_are_hermitian() {
        let fields = init_pair(8, 5.0, 0.5, 11);
        let g = *fields.phi.grid();
        let n = g.n;
        for z in [0, n / 2] {
            for x in 0..n {
                for y in 0..n {
                    let here = fields.phi.momentum()[g.idx_mom(x, y, z)];
                    let mirror = fields.phi.momentum()[g.idx_mom((n - x) % n, (n - y) % n, z)];
                    let diff = here - mirror.conj();
                    assert!(
                        diff.norm_sqr() < 1e-30,
                        "mode ({x},{y},{z}) breaks Hermitian symmetry: {here} vs {mirror}"
                    );
                }
            }
        }
    }

    #[test]
    fn realization_transforms_to_real_finite_field() {
        let mut fields = init_pair(16, 5.0, 1.0, 3);
        fields.phi.switch_state(Representation::Position);
        assert!(fields.phi.is_finite());
        let mean: f64 =
            fields.phi.position().iter().sum::<f64>() / fields.phi.position().len() as f64;
        assert!(mean.abs() < 1e-9, "zero-mode-free field must average to 0: {mean}");
    }

    #[test]
    fn amplitude_scales_inversely_with_frequency() {
        // Heavy fields fluctuate less: compare mean mode power at two
        // effective masses with matched seeds.
        let light = init_pair(8, 5.0, 0.01, 19);
        let heavy = init_pair(8, 5.0, 100.0, 19);
        let power = |f: &SimFields| -> f64 {
            f.phi.momentum().iter().map(Complex64::norm_sqr).sum::<f64>()
        };
        let (pl, ph) = (power(&light), power(&heavy));
        assert!(
            pl > 5.0 * ph,
            "light field should carry more vacuum power: {pl} vs {ph}"
        );
    }

    #[test]
    fn velocity_modes_carry_omega_scaling() {
        let fields = init_pair(8, 5.0, 4.0, 23);
        // With m_eff^2 = 4 every omega >= 2: total |fdot|^2 >= omega^2 |f|^2
        // summed in quadrature over movers; check the aggregate ratio is in
        // a physical band rather than mode-by-mode (movers are random).
        let f2: f64 = fields.phi.momentum().iter().map(Complex64::norm_sqr).sum();
        let fd2: f64 = fields.phidot.momentum().iter().map(Complex64::norm_sqr).sum();
        let ratio = fd2 / f2;
        assert!(ratio > 1.0, "velocity power too small: ratio = {ratio}");
    }
}
