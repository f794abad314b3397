// SPDX-License-Identifier: AGPL-3.0-only

//! Dual-representation field container.
//!
//! A field lives in exactly one of two representations at a time: a real
//! N^3 position array or its Hermitian-packed N^2 (N/2+1) complex momentum
//! slab. A state flag records which; the inactive buffer's contents are
//! undefined. [`Field::switch_state`] moves between them via the shared
//! [`SpectralPlans`] and is a no-op when already in the target state.
//!
//! Accessors are representation-checked: reading the wrong buffer is a
//! contract violation caught by `debug_assert!` (release builds elide the
//! check on the hot path).

use std::sync::Arc;

use rustfft::num_complex::Complex64;

use crate::fft::SpectralPlans;
use crate::grid::GridParams;

/// Which buffer of a [`Field`] currently holds the live data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Representation {
    /// Real values on the N^3 lattice.
    Position,
    /// Hermitian-packed complex modes on the N^2 (N/2+1) slab.
    Momentum,
}

/// One real scalar field on the lattice, owning both memory layouts.
pub struct Field {
    grid: GridParams,
    state: Representation,
    position: Vec<f64>,
    momentum: Vec<Complex64>,
    plans: Arc<SpectralPlans>,
}

impl Field {
    /// Create a zeroed field in position representation.
    ///
    /// # Panics
    ///
    /// If `plans` were built for a different grid size.
    #[must_use]
    pub fn new(grid: GridParams, plans: Arc<SpectralPlans>) -> Self {
        assert_eq!(plans.n(), grid.n, "FFT plans built for a different grid");
        Self {
            grid,
            state: Representation::Position,
            position: vec![0.0; grid.total_gridpoints()],
            momentum: vec![Complex64::new(0.0, 0.0); grid.total_momentum_modes()],
            plans,
        }
    }

    /// Grid this field lives on.
    #[must_use]
    pub const fn grid(&self) -> &GridParams {
        &self.grid
    }

    /// Current live representation.
    #[must_use]
    pub const fn state(&self) -> Representation {
        self.state
    }

    /// Move the live representation to `target`.
    ///
    /// No-op when already there; otherwise performs the R2C or C2R
    /// transform. After the call the container expresses the same
    /// mathematical field in the other layout, and the previous layout's
    /// buffer is undefined.
    pub fn switch_state(&mut self, target: Representation) {
        if self.state == target {
            return;
        }
        match target {
            Representation::Momentum => {
                self.plans.forward(&self.position, &mut self.momentum);
            }
            Representation::Position => {
                self.plans.inverse(&mut self.momentum, &mut self.position);
            }
        }
        self.state = target;
    }

    /// Live position-space values.
    ///
    /// Debug-asserts the field is in position representation.
    #[must_use]
    pub fn position(&self) -> &[f64] {
        debug_assert_eq!(self.state, Representation::Position, "field not in position state");
        &self.position
    }

    /// Mutable position-space values.
    pub fn position_mut(&mut self) -> &mut [f64] {
        debug_assert_eq!(self.state, Representation::Position, "field not in position state");
        &mut self.position
    }

    /// Live momentum-space modes.
    ///
    /// Debug-asserts the field is in momentum representation.
    #[must_use]
    pub fn momentum(&self) -> &[Complex64] {
        debug_assert_eq!(self.state, Representation::Momentum, "field not in momentum state");
        &self.momentum
    }

    /// Mutable momentum-space modes.
    pub fn momentum_mut(&mut self) -> &mut [Complex64] {
        debug_assert_eq!(self.state, Representation::Momentum, "field not in momentum state");
        &mut self.momentum
    }

    /// Overwrite every position-space point with `value` and mark the
    /// position representation live.
    pub fn fill_position(&mut self, value: f64) {
        self.position.fill(value);
        self.state = Representation::Position;
    }

    /// Mark the position representation live and return its buffer for
    /// overwriting. Previous contents of either representation are
    /// discarded (no transform is performed).
    pub fn overwrite_position(&mut self) -> &mut [f64] {
        self.state = Representation::Position;
        &mut self.position
    }

    /// Zero the momentum slab and mark the momentum representation live.
    /// Starting point for mode-by-mode initialization.
    pub fn clear_momentum(&mut self) {
        self.momentum.fill(Complex64::new(0.0, 0.0));
        self.state = Representation::Momentum;
    }

    /// Set the homogeneous (zero-momentum) mode to the given volume mean.
    ///
    /// With the unnormalized forward convention the zero mode of a uniform
    /// field of value `mean` is `mean * N^3`.
    pub fn set_homogeneous_mode(&mut self, mean: f64) {
        let npts = self.grid.total_gridpoints() as f64;
        self.momentum_mut()[0] = Complex64::new(mean * npts, 0.0);
    }

    /// Handle to the FFT plans this field was built with.
    #[must_use]
    pub fn plans_handle(&self) -> Arc<SpectralPlans> {
        Arc::clone(&self.plans)
    }

    /// True when every mode of the live representation is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self.state {
            Representation::Position => self.position.iter().all(|v| v.is_finite()),
            Representation::Momentum => self
                .momentum
                .iter()
                .all(|c| c.re.is_finite() && c.im.is_finite()),
        }
    }
}

/// The driver-owned field set: phi, chi, and their first derivatives.
///
/// Authoritative field state is visible here between steps; the integrator
/// borrows the set mutably for the duration of each call.
pub struct SimFields {
    /// phi.
    pub phi: Field,
    /// d phi / dt (program time).
    pub phidot: Field,
    /// chi.
    #[cfg(feature = "chi")]
    pub chi: Field,
    /// d chi / dt (program time).
    #[cfg(feature = "chi")]
    pub chidot: Field,
}

impl SimFields {
    /// Allocate the full field set on `grid`, all zeroed, sharing one set of
    /// FFT plans.
    #[must_use]
    pub fn new(grid: GridParams) -> Self {
        let plans = Arc::new(SpectralPlans::new(&grid));
        Self::with_plans(grid, &plans)
    }

    /// Allocate the field set with externally shared plans.
    #[must_use]
    pub fn with_plans(grid: GridParams, plans: &Arc<SpectralPlans>) -> Self {
        Self {
            phi: Field::new(grid, Arc::clone(plans)),
            phidot: Field::new(grid, Arc::clone(plans)),
            #[cfg(feature = "chi")]
            chi: Field::new(grid, Arc::clone(plans)),
            #[cfg(feature = "chi")]
            chidot: Field::new(grid, Arc::clone(plans)),
        }
    }

    /// FFT plans shared by the set.
    #[must_use]
    pub fn plans(&self) -> Arc<SpectralPlans> {
        Arc::clone(&self.phi.plans)
    }

    /// Switch every member to `target`.
    pub fn switch_all(&mut self, target: Representation) {
        self.phi.switch_state(target);
        self.phidot.switch_state(target);
        #[cfg(feature = "chi")]
        {
            self.chi.switch_state(target);
            self.chidot.switch_state(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_field(n: usize) -> Field {
        let grid = GridParams::new(n, 1.0);
        Field::new(grid, Arc::new(SpectralPlans::new(&grid)))
    }

    /// Deterministic broadband fill (incommensurate waves over the linear
    /// index) exercising every mode without an RNG.
    fn fill_wave_mix(field: &mut Field) {
        for (i, v) in field.position_mut().iter_mut().enumerate() {
            let t = i as f64;
            *v = (0.61 * t).sin() + 0.33 * (1.7 * t + 0.9).cos();
        }
    }

    #[test]
    fn new_field_starts_in_position_state() {
        let f = make_field(8);
        assert_eq!(f.state(), Representation::Position);
        assert!(f.position().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn switch_to_current_state_preserves_data_exactly() {
        let mut f = make_field(8);
        fill_wave_mix(&mut f);
        let before = f.position().to_vec();
        f.switch_state(Representation::Position);
        assert_eq!(f.position(), &before[..], "idempotent switch must be bitwise");
    }

    #[test]
    fn roundtrip_relative_error_within_tolerance() {
        let mut f = make_field(16);
        fill_wave_mix(&mut f);
        let before = f.position().to_vec();
        f.switch_state(Representation::Momentum);
        f.switch_state(Representation::Position);
        for (i, (a, b)) in before.iter().zip(f.position()).enumerate() {
            // Relative per element, floored at unit scale so near-zero
            // samples compare absolutely.
            assert!(
                ((a - b) / a.abs().max(1.0)).abs() < crate::tolerances::FFT_ROUNDTRIP,
                "point {i}: {a} vs {b}"
            );
        }
    }

    #[test]
    fn uniform_field_concentrates_in_zero_mode() {
        let mut f = make_field(8);
        f.fill_position(3.0);
        f.switch_state(Representation::Momentum);
        let zero = f.momentum()[0];
        let expect = 3.0 * f.grid().total_gridpoints() as f64;
        assert!((zero.re - expect).abs() < 1e-9, "zero mode = {zero}");
        let rest: f64 = f.momentum()[1..].iter().map(Complex64::norm_sqr).sum();
        assert!(rest < 1e-16, "nonzero-mode leakage = {rest}");
    }

    #[test]
    fn is_finite_detects_nan_in_live_buffer() {
        let mut f = make_field(8);
        assert!(f.is_finite());
        f.position_mut()[17] = f64::NAN;
        assert!(!f.is_finite());
    }

    #[test]
    fn sim_fields_share_plans() {
        let grid = GridParams::new(8, 1.0);
        let fields = SimFields::new(grid);
        assert_eq!(fields.plans().n(), 8);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "position state")]
    fn wrong_state_access_panics_in_debug() {
        let mut f = make_field(8);
        f.switch_state(Representation::Momentum);
        let _ = f.position();
    }
}
