// SPDX-License-Identifier: AGPL-3.0-only

//! Scale-factor dynamics from the Friedmann constraint.
//!
//! In program units (fields in units of M_Pl, G = 1) the acceleration
//! equation, with the kinetic average eliminated via the first Friedmann
//! equation, reads
//!
//! ```text
//! addot = -(s+2) adot^2 / a
//!       + (8 pi / A^2) [ a^{-2s-2r-1} (<|grad phi|^2> + <|grad chi|^2>) / 3
//!                      + a^{1-2s-4r} <V> / B^2 ]
//! ```
//!
//! The staggered variant closes the velocity-Verlet loop: the new `adot` is
//! `adot_staggered + addot dt / 2`, so substituting it back yields a
//! quadratic in `addot`. It is solved with the rationalized root, which is
//! well-conditioned as `dt -> 0` and reduces to the plain form there. The
//! half-step velocity is deliberately paired with the already-drifted `a`.
//!
//! The companion map from program to physical time is
//! `d(pt)/dt = a^{-s} / B`, with derivative
//! `d^2(pt)/dt^2 = -s/B a^{-s-1} adot`.

use std::f64::consts::PI;

use crate::params::ModelParams;

/// The gradient + potential source term of the acceleration equation.
fn friedmann_source(p: &ModelParams, a: f64, grad_phi: f64, grad_chi: f64, avg_v: f64) -> f64 {
    let a2 = p.rescale_a * p.rescale_a;
    let b2 = p.rescale_b * p.rescale_b;
    let grad_pow = a.powf(-2.0 * p.rescale_s - 2.0 * p.rescale_r - 1.0);
    let pot_pow = a.powf(1.0 - 2.0 * p.rescale_s - 4.0 * p.rescale_r);
    8.0 * PI / a2 * (grad_pow * (grad_phi + grad_chi) / 3.0 + pot_pow * avg_v / b2)
}

/// Scale-factor acceleration from synchronous `(a, adot)`.
///
/// `grad_phi`/`grad_chi` are the volume-averaged squared gradients in
/// program units; `avg_v` the volume-averaged program potential. Returns 0
/// when expansion is disabled.
#[must_use]
pub fn adoubledot(
    p: &ModelParams,
    a: f64,
    adot: f64,
    grad_phi: f64,
    grad_chi: f64,
    avg_v: f64,
) -> f64 {
    if !p.expansion {
        return 0.0;
    }
    let c = (p.rescale_s + 2.0) / a;
    friedmann_source(p, a, grad_phi, grad_chi, avg_v) - c * adot * adot
}

/// Scale-factor acceleration closing the staggered step.
///
/// Solves `addot = -c (adot_staggered + addot dt/2)^2 + S` for `addot`,
/// taking the root continuous with the `dt -> 0` limit. Returns 0 when
/// expansion is disabled.
#[must_use]
pub fn adoubledot_staggered(
    p: &ModelParams,
    dt: f64,
    a: f64,
    adot_staggered: f64,
    grad_phi: f64,
    grad_chi: f64,
    avg_v: f64,
) -> f64 {
    if !p.expansion {
        return 0.0;
    }
    let c = (p.rescale_s + 2.0) / a;
    let source = friedmann_source(p, a, grad_phi, grad_chi, avg_v);

    // alpha x^2 + beta x + gamma = 0 with x = addot.
    let alpha = c * dt * dt / 4.0;
    let beta = c * adot_staggered * dt + 1.0;
    let gamma = c * adot_staggered * adot_staggered - source;

    let disc = (beta * beta - 4.0 * alpha * gamma).max(0.0);
    // Rationalized quadratic root: -2 gamma / (beta + sqrt(disc)) stays
    // finite as alpha -> 0 and matches -gamma/beta there.
    -2.0 * gamma / (beta + disc.sqrt())
}

/// `d(pt)/dt`: physical seconds per unit program time.
#[must_use]
pub fn dptdt(p: &ModelParams, a: f64) -> f64 {
    a.powf(-p.rescale_s) / p.rescale_b
}

/// `d^2(pt)/dt^2 = -s/B a^{-s-1} adot`.
#[must_use]
pub fn ddptdt(p: &ModelParams, a: f64, adot: f64) -> f64 {
    -p.rescale_s / p.rescale_b * a.powf(-p.rescale_s - 1.0) * adot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expanding_params() -> ModelParams {
        ModelParams::new(2.0, 3.0, 1.0, -1.0)
    }

    #[test]
    fn expansion_off_freezes_background() {
        let p = ModelParams::flat();
        assert!(adoubledot(&p, 1.0, 0.5, 1.0, 1.0, 1.0).abs() < f64::EPSILON);
        assert!(adoubledot_staggered(&p, 0.01, 1.0, 0.5, 1.0, 1.0, 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn vacuum_decelerates_through_velocity_term() {
        // No sources: addot = -(s+2) adot^2 / a.
        let p = expanding_params();
        let addot = adoubledot(&p, 2.0, 0.5, 0.0, 0.0, 0.0);
        let expect = -(p.rescale_s + 2.0) * 0.25 / 2.0;
        assert!((addot - expect).abs() < 1e-14, "addot = {addot}");
    }

    #[test]
    fn potential_source_accelerates() {
        let p = expanding_params();
        let with_v = adoubledot(&p, 1.0, 0.0, 0.0, 0.0, 1.0);
        assert!(with_v > 0.0, "positive <V> must drive addot > 0: {with_v}");
    }

    #[test]
    fn staggered_matches_plain_as_dt_vanishes() {
        let p = expanding_params();
        let (a, adot) = (1.3, 0.2);
        let plain = adoubledot(&p, a, adot, 0.7, 0.4, 0.9);
        let stag = adoubledot_staggered(&p, 1e-9, a, adot, 0.7, 0.4, 0.9);
        assert!(
            (plain - stag).abs() < 1e-7,
            "dt->0 limit: {plain} vs {stag}"
        );
    }

    #[test]
    fn staggered_closure_is_self_consistent() {
        // The returned addot must satisfy the implicit equation
        // addot = -c (adot_s + addot dt/2)^2 + S exactly.
        let p = expanding_params();
        let (dt, a, adot_s) = (0.05, 1.1, 0.3);
        let (gp, gc, v) = (0.6, 0.2, 1.4);
        let addot = adoubledot_staggered(&p, dt, a, adot_s, gp, gc, v);
        let c = (p.rescale_s + 2.0) / a;
        let adot_new = adot_s + 0.5 * addot * dt;
        let rhs = friedmann_source(&p, a, gp, gc, v) - c * adot_new * adot_new;
        assert!((addot - rhs).abs() < 1e-12, "closure residual {}", addot - rhs);
    }

    #[test]
    fn physical_time_map_is_identity_for_trivial_rescaling() {
        let p = ModelParams::flat();
        assert!((dptdt(&p, 5.0) - 1.0).abs() < 1e-15);
        assert!(ddptdt(&p, 5.0, 0.3).abs() < 1e-15);
    }

    #[test]
    fn physical_time_derivative_matches_finite_difference() {
        let p = expanding_params();
        let (a, adot) = (1.7, 0.4);
        let h = 1e-6;
        // d/dt dptdt(a(t)) = dptdt'(a) adot
        let fd = (dptdt(&p, a + adot * h) - dptdt(&p, a - adot * h)) / (2.0 * h);
        let analytic = ddptdt(&p, a, adot);
        assert!(
            ((fd - analytic) / analytic.abs().max(1e-30)).abs() < 1e-5,
            "fd {fd} vs analytic {analytic}"
        );
    }
}
