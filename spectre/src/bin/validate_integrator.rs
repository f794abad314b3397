// SPDX-License-Identifier: AGPL-3.0-only

//! Integrator validation — pass/fail against documented tolerances.
//!
//! Checks, in order:
//! 1. FFT round trip on a random field (machine precision);
//! 2. free-mode oscillation period 2 pi / |k| (1%);
//! 3. flat-spacetime energy conservation over 10^4 steps;
//! 4. dt -> dt/2 energy-error reduction factor 4 +- 0.5 (second order);
//! 5. massive-mode dispersion omega = sqrt(k^2 + m^2) (2%).
//!
//! Exit code 0 when every check passes, 1 otherwise.

use std::f64::consts::TAU;
use std::process::ExitCode;

use spectre::tolerances;
use spectre::validation::ValidationHarness;
use spectre::{GridParams, ModelParams, Representation, SimFields, TimeState, VerletIntegrator};

/// Build a field set whose phi is a unit-amplitude fundamental cosine
/// along x, in momentum representation.
fn cosine_fields(n: usize, len: f64) -> SimFields {
    let grid = GridParams::new(n, len);
    let mut fields = SimFields::new(grid);
    {
        let pos = fields.phi.position_mut();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    pos[grid.idx_pos(x, y, z)] = (TAU * x as f64 / n as f64).cos();
                }
            }
        }
    }
    fields.switch_all(Representation::Momentum);
    fields
}

/// Oscillation angular frequency of the fundamental mode, measured from
/// linearly interpolated zero crossings of its real part.
fn measured_omega(params: &ModelParams, n: usize, len: f64, dt: f64, steps: usize) -> f64 {
    let mut fields = cosine_fields(n, len);
    let grid = *fields.phi.grid();
    let mode = grid.idx_mom(1, 0, 0);
    let mut verlet = VerletIntegrator::new(params.clone(), TimeState::new(1.0, 0.0, dt), &fields);
    verlet.initialize(&mut fields);

    let mut crossings = Vec::new();
    let mut prev = fields.phi.momentum()[mode].re;
    for step in 1..=steps {
        verlet.step(&mut fields).expect("validation step");
        let cur = fields.phi.momentum()[mode].re;
        if prev.signum() != cur.signum() {
            let frac = prev / (prev - cur);
            crossings.push((step as f64 - 1.0 + frac) * dt);
        }
        prev = cur;
    }
    assert!(crossings.len() >= 2, "too few zero crossings: {}", crossings.len());
    let spacing = (crossings[crossings.len() - 1] - crossings[0]) / (crossings.len() - 1) as f64;
    std::f64::consts::PI / spacing
}

/// Maximum relative deviation of the average energy over a run.
fn max_energy_deviation(params: &ModelParams, dt: f64, total_time: f64) -> f64 {
    let mut fields = cosine_fields(8, TAU);
    #[cfg(feature = "chi")]
    {
        fields.chi.fill_position(0.5);
        fields.chi.switch_state(Representation::Momentum);
    }
    let mut verlet = VerletIntegrator::new(params.clone(), TimeState::new(1.0, 0.0, dt), &fields);
    verlet.initialize(&mut fields);
    let e0 = verlet.average_energy(&fields);
    let steps = (total_time / dt).round() as usize;
    let mut worst: f64 = 0.0;
    for _ in 0..steps {
        verlet.step(&mut fields).expect("validation step");
        let e = verlet.average_energy(&fields);
        worst = worst.max(((e - e0) / e0).abs());
    }
    worst
}

fn main() -> ExitCode {
    let mut harness = ValidationHarness::new("validate_integrator");

    // 1. Round trip on a deterministic broadband field (incommensurate
    //    waves over the linear index put power in every mode).
    {
        let grid = GridParams::new(16, 3.0);
        let mut fields = SimFields::new(grid);
        for (i, v) in fields.phi.position_mut().iter_mut().enumerate() {
            let t = i as f64;
            *v = (0.47 * t).sin() + 0.31 * (1.9 * t + 0.7).cos();
        }
        let before = fields.phi.position().to_vec();
        fields.phi.switch_state(Representation::Momentum);
        fields.phi.switch_state(Representation::Position);
        let worst = before
            .iter()
            .zip(fields.phi.position())
            .map(|(a, b)| ((a - b) / a.abs().max(1.0)).abs())
            .fold(0.0f64, f64::max);
        harness.check_abs("fft roundtrip max rel error", worst, 0.0, tolerances::FFT_ROUNDTRIP);
    }

    // 2. Free-mode period: L = 2 pi gives |k| = 1, period 2 pi.
    {
        let omega = measured_omega(&ModelParams::flat(), 16, TAU, 0.01, 1000);
        harness.check_rel("free mode omega = |k|", omega, 1.0, tolerances::OSCILLATION_PERIOD);
    }

    // 3. Flat-spacetime conservation, 1e4 steps at dt = 0.01.
    {
        let p = ModelParams::flat().with_masses(1.0, 0.0);
        let drift = max_energy_deviation(&p, 0.01, 100.0);
        harness.check_abs("flat energy drift", drift, 0.0, tolerances::ENERGY_DRIFT_FLAT);
    }

    // 4. Second-order scaling with couplings on.
    {
        let p = ModelParams::flat()
            .with_masses(1.0, 0.5)
            .with_quartic(1.0, 0.0)
            .with_cross_coupling(1.0);
        let coarse = max_energy_deviation(&p, 0.05, 25.0);
        let fine = max_energy_deviation(&p, 0.025, 25.0);
        harness.check_band(
            "dt/2 energy-error ratio",
            coarse / fine,
            tolerances::SYMPLECTIC_RATIO_LOW,
            tolerances::SYMPLECTIC_RATIO_HIGH,
        );
    }

    // 5. Dispersion: m = 1 on the |k| = 1 mode, omega = sqrt 2.
    {
        let p = ModelParams::flat().with_masses(1.0, 0.0);
        let omega = measured_omega(&p, 16, TAU, 0.01, 1000);
        harness.check_rel(
            "massive mode omega = sqrt(k^2 + m^2)",
            omega,
            2.0f64.sqrt(),
            tolerances::DISPERSION,
        );
    }

    if harness.report() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
