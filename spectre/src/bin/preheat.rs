// SPDX-License-Identifier: AGPL-3.0-only

//! Two-field lambda phi^4 preheating run.
//!
//! Sets up the standard conformal lambda phi^4 model with a g^2 phi^2 chi^2
//! decay channel (CMB-normalized lambda = 9e-14), initializes vacuum
//! fluctuations around the slow-roll background, integrates, and writes
//! phi / energy-density snapshots plus a JSON run report.
//!
//! Usage: `preheat [N] [STEPS] [OUTDIR]` (defaults: 64, 5000, `preheat_out`).
//!
//! Rescalings follow LatticeEasy for a quartic-dominated potential:
//! A = 1/phi0, B = sqrt(lambda) phi0, r = 1, s = -1, which makes program
//! time conformal and removes the Hubble friction term.

use std::f64::consts::PI;
use std::time::Instant;

use serde::Serialize;

use spectre::energy::energy_density;
use spectre::init::LatticeInitializer;
use spectre::snapshot::{physical_field, SnapshotWriter};
use spectre::{GridParams, ModelParams, Representation, SimFields, TimeState, VerletIntegrator};

/// CMB-normalized quartic self-coupling.
const LAMBDA: f64 = 9.0e-14;
/// Resonance band ratio g^2 / lambda.
const G_SQ_OVER_LAMBDA: f64 = 200.0;
/// Inflaton value at the end of inflation, units of M_Pl.
const PHI0: f64 = 0.342;
/// Program-unit box side (comoving, in units of 1/(sqrt(lambda) phi0)).
const BOX_SIDE: f64 = 20.0;
/// Program-unit timestep.
const DT: f64 = 0.005;
/// Steps between snapshot dumps.
const DUMP_INTERVAL: u64 = 500;
/// Steps between energy-record appends.
const RECORD_INTERVAL: u64 = 25;

#[derive(Serialize)]
struct EnergyRecord {
    step: u64,
    t: f64,
    physical_time: f64,
    a: f64,
    adot: f64,
    rho: f64,
}

#[derive(Serialize)]
struct RunReport {
    n: usize,
    box_side: f64,
    dt: f64,
    steps: u64,
    lambda: f64,
    g: f64,
    phi0: f64,
    seed: u64,
    elapsed_s: f64,
    records: Vec<EnergyRecord>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let n: usize = args.get(1).map_or(Ok(64), |s| s.parse())?;
    let steps: u64 = args.get(2).map_or(Ok(5000), |s| s.parse())?;
    let outdir = args.get(3).map_or("preheat_out", String::as_str);
    let seed = 2009;

    let g_coupling = (G_SQ_OVER_LAMBDA * LAMBDA).sqrt();
    let params = ModelParams::new(1.0 / PHI0, LAMBDA.sqrt() * PHI0, 1.0, -1.0)
        .with_quartic(LAMBDA, 0.0)
        .with_cross_coupling(g_coupling);
    let grid = GridParams::new(n, BOX_SIDE);

    // Slow-roll background at the end of inflation, converted to program
    // units at a = 1: phi_pr = A phi0 = 1, adot_pr = H / B,
    // phidot_pr = (A/B) phidot_phys + r adot_pr phi_pr.
    let v0 = LAMBDA * PHI0.powi(4) / 4.0;
    let hubble = (8.0 * PI * v0 / 3.0).sqrt();
    let phidot_phys = -LAMBDA * PHI0.powi(3) / (3.0 * hubble);
    let adot0 = hubble / params.rescale_b;
    let phidot0 = phidot_phys / (PHI0 * params.rescale_b) + adot0;

    println!("── spectre preheat: N = {n}, L = {BOX_SIDE}, dt = {DT}, {steps} steps ──");
    println!(
        "   lambda = {LAMBDA:.3e}, g^2/lambda = {G_SQ_OVER_LAMBDA}, phi0 = {PHI0} M_Pl, H0/B = {adot0:.4}"
    );

    let mut fields = SimFields::new(grid);
    let mut init = LatticeInitializer::new(&params, grid, BOX_SIDE, seed);
    let m_eff_phi = params.effective_mass_sq_phi(1.0, 0.0);
    let m_eff_chi = params.effective_mass_sq_chi(1.0, 0.0);
    init.initialize_field(&mut fields.phi, &mut fields.phidot, m_eff_phi, adot0);
    #[cfg(feature = "chi")]
    init.initialize_field(&mut fields.chi, &mut fields.chidot, m_eff_chi, adot0);
    #[cfg(not(feature = "chi"))]
    let _ = m_eff_chi;
    fields.phi.set_homogeneous_mode(1.0);
    fields.phidot.set_homogeneous_mode(phidot0);

    let mut verlet = VerletIntegrator::new(params.clone(), TimeState::new(1.0, adot0, DT), &fields);
    verlet.initialize(&mut fields);

    let mut writer = SnapshotWriter::create(outdir)?;
    let mut records = Vec::new();
    let t_start = Instant::now();

    for step in 1..=steps {
        verlet.step(&mut fields)?;
        let ts = *verlet.time_state();

        if step % RECORD_INTERVAL == 0 {
            records.push(EnergyRecord {
                step,
                t: ts.t,
                physical_time: ts.physical_time,
                a: ts.a,
                adot: ts.adot,
                rho: verlet.average_energy(&fields),
            });
        }

        if step % DUMP_INTERVAL == 0 {
            // energy_density leaves the fields in position representation.
            let rho = energy_density(&params, ts.a, ts.adot, &mut fields);
            let phi_phys = physical_field(&fields.phi, &params, ts.a);
            writer.write_field("phi", &phi_phys)?;
            writer.write_field("rho", &rho)?;
            writer.advance();
            fields.switch_all(Representation::Momentum);
            println!(
                "   step {step:>7}: t = {:.3}, a = {:.4}, <rho> = {:.6e}",
                ts.t,
                ts.a,
                verlet.average_energy(&fields)
            );
        }
    }

    let elapsed_s = t_start.elapsed().as_secs_f64();
    let report = RunReport {
        n,
        box_side: BOX_SIDE,
        dt: DT,
        steps,
        lambda: LAMBDA,
        g: g_coupling,
        phi0: PHI0,
        seed,
        elapsed_s,
        records,
    };
    let report_path = std::path::Path::new(outdir).join("run_report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;

    let ts = verlet.time_state();
    println!("── done: t = {:.3}, a = {:.4}, {:.1} s ──", ts.t, ts.a, elapsed_s);
    println!("   report: {}", report_path.display());
    Ok(())
}
