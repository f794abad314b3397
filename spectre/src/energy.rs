// SPDX-License-Identifier: AGPL-3.0-only

//! Volume-averaged energies and the pointwise energy density.
//!
//! Three consumers:
//!
//! - the Verlet integrator needs `<V>` and the mode-space gradient averages
//!   to drive the scale factor;
//! - drivers log the physical-unit average energy density between steps;
//! - the snapshot path needs the pointwise density `rho(x)`.
//!
//! Mode sums run over the Hermitian half-grid with the parity correction
//! (interior z counts twice) and are reduced per x-slab into an ordered
//! vector summed serially, so the result is independent of worker
//! scheduling for a given grid size.

use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use crate::field::{Field, Representation, SimFields};
use crate::params::ModelParams;

/// Program-unit potential coefficients at fixed `a`, precomputed once per
/// evaluation sweep.
struct PotentialTerms {
    quad_phi: f64,
    quad_chi: f64,
    md_phi: Option<(f64, f64)>,
    md_chi: Option<(f64, f64)>,
    quart_phi: f64,
    quart_chi: f64,
    cross: f64,
    sext_phi: f64,
    sext_chi: f64,
}

impl PotentialTerms {
    fn new(p: &ModelParams, a: f64) -> Self {
        let a_2r = a.powf(2.0 * p.rescale_r);
        let a_m2r = a.powf(-2.0 * p.rescale_r);
        let ra2 = p.rescale_a * p.rescale_a;
        let ra4 = ra2 * ra2;
        // Nonzero mass-damping exponent replaces the quadratic mass term by
        // a^{2r} |f|^{e+2} / (e+2).
        let (quad_phi, md_phi) = if p.md_e_phi == 0.0 {
            (p.m_phi * p.m_phi * a_2r / 2.0, None)
        } else {
            (0.0, Some((a_2r / (p.md_e_phi + 2.0), p.md_e_phi + 2.0)))
        };
        let (quad_chi, md_chi) = if p.md_e_chi == 0.0 {
            (p.m_chi * p.m_chi * a_2r / 2.0, None)
        } else {
            (0.0, Some((a_2r / (p.md_e_chi + 2.0), p.md_e_chi + 2.0)))
        };
        Self {
            quad_phi,
            quad_chi,
            md_phi,
            md_chi,
            quart_phi: p.lambda_phi / (4.0 * ra2),
            quart_chi: p.lambda_chi / (4.0 * ra2),
            cross: (p.g / p.rescale_a).powi(2) / 2.0,
            sext_phi: p.gamma_phi * a_m2r / (6.0 * ra4),
            sext_chi: p.gamma_chi * a_m2r / (6.0 * ra4),
        }
    }

    /// V(phi, chi) at one lattice point.
    fn point(&self, phi: f64, chi: f64) -> f64 {
        let phi2 = phi * phi;
        let chi2 = chi * chi;
        let mut v = self.quad_phi * phi2 + self.quad_chi * chi2;
        if let Some((coef, pow)) = self.md_phi {
            v += coef * phi.abs().powf(pow);
        }
        if let Some((coef, pow)) = self.md_chi {
            v += coef * chi.abs().powf(pow);
        }
        v += self.quart_phi * phi2 * phi2 + self.quart_chi * chi2 * chi2;
        v += self.cross * phi2 * chi2;
        v += self.sext_phi * phi2 * phi2 * phi2 + self.sext_chi * chi2 * chi2 * chi2;
        v
    }
}

/// Volume-averaged program potential `<V(phi, chi, a)>`.
///
/// Fields must be in position representation; neither is mutated.
#[must_use]
pub fn average_potential(p: &ModelParams, a: f64, fields: &SimFields) -> f64 {
    let terms = PotentialTerms::new(p, a);
    let phi = fields.phi.position();
    let chunk = fields.phi.grid().n * fields.phi.grid().n;

    #[cfg(feature = "chi")]
    let partials: Vec<f64> = {
        let chi = fields.chi.position();
        phi.par_chunks(chunk)
            .zip(chi.par_chunks(chunk))
            .map(|(pc, cc)| {
                pc.iter()
                    .zip(cc)
                    .map(|(&f, &c)| terms.point(f, c))
                    .sum::<f64>()
            })
            .collect()
    };
    #[cfg(not(feature = "chi"))]
    let partials: Vec<f64> = phi
        .par_chunks(chunk)
        .map(|pc| pc.iter().map(|&f| terms.point(f, 0.0)).sum::<f64>())
        .collect();

    partials.iter().sum::<f64>() / fields.phi.grid().total_gridpoints() as f64
}

/// Parity-corrected mode sum `sum w(z) |k|^2 |f(k)|^2 / N^6`, the
/// volume-averaged squared gradient of a momentum-state field.
#[must_use]
pub fn average_gradient_squared(field: &Field) -> f64 {
    let grid = *field.grid();
    let nc = grid.mom_z();
    let partials: Vec<f64> = field
        .momentum()
        .par_chunks(grid.n * nc)
        .enumerate()
        .map(|(x, slab)| {
            let mut sum = 0.0;
            for y in 0..grid.n {
                for z in 0..nc {
                    let k2 = grid.momentum_sq(x, y, z);
                    sum += grid.parity_weight(z) * k2 * slab[y * nc + z].norm_sqr();
                }
            }
            sum
        })
        .collect();
    let npts = grid.total_gridpoints() as f64;
    partials.iter().sum::<f64>() / (npts * npts)
}

/// Volume average of `(fdot - c f)^2` from the momentum representation.
///
/// With `c = r adot / a` this is the conformal kinetic average entering the
/// physical energy density.
#[must_use]
pub fn conformal_kinetic_average(field: &Field, fielddot: &Field, c: f64) -> f64 {
    let grid = *field.grid();
    let nc = grid.mom_z();
    let partials: Vec<f64> = field
        .momentum()
        .par_chunks(grid.n * nc)
        .zip(fielddot.momentum().par_chunks(grid.n * nc))
        .map(|(f_slab, fd_slab)| {
            let mut sum = 0.0;
            for y in 0..grid.n {
                for z in 0..nc {
                    let i = y * nc + z;
                    let v = fd_slab[i] - f_slab[i] * c;
                    sum += grid.parity_weight(z) * v.norm_sqr();
                }
            }
            sum
        })
        .collect();
    let npts = grid.total_gridpoints() as f64;
    partials.iter().sum::<f64>() / (npts * npts)
}

/// Conversion factors from program-unit averages to the physical energy
/// density at a given background state.
struct DensityFactors {
    kinetic: f64,
    gradient: f64,
    potential: f64,
    cross: f64,
}

impl DensityFactors {
    fn new(p: &ModelParams, a: f64, adot: f64) -> Self {
        let ba2 = (p.rescale_b / p.rescale_a).powi(2);
        Self {
            kinetic: ba2 * a.powf(2.0 * p.rescale_s - 2.0 * p.rescale_r) / 2.0,
            gradient: ba2 * a.powf(-2.0 * p.rescale_r - 2.0) / 2.0,
            potential: a.powf(-4.0 * p.rescale_r) / (p.rescale_a * p.rescale_a),
            cross: p.rescale_r * adot / a,
        }
    }
}

/// Volume-averaged physical energy density from momentum-state fields and a
/// previously computed `<V>`.
#[must_use]
pub fn average_energy_density(
    p: &ModelParams,
    a: f64,
    adot: f64,
    fields: &SimFields,
    avg_potential: f64,
    grad_phi: f64,
    grad_chi: f64,
) -> f64 {
    let factors = DensityFactors::new(p, a, adot);
    let mut kin = conformal_kinetic_average(&fields.phi, &fields.phidot, factors.cross);
    #[cfg(feature = "chi")]
    {
        kin += conformal_kinetic_average(&fields.chi, &fields.chidot, factors.cross);
    }
    factors.kinetic * kin
        + factors.gradient * (grad_phi + grad_chi)
        + factors.potential * avg_potential
}

/// Accumulate `|grad f|^2` pointwise from a momentum-state field via three
/// spectral derivatives.
fn accumulate_gradient_sq(field: &Field, grad_sq: &mut [f64]) {
    let grid = *field.grid();
    let plans = field_plans(field);
    let nc = grid.mom_z();
    let mut deriv = vec![Complex64::new(0.0, 0.0); grid.total_momentum_modes()];
    let mut real = vec![0.0; grid.total_gridpoints()];

    for dim in 0..3 {
        let mom = field.momentum();
        deriv
            .par_chunks_mut(grid.n * nc)
            .zip(mom.par_chunks(grid.n * nc))
            .enumerate()
            .for_each(|(x, (d_slab, f_slab))| {
                for y in 0..grid.n {
                    for z in 0..nc {
                        let idx = match dim {
                            0 => grid.centred_derivative(x),
                            1 => grid.centred_derivative(y),
                            _ => grid.centred_derivative(z),
                        };
                        let k = grid.dp * idx as f64;
                        // i k f: (re, im) -> (-k im, k re)
                        let f = f_slab[y * nc + z];
                        d_slab[y * nc + z] = Complex64::new(-k * f.im, k * f.re);
                    }
                }
            });
        plans.inverse(&mut deriv, &mut real);
        grad_sq
            .par_chunks_mut(grid.n)
            .zip(real.par_chunks(grid.n))
            .for_each(|(acc, g)| {
                for (a_, &g_) in acc.iter_mut().zip(g) {
                    *a_ += g_ * g_;
                }
            });
    }
}

// The snapshot path needs the plans a field was built with; keep the
// accessor local to this crate.
fn field_plans(field: &Field) -> std::sync::Arc<crate::fft::SpectralPlans> {
    field.plans_handle()
}

/// Pointwise physical energy density `rho(x)` for snapshots.
///
/// Requires all fields in momentum representation on entry (the spectral
/// gradients are read there first); on return every field is in **position**
/// representation so the caller can dump `phi` alongside. The z = N/2
/// Nyquist plane carries no odd-derivative information and contributes zero
/// to the spectral gradients.
#[must_use]
pub fn energy_density(p: &ModelParams, a: f64, adot: f64, fields: &mut SimFields) -> Vec<f64> {
    assert_eq!(
        fields.phi.state(),
        Representation::Momentum,
        "energy_density expects momentum-state fields"
    );
    let grid = *fields.phi.grid();
    let npts = grid.total_gridpoints();
    let factors = DensityFactors::new(p, a, adot);
    let terms = PotentialTerms::new(p, a);

    let mut grad_sq = vec![0.0; npts];
    accumulate_gradient_sq(&fields.phi, &mut grad_sq);
    #[cfg(feature = "chi")]
    accumulate_gradient_sq(&fields.chi, &mut grad_sq);

    fields.switch_all(Representation::Position);

    let phi = fields.phi.position();
    let phidot = fields.phidot.position();
    let mut rho = vec![0.0; npts];

    #[cfg(feature = "chi")]
    {
        let chi = fields.chi.position();
        let chidot = fields.chidot.position();
        rho.par_iter_mut().enumerate().for_each(|(i, r)| {
            let vp = phidot[i] - factors.cross * phi[i];
            let vc = chidot[i] - factors.cross * chi[i];
            *r = factors.kinetic * (vp * vp + vc * vc)
                + factors.gradient * grad_sq[i]
                + factors.potential * terms.point(phi[i], chi[i]);
        });
    }
    #[cfg(not(feature = "chi"))]
    rho.par_iter_mut().enumerate().for_each(|(i, r)| {
        let vp = phidot[i] - factors.cross * phi[i];
        *r = factors.kinetic * (vp * vp)
            + factors.gradient * grad_sq[i]
            + factors.potential * terms.point(phi[i], 0.0);
    });

    rho
}
