// SPDX-License-Identifier: AGPL-3.0-only

//! Nonlinear term builder.
//!
//! The Klein-Gordon acceleration is evaluated mode by mode, but the
//! potential's nonlinear derivatives are products of fields and must be
//! formed in position space. Each step the builder takes the current
//! (phi, chi), forms every required monomial pointwise, and transforms the
//! products to momentum space where the integrator consumes them:
//!
//! | Product | Formula | Built when |
//! |---------|---------|------------|
//! | chi2phi | chi^2 phi | always (two-field build) |
//! | phi2chi | phi^2 chi | always (two-field build) |
//! | phi3, chi3 | f^3 | quartic coupling nonzero |
//! | phi5, chi5 | f^5 | sextic coupling nonzero |
//! | phi_md, chi_md | sign(f) |f|^{e+1} | mass-damping exponent nonzero |
//!
//! Products gated off are never allocated; the integrator substitutes the
//! plain mass term. The builder owns its product fields for the lifetime of
//! the integrator and reuses them every step.

use std::sync::Arc;

use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use crate::fft::SpectralPlans;
use crate::field::{Field, Representation, SimFields};
use crate::grid::GridParams;
use crate::params::ModelParams;

/// Owns the product fields and rebuilds them on demand.
pub struct NonlinearTerms {
    chunk: usize,
    #[cfg(feature = "chi")]
    chi2phi: Field,
    #[cfg(feature = "chi")]
    phi2chi: Field,
    phi3: Option<Field>,
    #[cfg(feature = "chi")]
    chi3: Option<Field>,
    phi5: Option<Field>,
    #[cfg(feature = "chi")]
    chi5: Option<Field>,
    phi_md: Option<Field>,
    #[cfg(feature = "chi")]
    chi_md: Option<Field>,
}

impl NonlinearTerms {
    /// Allocate product fields for the couplings active in `p`.
    #[must_use]
    pub fn new(p: &ModelParams, grid: GridParams, plans: &Arc<SpectralPlans>) -> Self {
        let gated = |active: bool| -> Option<Field> {
            active.then(|| Field::new(grid, Arc::clone(plans)))
        };
        Self {
            chunk: grid.n * grid.n,
            #[cfg(feature = "chi")]
            chi2phi: Field::new(grid, Arc::clone(plans)),
            #[cfg(feature = "chi")]
            phi2chi: Field::new(grid, Arc::clone(plans)),
            phi3: gated(p.lambda_phi != 0.0),
            #[cfg(feature = "chi")]
            chi3: gated(p.lambda_chi != 0.0),
            phi5: gated(p.gamma_phi != 0.0),
            #[cfg(feature = "chi")]
            chi5: gated(p.gamma_chi != 0.0),
            phi_md: gated(p.md_e_phi != 0.0),
            #[cfg(feature = "chi")]
            chi_md: gated(p.md_e_chi != 0.0),
        }
    }

    /// Rebuild every active product from the current fields.
    ///
    /// Ensures phi and chi are in position representation (the stated
    /// precondition; switching is a no-op when the integrator has already
    /// done so), forms the products pointwise, transforms them to momentum
    /// space, and returns phi and chi to momentum representation.
    pub fn build(&mut self, p: &ModelParams, fields: &mut SimFields) {
        fields.phi.switch_state(Representation::Position);
        #[cfg(feature = "chi")]
        fields.chi.switch_state(Representation::Position);

        self.build_products(p, fields);

        fields.phi.switch_state(Representation::Momentum);
        #[cfg(feature = "chi")]
        fields.chi.switch_state(Representation::Momentum);

        for product in self.active_mut() {
            product.switch_state(Representation::Momentum);
        }
    }

    fn build_products(&mut self, p: &ModelParams, fields: &SimFields) {
        let chunk = self.chunk;
        let phi = fields.phi.position();

        #[cfg(feature = "chi")]
        {
            let chi = fields.chi.position();
            map2(self.chi2phi.overwrite_position(), phi, chi, chunk, |f, c| c * c * f);
            map2(self.phi2chi.overwrite_position(), phi, chi, chunk, |f, c| f * f * c);
            if let Some(fld) = self.chi3.as_mut() {
                map1(fld.overwrite_position(), chi, chunk, |c| c * c * c);
            }
            if let Some(fld) = self.chi5.as_mut() {
                map1(fld.overwrite_position(), chi, chunk, |c| c * c * c * c * c);
            }
            if let Some(fld) = self.chi_md.as_mut() {
                let e = p.md_e_chi;
                map1(fld.overwrite_position(), chi, chunk, move |c| {
                    c.signum() * c.abs().powf(e + 1.0)
                });
            }
        }

        if let Some(fld) = self.phi3.as_mut() {
            map1(fld.overwrite_position(), phi, chunk, |f| f * f * f);
        }
        if let Some(fld) = self.phi5.as_mut() {
            map1(fld.overwrite_position(), phi, chunk, |f| f * f * f * f * f);
        }
        if let Some(fld) = self.phi_md.as_mut() {
            let e = p.md_e_phi;
            map1(fld.overwrite_position(), phi, chunk, move |f| {
                f.signum() * f.abs().powf(e + 1.0)
            });
        }
    }

    fn active_mut(&mut self) -> Vec<&mut Field> {
        let mut out: Vec<&mut Field> = Vec::with_capacity(8);
        #[cfg(feature = "chi")]
        {
            out.push(&mut self.chi2phi);
            out.push(&mut self.phi2chi);
        }
        out.extend(self.phi3.as_mut());
        #[cfg(feature = "chi")]
        out.extend(self.chi3.as_mut());
        out.extend(self.phi5.as_mut());
        #[cfg(feature = "chi")]
        out.extend(self.chi5.as_mut());
        out.extend(self.phi_md.as_mut());
        #[cfg(feature = "chi")]
        out.extend(self.chi_md.as_mut());
        out
    }

    /// chi^2 phi modes (the cross term of phi's equation).
    #[must_use]
    pub fn cross_phi(&self) -> Option<&[Complex64]> {
        #[cfg(feature = "chi")]
        {
            Some(self.chi2phi.momentum())
        }
        #[cfg(not(feature = "chi"))]
        None
    }

    /// phi^2 chi modes (the cross term of chi's equation).
    #[cfg(feature = "chi")]
    #[must_use]
    pub fn cross_chi(&self) -> &[Complex64] {
        self.phi2chi.momentum()
    }

    /// phi^3 modes, when the quartic coupling is active.
    #[must_use]
    pub fn phi3(&self) -> Option<&[Complex64]> {
        self.phi3.as_ref().map(Field::momentum)
    }

    /// chi^3 modes, when the quartic coupling is active.
    #[cfg(feature = "chi")]
    #[must_use]
    pub fn chi3(&self) -> Option<&[Complex64]> {
        self.chi3.as_ref().map(Field::momentum)
    }

    /// phi^5 modes, when the sextic coupling is active.
    #[must_use]
    pub fn phi5(&self) -> Option<&[Complex64]> {
        self.phi5.as_ref().map(Field::momentum)
    }

    /// chi^5 modes, when the sextic coupling is active.
    #[cfg(feature = "chi")]
    #[must_use]
    pub fn chi5(&self) -> Option<&[Complex64]> {
        self.chi5.as_ref().map(Field::momentum)
    }

    /// Mass-damping term for phi, when its exponent is nonzero.
    #[must_use]
    pub fn phi_md(&self) -> Option<&[Complex64]> {
        self.phi_md.as_ref().map(Field::momentum)
    }

    /// Mass-damping term for chi, when its exponent is nonzero.
    #[cfg(feature = "chi")]
    #[must_use]
    pub fn chi_md(&self) -> Option<&[Complex64]> {
        self.chi_md.as_ref().map(Field::momentum)
    }

    /// Position-space view of the chi^2 phi product (testing hook).
    #[cfg(feature = "chi")]
    #[must_use]
    pub fn chi2phi_position(&self) -> &[f64] {
        self.chi2phi.position()
    }

    /// Position-space view of the phi^2 chi product (testing hook).
    #[cfg(feature = "chi")]
    #[must_use]
    pub fn phi2chi_position(&self) -> &[f64] {
        self.phi2chi.position()
    }
}

fn map1(dst: &mut [f64], src: &[f64], chunk: usize, op: impl Fn(f64) -> f64 + Sync) {
    dst.par_chunks_mut(chunk)
        .zip(src.par_chunks(chunk))
        .for_each(|(d, s)| {
            for (d_, &s_) in d.iter_mut().zip(s) {
                *d_ = op(s_);
            }
        });
}

#[cfg(feature = "chi")]
fn map2(
    dst: &mut [f64],
    phi: &[f64],
    chi: &[f64],
    chunk: usize,
    op: impl Fn(f64, f64) -> f64 + Sync,
) {
    dst.par_chunks_mut(chunk)
        .zip(phi.par_chunks(chunk))
        .zip(chi.par_chunks(chunk))
        .for_each(|((d, f), c)| {
            for i in 0..d.len() {
                d[i] = op(f[i], c[i]);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridParams;

    fn setup(p: &ModelParams, n: usize) -> (SimFields, NonlinearTerms) {
        let grid = GridParams::new(n, 1.0);
        let fields = SimFields::new(grid);
        let plans = fields.plans();
        let builder = NonlinearTerms::new(p, grid, &plans);
        (fields, builder)
    }

    #[test]
    fn gating_skips_inactive_products() {
        let p = ModelParams::flat();
        let (_, b) = setup(&p, 8);
        assert!(b.phi3().is_none());
        assert!(b.phi5().is_none());
        assert!(b.phi_md().is_none());
    }

    #[test]
    fn gating_allocates_active_products() {
        let p = ModelParams::flat()
            .with_quartic(1.0, 0.0)
            .with_sextic(0.0, 0.0)
            .with_mass_damping(0.5, 0.0);
        let (mut fields, mut b) = setup(&p, 8);
        fields.switch_all(Representation::Momentum);
        b.build(&p, &mut fields);
        assert!(b.phi3().is_some());
        assert!(b.phi5().is_none());
        assert!(b.phi_md().is_some());
    }

    #[cfg(feature = "chi")]
    #[test]
    fn uniform_cross_products_match_closed_form() {
        // phi = 1, chi = 0.5: chi^2 phi = 0.25, phi^2 chi = 0.5 everywhere.
        let p = ModelParams::flat().with_cross_coupling(1.0);
        let (mut fields, mut b) = setup(&p, 8);
        fields.phi.fill_position(1.0);
        fields.chi.fill_position(0.5);
        fields.switch_all(Representation::Momentum);

        b.build(&p, &mut fields);

        // Products are delivered in momentum space; check the zero mode and
        // the position-space values via a transform back.
        let npts = 512.0;
        let c2p0 = b.chi2phi.momentum()[0];
        assert!((c2p0.re - 0.25 * npts).abs() < 1e-9, "chi2phi zero mode {c2p0}");
        let mut back = b.chi2phi;
        back.switch_state(Representation::Position);
        for (i, v) in back.position().iter().enumerate() {
            assert!((v - 0.25).abs() < 1e-12, "chi2phi[{i}] = {v}");
        }

        let mut p2c = b.phi2chi;
        p2c.switch_state(Representation::Position);
        for (i, v) in p2c.position().iter().enumerate() {
            assert!((v - 0.5).abs() < 1e-12, "phi2chi[{i}] = {v}");
        }
    }

    #[test]
    fn cubic_product_is_pointwise_cube() {
        let p = ModelParams::flat().with_quartic(1.0, 0.0);
        let (mut fields, mut b) = setup(&p, 8);
        fields.phi.fill_position(-2.0);
        fields.switch_all(Representation::Momentum);
        b.build(&p, &mut fields);
        let zero = b.phi3().map_or(Complex64::new(0.0, 0.0), |m| m[0]);
        assert!((zero.re - (-8.0 * 512.0)).abs() < 1e-8, "phi3 zero mode {zero}");
    }

    #[test]
    fn mass_damping_preserves_sign() {
        let p = ModelParams::flat().with_mass_damping(1.0, 0.0);
        let (mut fields, mut b) = setup(&p, 8);
        fields.phi.fill_position(-3.0);
        fields.switch_all(Representation::Momentum);
        b.build(&p, &mut fields);
        // sign(f) |f|^{e+1} = -9 for f = -3, e = 1.
        let zero = b.phi_md().map_or(Complex64::new(0.0, 0.0), |m| m[0]);
        assert!((zero.re - (-9.0 * 512.0)).abs() < 1e-8, "phi_md zero mode {zero}");
    }

    #[test]
    fn build_returns_fields_to_momentum_state() {
        let p = ModelParams::flat().with_quartic(1.0, 1.0);
        let (mut fields, mut b) = setup(&p, 8);
        fields.switch_all(Representation::Momentum);
        b.build(&p, &mut fields);
        assert_eq!(fields.phi.state(), Representation::Momentum);
        #[cfg(feature = "chi")]
        assert_eq!(fields.chi.state(), Representation::Momentum);
    }
}
