// SPDX-License-Identifier: AGPL-3.0-only

//! Model parameters: conformal rescalings, masses, couplings.
//!
//! Program units follow the LatticeEasy conventions: program field
//! `f_pr = A a^r f`, program length `x_pr = B x`, and program time defined
//! by `dt = a^{-s}/B dt_pr`, with the exponents r and s chosen per model so
//! the first-derivative friction term of the Klein-Gordon equation drops
//! out. All couplings are runtime values; a zero coefficient disables the
//! corresponding term everywhere (builder, potential, acceleration), which
//! costs nothing next to the transforms.
//!
//! The potential in program units is
//!
//! ```text
//! V = a^{2r} (m_phi^2 phi^2 + m_chi^2 chi^2) / 2
//!   + (lambda_phi phi^4 + lambda_chi chi^4) / (4 A^2)
//!   + (g/A)^2 phi^2 chi^2 / 2
//!   + a^{-2r} (gamma_phi phi^6 + gamma_chi chi^6) / (6 A^4)
//! ```
//!
//! with the quadratic mass term of a field replaced by
//! `a^{2r} |f|^{e+2} / (e+2)` when its mass-damping exponent `e` is nonzero.

/// Immutable model description for a run.
#[derive(Clone, Debug)]
#[must_use]
pub struct ModelParams {
    /// Field rescaling amplitude A (> 0).
    pub rescale_a: f64,
    /// Length/time rescaling B (> 0).
    pub rescale_b: f64,
    /// Field rescaling exponent r.
    pub rescale_r: f64,
    /// Time rescaling exponent s.
    pub rescale_s: f64,
    /// phi mass (program units).
    pub m_phi: f64,
    /// chi mass (program units).
    pub m_chi: f64,
    /// phi quartic self-coupling.
    pub lambda_phi: f64,
    /// chi quartic self-coupling.
    pub lambda_chi: f64,
    /// Cross-coupling g in the g^2 phi^2 chi^2 / 2 term.
    pub g: f64,
    /// phi sextic coupling.
    pub gamma_phi: f64,
    /// chi sextic coupling.
    pub gamma_chi: f64,
    /// Mass-damping exponent for phi; zero disables the term.
    pub md_e_phi: f64,
    /// Mass-damping exponent for chi; zero disables the term.
    pub md_e_chi: f64,
    /// Evolve the scale factor self-consistently. When false the background
    /// is frozen at `a = 1`, `adot = addot = 0`.
    pub expansion: bool,
}

impl ModelParams {
    /// Create parameters with the given rescalings and all couplings zero.
    ///
    /// # Panics
    ///
    /// If `rescale_a` or `rescale_b` is not positive.
    pub fn new(rescale_a: f64, rescale_b: f64, rescale_r: f64, rescale_s: f64) -> Self {
        assert!(rescale_a > 0.0, "rescale_a must be positive, got {rescale_a}");
        assert!(rescale_b > 0.0, "rescale_b must be positive, got {rescale_b}");
        Self {
            rescale_a,
            rescale_b,
            rescale_r,
            rescale_s,
            m_phi: 0.0,
            m_chi: 0.0,
            lambda_phi: 0.0,
            lambda_chi: 0.0,
            g: 0.0,
            gamma_phi: 0.0,
            gamma_chi: 0.0,
            md_e_phi: 0.0,
            md_e_chi: 0.0,
            expansion: true,
        }
    }

    /// Trivial rescalings (A = B = 1, r = s = 0), expansion off. The
    /// flat-spacetime baseline used throughout the test suite.
    pub fn flat() -> Self {
        let mut p = Self::new(1.0, 1.0, 0.0, 0.0);
        p.expansion = false;
        p
    }

    /// Set the field masses.
    pub const fn with_masses(mut self, m_phi: f64, m_chi: f64) -> Self {
        self.m_phi = m_phi;
        self.m_chi = m_chi;
        self
    }

    /// Set the quartic self-couplings.
    pub const fn with_quartic(mut self, lambda_phi: f64, lambda_chi: f64) -> Self {
        self.lambda_phi = lambda_phi;
        self.lambda_chi = lambda_chi;
        self
    }

    /// Set the cross-coupling g.
    pub const fn with_cross_coupling(mut self, g: f64) -> Self {
        self.g = g;
        self
    }

    /// Set the sextic couplings.
    pub const fn with_sextic(mut self, gamma_phi: f64, gamma_chi: f64) -> Self {
        self.gamma_phi = gamma_phi;
        self.gamma_chi = gamma_chi;
        self
    }

    /// Set the mass-damping exponents.
    pub const fn with_mass_damping(mut self, md_e_phi: f64, md_e_chi: f64) -> Self {
        self.md_e_phi = md_e_phi;
        self.md_e_chi = md_e_chi;
        self
    }

    /// Disable self-consistent expansion (`a` frozen at its initial value).
    pub const fn without_expansion(mut self) -> Self {
        self.expansion = false;
        self
    }

    /// Effective squared mass of phi about homogeneous values `(phi0, chi0)`
    /// at `a = 1`: the second derivative of the program-unit potential.
    ///
    /// Used by the initializer to set vacuum mode frequencies.
    #[must_use]
    pub fn effective_mass_sq_phi(&self, phi0: f64, chi0: f64) -> f64 {
        let a2 = self.rescale_a * self.rescale_a;
        let quad = if self.md_e_phi == 0.0 {
            self.m_phi * self.m_phi
        } else {
            (self.md_e_phi + 1.0) * phi0.abs().powf(self.md_e_phi)
        };
        quad + 3.0 * self.lambda_phi / a2 * phi0 * phi0
            + (self.g / self.rescale_a).powi(2) * chi0 * chi0
            + 5.0 * self.gamma_phi / (a2 * a2) * phi0.powi(4)
    }

    /// Effective squared mass of chi about homogeneous values `(phi0, chi0)`
    /// at `a = 1`.
    #[must_use]
    pub fn effective_mass_sq_chi(&self, phi0: f64, chi0: f64) -> f64 {
        let a2 = self.rescale_a * self.rescale_a;
        let quad = if self.md_e_chi == 0.0 {
            self.m_chi * self.m_chi
        } else {
            (self.md_e_chi + 1.0) * chi0.abs().powf(self.md_e_chi)
        };
        quad + 3.0 * self.lambda_chi / a2 * chi0 * chi0
            + (self.g / self.rescale_a).powi(2) * phi0 * phi0
            + 5.0 * self.gamma_chi / (a2 * a2) * chi0.powi(4)
    }
}
