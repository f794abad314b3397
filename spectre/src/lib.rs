// SPDX-License-Identifier: AGPL-3.0-only

// Clippy pedantic/nursery + physics-specific allows are in [workspace.lints.clippy]
// in Cargo.toml. Library code must propagate errors, not panic:
#![deny(clippy::expect_used, clippy::unwrap_used)]
#![warn(missing_docs)]

//! spectre — spectral lattice dynamics for cosmological reheating
//!
//! Integrates the classical evolution of one or two real scalar fields on a
//! 3D periodic lattice coupled to a self-consistent
//! Friedmann-Robertson-Walker scale factor. Linear (Laplacian) and
//! background terms act in momentum space; nonlinear potential terms are
//! formed in position space; real-to-complex 3D FFTs connect the two.
//!
//! # Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `grid` | Lattice geometry, Hermitian-packed momentum layout |
//! | `params` | Conformal rescalings, masses, couplings |
//! | `field` | Dual-representation field container |
//! | `fft` | Pencil R2C/C2R transforms (rustfft + rayon) |
//! | `nonlinear` | Position-space monomial products per step |
//! | `energy` | Potential, gradient, and energy-density averages |
//! | `scale_factor` | Friedmann acceleration, program/physical time map |
//! | `time_state` | Shared (t, a, adot, addot, dt, physical time) |
//! | `verlet` | Staggered velocity-Verlet orchestration |
//! | `init` | LatticeEasy-style vacuum fluctuation initializer |
//! | `snapshot` | Raw little-endian binary field dumps |
//! | `tolerances` | Centralized, justified validation thresholds |
//! | `validation` | Pass/fail harness for validation binaries |
//! | `error` | Typed blow-up / snapshot failure modes |
//!
//! # Units
//!
//! Fields are evolved in LatticeEasy program units (`f_pr = A a^r f`,
//! `dt_phys = a^{-s}/B dt_pr`, fields in units of M_Pl); snapshots convert
//! back to physical units on the way out.
//!
//! The second field chi is a compile-time choice (`chi` cargo feature, on
//! by default); individual couplings are runtime-gated by their
//! coefficients.

/// Volume-averaged energies and the pointwise energy density.
pub mod energy;
/// Typed errors for integration and snapshot operations.
pub mod error;
/// Real-to-complex 3D transforms on the Hermitian-packed grid.
pub mod fft;
/// Dual-representation field container.
pub mod field;
/// Lattice geometry and momentum layout.
pub mod grid;
/// LatticeEasy-style vacuum fluctuation initializer.
pub mod init;
/// Position-space nonlinear term builder.
pub mod nonlinear;
/// Model parameters and conformal rescalings.
pub mod params;
/// Scale-factor dynamics from the Friedmann constraint.
pub mod scale_factor;
/// Snapshot sink: raw binary field dumps.
pub mod snapshot;
/// Shared integration clock and background state.
pub mod time_state;
/// Centralized validation tolerances.
pub mod tolerances;
/// Pass/fail harness for validation binaries.
pub mod validation;
/// Staggered velocity-Verlet integrator.
pub mod verlet;

pub use error::SpectreError;
pub use field::{Field, Representation, SimFields};
pub use grid::GridParams;
pub use params::ModelParams;
pub use time_state::TimeState;
pub use verlet::VerletIntegrator;
