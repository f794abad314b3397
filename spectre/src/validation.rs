// SPDX-License-Identifier: AGPL-3.0-only

//! Validation harness for pass/fail binaries.
//!
//! Validation binaries follow one pattern: hardcoded expected values,
//! explicit checks against the documented tolerances in
//! [`crate::tolerances`], a machine-readable summary on stdout, and exit
//! code 0 (all checks pass) or 1 (any check fails). This module provides
//! the shared check accumulator.

/// A single validation check with result tracking.
#[derive(Debug, Clone)]
pub struct Check {
    /// Human-readable label.
    pub label: String,
    /// Whether this check passed.
    pub passed: bool,
    /// Observed value.
    pub observed: f64,
    /// Expected value (or threshold for bound checks).
    pub expected: f64,
    /// Tolerance used.
    pub tolerance: f64,
    /// How the tolerance was applied.
    pub mode: ToleranceMode,
}

/// How a tolerance threshold is applied.
#[derive(Debug, Clone, Copy)]
pub enum ToleranceMode {
    /// `|observed - expected| < tolerance`
    Absolute,
    /// `|observed - expected| / |expected| < tolerance`
    Relative,
    /// `low < observed < high` (expected holds the midpoint)
    Band,
}

impl std::fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "abs"),
            Self::Relative => write!(f, "rel"),
            Self::Band => write!(f, "band"),
        }
    }
}

/// Accumulates validation checks and produces a summary with exit code.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    /// Name of the validation binary.
    pub name: String,
    /// All checks performed.
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    /// Create a harness for a named validation binary.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    /// Absolute check: `|observed - expected| < tolerance`.
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        self.checks.push(Check {
            label: label.to_string(),
            passed: (observed - expected).abs() < tolerance,
            observed,
            expected,
            tolerance,
            mode: ToleranceMode::Absolute,
        });
    }

    /// Relative check: `|observed - expected| / |expected| < tolerance`.
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = if expected.abs() > f64::EPSILON {
            ((observed - expected) / expected).abs() < tolerance
        } else {
            observed.abs() < tolerance
        };
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            expected,
            tolerance,
            mode: ToleranceMode::Relative,
        });
    }

    /// Band check: `low < observed < high`.
    pub fn check_band(&mut self, label: &str, observed: f64, low: f64, high: f64) {
        self.checks.push(Check {
            label: label.to_string(),
            passed: observed > low && observed < high,
            observed,
            expected: (low + high) / 2.0,
            tolerance: (high - low) / 2.0,
            mode: ToleranceMode::Band,
        });
    }

    /// True when every check passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Print the per-check table and summary line; return the process exit
    /// code (0 pass, 1 fail).
    #[must_use]
    pub fn report(&self) -> i32 {
        println!("── {} ──", self.name);
        for c in &self.checks {
            let status = if c.passed { "PASS" } else { "FAIL" };
            println!(
                "  [{status}] {} : observed {:.6e}, expected {:.6e} ({} tol {:.1e})",
                c.label, c.observed, c.expected, c.mode, c.tolerance
            );
        }
        let n_pass = self.checks.iter().filter(|c| c.passed).count();
        println!("  {} / {} checks passed", n_pass, self.checks.len());
        i32::from(!self.all_passed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_check_passes_inside_tolerance() {
        let mut h = ValidationHarness::new("t");
        h.check_abs("x", 1.0000001, 1.0, 1e-6);
        assert!(h.all_passed());
    }

    #[test]
    fn relative_check_fails_outside_tolerance() {
        let mut h = ValidationHarness::new("t");
        h.check_rel("x", 1.1, 1.0, 0.05);
        assert!(!h.all_passed());
        assert_eq!(h.report(), 1);
    }

    #[test]
    fn relative_check_falls_back_to_absolute_near_zero() {
        let mut h = ValidationHarness::new("t");
        h.check_rel("x", 1e-12, 0.0, 1e-10);
        assert!(h.all_passed());
    }

    #[test]
    fn band_check_brackets_value() {
        let mut h = ValidationHarness::new("t");
        h.check_band("ratio", 4.2, 3.5, 4.5);
        h.check_band("ratio", 5.0, 3.5, 4.5);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn report_exit_code_reflects_overall_status() {
        let mut h = ValidationHarness::new("t");
        h.check_abs("ok", 0.0, 0.0, 1.0);
        assert_eq!(h.report(), 0);
    }
}
