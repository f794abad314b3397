// SPDX-License-Identifier: AGPL-3.0-only

//! Shared integration clock and background state.

/// Mutable time/background state: program time, scale factor and its
/// derivatives, the fixed step, and accumulated physical time.
///
/// Mutated only by the Verlet integrator; drivers read it between steps.
#[derive(Clone, Copy, Debug)]
pub struct TimeState {
    /// Program (integrator) time.
    pub t: f64,
    /// Scale factor.
    pub a: f64,
    /// d a / dt in program time.
    pub adot: f64,
    /// d^2 a / dt^2 in program time.
    pub addot: f64,
    /// Fixed program-time step.
    pub dt: f64,
    /// Accumulated physical time.
    pub physical_time: f64,
}

impl TimeState {
    /// Create a time state at `t = 0` with the given background values.
    ///
    /// # Panics
    ///
    /// If `a` or `dt` is not positive.
    #[must_use]
    pub fn new(a: f64, adot: f64, dt: f64) -> Self {
        assert!(a > 0.0, "scale factor must be positive, got {a}");
        assert!(dt > 0.0, "timestep must be positive, got {dt}");
        Self {
            t: 0.0,
            a,
            adot,
            addot: 0.0,
            dt,
            physical_time: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_at_zero_time() {
        let ts = TimeState::new(1.0, 0.1, 0.01);
        assert!(ts.t.abs() < f64::EPSILON);
        assert!(ts.physical_time.abs() < f64::EPSILON);
        assert!((ts.adot - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    #[should_panic(expected = "timestep")]
    fn zero_dt_rejected() {
        let _ = TimeState::new(1.0, 0.0, 0.0);
    }

    #[test]
    #[should_panic(expected = "scale factor")]
    fn non_positive_a_rejected() {
        let _ = TimeState::new(-1.0, 0.0, 0.01);
    }
}
