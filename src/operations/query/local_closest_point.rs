use crate::error::{QueryError, Result};
use crate::geometry::{Curve, PathCurve};
use crate::math::{Point3, TOLERANCE};

/// Newton iterations before the search is declared diverged.
const MAX_ITERATIONS: usize = 50;

/// Step halvings allowed when a step would increase the distance.
const MAX_HALVINGS: usize = 30;

/// Converged once a step moves less than this fraction of the tolerance
/// along the curve.
const CONVERGENCE_FRACTION: f64 = 1e-3;

/// Refines a closest-point estimate inside a bounded parameter window.
///
/// Runs a damped Newton iteration on `C'(t) · (C(t) - P) = 0`, starting from
/// the guess and never leaving the window. Meant for tracking a point that
/// moves little between calls, seeded with the previous result.
pub struct LocalClosestPoint {
    point: Point3,
    guess: f64,
    window_start: f64,
    window_end: f64,
    tolerance: Option<f64>,
}

impl LocalClosestPoint {
    /// Creates a search using the curve's geometric resolution as tolerance.
    #[must_use]
    pub fn new(point: Point3, guess: f64, window_start: f64, window_end: f64) -> Self {
        Self {
            point,
            guess,
            window_start,
            window_end,
            tolerance: None,
        }
    }

    /// Sets an explicit tolerance.
    #[must_use]
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Executes the search, returning the refined parameter.
    ///
    /// The window is intersected with the curve domain and the guess clamped
    /// into it. A minimum on the window boundary is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidWindow`] if the window is reversed or
    /// misses the domain, [`QueryError::SearchDiverged`] if the iteration
    /// does not settle, or an error if the curve is unbuilt.
    pub fn execute(&self, curve: &PathCurve) -> Result<f64> {
        let tolerance = self.tolerance.unwrap_or(curve.geometric_resolution());
        if !(tolerance > 0.0 && tolerance.is_finite()) {
            return Err(QueryError::InvalidTolerance(tolerance).into());
        }
        let spline = curve.built_spline()?;
        let domain = spline.domain();

        let start = self.window_start.max(domain.t_min);
        let end = self.window_end.min(domain.t_max);
        if !(start <= end) {
            return Err(QueryError::InvalidWindow {
                start: self.window_start,
                end: self.window_end,
            }
            .into());
        }
        let diverged = || QueryError::SearchDiverged {
            guess: self.guess,
            start,
            end,
        };
        if !self.guess.is_finite() {
            return Err(diverged().into());
        }

        let dist2 = |t: f64| (spline.point_at(t) - self.point).norm_squared();
        let mut t = self.guess.clamp(start, end);
        for iteration in 0..MAX_ITERATIONS {
            let ders = spline.eval_derivatives(t, 2);
            let offset = ders[0] - self.point.coords;
            let (d1, d2) = (ders[1], ders[2]);
            let speed2 = d1.norm_squared();
            if speed2 < TOLERANCE * TOLERANCE {
                break;
            }

            let g = d1.dot(&offset);
            if (t <= start && g > 0.0) || (t >= end && g < 0.0) {
                return Ok(t);
            }

            let h = d2.dot(&offset) + speed2;
            let mut step = if h > 0.0 { -g / h } else { -g / speed2 };
            let f0 = dist2(t);
            let mut next = (t + step).clamp(start, end);
            let mut halvings = 0;
            while dist2(next) > f0 && halvings < MAX_HALVINGS {
                step *= 0.5;
                next = (t + step).clamp(start, end);
                halvings += 1;
            }

            let moved = (next - t).abs() * speed2.sqrt();
            tracing::trace!(iteration, t, next, moved, "local closest point step");
            t = next;
            if moved <= CONVERGENCE_FRACTION * tolerance {
                return Ok(t);
            }
        }

        tracing::warn!(
            guess = self.guess,
            start,
            end,
            "local closest point search diverged"
        );
        Err(diverged().into())
    }
}
