use nalgebra::DMatrix;

use crate::error::{Result, SimplificationError};
use crate::geometry::curve::bspline::{basis_function_derivatives, find_span, uniform_knots};
use crate::geometry::{BSplineCurve, Curve, CurveDomain, PathCurve};
use crate::math::{Point3, Vector3};

/// Uniform samples taken per control point of the curve being simplified.
const SAMPLES_PER_CONTROL_POINT: usize = 16;

/// Lower bound on the number of uniform samples.
const MIN_SAMPLES: usize = 64;

/// Extra samples placed inside every polynomial span.
const SAMPLES_PER_SPAN: usize = 8;

/// Parameters for curve simplification.
#[derive(Debug, Clone, Copy)]
pub struct SimplifyParams {
    /// Allowed deviation per axis. `None` uses the curve's geometric resolution.
    pub tolerance: Option<f64>,
    /// Number of control-point counts tried before giving up.
    pub max_iterations: usize,
}

impl Default for SimplifyParams {
    fn default() -> Self {
        Self {
            tolerance: None,
            max_iterations: 10,
        }
    }
}

/// Replaces a path's spline with one using fewer control points.
///
/// The replacement keeps the order, the domain and both end points. Its
/// control points are a least-squares fit to dense samples of the current
/// spline on a uniform knot vector. The control-point count starts at the
/// order and grows by half each iteration until the per-axis deviation is
/// within tolerance. Once the count would reach the current one the current
/// spline is kept as is.
pub struct Simplify {
    params: SimplifyParams,
}

impl Simplify {
    /// Creates a new `Simplify` operation.
    #[must_use]
    pub fn new(params: SimplifyParams) -> Self {
        Self { params }
    }

    /// Creates a `Simplify` operation with an explicit tolerance.
    #[must_use]
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self::new(SimplifyParams {
            tolerance: Some(tolerance),
            ..SimplifyParams::default()
        })
    }

    /// Executes the simplification, returning the maximum deviation per axis.
    ///
    /// Cached length and maximum curvature are dropped when the spline is
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::UnbuiltCurve`](crate::error::EvaluationError::UnbuiltCurve)
    /// before the first fit, [`SimplificationError::InvalidTolerance`] for a
    /// non-positive tolerance, or [`SimplificationError::NotConverged`] when
    /// the iteration budget runs out. The curve is unchanged on error.
    pub fn execute(&self, curve: &mut PathCurve) -> Result<Vector3> {
        let original = curve.built_spline()?;
        let tolerance = self.params.tolerance.unwrap_or(curve.geometric_resolution());
        if !(tolerance > 0.0 && tolerance.is_finite()) {
            return Err(SimplificationError::InvalidTolerance(tolerance).into());
        }

        let order = original.order();
        let domain = original.domain();
        let current = original.control_point_count();
        let params = sample_parameters(original);
        let targets: Vec<Point3> = params.iter().map(|&t| original.point_at(t)).collect();

        let mut count = order;
        for iteration in 1..=self.params.max_iterations {
            if count >= current {
                tracing::debug!(
                    control_points = current,
                    iteration,
                    "spline already minimal within tolerance"
                );
                return Ok(Vector3::zeros());
            }

            if let Some(candidate) = fit_candidate(order, count, domain, &params, &targets)? {
                let error = max_deviation(&candidate, &params, &targets);
                tracing::trace!(
                    iteration,
                    control_points = count,
                    error = error.max(),
                    "simplify candidate"
                );
                if error.max() <= tolerance {
                    tracing::debug!(
                        from = current,
                        to = count,
                        error_x = error.x,
                        error_y = error.y,
                        error_z = error.z,
                        "simplified spline"
                    );
                    curve.replace_spline(candidate);
                    return Ok(error);
                }
            }

            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::cast_precision_loss
            )]
            let grown = (count as f64 * 1.5).ceil() as usize;
            count = grown.max(count + 1).min(current);
        }

        Err(SimplificationError::NotConverged {
            iterations: self.params.max_iterations,
        }
        .into())
    }
}

/// Uniform samples over the domain plus a few inside every span, sorted.
fn sample_parameters(spline: &BSplineCurve) -> Vec<f64> {
    let domain = spline.domain();
    let uniform = (SAMPLES_PER_CONTROL_POINT * spline.control_point_count()).max(MIN_SAMPLES);

    let mut params = Vec::with_capacity(uniform + 1);
    for i in 0..=uniform {
        #[allow(clippy::cast_precision_loss)]
        let frac = i as f64 / uniform as f64;
        params.push(domain.t_min + frac * domain.span());
    }
    for (a, b) in spline.spans() {
        for i in 1..=SAMPLES_PER_SPAN {
            #[allow(clippy::cast_precision_loss)]
            let frac = i as f64 / (SAMPLES_PER_SPAN + 1) as f64;
            params.push(a + frac * (b - a));
        }
    }
    params.sort_by(f64::total_cmp);
    params.dedup_by(|a, b| (*a - *b).abs() <= f64::EPSILON * (1.0 + b.abs()));
    params
}

/// Least-squares spline with `count` control points through `targets`,
/// with the first and last control points pinned to the end targets.
///
/// Returns `None` if the normal equations are singular.
fn fit_candidate(
    order: usize,
    count: usize,
    domain: CurveDomain,
    params: &[f64],
    targets: &[Point3],
) -> Result<Option<BSplineCurve>> {
    let degree = order - 1;
    let knots = uniform_knots(order, count, domain);
    let (Some(&first), Some(&last)) = (targets.first(), targets.last()) else {
        return Ok(None);
    };

    let mut control_points = vec![first; count];
    control_points[count - 1] = last;

    let free = count - 2;
    if free > 0 {
        let mut design = DMatrix::<f64>::zeros(params.len(), free);
        let mut rhs = DMatrix::<f64>::zeros(params.len(), 3);
        for (row, (&t, target)) in params.iter().zip(targets).enumerate() {
            let span = find_span(&knots, degree, count, t);
            let basis = basis_function_derivatives(&knots, degree, span, t, 0);
            let mut residual = target.coords;
            for (j, &value) in basis[0].iter().enumerate() {
                let index = span - degree + j;
                if index == 0 {
                    residual -= first.coords * value;
                } else if index == count - 1 {
                    residual -= last.coords * value;
                } else {
                    design[(row, index - 1)] = value;
                }
            }
            for axis in 0..3 {
                rhs[(row, axis)] = residual[axis];
            }
        }

        let normal = design.transpose() * &design;
        let projected = design.transpose() * rhs;
        let Some(solution) = normal.lu().solve(&projected) else {
            tracing::warn!(control_points = count, "simplification system is singular");
            return Ok(None);
        };
        if !solution.iter().all(|v| v.is_finite()) {
            return Ok(None);
        }
        for i in 0..free {
            control_points[i + 1] = Point3::new(solution[(i, 0)], solution[(i, 1)], solution[(i, 2)]);
        }
    }

    BSplineCurve::new(order, knots, control_points).map(Some)
}

/// Largest absolute deviation per axis between `spline` and `targets`.
fn max_deviation(spline: &BSplineCurve, params: &[f64], targets: &[Point3]) -> Vector3 {
    params
        .iter()
        .zip(targets)
        .fold(Vector3::zeros(), |acc, (&t, target)| {
            let diff = (spline.point_at(t) - *target).abs();
            acc.sup(&diff)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{EvaluationError, PathError};
    use crate::geometry::{CurveParams, Waypoint};
    use approx::assert_relative_eq;
    use std::f64::consts::TAU;

    fn fit(points: &[(f64, f64, f64)], order: usize) -> PathCurve {
        let waypoints = points
            .iter()
            .map(|&(x, y, z)| Waypoint::point(x, y, z))
            .collect();
        PathCurve::fit(
            CurveParams {
                geometric_resolution: 1e-3,
                order,
            },
            waypoints,
        )
        .unwrap()
    }

    fn sine_wave(samples: u32) -> PathCurve {
        let points: Vec<(f64, f64, f64)> = (0..=samples)
            .map(|i| {
                let x = TAU * f64::from(i) / f64::from(samples);
                (x, x.sin(), 0.05 * x)
            })
            .collect();
        fit(&points, 4)
    }

    #[test]
    fn unbuilt_curve_is_rejected() {
        let mut curve = PathCurve::with_params(CurveParams::default());
        assert!(matches!(
            Simplify::new(SimplifyParams::default()).execute(&mut curve),
            Err(PathError::Evaluation(EvaluationError::UnbuiltCurve))
        ));
    }

    #[test]
    fn invalid_tolerance_is_rejected() {
        let mut curve = sine_wave(16);
        for tol in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Simplify::with_tolerance(tol).execute(&mut curve),
                Err(PathError::Simplification(SimplificationError::InvalidTolerance(_)))
            ));
        }
    }

    #[test]
    fn collinear_curve_reduces_to_minimum() {
        crate::test_support::init_tracing();
        let points: Vec<(f64, f64, f64)> = (0..8)
            .map(|i| (f64::from(i), 2.0 * f64::from(i), 0.0))
            .collect();
        let mut curve = fit(&points, 3);
        let error = Simplify::with_tolerance(1e-6).execute(&mut curve).unwrap();
        assert!(error.max() < 1e-9, "error={error}");
        assert_eq!(curve.spline().unwrap().control_point_count(), 3);
        assert_relative_eq!(
            curve.position(curve.end_param().unwrap()).unwrap(),
            Point3::new(7.0, 14.0, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn dense_curve_gets_fewer_control_points() {
        let mut curve = sine_wave(40);
        let before = curve.spline().unwrap().control_point_count();
        let original = curve.clone();

        let error = Simplify::with_tolerance(1e-2).execute(&mut curve).unwrap();
        assert!(error.x <= 1e-2 && error.y <= 1e-2 && error.z <= 1e-2);
        let after = curve.spline().unwrap().control_point_count();
        assert!(after < before, "before={before} after={after}");
        assert_eq!(curve.domain().unwrap(), original.domain().unwrap());

        let end = curve.end_param().unwrap();
        for i in 0..=50 {
            let t = end * f64::from(i) / 50.0;
            let diff = curve.position(t).unwrap() - original.position(t).unwrap();
            assert!(diff.abs().max() <= 1.5e-2, "t={t} diff={diff}");
        }
    }

    #[test]
    fn end_points_are_preserved() {
        let mut curve = sine_wave(24);
        let original = curve.clone();
        Simplify::with_tolerance(5e-2).execute(&mut curve).unwrap();
        for t in [curve.start_param().unwrap(), curve.end_param().unwrap()] {
            assert_relative_eq!(
                curve.position(t).unwrap(),
                original.position(t).unwrap(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn repeated_simplification_settles() {
        let mut curve = sine_wave(40);
        let first = Simplify::with_tolerance(1e-2).execute(&mut curve).unwrap();
        let count = curve.spline().unwrap().control_point_count();
        let second = Simplify::with_tolerance(1e-2).execute(&mut curve).unwrap();
        assert!(first.max() <= 1e-2 && second.max() <= 1e-2);
        assert!(curve.spline().unwrap().control_point_count() <= count);
    }

    #[test]
    fn simplification_drops_cached_metrics() {
        let mut curve = sine_wave(40);
        let before = curve.length().unwrap();
        assert!(curve.has_cached_metrics());
        Simplify::with_tolerance(1e-2).execute(&mut curve).unwrap();
        assert!(!curve.has_cached_metrics());
        assert!((curve.length().unwrap() - before).abs() < 0.1);
    }

    #[test]
    fn exhausted_budget_leaves_curve_unchanged() {
        let mut curve = sine_wave(16);
        let before = curve.spline().unwrap().control_point_count();
        let err = Simplify::new(SimplifyParams {
            tolerance: Some(1e-9),
            max_iterations: 1,
        })
        .execute(&mut curve)
        .unwrap_err();
        assert!(matches!(
            err,
            PathError::Simplification(SimplificationError::NotConverged { iterations: 1 })
        ));
        assert!(curve.is_built());
        assert_eq!(curve.spline().unwrap().control_point_count(), before);
    }

    #[test]
    fn default_tolerance_is_geometric_resolution() {
        let mut curve = sine_wave(40);
        let error = Simplify::new(SimplifyParams::default())
            .execute(&mut curve)
            .unwrap();
        assert!(error.max() <= curve.geometric_resolution());
    }
}
