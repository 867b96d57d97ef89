use crate::error::{EvaluationError, Result};
use crate::geometry::curve::Curve;
use crate::math::angle::wrap_to_pi;
use crate::math::{Matrix3, Point3, Vector2, Vector3, TOLERANCE};

use super::PathCurve;

impl PathCurve {
    /// Evaluates the position at `param`.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::UnbuiltCurve`] before the first fit and
    /// [`EvaluationError::ParameterOutOfRange`] outside the domain.
    pub fn position(&self, param: f64) -> Result<Point3> {
        self.built_spline()?.evaluate(param)
    }

    /// Evaluates `C(param)` through its `n`-th derivative.
    ///
    /// # Errors
    ///
    /// Same conditions as [`PathCurve::position`].
    pub fn derivatives(&self, param: f64, n: usize) -> Result<Vec<Vector3>> {
        self.built_spline()?.derivatives(param, n)
    }

    /// Curvature `|C' × C''| / |C'|³` at `param`.
    ///
    /// # Errors
    ///
    /// Fails like [`PathCurve::position`], or with
    /// [`EvaluationError::Degenerate`] where the first derivative vanishes.
    pub fn curvature(&self, param: f64) -> Result<f64> {
        let ders = self.derivatives(param, 2)?;
        let (d1, d2) = (ders[1], ders[2]);
        let speed = nonzero_speed(&d1, param)?;
        Ok(d1.cross(&d2).norm() / speed.powi(3))
    }

    /// Derivative of the curvature with respect to arc length at `param`.
    ///
    /// # Errors
    ///
    /// Fails like [`PathCurve::curvature`].
    pub fn variation_of_curvature(&self, param: f64) -> Result<f64> {
        let ders = self.derivatives(param, 3)?;
        let (d1, d2, d3) = (ders[1], ders[2], ders[3]);
        let speed = nonzero_speed(&d1, param)?;

        let c12 = d1.cross(&d2);
        let c12_norm = c12.norm();
        let curvature = c12_norm / speed.powi(3);

        // d|C' x C''|/dt vanishes along with C' x C''.
        let cross_rate = if c12_norm < TOLERANCE {
            0.0
        } else {
            c12.dot(&d1.cross(&d3)) / c12_norm
        };
        let dk_dt = cross_rate / speed.powi(3) - 3.0 * curvature * d1.dot(&d2) / (speed * speed);
        Ok(dk_dt / speed)
    }

    /// Frenet frame at `param`, with tangent, normal and binormal as rows.
    ///
    /// Where the curve is locally straight the normal is taken horizontal and
    /// to the left of the tangent (or along `+x` for a vertical tangent).
    ///
    /// # Errors
    ///
    /// Fails like [`PathCurve::curvature`].
    pub fn frenet_frame(&self, param: f64) -> Result<Matrix3> {
        let ders = self.derivatives(param, 2)?;
        let (d1, d2) = (ders[1], ders[2]);
        let speed = nonzero_speed(&d1, param)?;
        let tangent = d1 / speed;

        let cross = d1.cross(&d2);
        let (normal, binormal) = if cross.norm() < TOLERANCE * speed * speed {
            let normal = straight_normal(&tangent);
            (normal, tangent.cross(&normal))
        } else {
            let binormal = cross.normalize();
            (binormal.cross(&tangent), binormal)
        };

        Ok(Matrix3::from_rows(&[
            tangent.transpose(),
            normal.transpose(),
            binormal.transpose(),
        ]))
    }

    /// Bearing of the tangent projected onto the horizontal plane, in `(-π, π]`.
    ///
    /// # Errors
    ///
    /// Fails like [`PathCurve::curvature`], or with
    /// [`EvaluationError::Degenerate`] where the tangent is vertical.
    pub fn heading(&self, param: f64) -> Result<f64> {
        let frame = self.frenet_frame(param)?;
        let horizontal = Vector2::new(frame[(0, 0)], frame[(0, 1)]);
        let len = horizontal.norm();
        if len < TOLERANCE {
            return Err(EvaluationError::Degenerate(format!("vertical tangent at {param}")).into());
        }
        let horizontal = horizontal / len;
        Ok(wrap_to_pi(horizontal.y.atan2(horizontal.x)))
    }
}

fn nonzero_speed(d1: &Vector3, param: f64) -> Result<f64> {
    let speed = d1.norm();
    if speed < TOLERANCE {
        return Err(EvaluationError::Degenerate(format!("vanishing derivative at {param}")).into());
    }
    Ok(speed)
}

fn straight_normal(tangent: &Vector3) -> Vector3 {
    let left = Vector3::z().cross(tangent);
    if left.norm() < TOLERANCE {
        let side = Vector3::x() - tangent * tangent.x;
        side.normalize()
    } else {
        left.normalize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::PathError;
    use crate::geometry::path::CurveParams;
    use crate::geometry::Waypoint;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

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

    fn half_circle(radius: f64, samples: u32) -> Vec<(f64, f64, f64)> {
        (0..=samples)
            .map(|i| {
                let a = PI * f64::from(i) / f64::from(samples);
                (radius * a.cos(), radius * a.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn scenario_endpoints() {
        let curve = fit(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (2.0, 1.0, 0.0)], 3);
        let start = curve.position(curve.start_param().unwrap()).unwrap();
        let end = curve.position(curve.end_param().unwrap()).unwrap();
        assert_relative_eq!(start, Point3::new(0.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(end, Point3::new(2.0, 1.0, 0.0), epsilon = 1e-9);
    }

    fn out_of_range<T>(result: Result<T>) -> bool {
        matches!(
            result,
            Err(PathError::Evaluation(EvaluationError::ParameterOutOfRange { .. }))
        )
    }

    #[test]
    fn queries_fail_outside_domain_and_succeed_on_boundary() {
        let curve = fit(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (2.0, 1.0, 0.0)], 3);
        let (lo, hi) = (curve.start_param().unwrap(), curve.end_param().unwrap());
        for t in [lo - 1e-6, hi + 1e-6, f64::NAN] {
            assert!(out_of_range(curve.position(t)));
            assert!(out_of_range(curve.curvature(t)));
            assert!(out_of_range(curve.variation_of_curvature(t)));
            assert!(out_of_range(curve.frenet_frame(t)));
            assert!(out_of_range(curve.heading(t)));
        }
        for t in [lo, hi] {
            assert!(curve.position(t).is_ok());
            assert!(curve.curvature(t).is_ok());
            assert!(curve.variation_of_curvature(t).is_ok());
            assert!(curve.frenet_frame(t).is_ok());
        }
    }

    #[test]
    fn unbuilt_curve_fails_evaluation() {
        let curve = PathCurve::with_params(CurveParams::default());
        assert!(matches!(
            curve.position(0.0),
            Err(PathError::Evaluation(EvaluationError::UnbuiltCurve))
        ));
    }

    #[test]
    fn straight_line_has_zero_curvature() {
        let curve = fit(&[(0.0, 0.0, 0.0), (1.0, 1.0, 0.0), (3.0, 3.0, 0.0)], 2);
        let end = curve.end_param().unwrap();
        for i in 0..=20 {
            let t = end * f64::from(i) / 20.0;
            assert!(curve.curvature(t).unwrap().abs() < 1e-12);
            assert!(curve.variation_of_curvature(t).unwrap().abs() < 1e-12);
        }
    }

    #[test]
    fn circle_curvature_matches_radius() {
        let curve = fit(&half_circle(2.0, 24), 4);
        let end = curve.end_param().unwrap();
        for i in 2..=18 {
            let t = end * f64::from(i) / 20.0;
            let k = curve.curvature(t).unwrap();
            assert!((k - 0.5).abs() < 1e-2, "t={t} k={k}");
            assert!(curve.variation_of_curvature(t).unwrap().abs() < 0.1);
        }
    }

    #[test]
    fn frenet_frame_is_orthonormal() {
        let curve = fit(
            &[(0.0, 0.0, 0.0), (1.0, 0.5, 0.2), (2.0, 0.0, 0.5), (3.0, -1.0, 0.3)],
            3,
        );
        let end = curve.end_param().unwrap();
        for i in 0..=10 {
            let frame = curve.frenet_frame(end * f64::from(i) / 10.0).unwrap();
            assert_relative_eq!(frame * frame.transpose(), Matrix3::identity(), epsilon = 1e-9);
            assert_relative_eq!(frame.determinant(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn circle_normal_points_to_center() {
        let curve = fit(&half_circle(1.0, 16), 4);
        let t = 0.5 * curve.end_param().unwrap();
        let frame = curve.frenet_frame(t).unwrap();
        let p = curve.position(t).unwrap();
        let normal = Vector3::new(frame[(1, 0)], frame[(1, 1)], frame[(1, 2)]);
        let to_center = (Point3::origin() - p).normalize();
        assert!(normal.dot(&to_center) > 0.99);
    }

    #[test]
    fn straight_frame_uses_left_normal() {
        let curve = fit(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (2.0, 0.0, 0.0)], 2);
        let frame = curve.frenet_frame(0.5).unwrap();
        assert_relative_eq!(frame, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn heading_follows_tangent_direction() {
        let east = fit(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (2.0, 0.0, 0.0)], 2);
        assert!(east.heading(1.0).unwrap().abs() < 1e-12);

        let west = fit(&[(2.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 0.0, 0.0)], 2);
        assert_relative_eq!(west.heading(1.0).unwrap(), PI, epsilon = 1e-12);

        let north_up = fit(&[(0.0, 0.0, 0.0), (0.0, 1.0, 1.0), (0.0, 2.0, 2.0)], 2);
        assert_relative_eq!(north_up.heading(1.0).unwrap(), PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn heading_is_in_half_open_range() {
        let curve = fit(&half_circle(1.0, 16), 3);
        let end = curve.end_param().unwrap();
        for i in 0..=50 {
            let h = curve.heading(end * f64::from(i) / 50.0).unwrap();
            assert!(h > -PI && h <= PI, "h={h}");
        }
    }

    #[test]
    fn vertical_tangent_has_no_heading() {
        let curve = fit(&[(0.0, 0.0, 0.0), (0.0, 0.0, 1.0), (0.0, 0.0, 2.0)], 2);
        assert!(matches!(
            curve.heading(1.0),
            Err(PathError::Evaluation(EvaluationError::Degenerate(_)))
        ));
    }
}
