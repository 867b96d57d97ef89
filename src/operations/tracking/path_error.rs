use crate::error::Result;
use crate::geometry::PathCurve;
use crate::math::angle::wrap_to_pi;
use crate::math::{Point3, Vector2, TOLERANCE};
use crate::operations::query::LocalClosestPoint;

/// Angular difference between an actual heading and the path heading.
pub struct HeadingError {
    actual_heading: f64,
    param: f64,
}

impl HeadingError {
    /// Creates a new `HeadingError` query.
    #[must_use]
    pub fn new(actual_heading: f64, param: f64) -> Self {
        Self {
            actual_heading,
            param,
        }
    }

    /// Returns `actual_heading - heading(param)` wrapped into `(-π, π]`.
    ///
    /// # Errors
    ///
    /// Returns an evaluation error if the heading at `param` is undefined.
    pub fn execute(&self, curve: &PathCurve) -> Result<f64> {
        let path_heading = curve.heading(self.param)?;
        Ok(wrap_to_pi(self.actual_heading - path_heading))
    }
}

/// Signed horizontal offset of a point from the path at a given parameter.
///
/// Positive when the point lies to the left of the path heading, negative to
/// the right. The vertical component is ignored.
pub struct DistanceError {
    point: Point3,
    param: f64,
}

impl DistanceError {
    /// Creates a new `DistanceError` query.
    #[must_use]
    pub fn new(point: Point3, param: f64) -> Self {
        Self { point, param }
    }

    /// Executes the query.
    ///
    /// # Errors
    ///
    /// Returns an evaluation error if the position or heading at `param`
    /// cannot be evaluated.
    pub fn execute(&self, curve: &PathCurve) -> Result<f64> {
        let on_path = curve.position(self.param)?;
        let offset = Vector2::new(self.point.x - on_path.x, self.point.y - on_path.y);
        let distance = offset.norm();
        if distance < TOLERANCE {
            return Ok(0.0);
        }

        let heading = curve.heading(self.param)?;
        let direction = Vector2::new(heading.cos(), heading.sin());
        let side = direction.perp(&offset);
        Ok(if side >= 0.0 { distance } else { -distance })
    }
}

/// Tracking errors of a pose against the path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingError {
    /// Signed cross-track distance, positive to the left of the path.
    pub distance: f64,
    /// Heading error in `(-π, π]`.
    pub heading: f64,
    /// Path parameter matched to the pose.
    pub param: f64,
}

/// Matches a pose to the path and reports its tracking errors.
///
/// Searches forward from `search_start` over the parameter range covering
/// `length_tolerance` of arc length, so a controller can feed back the
/// previous cycle's parameter.
pub struct PoseError {
    point: Point3,
    actual_heading: f64,
    search_start: f64,
    length_tolerance: f64,
}

impl PoseError {
    /// Creates a new `PoseError` query.
    #[must_use]
    pub fn new(point: Point3, actual_heading: f64, search_start: f64, length_tolerance: f64) -> Self {
        Self {
            point,
            actual_heading,
            search_start,
            length_tolerance,
        }
    }

    /// Executes the query.
    ///
    /// The search window ends at `search_start + unit_parameter() * length_tolerance`,
    /// clamped to the end of the curve.
    ///
    /// # Errors
    ///
    /// Returns an error if the curve has no length, the window is invalid,
    /// the local search diverges, or the errors cannot be evaluated at the
    /// matched parameter.
    pub fn execute(&self, curve: &PathCurve) -> Result<TrackingError> {
        let window_end = (self.search_start + curve.unit_parameter()? * self.length_tolerance)
            .min(curve.end_param()?);
        let param = LocalClosestPoint::new(self.point, self.search_start, self.search_start, window_end)
            .execute(curve)?;

        let distance = DistanceError::new(self.point, param).execute(curve)?;
        let heading = HeadingError::new(self.actual_heading, param).execute(curve)?;
        tracing::trace!(param, distance, heading, "pose error");
        Ok(TrackingError {
            distance,
            heading,
            param,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{PathError, QueryError};
    use crate::geometry::{CurveParams, Waypoint};
    use crate::math::Vector3;
    use crate::operations::query::ClosestPoints;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

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

    fn east() -> PathCurve {
        fit(&[(0.0, 0.0, 0.0), (2.0, 0.0, 0.0), (4.0, 0.0, 0.0)], 2)
    }

    #[test]
    fn heading_error_is_wrapped() {
        let curve = east();
        let cases = [
            (0.3, 0.3),
            (1.5 * PI, -FRAC_PI_2),
            (-PI, PI),
            (PI + 0.1, -PI + 0.1),
        ];
        for (actual, expected) in cases {
            let err = HeadingError::new(actual, 1.0).execute(&curve).unwrap();
            assert_relative_eq!(err, expected, epsilon = 1e-9);
            assert!(err > -PI && err <= PI);
        }
    }

    #[test]
    fn heading_error_against_westbound_path() {
        let west = fit(&[(4.0, 0.0, 0.0), (2.0, 0.0, 0.0), (0.0, 0.0, 0.0)], 2);
        let err = HeadingError::new(0.0, 1.0).execute(&west).unwrap();
        assert_relative_eq!(err, PI, epsilon = 1e-9);
    }

    #[test]
    fn distance_error_is_positive_on_the_left() {
        let curve = east();
        let left = DistanceError::new(Point3::new(1.0, 1.5, 0.0), 1.0)
            .execute(&curve)
            .unwrap();
        let right = DistanceError::new(Point3::new(1.0, -1.5, 0.0), 1.0)
            .execute(&curve)
            .unwrap();
        assert_relative_eq!(left, 1.5, epsilon = 1e-12);
        assert_relative_eq!(right, -1.5, epsilon = 1e-12);
    }

    #[test]
    fn distance_error_ignores_height() {
        let curve = east();
        let raised = DistanceError::new(Point3::new(1.0, 1.0, 7.0), 1.0)
            .execute(&curve)
            .unwrap();
        assert_relative_eq!(raised, 1.0, epsilon = 1e-12);
        let above = DistanceError::new(Point3::new(1.0, 0.0, 3.0), 1.0)
            .execute(&curve)
            .unwrap();
        assert!(above.abs() < f64::EPSILON);
    }

    #[test]
    fn scenario_reflection_flips_sign() {
        crate::test_support::init_tracing();
        let curve = fit(&[(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (2.0, 1.0, 0.0)], 3);
        let query = Point3::new(1.0, 1.0, 0.0);
        let param = ClosestPoints::with_tolerance(query, 0.05)
            .find_one(&curve)
            .unwrap();
        assert!(param >= curve.start_param().unwrap() && param <= curve.end_param().unwrap());

        let foot = curve.position(param).unwrap();
        let frame = curve.frenet_frame(param).unwrap();
        let tangent = Vector3::new(frame[(0, 0)], frame[(0, 1)], frame[(0, 2)]);
        let offset = query - foot;
        let reflected = foot + tangent * (2.0 * offset.dot(&tangent)) - offset;

        let d = DistanceError::new(query, param).execute(&curve).unwrap();
        let d_reflected = DistanceError::new(reflected, param).execute(&curve).unwrap();
        assert!(d.abs() > 0.1);
        assert_relative_eq!(d_reflected, -d, epsilon = 1e-9);
    }

    #[test]
    fn pose_error_on_straight_path() {
        let curve = east();
        let result = PoseError::new(Point3::new(1.3, 0.4, 0.0), 0.1, 1.0, 1.0)
            .execute(&curve)
            .unwrap();
        assert!((result.param - 1.3).abs() < 1e-6);
        assert_relative_eq!(result.distance, 0.4, epsilon = 1e-6);
        assert_relative_eq!(result.heading, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn pose_error_window_is_clamped_to_curve_end() {
        let curve = east();
        let result = PoseError::new(Point3::new(5.0, -0.5, 0.0), -0.2, 3.5, 2.0)
            .execute(&curve)
            .unwrap();
        assert!((result.param - 4.0).abs() < 1e-12);
        assert_relative_eq!(result.distance, -(1.25_f64.sqrt()), epsilon = 1e-9);
        assert_relative_eq!(result.heading, -0.2, epsilon = 1e-9);
    }

    #[test]
    fn pose_error_rejects_start_past_the_end() {
        let curve = east();
        let err = PoseError::new(Point3::new(1.0, 0.0, 0.0), 0.0, 5.0, 1.0)
            .execute(&curve)
            .unwrap_err();
        assert!(matches!(err, PathError::Query(QueryError::InvalidWindow { .. })));
    }
}
