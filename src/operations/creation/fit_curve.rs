use nalgebra::DMatrix;

use crate::error::{FitError, Result};
use crate::geometry::curve::bspline::{basis_function_derivatives, find_span};
use crate::geometry::waypoint::Attachment;
use crate::geometry::{BSplineCurve, Waypoint, WaypointRole};
use crate::math::{Point3, Vector3, TOLERANCE};

/// Relative residual above which a solved system is treated as singular.
const RESIDUAL_LIMIT: f64 = 1e-6;

/// A spline fitted through waypoints, with the parameter of every input.
#[derive(Debug, Clone)]
pub struct FittedSpline {
    /// The interpolating spline, starting at parameter `0`.
    pub spline: BSplineCurve,
    /// Parameter assigned to each input waypoint, in input order.
    ///
    /// Derivative and tangent waypoints report the parameter of the point
    /// they constrain.
    pub parameters: Vec<f64>,
}

impl FittedSpline {
    /// Parameter value at the end of the curve.
    #[must_use]
    pub fn end_param(&self) -> f64 {
        self.parameters.iter().copied().fold(0.0, f64::max)
    }
}

/// One interpolation condition: the `derivative`-th derivative at `param`.
#[derive(Debug, Clone, Copy)]
struct Condition {
    param: f64,
    derivative: usize,
    value: Vector3,
}

/// Fits an interpolating B-spline of a given order through waypoints.
///
/// Ordinary points are parameterized by cumulative chord length starting at
/// `0`. Consecutive coincident points collapse to one parameter. The knot
/// vector is clamped, with interior knots placed by averaging the condition
/// parameters, and the control points come from solving the collocation
/// system.
pub struct FitCurve<'a> {
    waypoints: &'a [Waypoint],
    order: usize,
}

impl<'a> FitCurve<'a> {
    /// Creates a new `FitCurve` operation.
    #[must_use]
    pub fn new(waypoints: &'a [Waypoint], order: usize) -> Self {
        Self { waypoints, order }
    }

    /// Executes the fit.
    ///
    /// # Errors
    ///
    /// Returns a [`FitError`] if the order is below 2, fewer than `order`
    /// distinct ordinary points are given, a constraint waypoint has no
    /// ordinary neighbor on its side, or the system is singular.
    pub fn execute(&self) -> Result<FittedSpline> {
        if self.order < 2 {
            return Err(FitError::InvalidOrder(self.order).into());
        }
        if let Some(index) = self
            .waypoints
            .iter()
            .position(|w| !w.position.coords.iter().all(|c| c.is_finite()))
        {
            return Err(FitError::NonFinite { index }.into());
        }

        let (positions, slots) = self.collapse_positions();
        let required = self.order.max(2);
        if positions.len() < required {
            return Err(FitError::InsufficientPoints {
                required,
                found: positions.len(),
            }
            .into());
        }

        let params = chord_parameters(&positions);
        let mut conditions: Vec<Condition> = positions
            .iter()
            .zip(&params)
            .map(|(p, &param)| Condition {
                param,
                derivative: 0,
                value: p.coords,
            })
            .collect();

        let mut parameters = vec![0.0; self.waypoints.len()];
        for (index, waypoint) in self.waypoints.iter().enumerate() {
            let slot = match slots[index] {
                Some(slot) => slot,
                None => waypoint
                    .role
                    .attachment()
                    .and_then(|attachment| neighbor_slot(index, attachment, &slots))
                    .ok_or(FitError::DanglingConstraint { index })?,
            };
            parameters[index] = params[slot];

            if waypoint.role.is_position() {
                continue;
            }
            let mut value = waypoint.position.coords;
            if matches!(
                waypoint.role,
                WaypointRole::TangentToNext | WaypointRole::TangentToPrior
            ) {
                let len = value.norm();
                if len < TOLERANCE {
                    return Err(FitError::ZeroTangent { index }.into());
                }
                // Chord-length parameterization runs at roughly unit speed.
                value /= len;
            }
            conditions.push(Condition {
                param: params[slot],
                derivative: waypoint.role.derivative_order(),
                value,
            });
        }

        conditions.sort_by(|a, b| {
            a.param
                .total_cmp(&b.param)
                .then(a.derivative.cmp(&b.derivative))
        });

        let spline = solve_interpolation(self.order, &conditions)?;
        tracing::debug!(
            waypoints = self.waypoints.len(),
            control_points = spline.control_point_count(),
            order = self.order,
            end_param = params[params.len() - 1],
            "fitted spline"
        );

        Ok(FittedSpline { spline, parameters })
    }

    /// Maps each position waypoint to its slot in the collapsed position
    /// list; constraint waypoints map to `None`.
    fn collapse_positions(&self) -> (Vec<Point3>, Vec<Option<usize>>) {
        let mut positions: Vec<Point3> = Vec::with_capacity(self.waypoints.len());
        let mut slots = Vec::with_capacity(self.waypoints.len());
        for waypoint in self.waypoints {
            if !waypoint.role.is_position() {
                slots.push(None);
                continue;
            }
            let duplicate = positions
                .last()
                .is_some_and(|last| (waypoint.position - last).norm() < TOLERANCE);
            if !duplicate {
                positions.push(waypoint.position);
            }
            slots.push(Some(positions.len() - 1));
        }
        (positions, slots)
    }
}

/// Slot of the nearest position waypoint on the attached side of `index`.
fn neighbor_slot(index: usize, attachment: Attachment, slots: &[Option<usize>]) -> Option<usize> {
    match attachment {
        Attachment::Next => slots[index + 1..].iter().find_map(|s| *s),
        Attachment::Prior => slots[..index].iter().rev().find_map(|s| *s),
    }
}

/// Cumulative chord-length parameters starting at `0`.
fn chord_parameters(positions: &[Point3]) -> Vec<f64> {
    let mut params = Vec::with_capacity(positions.len());
    let mut acc = 0.0;
    params.push(acc);
    for pair in positions.windows(2) {
        acc += (pair[1] - pair[0]).norm();
        params.push(acc);
    }
    params
}

/// Interior knots by averaging `order - 1` consecutive condition parameters.
fn averaged_knots(order: usize, params: &[f64]) -> Vec<f64> {
    let degree = order - 1;
    let count = params.len();
    let start = params[0];
    let end = params[count - 1];

    let mut knots = Vec::with_capacity(count + order);
    knots.extend(std::iter::repeat_n(start, order));
    for j in 1..=count - order {
        #[allow(clippy::cast_precision_loss)]
        let avg = params[j..j + degree].iter().sum::<f64>() / degree as f64;
        knots.push(avg);
    }
    knots.extend(std::iter::repeat_n(end, order));
    knots
}

/// Solves the collocation system for the control points.
fn solve_interpolation(order: usize, conditions: &[Condition]) -> Result<BSplineCurve> {
    let count = conditions.len();
    let degree = order - 1;
    let params: Vec<f64> = conditions.iter().map(|c| c.param).collect();
    let knots = averaged_knots(order, &params);

    let mut matrix = DMatrix::<f64>::zeros(count, count);
    let mut rhs = DMatrix::<f64>::zeros(count, 3);
    for (row, condition) in conditions.iter().enumerate() {
        let span = find_span(&knots, degree, count, condition.param);
        let ders =
            basis_function_derivatives(&knots, degree, span, condition.param, condition.derivative);
        for (j, value) in ders[condition.derivative].iter().enumerate() {
            matrix[(row, span - degree + j)] = *value;
        }
        for axis in 0..3 {
            rhs[(row, axis)] = condition.value[axis];
        }
    }

    let Some(solution) = matrix.clone().lu().solve(&rhs) else {
        tracing::warn!(conditions = count, "interpolation matrix is singular");
        return Err(FitError::SingularSystem.into());
    };
    let residual = (&matrix * &solution - &rhs).norm();
    if !solution.iter().all(|v| v.is_finite()) || residual > RESIDUAL_LIMIT * (1.0 + rhs.norm())
    {
        tracing::warn!(conditions = count, residual, "interpolation system is ill-conditioned");
        return Err(FitError::SingularSystem.into());
    }

    let control_points = (0..count)
        .map(|i| Point3::new(solution[(i, 0)], solution[(i, 1)], solution[(i, 2)]))
        .collect();
    BSplineCurve::new(order, knots, control_points).map_err(|_| FitError::SingularSystem.into())
}
