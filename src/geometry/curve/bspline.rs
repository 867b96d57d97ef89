use crate::error::{EvaluationError, Result};
use crate::math::quadrature::adaptive_gauss_legendre;
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveDomain};

/// A clamped, non-rational B-spline curve in 3D space.
///
/// The curve has `order` = degree + 1 and `n` control points, with a
/// non-decreasing knot vector of length `n + order` whose first and last
/// `order` entries coincide. The parameter domain is
/// `[knots[order - 1], knots[n]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineCurve {
    order: usize,
    knots: Vec<f64>,
    control_points: Vec<Point3>,
}

impl BSplineCurve {
    /// Creates a new B-spline curve.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is below 2, there are fewer control
    /// points than the order, the knot vector has the wrong length, is not
    /// non-decreasing, or spans an empty domain.
    pub fn new(order: usize, knots: Vec<f64>, control_points: Vec<Point3>) -> Result<Self> {
        let n = control_points.len();
        if order < 2 || n < order {
            return Err(EvaluationError::Degenerate(format!(
                "order {order} with {n} control points"
            ))
            .into());
        }
        if knots.len() != n + order {
            return Err(EvaluationError::Degenerate(format!(
                "expected {} knots, got {}",
                n + order,
                knots.len()
            ))
            .into());
        }
        if knots.windows(2).any(|w| w[1] < w[0]) || knots.iter().any(|k| !k.is_finite()) {
            return Err(EvaluationError::Degenerate("knot vector is not non-decreasing".into()).into());
        }
        if knots[n] - knots[order - 1] <= 0.0 {
            return Err(EvaluationError::Degenerate("empty parameter domain".into()).into());
        }
        Ok(Self {
            order,
            knots,
            control_points,
        })
    }

    /// Creates a curve on a clamped knot vector whose interior knots are
    /// evenly spaced over `domain`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`BSplineCurve::new`].
    pub fn with_uniform_knots(
        order: usize,
        control_points: Vec<Point3>,
        domain: CurveDomain,
    ) -> Result<Self> {
        let knots = uniform_knots(order, control_points.len(), domain);
        Self::new(order, knots, control_points)
    }

    /// Returns the order (degree + 1).
    #[must_use]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Returns the polynomial degree.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.order - 1
    }

    /// Returns the knot vector.
    #[must_use]
    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Returns the control points.
    #[must_use]
    pub fn control_points(&self) -> &[Point3] {
        &self.control_points
    }

    /// Returns the number of control points.
    #[must_use]
    pub fn control_point_count(&self) -> usize {
        self.control_points.len()
    }

    /// Returns the non-empty knot intervals inside the domain, in order.
    ///
    /// The curve is a single polynomial on each of them.
    pub fn spans(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let n = self.control_points.len();
        self.knots[self.degree()..=n]
            .windows(2)
            .filter(|w| w[1] > w[0])
            .map(|w| (w[0], w[1]))
    }

    pub(crate) fn find_span(&self, t: f64) -> usize {
        find_span(&self.knots, self.degree(), self.control_points.len(), t)
    }

    /// Evaluates `C(t)` through `C^(n)(t)` with `t` clamped into the domain.
    pub(crate) fn eval_derivatives(&self, t: f64, n: usize) -> Vec<Vector3> {
        let t = self.domain().clamp(t);
        let p = self.degree();
        let span = self.find_span(t);
        let ders = basis_function_derivatives(&self.knots, p, span, t, n);

        ders.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold(Vector3::zeros(), |acc, (j, &b)| {
                        acc + self.control_points[span - p + j].coords * b
                    })
            })
            .collect()
    }

    /// Evaluates the position with `t` clamped into the domain.
    pub(crate) fn point_at(&self, t: f64) -> Point3 {
        let ders = self.eval_derivatives(t, 0);
        Point3::from(ders[0])
    }

    /// Integrates the speed `|C'(t)|` over `[a, b]` (clamped into the domain).
    #[must_use]
    pub fn arc_length_between(&self, a: f64, b: f64, tolerance: f64) -> f64 {
        let domain = self.domain();
        let (a, b) = (domain.clamp(a.min(b)), domain.clamp(a.max(b)));
        let pieces: Vec<(f64, f64)> = self
            .spans()
            .filter_map(|(s0, s1)| {
                let lo = s0.max(a);
                let hi = s1.min(b);
                (hi > lo).then_some((lo, hi))
            })
            .collect();
        if pieces.is_empty() {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let per_piece = tolerance / pieces.len() as f64;
        let mut speed = |t: f64| self.eval_derivatives(t, 1)[1].norm();
        pieces
            .iter()
            .map(|&(lo, hi)| adaptive_gauss_legendre(&mut speed, lo, hi, per_piece))
            .sum()
    }

    /// Integrates the total arc length over the domain to within `tolerance`.
    #[must_use]
    pub fn arc_length(&self, tolerance: f64) -> f64 {
        let domain = self.domain();
        self.arc_length_between(domain.t_min, domain.t_max, tolerance)
    }

    fn check_parameter(&self, t: f64) -> Result<()> {
        let domain = self.domain();
        if domain.contains(t) {
            Ok(())
        } else {
            Err(EvaluationError::ParameterOutOfRange {
                value: t,
                min: domain.t_min,
                max: domain.t_max,
            }
            .into())
        }
    }
}

impl Curve for BSplineCurve {
    fn evaluate(&self, t: f64) -> Result<Point3> {
        self.check_parameter(t)?;
        Ok(self.point_at(t))
    }

    fn derivatives(&self, t: f64, n: usize) -> Result<Vec<Vector3>> {
        self.check_parameter(t)?;
        Ok(self.eval_derivatives(t, n))
    }

    fn tangent(&self, t: f64) -> Result<Vector3> {
        self.check_parameter(t)?;
        let d1 = self.eval_derivatives(t, 1)[1];
        let len = d1.norm();
        if len < TOLERANCE {
            return Err(EvaluationError::Degenerate(format!("vanishing derivative at {t}")).into());
        }
        Ok(d1 / len)
    }

    fn domain(&self) -> CurveDomain {
        let n = self.control_points.len();
        CurveDomain::new(self.knots[self.order - 1], self.knots[n])
    }
}

/// Finds the knot span index `i` with `knots[i] <= t < knots[i + 1]` for a
/// curve with `n` control points.
///
/// `t` at the end of the domain maps to the last non-empty span.
pub(crate) fn find_span(knots: &[f64], degree: usize, n: usize, t: f64) -> usize {
    let p = degree;

    if t >= knots[n] {
        let mut i = n - 1;
        while i > p && knots[i] >= knots[n] {
            i -= 1;
        }
        return i;
    }

    let mut low = p;
    let mut high = n;
    while low < high {
        let mid = (low + high) / 2;
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    (low - 1).max(p)
}

/// Builds a clamped knot vector with evenly spaced interior knots.
pub(crate) fn uniform_knots(order: usize, count: usize, domain: CurveDomain) -> Vec<f64> {
    let interior = count.saturating_sub(order);
    let mut knots = Vec::with_capacity(count + order);
    knots.extend(std::iter::repeat_n(domain.t_min, order));
    for i in 1..=interior {
        #[allow(clippy::cast_precision_loss)]
        let frac = i as f64 / (interior + 1) as f64;
        knots.push(domain.t_min + frac * domain.span());
    }
    knots.extend(std::iter::repeat_n(domain.t_max, order));
    knots
}

/// Computes the non-zero basis functions and their derivatives at `t`.
///
/// Returns `ders[k][j]`, the `k`-th derivative of `N_{span - degree + j}`,
/// for `k` in `0..=n` and `j` in `0..=degree`. Rows above the degree are zero.
/// `span` must satisfy `knots[span] <= t < knots[span + 1]` (or be the last
/// non-empty span when `t` is the domain end).
#[allow(
    clippy::many_single_char_names,
    clippy::needless_range_loop,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub(crate) fn basis_function_derivatives(
    knots: &[f64],
    degree: usize,
    span: usize,
    t: f64,
    n: usize,
) -> Vec<Vec<f64>> {
    let p = degree;
    let top = n.min(p);

    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;
    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            // Lower triangle holds knot differences, upper triangle the basis values.
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ndu[r][j - 1] / ndu[j][r];
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let mut ders = vec![vec![0.0; p + 1]; n + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let (mut s1, mut s2) = (0, 1);
        a[0][0] = 1.0;
        for k in 1..=top {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if r >= k {
                a[s2][0] = a[s1][0] / ndu[pk + 1][r - k];
                d = a[s2][0] * ndu[r - k][pk];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r <= pk + 1 { k - 1 } else { p - r };
            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                d += a[s2][j] * ndu[idx][pk];
            }
            if r <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                d += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=top {
        for j in 0..=p {
            ders[k][j] *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}
