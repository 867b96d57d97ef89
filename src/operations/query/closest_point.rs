use crate::error::{QueryError, Result};
use crate::geometry::{BSplineCurve, Curve, PathCurve};
use crate::math::Point3;

/// Samples per knot span, multiplied by the spline order.
const SAMPLES_PER_ORDER: usize = 8;

/// Golden-section iterations used to refine each sampled minimum.
const REFINE_ITERATIONS: usize = 60;

/// Minimum arc length of an equidistant run, in tolerances, before it is
/// reported as an interval.
const INTERVAL_MIN_LENGTH: f64 = 8.0;

/// Closest points found by a global search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosestPointSet {
    /// Isolated closest parameters, ascending.
    pub points: Vec<f64>,
    /// Parameter intervals over which the curve stays equidistant, ascending.
    pub intervals: Vec<(f64, f64)>,
    /// Smallest distance found.
    pub distance: f64,
}

impl ClosestPointSet {
    /// Returns the lowest isolated parameter, or the start of the first
    /// interval when there are no isolated points.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoClosestPoint`] if both sets are empty.
    pub fn first(&self) -> Result<f64> {
        self.points
            .first()
            .copied()
            .or_else(|| self.intervals.first().map(|&(start, _)| start))
            .ok_or_else(|| QueryError::NoClosestPoint.into())
    }

    /// Returns whether nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.intervals.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    t: f64,
    position: Point3,
    distance: f64,
}

/// Finds every closest projection of a point onto the whole curve.
///
/// The curve is sampled densely on each knot span and every sampled local
/// minimum of the distance, interior or at an end of the curve, is refined
/// by golden-section search. Runs of samples that stay equidistant to within
/// `tolerance` (both in distance and in the tangential component of the
/// offset) over at least eight tolerances of arc length are reported as
/// intervals instead, absorbing the minima inside them. Minima closer than
/// `tolerance` to each other are merged.
pub struct ClosestPoints {
    point: Point3,
    tolerance: Option<f64>,
}

impl ClosestPoints {
    /// Creates a query using the curve's geometric resolution as tolerance.
    #[must_use]
    pub fn new(point: Point3) -> Self {
        Self {
            point,
            tolerance: None,
        }
    }

    /// Creates a query with an explicit tolerance.
    #[must_use]
    pub fn with_tolerance(point: Point3, tolerance: f64) -> Self {
        Self {
            point,
            tolerance: Some(tolerance),
        }
    }

    /// Executes the query, returning all closest points and intervals.
    ///
    /// # Errors
    ///
    /// Returns an error if the curve is unbuilt or the tolerance is not
    /// positive.
    pub fn execute(&self, curve: &PathCurve) -> Result<ClosestPointSet> {
        let tolerance = self.tolerance.unwrap_or(curve.geometric_resolution());
        if !(tolerance > 0.0 && tolerance.is_finite()) {
            return Err(QueryError::InvalidTolerance(tolerance).into());
        }
        let spline = curve.built_spline()?;

        let samples = self.sample(spline);
        let mut minima: Vec<(f64, f64)> = (0..samples.len())
            .filter(|&i| is_local_minimum(&samples, i))
            .map(|i| self.refine(spline, &samples, i))
            .collect();

        let best = minima
            .iter()
            .map(|&(_, d)| d)
            .fold(f64::INFINITY, f64::min);
        if !best.is_finite() {
            return Ok(ClosestPointSet::default());
        }

        minima.sort_by(|a, b| a.0.total_cmp(&b.0));

        let intervals = self.equidistant_runs(spline, &samples, tolerance);

        let mut points: Vec<f64> = Vec::with_capacity(minima.len());
        let mut last: Option<Point3> = None;
        for &(t, _) in &minima {
            if intervals.iter().any(|&(a, b)| t >= a && t <= b) {
                continue;
            }
            let p = spline.point_at(t);
            if last.is_some_and(|q| (p - q).norm() < tolerance) {
                continue;
            }
            points.push(t);
            last = Some(p);
        }

        Ok(ClosestPointSet {
            points,
            intervals,
            distance: best,
        })
    }

    /// Executes the query and returns a single parameter.
    ///
    /// # Errors
    ///
    /// Fails like [`ClosestPoints::execute`], or with
    /// [`QueryError::NoClosestPoint`] if nothing is found.
    pub fn find_one(&self, curve: &PathCurve) -> Result<f64> {
        self.execute(curve)?.first()
    }

    fn sample(&self, spline: &BSplineCurve) -> Vec<Sample> {
        let per_span = SAMPLES_PER_ORDER * spline.order();
        let mut samples = Vec::new();
        for (s0, s1) in spline.spans() {
            let start = usize::from(!samples.is_empty());
            for i in start..=per_span {
                #[allow(clippy::cast_precision_loss)]
                let t = s0 + (s1 - s0) * i as f64 / per_span as f64;
                let position = spline.point_at(t);
                samples.push(Sample {
                    t,
                    position,
                    distance: (position - self.point).norm(),
                });
            }
        }
        samples
    }

    /// Golden-section search for the distance minimum between the
    /// neighbors of sample `i`.
    fn refine(&self, spline: &BSplineCurve, samples: &[Sample], i: usize) -> (f64, f64) {
        let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
        let mut lo = samples[i.saturating_sub(1)].t;
        let mut hi = samples[(i + 1).min(samples.len() - 1)].t;
        let dist = |t: f64| (spline.point_at(t) - self.point).norm();

        let mut x1 = hi - inv_phi * (hi - lo);
        let mut x2 = lo + inv_phi * (hi - lo);
        let mut f1 = dist(x1);
        let mut f2 = dist(x2);
        for _ in 0..REFINE_ITERATIONS {
            if f1 < f2 {
                hi = x2;
                x2 = x1;
                f2 = f1;
                x1 = hi - inv_phi * (hi - lo);
                f1 = dist(x1);
            } else {
                lo = x1;
                x1 = x2;
                f1 = f2;
                x2 = lo + inv_phi * (hi - lo);
                f2 = dist(x2);
            }
        }

        let mid = 0.5 * (lo + hi);
        // The bracket ends are candidates too: minima on the domain boundary.
        [(mid, dist(mid)), (samples[i].t, samples[i].distance)]
            .into_iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((mid, dist(mid)))
    }

    /// Runs of samples whose offset stays perpendicular to the curve and
    /// whose distance varies by at most `tolerance`, long enough to count as
    /// an interval and not rising above the samples around them.
    fn equidistant_runs(
        &self,
        spline: &BSplineCurve,
        samples: &[Sample],
        tolerance: f64,
    ) -> Vec<(f64, f64)> {
        let flat: Vec<bool> = samples
            .iter()
            .map(|s| {
                spline.tangent(s.t).is_ok_and(|tangent| {
                    (s.position - self.point).dot(&tangent).abs() <= tolerance
                })
            })
            .collect();

        let mut intervals = Vec::new();
        let mut i = 0;
        while i < samples.len() {
            if !flat[i] {
                i += 1;
                continue;
            }
            let start = i;
            let mut length = 0.0;
            while i + 1 < samples.len() && flat[i + 1] {
                length += (samples[i + 1].position - samples[i].position).norm();
                i += 1;
            }
            if i - start >= 2
                && length >= INTERVAL_MIN_LENGTH * tolerance
                && is_minimal_run(samples, start, i, tolerance)
            {
                intervals.push((samples[start].t, samples[i].t));
            }
            i += 1;
        }
        intervals
    }
}

/// Whether `samples[start..=end]` is equidistant to within `tolerance` and
/// no farther than the samples bordering it.
fn is_minimal_run(samples: &[Sample], start: usize, end: usize, tolerance: f64) -> bool {
    let (lo, hi) = samples[start..=end]
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.distance), hi.max(s.distance))
        });
    let closer = |j: Option<usize>| {
        j.and_then(|j| samples.get(j))
            .is_some_and(|s| s.distance < lo)
    };
    hi - lo <= tolerance && !closer(start.checked_sub(1)) && !closer(Some(end + 1))
}

fn is_local_minimum(samples: &[Sample], i: usize) -> bool {
    let d = samples[i].distance;
    let left = i == 0 || d <= samples[i - 1].distance;
    let right = i + 1 == samples.len() || d <= samples[i + 1].distance;
    left && right
}
