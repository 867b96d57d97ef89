mod cache;
mod evaluate;
mod metrics;

use std::fmt;

use cache::CachedMetric;

use crate::error::{EvaluationError, Result};
use crate::geometry::curve::{BSplineCurve, Curve, CurveDomain};
use crate::geometry::Waypoint;
use crate::operations::creation::FitCurve;

/// Parameters controlling how a path curve is fitted and sampled.
#[derive(Debug, Clone, Copy)]
pub struct CurveParams {
    /// Length tolerance for arc-length integration, curvature sampling and
    /// the default closest-point search tolerance.
    pub geometric_resolution: f64,
    /// Order (degree + 1) of the fitted spline.
    pub order: usize,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            geometric_resolution: 0.01,
            order: 3,
        }
    }
}

/// A smooth path through an ordered list of waypoints.
///
/// The curve is *unbuilt* until [`PathCurve::update`] fits a spline through
/// the waypoints. Every query on an unbuilt curve fails with
/// [`EvaluationError::UnbuiltCurve`]. Refitting or simplifying replaces the
/// spline and drops the cached length and maximum curvature.
///
/// Cloning makes a deep copy, cached metrics included.
#[derive(Debug, Clone)]
pub struct PathCurve {
    params: CurveParams,
    waypoints: Vec<Waypoint>,
    spline: Option<BSplineCurve>,
    waypoint_params: Vec<f64>,
    curve_length: CachedMetric,
    curvature_max: CachedMetric,
}

impl PathCurve {
    /// Creates an unbuilt curve holding `waypoints`.
    #[must_use]
    pub fn new(params: CurveParams, waypoints: Vec<Waypoint>) -> Self {
        Self {
            params,
            waypoints,
            spline: None,
            waypoint_params: Vec::new(),
            curve_length: CachedMetric::default(),
            curvature_max: CachedMetric::default(),
        }
    }

    /// Creates an unbuilt curve without waypoints.
    #[must_use]
    pub fn with_params(params: CurveParams) -> Self {
        Self::new(params, Vec::new())
    }

    /// Creates a curve and fits it through `waypoints`.
    ///
    /// # Errors
    ///
    /// Returns a fit error if the waypoints cannot be interpolated.
    pub fn fit(params: CurveParams, waypoints: Vec<Waypoint>) -> Result<Self> {
        let mut curve = Self::new(params, waypoints);
        curve.update()?;
        Ok(curve)
    }

    /// Returns the fitting parameters.
    #[must_use]
    pub fn params(&self) -> CurveParams {
        self.params
    }

    /// Returns the geometric resolution.
    #[must_use]
    pub fn geometric_resolution(&self) -> f64 {
        self.params.geometric_resolution
    }

    /// Returns the spline order.
    #[must_use]
    pub fn order(&self) -> usize {
        self.params.order
    }

    /// Returns the stored waypoints.
    #[must_use]
    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// Returns the number of stored waypoints.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.waypoints.len()
    }

    /// Appends a waypoint. The curve is unchanged until the next
    /// [`PathCurve::update`].
    pub fn add_waypoint(&mut self, waypoint: impl Into<Waypoint>) {
        self.waypoints.push(waypoint.into());
    }

    /// Refits the spline from the stored waypoints.
    ///
    /// The previous spline is discarded before fitting, so a failed fit
    /// leaves the curve unbuilt.
    ///
    /// # Errors
    ///
    /// Returns a fit error if the waypoints cannot be interpolated.
    pub fn update(&mut self) -> Result<()> {
        self.discard_spline();
        let fitted = FitCurve::new(&self.waypoints, self.params.order).execute()?;
        self.spline = Some(fitted.spline);
        self.waypoint_params = fitted.parameters;
        Ok(())
    }

    /// Drops the spline and the waypoints. The curve becomes unbuilt.
    pub fn clear(&mut self) {
        self.discard_spline();
        self.waypoints.clear();
    }

    /// Returns whether a spline has been fitted.
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.spline.is_some()
    }

    /// Returns the fitted spline, if any.
    #[must_use]
    pub fn spline(&self) -> Option<&BSplineCurve> {
        self.spline.as_ref()
    }

    /// Parameter assigned to each waypoint by the last fit.
    #[must_use]
    pub fn waypoint_parameters(&self) -> &[f64] {
        &self.waypoint_params
    }

    /// Returns the parameter domain.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::UnbuiltCurve`] before the first fit.
    pub fn domain(&self) -> Result<CurveDomain> {
        Ok(self.built_spline()?.domain())
    }

    /// Returns the first valid parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::UnbuiltCurve`] before the first fit.
    pub fn start_param(&self) -> Result<f64> {
        Ok(self.domain()?.t_min)
    }

    /// Returns the last valid parameter.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError::UnbuiltCurve`] before the first fit.
    pub fn end_param(&self) -> Result<f64> {
        Ok(self.domain()?.t_max)
    }

    /// Summarizes the fitted spline.
    ///
    /// # Errors
    ///
    /// Returns an error if the curve is unbuilt or the length cannot be computed.
    pub fn properties(&self) -> Result<CurveProperties> {
        let spline = self.built_spline()?;
        Ok(CurveProperties {
            control_points: spline.control_point_count(),
            order: spline.order(),
            dimension: 3,
            domain: spline.domain(),
            length: self.length()?,
        })
    }

    pub(crate) fn built_spline(&self) -> Result<&BSplineCurve> {
        self.spline
            .as_ref()
            .ok_or_else(|| EvaluationError::UnbuiltCurve.into())
    }

    /// Swaps in a new spline over the same waypoints.
    pub(crate) fn replace_spline(&mut self, spline: BSplineCurve) {
        self.invalidate_metrics();
        self.spline = Some(spline);
    }

    #[cfg(test)]
    pub(crate) fn has_cached_metrics(&self) -> bool {
        self.curve_length.get().is_some() || self.curvature_max.get().is_some()
    }

    fn discard_spline(&mut self) {
        self.invalidate_metrics();
        self.spline = None;
        self.waypoint_params.clear();
    }

    fn invalidate_metrics(&mut self) {
        self.curve_length.invalidate();
        self.curvature_max.invalidate();
    }
}

/// Summary of a fitted path curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveProperties {
    pub control_points: usize,
    pub order: usize,
    pub dimension: usize,
    pub domain: CurveDomain,
    pub length: f64,
}

impl fmt::Display for CurveProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "curve properties")?;
        writeln!(f, "  control points : {}", self.control_points)?;
        writeln!(f, "  order          : {}", self.order)?;
        writeln!(f, "  dimension      : {}", self.dimension)?;
        writeln!(
            f,
            "  parameters     : {} -> {}",
            self.domain.t_min, self.domain.t_max
        )?;
        write!(f, "  length         : {}", self.length)
    }
}
