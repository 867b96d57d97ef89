use crate::error::{QueryError, Result};
use crate::geometry::curve::Curve;
use crate::math::TOLERANCE;

use super::PathCurve;

/// Upper bound on curvature samples taken by [`PathCurve::curvature_max`].
const MAX_CURVATURE_SAMPLES: usize = 1_000_000;

impl PathCurve {
    /// Total arc length over the domain, integrated to within the geometric
    /// resolution. Cached until the spline changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the curve is unbuilt.
    pub fn length(&self) -> Result<f64> {
        let spline = self.built_spline()?;
        self.curve_length.get_or_try_compute(|| {
            let length = spline.arc_length(self.params.geometric_resolution.max(TOLERANCE));
            tracing::debug!(length, "computed curve length");
            Ok(length)
        })
    }

    /// Average parameter advance per unit of arc length.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::DegenerateCurve`] if the curve has zero length.
    pub fn unit_parameter(&self) -> Result<f64> {
        let length = self.length()?;
        if length < TOLERANCE {
            return Err(QueryError::DegenerateCurve.into());
        }
        Ok(self.domain()?.span() / length)
    }

    /// Largest curvature sampled every `unit_parameter() * geometric_resolution`
    /// across the domain, both ends included. Cached until the spline changes.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::DegenerateCurve`] if the sampling step is not
    /// strictly positive or would need more than a million samples, or any
    /// curvature evaluation error.
    pub fn curvature_max(&self) -> Result<f64> {
        let spline = self.built_spline()?;
        self.curvature_max.get_or_try_compute(|| {
            let step = self.unit_parameter()? * self.params.geometric_resolution;
            if !(step > 0.0 && step.is_finite()) {
                return Err(QueryError::DegenerateCurve.into());
            }

            let domain = spline.domain();
            let steps = (domain.span() / step).ceil();
            #[allow(clippy::cast_precision_loss)]
            let limit = MAX_CURVATURE_SAMPLES as f64;
            if steps >= limit {
                tracing::warn!(step, span = domain.span(), "curvature sampling step too fine");
                return Err(QueryError::DegenerateCurve.into());
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let steps = steps as usize;

            let mut max = 0.0_f64;
            for i in 0..=steps {
                #[allow(clippy::cast_precision_loss)]
                let t = (domain.t_min + i as f64 * step).min(domain.t_max);
                max = max.max(self.curvature(t)?);
            }
            tracing::debug!(curvature_max = max, samples = steps + 1, "computed max curvature");
            Ok(max)
        })
    }
}
