mod fit_curve;

pub use fit_curve::{FitCurve, FittedSpline};
