use thiserror::Error;

/// Top-level error type for the path spline engine.
#[derive(Debug, Error)]
pub enum PathError {
    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Simplification(#[from] SimplificationError),
}

/// Errors raised while fitting a spline through waypoints.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("spline order must be at least 2, got {0}")]
    InvalidOrder(usize),

    #[error("need at least {required} distinct ordinary waypoints, found {found}")]
    InsufficientPoints { required: usize, found: usize },

    #[error("waypoint {index} constrains a neighbor that is not an ordinary point")]
    DanglingConstraint { index: usize },

    #[error("tangent waypoint {index} has zero length")]
    ZeroTangent { index: usize },

    #[error("waypoint {index} has a non-finite coordinate")]
    NonFinite { index: usize },

    #[error("interpolation system is singular")]
    SingularSystem,
}

/// Errors related to evaluating a curve.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("parameter {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange { value: f64, min: f64, max: f64 },

    #[error("curve has not been built")]
    UnbuiltCurve,

    #[error("degenerate curve: {0}")]
    Degenerate(String),
}

/// Errors related to length, curvature and closest-point queries.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("curve has zero length")]
    DegenerateCurve,

    #[error("no closest point found")]
    NoClosestPoint,

    #[error("local search from {guess} did not converge in [{start}, {end}]")]
    SearchDiverged { guess: f64, start: f64, end: f64 },

    #[error("tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),

    #[error("search window [{start}, {end}] does not overlap the curve domain")]
    InvalidWindow { start: f64, end: f64 },
}

/// Errors related to curve simplification.
#[derive(Debug, Error)]
pub enum SimplificationError {
    #[error("tolerance must be positive and finite, got {0}")]
    InvalidTolerance(f64),

    #[error("no approximation within tolerance after {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// Convenience type alias for results using [`PathError`].
pub type Result<T> = std::result::Result<T, PathError>;
