pub mod curve;
pub mod path;
pub mod waypoint;

pub use curve::{BSplineCurve, Curve, CurveDomain};
pub use path::{CurveParams, CurveProperties, PathCurve};
pub use waypoint::{Waypoint, WaypointRole};
