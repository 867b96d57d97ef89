mod closest_point;
mod local_closest_point;

pub use closest_point::{ClosestPointSet, ClosestPoints};
pub use local_closest_point::LocalClosestPoint;
