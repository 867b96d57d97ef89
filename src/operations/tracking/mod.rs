mod path_error;

pub use path_error::{DistanceError, HeadingError, PoseError, TrackingError};
