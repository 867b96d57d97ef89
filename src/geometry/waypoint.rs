use crate::math::Point3;

/// How a waypoint takes part in the interpolation.
///
/// Derivative and tangent roles carry a vector rather than a position: the
/// waypoint's coordinates are interpreted as that vector and constrain the
/// curve at the neighboring ordinary point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaypointRole {
    /// A position the curve passes through.
    #[default]
    Ordinary,
    /// A corner point. Interpolated like an ordinary point.
    Knuckle,
    /// First derivative at the next ordinary point.
    DerivativeToNext,
    /// First derivative at the previous ordinary point.
    DerivativeToPrior,
    /// Second derivative at the next ordinary point.
    SecondDerivativeToNext,
    /// Second derivative at the previous ordinary point.
    SecondDerivativeToPrior,
    /// Tangent direction at the next ordinary point.
    TangentToNext,
    /// Tangent direction at the previous ordinary point.
    TangentToPrior,
}

/// Which neighbor a constraint role attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attachment {
    Next,
    Prior,
}

impl WaypointRole {
    /// Returns whether the waypoint is a position on the curve.
    #[must_use]
    pub fn is_position(self) -> bool {
        matches!(self, Self::Ordinary | Self::Knuckle)
    }

    /// Order of the derivative this role constrains (`0` for positions).
    #[must_use]
    pub fn derivative_order(self) -> usize {
        match self {
            Self::Ordinary | Self::Knuckle => 0,
            Self::DerivativeToNext
            | Self::DerivativeToPrior
            | Self::TangentToNext
            | Self::TangentToPrior => 1,
            Self::SecondDerivativeToNext | Self::SecondDerivativeToPrior => 2,
        }
    }

    pub(crate) fn attachment(self) -> Option<Attachment> {
        match self {
            Self::Ordinary | Self::Knuckle => None,
            Self::DerivativeToNext | Self::SecondDerivativeToNext | Self::TangentToNext => {
                Some(Attachment::Next)
            }
            Self::DerivativeToPrior | Self::SecondDerivativeToPrior | Self::TangentToPrior => {
                Some(Attachment::Prior)
            }
        }
    }
}

/// A 3D waypoint tagged with its interpolation role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Point3,
    pub role: WaypointRole,
}

impl Waypoint {
    /// Creates a waypoint with an explicit role.
    #[must_use]
    pub fn new(position: Point3, role: WaypointRole) -> Self {
        Self { position, role }
    }

    /// Creates an ordinary waypoint the curve passes through.
    #[must_use]
    pub fn point(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z), WaypointRole::Ordinary)
    }
}

impl From<Point3> for Waypoint {
    fn from(position: Point3) -> Self {
        Self::new(position, WaypointRole::Ordinary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_role_is_ordinary() {
        assert_eq!(WaypointRole::default(), WaypointRole::Ordinary);
        let wp: Waypoint = Point3::new(1.0, 2.0, 3.0).into();
        assert!(wp.role.is_position());
    }

    #[test]
    fn knuckle_behaves_like_a_position() {
        assert!(WaypointRole::Knuckle.is_position());
        assert_eq!(WaypointRole::Knuckle.derivative_order(), 0);
        assert!(WaypointRole::Knuckle.attachment().is_none());
    }

    #[test]
    fn constraint_roles_attach_to_a_neighbor() {
        assert_eq!(WaypointRole::TangentToNext.attachment(), Some(Attachment::Next));
        assert_eq!(WaypointRole::DerivativeToPrior.attachment(), Some(Attachment::Prior));
        assert_eq!(WaypointRole::SecondDerivativeToNext.derivative_order(), 2);
        assert_eq!(WaypointRole::TangentToPrior.derivative_order(), 1);
    }
}
