use std::f64::consts::{PI, TAU};

/// Wraps an angle into the half-open range `(-π, π]`.
///
/// Works for any finite input, not only for differences of two wrapped angles.
#[must_use]
pub fn wrap_to_pi(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn identity_inside_range() {
        assert!((wrap_to_pi(0.5) - 0.5).abs() < TOL);
        assert!((wrap_to_pi(-0.5) + 0.5).abs() < TOL);
        assert!(wrap_to_pi(0.0).abs() < TOL);
    }

    #[test]
    fn pi_is_kept_and_minus_pi_flips() {
        assert!((wrap_to_pi(PI) - PI).abs() < TOL);
        assert!((wrap_to_pi(-PI) - PI).abs() < TOL);
    }

    #[test]
    fn folds_multiple_turns() {
        assert!((wrap_to_pi(3.0 * TAU + 0.25) - 0.25).abs() < 1e-9);
        assert!((wrap_to_pi(-5.0 * TAU - 0.25) + 0.25).abs() < 1e-9);
    }

    #[test]
    fn result_always_in_half_open_range() {
        for i in -200..=200 {
            let a = f64::from(i) * 0.173;
            let w = wrap_to_pi(a);
            assert!(w > -PI && w <= PI, "a={a} w={w}");
        }
    }
}
