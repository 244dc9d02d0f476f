//! Small rotation helpers on top of glam's `f64` types.

use glam::{DMat3, DVec3};
use std::f64::consts::PI;

/// Builds `Rx(a) * Ry(b) * Rz(c)` from `angles = (a, b, c)` in radians
/// (intrinsic X-Y-Z order).
pub fn from_euler_xyz(angles: DVec3) -> DMat3 {
    DMat3::from_rotation_x(angles.x)
        * DMat3::from_rotation_y(angles.y)
        * DMat3::from_rotation_z(angles.z)
}

/// Inverse of [`from_euler_xyz`].
///
/// Only unambiguous for `|b| < pi/2`; at gimbal lock some valid triple is
/// returned.
pub fn to_euler_xyz(m: DMat3) -> DVec3 {
    // glam is column-major: m.col(c)[r] is element (r, c).
    let b = m.z_axis.x.clamp(-1.0, 1.0).asin();
    let a = (-m.z_axis.y).atan2(m.z_axis.z);
    let c = (-m.y_axis.x).atan2(m.x_axis.x);
    DVec3::new(a, b, c)
}

/// Minimal rotation taking unit vector `from` onto unit vector `to`.
///
/// The angle comes from `atan2(|from x to|, from . to)`, which stays exact
/// for tiny turns and for turns just short of a half turn. Exactly
/// antiparallel inputs give a half turn about some axis orthogonal to
/// `from`.
pub fn rotation_between(from: DVec3, to: DVec3) -> DMat3 {
    let cross = from.cross(to);
    let sin = cross.length();
    let cos = from.dot(to);
    if sin > 0.0 {
        DMat3::from_axis_angle(cross / sin, sin.atan2(cos))
    } else if cos >= 0.0 {
        DMat3::IDENTITY
    } else {
        DMat3::from_axis_angle(from.any_orthonormal_vector(), PI)
    }
}

/// Returns `true` if `m` is a proper rotation: `m^T m = I` and
/// `det(m) = +1`, both within `tol`.
pub fn is_orthonormal(m: DMat3, tol: f64) -> bool {
    m.is_finite()
        && (m.transpose() * m).abs_diff_eq(DMat3::IDENTITY, tol)
        && (m.determinant() - 1.0).abs() < tol
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn euler_order_is_x_then_y_then_z() {
        let angles = DVec3::new(0.3, -0.2, 0.1);
        let expected = DMat3::from_rotation_x(0.3)
            * DMat3::from_rotation_y(-0.2)
            * DMat3::from_rotation_z(0.1);

        assert!(from_euler_xyz(angles).abs_diff_eq(expected, 1e-15));
    }

    #[test]
    fn euler_angles_round_trip() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let angles = DVec3::new(
                rng.random_range(-3.0..3.0),
                rng.random_range(-1.5..1.5),
                rng.random_range(-3.0..3.0),
            );
            let back = to_euler_xyz(from_euler_xyz(angles));
            assert!(
                back.abs_diff_eq(angles, 1e-9),
                "angles {angles} came back as {back}"
            );
        }
    }

    #[test]
    fn sampled_rotations_are_orthonormal() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..100 {
            let m = from_euler_xyz(DVec3::new(
                rng.random_range(-0.2..=0.2),
                rng.random_range(-0.2..=0.2),
                rng.random_range(-0.2..=0.2),
            ));
            assert!(is_orthonormal(m, 1e-12), "not a rotation: {m}");
        }
    }

    #[test]
    fn rotation_between_maps_from_onto_to() {
        let from = DVec3::new(1.0, 2.0, -0.5).normalize();
        let to = DVec3::new(-0.3, 0.1, 0.9).normalize();
        let m = rotation_between(from, to);

        assert!((m * from).abs_diff_eq(to, 1e-12));
        assert!(is_orthonormal(m, 1e-12));
    }

    #[test]
    fn rotation_between_keeps_tiny_angles() {
        let to = DVec3::new(1.0, 1e-9, 0.0).normalize();
        let m = rotation_between(DVec3::X, to);

        assert!((m * DVec3::X - to).length() < 1e-15);
        assert_ne!(m, DMat3::IDENTITY);
    }

    #[test]
    fn rotation_between_keeps_near_half_turns() {
        for eps in [1e-6_f64, 1e-8, 1e-9, 1e-12] {
            let to = DVec3::new(-eps.cos(), eps.sin(), 0.0);
            let m = rotation_between(DVec3::X, to);

            assert!(
                (m * DVec3::X - to).length() < 1e-15,
                "eps {eps}: landed on {}",
                m * DVec3::X
            );
            assert!(is_orthonormal(m, 1e-12));
        }
    }

    #[test]
    fn rotation_between_parallel_is_identity() {
        assert_eq!(rotation_between(DVec3::Y, DVec3::Y), DMat3::IDENTITY);
    }

    #[test]
    fn rotation_between_handles_antiparallel() {
        let m = rotation_between(DVec3::X, -DVec3::X);

        assert!((m * DVec3::X).abs_diff_eq(-DVec3::X, 1e-12));
        assert!(is_orthonormal(m, 1e-12));
    }

    #[test]
    fn reflection_is_not_a_rotation() {
        let mirror = DMat3::from_diagonal(DVec3::new(1.0, 1.0, -1.0));

        assert!(!is_orthonormal(mirror, 1e-9));
        assert!(is_orthonormal(DMat3::from_rotation_z(FRAC_PI_2), 1e-12));
    }
}
