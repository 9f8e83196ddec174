use nalgebra::{Matrix2, Rotation2, Rotation3, Unit, Vector2, Vector3};

/// Fractional coordinates closer than this to 1.0 are folded back to 0.0.
pub const WRAP_EPS: f64 = 1e-10;

pub fn rotation_to_align(from: &Vector3<f64>, to: &Vector3<f64>) -> Option<Rotation3<f64>> {
    Rotation3::rotation_between(from, to)
}

/// Counter-clockwise rotation about +z by `angle_degrees`.
pub fn rotation_about_z(angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle_degrees.to_radians())
}

pub fn rotate_2d(vector: &Vector2<f64>, angle_degrees: f64) -> Vector2<f64> {
    Rotation2::new(angle_degrees.to_radians()) * vector
}

/// Angle between two vectors in radians, in `[0, pi]`.
pub fn enclosed_angle(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    let cos = a.dot(b) / (a.norm() * b.norm());
    cos.clamp(-1.0, 1.0).acos()
}

/// Wraps a fractional coordinate into `[0, 1)`.
pub fn wrap_fraction(x: f64) -> f64 {
    let w = x.rem_euclid(1.0);
    if 1.0 - w < WRAP_EPS { 0.0 } else { w }
}

/// Translation that moves the largest (cyclic) gap between wrapped fractional
/// coordinates onto the cell boundary.
///
/// Subtracting the returned value from every coordinate and wrapping again
/// places the first coordinate after the largest gap at exactly zero, so a
/// vacuum-separated slab never straddles the boundary. Returns `0.0` for an
/// empty slice.
pub fn minimal_wrap_shift(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().map(|&v| wrap_fraction(v)).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let Some((&first, &last)) = sorted.first().zip(sorted.last()) else {
        return 0.0;
    };

    let mut best_gap = 1.0 + first - last;
    let mut best_start = first;
    for pair in sorted.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > best_gap + WRAP_EPS {
            best_gap = gap;
            best_start = pair[1];
        }
    }
    best_start
}

/// Relative strain needed to deform the `top` superlattice basis onto the
/// `bottom` one, in percent.
///
/// Both matrices hold basis vectors as columns. With `F = bottom * top^-1`
/// the right stretch tensor `U = sqrt(F^T F)` removes any rigid rotation, and
/// the result is `100 * |U - I|_F`. Returns `None` when `top` is singular.
pub fn right_stretch_strain(bottom: &Matrix2<f64>, top: &Matrix2<f64>) -> Option<f64> {
    let f = bottom * top.try_inverse()?;
    let c = f.transpose() * f;
    let det = c.determinant();
    if det <= 0.0 {
        return None;
    }
    let s = det.sqrt();
    let t = (c.trace() + 2.0 * s).sqrt();
    let u = (c + Matrix2::identity() * s) / t;
    Some(100.0 * (u - Matrix2::identity()).norm())
}

/// Unit normal of the plane spanned by `a` and `b`, or `None` if they are collinear.
pub fn plane_normal(a: &Vector3<f64>, b: &Vector3<f64>) -> Option<Unit<Vector3<f64>>> {
    Unit::try_new(a.cross(b), 1e-12)
}
