use nalgebra::{Matrix2, Matrix3, Vector2};

/// An integer 2x2 transformation matrix. Rows are the coefficients of the
/// superlattice vectors in terms of the original in-plane lattice vectors.
pub type IntMatrix2 = [[i64; 2]; 2];

pub const IDENTITY2: IntMatrix2 = [[1, 0], [0, 1]];

pub fn det2(m: &IntMatrix2) -> i64 {
    m[0][0] * m[1][1] - m[0][1] * m[1][0]
}

pub fn mul2(a: &IntMatrix2, b: &IntMatrix2) -> IntMatrix2 {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

pub fn adjugate2(m: &IntMatrix2) -> IntMatrix2 {
    [[m[1][1], -m[0][1]], [-m[1][0], m[0][0]]]
}

/// Solves `target = K * source` for an integer matrix `K`.
///
/// Returns `None` when `source` is singular or `K` would not be integral,
/// i.e. when the lattice spanned by the rows of `target` is not a sublattice
/// of the one spanned by the rows of `source`.
pub fn integer_left_quotient(target: &IntMatrix2, source: &IntMatrix2) -> Option<IntMatrix2> {
    let det = det2(source);
    if det == 0 {
        return None;
    }
    let scaled = mul2(target, &adjugate2(source));
    let mut k = [[0; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            if scaled[i][j] % det != 0 {
                return None;
            }
            k[i][j] = scaled[i][j] / det;
        }
    }
    Some(k)
}

/// Applies an integer transformation to an in-plane basis whose rows are the
/// lattice vectors, returning the superlattice basis (rows).
pub fn transform_basis(m: &IntMatrix2, basis: &Matrix2<f64>) -> Matrix2<f64> {
    Matrix2::new(
        m[0][0] as f64,
        m[0][1] as f64,
        m[1][0] as f64,
        m[1][1] as f64,
    ) * basis
}

/// Embeds a 2x2 in-plane transformation into a 3x3 supercell matrix that
/// leaves the stacking axis untouched.
pub fn embed_in_plane(m: &IntMatrix2) -> [[i64; 3]; 3] {
    [
        [m[0][0], m[0][1], 0],
        [m[1][0], m[1][1], 0],
        [0, 0, 1],
    ]
}

/// The in-plane 2x2 block (rows = in-plane lattice vectors, x/y components).
pub fn in_plane_block(cell: &Matrix3<f64>) -> Matrix2<f64> {
    Matrix2::new(cell[(0, 0)], cell[(0, 1)], cell[(1, 0)], cell[(1, 1)])
}

/// Cartesian in-plane vector for integer coefficients `m` of a row basis.
pub fn lattice_point(m: &[i64; 2], basis: &Matrix2<f64>) -> Vector2<f64> {
    basis.transpose() * Vector2::new(m[0] as f64, m[1] as f64)
}
