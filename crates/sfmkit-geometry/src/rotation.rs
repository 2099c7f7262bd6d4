/// Below this value of `sqrt(R00^2 + R10^2)` the ZYX decomposition is at gimbal lock.
pub const GIMBAL_LOCK_THRESHOLD: f64 = 1e-6;

/// Transpose a row-major 3x3 matrix.
pub fn transpose(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Multiply a row-major 3x3 matrix by a column vector.
pub fn mat3_mul_vec3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Multiply two row-major 3x3 matrices.
pub fn mat3_mul(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
        }
    }
    out
}

/// Largest absolute deviation of `R * R^T` from the identity.
pub fn orthonormality_error(r: &[[f64; 3]; 3]) -> f64 {
    let rrt = mat3_mul(r, &transpose(r));
    let mut max_err = 0.0f64;
    for (i, row) in rrt.iter().enumerate() {
        for (j, val) in row.iter().enumerate() {
            let target = if i == j { 1.0 } else { 0.0 };
            max_err = max_err.max((val - target).abs());
        }
    }
    max_err
}

/// Flatten a rotation matrix in column-major order.
///
/// The output is `[R00, R10, R20, R01, R11, R21, R02, R12, R22]`.
pub fn to_column_major(r: &[[f64; 3]; 3]) -> [f64; 9] {
    [
        r[0][0], r[1][0], r[2][0], r[0][1], r[1][1], r[2][1], r[0][2], r[1][2], r[2][2],
    ]
}

/// Decompose a rotation matrix into ZYX Euler angles.
///
/// # Arguments
///
/// * `r` - A row-major rotation matrix.
///
/// # Returns
///
/// `[roll, pitch, yaw]` in degrees, with roll about X, pitch about Y and yaw about Z.
///
/// When `sqrt(R00^2 + R10^2)` is below [`GIMBAL_LOCK_THRESHOLD`] the yaw is not
/// observable: roll is then taken from `R12`/`R11` and yaw is fixed to zero.
pub fn rotation_matrix_to_euler_angles(r: &[[f64; 3]; 3]) -> [f64; 3] {
    let sy = (r[0][0] * r[0][0] + r[1][0] * r[1][0]).sqrt();

    let (roll, pitch, yaw) = if sy < GIMBAL_LOCK_THRESHOLD {
        (
            (-r[1][2]).atan2(r[1][1]),
            (-r[2][0]).atan2(sy),
            0.0,
        )
    } else {
        (
            r[2][1].atan2(r[2][2]),
            (-r[2][0]).atan2(sy),
            r[1][0].atan2(r[0][0]),
        )
    };

    [roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()]
}
