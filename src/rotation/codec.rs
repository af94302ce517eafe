//! Conversions between raw orientation fields and unit quaternions.

use std::fmt;

use nalgebra::{Matrix3, Quaternion, Rotation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Tolerance on `|R^T R - I|` and `|det R - 1|` for direction cosine matrices.
pub const ORTHOGONALITY_TOLERANCE: f64 = 1e-6;

/// Quaternions (and rotation vectors) with a norm below this are treated as zero.
const NORM_EPSILON: f64 = 1e-12;

/// Middle-angle sine/cosine under which an Euler extraction is gimbal locked.
const GIMBAL_EPSILON: f64 = 1e-9;

/// Coordinate axis of an elementary rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Axis for a solver digit (`1` = X, `2` = Y, `3` = Z).
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '1' => Some(Axis::X),
            '2' => Some(Axis::Y),
            '3' => Some(Axis::Z),
            _ => None,
        }
    }

    pub fn digit(self) -> char {
        match self {
            Axis::X => '1',
            Axis::Y => '2',
            Axis::Z => '3',
        }
    }

    #[inline]
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    fn unit(self) -> Unit<Vector3<f64>> {
        match self {
            Axis::X => Vector3::x_axis(),
            Axis::Y => Vector3::y_axis(),
            Axis::Z => Vector3::z_axis(),
        }
    }
}

/// Unit of Euler angles in a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngleUnit {
    #[inline]
    pub fn to_radians(self, value: f64) -> f64 {
        match self {
            AngleUnit::Degrees => value.to_radians(),
            AngleUnit::Radians => value,
        }
    }

    #[inline]
    pub fn from_radians(self, value: f64) -> f64 {
        match self {
            AngleUnit::Degrees => value.to_degrees(),
            AngleUnit::Radians => value,
        }
    }
}

/// Encoding used for a node's orientation fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parametrization {
    /// Three angles composed as `R_A(a1) * R_B(a2) * R_C(a3)`.
    Euler([Axis; 3]),
    /// Axis-angle vector, magnitude in radians.
    RotationVector,
    /// Row-major 3x3 direction cosine matrix.
    Matrix,
    /// Quaternion, scalar first.
    Quaternion,
    /// No orientation fields.
    None,
}

impl Parametrization {
    /// Parse a solver parametrization tag (`euler123`, `phi`, `mat`, ...).
    pub fn parse(tag: &str) -> Result<Self, RotationError> {
        let unsupported = || RotationError::UnsupportedParametrization(tag.to_string());
        match tag {
            "phi" => return Ok(Parametrization::RotationVector),
            "mat" => return Ok(Parametrization::Matrix),
            "quat" | "quaternion" | "euler parameters" => return Ok(Parametrization::Quaternion),
            "none" => return Ok(Parametrization::None),
            _ => {}
        }

        let digits = tag.strip_prefix("euler").ok_or_else(unsupported)?;
        let axes: Vec<Axis> = digits
            .chars()
            .map(Axis::from_digit)
            .collect::<Option<_>>()
            .ok_or_else(unsupported)?;
        if axes.len() != 3 || axes[0] == axes[1] || axes[1] == axes[2] {
            return Err(unsupported());
        }
        Ok(Parametrization::Euler([axes[0], axes[1], axes[2]]))
    }

    /// Number of raw fields this encoding occupies.
    pub fn field_count(self) -> usize {
        match self {
            Parametrization::Euler(_) | Parametrization::RotationVector => 3,
            Parametrization::Matrix => 9,
            Parametrization::Quaternion => 4,
            Parametrization::None => 0,
        }
    }

    /// Field suffix used for orientation series in binary containers.
    pub fn series_suffix(self) -> &'static str {
        match self {
            Parametrization::Euler(_) => "E",
            Parametrization::RotationVector => "Phi",
            Parametrization::Matrix => "R",
            Parametrization::Quaternion => "Q",
            Parametrization::None => "",
        }
    }
}

impl fmt::Display for Parametrization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parametrization::Euler(axes) => {
                write!(f, "euler")?;
                for axis in axes {
                    write!(f, "{}", axis.digit())?;
                }
                Ok(())
            }
            Parametrization::RotationVector => write!(f, "phi"),
            Parametrization::Matrix => write!(f, "mat"),
            Parametrization::Quaternion => write!(f, "quat"),
            Parametrization::None => write!(f, "none"),
        }
    }
}

/// Orientation decoding errors. All of them are scoped to a single sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RotationError {
    #[error("Unsupported rotation parametrization '{0}'")]
    UnsupportedParametrization(String),
    #[error("Malformed quaternion (norm {norm:e})")]
    MalformedQuaternion { norm: f64 },
    #[error("Numerically degenerate orientation: {reason}")]
    NumericDegenerate { reason: String },
    #[error("{parametrization} needs {expected} fields, got {found}")]
    FieldCount {
        parametrization: Parametrization,
        expected: usize,
        found: usize,
    },
}

/// Decode raw orientation fields into a unit quaternion.
///
/// `units` only affects Euler encodings; rotation vectors are always radians.
pub fn decode_orientation(
    raw: &[f64],
    parametrization: Parametrization,
    units: AngleUnit,
) -> Result<UnitQuaternion<f64>, RotationError> {
    let expected = parametrization.field_count();
    if raw.len() != expected {
        return Err(RotationError::FieldCount {
            parametrization,
            expected,
            found: raw.len(),
        });
    }
    if let Some(value) = raw.iter().find(|v| !v.is_finite()) {
        return Err(RotationError::NumericDegenerate {
            reason: format!("non-finite orientation field {value}"),
        });
    }

    match parametrization {
        Parametrization::Euler(axes) => Ok(euler_to_quaternion(axes, [
            units.to_radians(raw[0]),
            units.to_radians(raw[1]),
            units.to_radians(raw[2]),
        ])),
        Parametrization::RotationVector => Ok(rotation_vector_to_quaternion(Vector3::new(
            raw[0], raw[1], raw[2],
        ))),
        Parametrization::Matrix => matrix_to_quaternion(&Matrix3::from_row_slice(raw)),
        Parametrization::Quaternion => {
            let q = Quaternion::new(raw[0], raw[1], raw[2], raw[3]);
            let norm = q.norm();
            if !norm.is_finite() || norm < NORM_EPSILON {
                return Err(RotationError::MalformedQuaternion { norm });
            }
            Ok(UnitQuaternion::from_quaternion(q))
        }
        Parametrization::None => Ok(UnitQuaternion::identity()),
    }
}

/// Encode a unit quaternion back into raw fields of the requested form.
pub fn encode_orientation(
    q: &UnitQuaternion<f64>,
    parametrization: Parametrization,
    units: AngleUnit,
) -> Vec<f64> {
    match parametrization {
        Parametrization::Euler(axes) => quaternion_to_euler(q, axes)
            .iter()
            .map(|&a| units.from_radians(a))
            .collect(),
        Parametrization::RotationVector => q.scaled_axis().iter().copied().collect(),
        Parametrization::Matrix => {
            let m = q.to_rotation_matrix().into_inner();
            (0..3).flat_map(|r| (0..3).map(move |c| m[(r, c)])).collect()
        }
        Parametrization::Quaternion => vec![q.w, q.i, q.j, q.k],
        Parametrization::None => Vec::new(),
    }
}

/// Compose three elementary rotations, angles in radians.
pub fn euler_to_quaternion(axes: [Axis; 3], angles: [f64; 3]) -> UnitQuaternion<f64> {
    axes.iter()
        .zip(angles)
        .map(|(axis, angle)| UnitQuaternion::from_axis_angle(&axis.unit(), angle))
        .fold(UnitQuaternion::identity(), |acc, q| acc * q)
}

/// Rotation vector to quaternion; a zero vector is the identity.
pub fn rotation_vector_to_quaternion(phi: Vector3<f64>) -> UnitQuaternion<f64> {
    let angle = phi.norm();
    if angle < NORM_EPSILON {
        return UnitQuaternion::identity();
    }
    UnitQuaternion::from_axis_angle(&Unit::new_unchecked(phi / angle), angle)
}

/// Direction cosine matrix to quaternion.
///
/// Matrices that are not proper rotations within [`ORTHOGONALITY_TOLERANCE`]
/// are rejected rather than orthogonalized.
pub fn matrix_to_quaternion(m: &Matrix3<f64>) -> Result<UnitQuaternion<f64>, RotationError> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(RotationError::NumericDegenerate {
            reason: "matrix has non-finite entries".to_string(),
        });
    }

    let drift = (m.transpose() * m - Matrix3::identity()).amax();
    if drift > ORTHOGONALITY_TOLERANCE {
        return Err(RotationError::NumericDegenerate {
            reason: format!("matrix is not orthogonal (|R^T R - I| = {drift:e})"),
        });
    }

    let det = m.determinant();
    if (det - 1.0).abs() > ORTHOGONALITY_TOLERANCE {
        return Err(RotationError::NumericDegenerate {
            reason: format!("matrix determinant is {det}, expected 1"),
        });
    }

    Ok(UnitQuaternion::from_rotation_matrix(
        &Rotation3::from_matrix_unchecked(*m),
    ))
}

/// Extract angles (radians) for `R = R_A(a1) * R_B(a2) * R_C(a3)`.
///
/// At gimbal lock the third angle is set to zero.
pub fn quaternion_to_euler(q: &UnitQuaternion<f64>, axes: [Axis; 3]) -> [f64; 3] {
    let r = q.to_rotation_matrix().into_inner();
    let i = axes[0].index();
    let j = axes[1].index();

    if axes[0] == axes[2] {
        // Proper Euler sequence, k is the axis not named.
        let k = 3 - i - j;
        let e = levi_civita(i, j, k);
        let sb = r[(i, j)].hypot(r[(i, k)]);
        let b = sb.atan2(r[(i, i)]);
        if sb < GIMBAL_EPSILON {
            return [(e * r[(k, j)]).atan2(r[(j, j)]), b, 0.0];
        }
        let a = r[(j, i)].atan2(-e * r[(k, i)]);
        let c = r[(i, j)].atan2(e * r[(i, k)]);
        [a, b, c]
    } else {
        let k = axes[2].index();
        let e = levi_civita(i, j, k);
        let cb = r[(i, i)].hypot(r[(i, j)]);
        let b = (e * r[(i, k)]).atan2(cb);
        if cb < GIMBAL_EPSILON {
            return [(e * r[(k, j)]).atan2(r[(j, j)]), b, 0.0];
        }
        let a = (-e * r[(j, k)]).atan2(r[(k, k)]);
        let c = (-e * r[(i, j)]).atan2(r[(i, i)]);
        [a, b, c]
    }
}

/// Sign of the permutation `(i, j, k)` of `(0, 1, 2)`.
#[inline]
fn levi_civita(i: usize, j: usize, k: usize) -> f64 {
    let (i, j, k) = (i as i64, j as i64, k as i64);
    ((i - j) * (j - k) * (k - i) / 2) as f64
}
