//! Rotation module - Orientation encodings emitted by the solver.
//!
//! Every per-node orientation, whatever its on-disk encoding, is decoded into a
//! single canonical form: a unit quaternion (`nalgebra::UnitQuaternion<f64>`).
//!
//! Supported encodings:
//!
//! ```text
//! euler<ABC>   3 angles, R = R_A(a1) * R_B(a2) * R_C(a3)   (digits 1,2,3 = X,Y,Z)
//! phi          3 components of a rotation vector (axis * angle, radians)
//! mat          9 components of a row-major direction cosine matrix
//! quat         4 components w x y z
//! none         0 components (position-only node)
//! ```

mod codec;

pub use codec::*;
