//! Rigid-transform parameterization for calibration chains.
//!
//! Each link of a calibration chain is stored as a 6-vector
//! `p = [tx, ty, tz, rx, ry, rz]`:
//!
//! - `(tx, ty, tz)` is the translation,
//! - `(rx, ry, rz)` is a rotation vector whose direction is the rotation axis
//!   and whose magnitude is the rotation angle in radians.
//!
//! [`inflate`] expands the vector into a 4×4 homogeneous transform and
//! [`deflate`] recovers the vector from a transform. The two are inverse up to
//! the usual axis-angle ambiguities: angles are reported in `[0, π]`, and a
//! zero rotation always comes back as the zero vector regardless of the axis
//! it was built from.
//!
//! A [`SingleTransform`] also carries a free-parameter mask telling an
//! optimizer which of the six values it may vary. The mask never influences
//! inflation or deflation.

use crate::{is_finite_matrix, Iso3, Mat3, Mat4, Real, Vec3, Vec6};
use anyhow::{ensure, Result};
use log::debug;
use nalgebra::{Rotation3, Translation3, Unit, UnitQuaternion};
use serde::{Deserialize, Serialize};

/// Number of parameters in one transform.
pub const PARAM_LEN: usize = 6;

/// Rotation vectors shorter than this are treated as "no rotation".
const AXIS_EPS: Real = 1e-12;

/// Split a rotation vector into a unit axis and an angle.
///
/// For a (near) zero vector the axis is undefined; the x axis is returned
/// together with the vector's tiny norm so that Rodrigues still yields the
/// identity.
pub fn axis_angle(rot: &Vec3) -> (Unit<Vec3>, Real) {
    match Unit::try_new_and_get(*rot, AXIS_EPS) {
        Some((axis, angle)) => (axis, angle),
        None => (Vec3::x_axis(), rot.norm()),
    }
}

/// Rodrigues rotation matrix for a unit `axis` and `angle` in radians.
pub fn rodrigues(axis: &Unit<Vec3>, angle: Real) -> Mat3 {
    let (a0, a1, a2) = (axis.x, axis.y, axis.z);
    let c = angle.cos();
    let s = angle.sin();
    let v = 1.0 - c;

    Mat3::new(
        a0 * a0 + (1.0 - a0 * a0) * c,
        a0 * a1 * v - a2 * s,
        a0 * a2 * v + a1 * s,
        a0 * a1 * v + a2 * s,
        a1 * a1 + (1.0 - a1 * a1) * c,
        a1 * a2 * v - a0 * s,
        a0 * a2 * v - a1 * s,
        a1 * a2 * v + a0 * s,
        a2 * a2 + (1.0 - a2 * a2) * c,
    )
}

/// Expand `[tx, ty, tz, rx, ry, rz]` into a 4×4 homogeneous transform.
pub fn inflate(p: &Vec6) -> Mat4 {
    let (axis, angle) = axis_angle(&p.fixed_rows::<3>(3).into_owned());
    let r = rodrigues(&axis, angle);

    let mut t = Mat4::identity();
    t.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
    t[(0, 3)] = p[0];
    t[(1, 3)] = p[1];
    t[(2, 3)] = p[2];
    t
}

/// Recover `[tx, ty, tz, rx, ry, rz]` from a homogeneous transform.
///
/// If the matrix holds any NaN or infinite entry the rotation part is
/// reported as zero; the translation column is passed through unchanged.
pub fn deflate(t: &Mat4) -> Vec6 {
    let rot = if is_finite_matrix(t) {
        log_rotation(&t.fixed_view::<3, 3>(0, 0).into_owned())
    } else {
        debug!("deflate: non-finite transform, rotation reset to zero");
        Vec3::zeros()
    };
    Vec6::new(t[(0, 3)], t[(1, 3)], t[(2, 3)], rot.x, rot.y, rot.z)
}

/// Closest proper rotation to `m` (SVD projection, det forced to +1).
fn project_to_so3(m: &Mat3) -> Option<Rotation3<Real>> {
    let svd = m.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r = u_flipped * v_t;
    }
    Some(Rotation3::from_matrix_unchecked(r))
}

/// log: SO(3) -> so(3) as a 3-vector (axis * angle).
///
/// The block is first projected onto the closest proper rotation, so
/// slightly non-orthonormal input from an optimizer step is tolerated.
fn log_rotation(m: &Mat3) -> Vec3 {
    let Some(rot) = project_to_so3(m) else {
        return Vec3::zeros();
    };
    let rot = UnitQuaternion::from_rotation_matrix(&rot);
    let angle = rot.angle();
    if angle < AXIS_EPS {
        return Vec3::zeros();
    }
    match rot.axis() {
        Some(axis) => axis.into_inner() * angle,
        None => Vec3::zeros(),
    }
}

/// Expand `[tx, ty, tz, roll, pitch, yaw]` (static x-y-z axes) into a
/// homogeneous transform, `R = Rz(yaw) * Ry(pitch) * Rx(roll)`.
pub fn inflate_rpy(p: &Vec6) -> Mat4 {
    let rot = Rotation3::from_euler_angles(p[3], p[4], p[5]);
    Iso3::from_parts(Translation3::new(p[0], p[1], p[2]), rot.into()).to_homogeneous()
}

/// Inverse of [`inflate_rpy`]. Non-finite input yields zero angles.
pub fn deflate_rpy(t: &Mat4) -> Vec6 {
    let angles = if is_finite_matrix(t) {
        project_to_so3(&t.fixed_view::<3, 3>(0, 0).into_owned()).map(|r| r.euler_angles())
    } else {
        None
    };
    let (roll, pitch, yaw) = angles.unwrap_or((0.0, 0.0, 0.0));
    Vec6::new(t[(0, 3)], t[(1, 3)], t[(2, 3)], roll, pitch, yaw)
}

/// Free-parameter mask: a flag is free iff it equals exactly `1`.
pub fn compute_mask(flags: &[i64; PARAM_LEN]) -> [bool; PARAM_LEN] {
    flags.map(|f| f == 1)
}

/// Serialized form of a transform as it appears in chain configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    pub params: [Real; PARAM_LEN],
    /// `1` marks a parameter as free, anything else keeps it fixed.
    #[serde(default)]
    pub free: [i64; PARAM_LEN],
}

/// One rigid link of a calibration chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleTransform {
    params: Vec6,
    free: [bool; PARAM_LEN],
}

impl Default for SingleTransform {
    fn default() -> Self {
        Self::new(Vec6::zeros())
    }
}

impl SingleTransform {
    /// Transform with every parameter fixed.
    pub fn new(params: Vec6) -> Self {
        debug!(
            "initializing single transform with params [{}]",
            params
                .iter()
                .map(|x| format!("{x: >7.4}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self {
            params,
            free: [false; PARAM_LEN],
        }
    }

    /// # Errors
    ///
    /// Returns an error unless exactly [`PARAM_LEN`] values are given.
    pub fn from_slice(values: &[Real]) -> Result<Self> {
        ensure!(
            values.len() == PARAM_LEN,
            "expected {} transform parameters, got {}",
            PARAM_LEN,
            values.len()
        );
        Ok(Self::new(Vec6::from_column_slice(values)))
    }

    pub fn from_config(config: &TransformConfig) -> Self {
        Self::new(Vec6::from_column_slice(&config.params)).with_free(compute_mask(&config.free))
    }

    /// Build from a homogeneous transform via [`deflate`].
    pub fn from_matrix(t: &Mat4) -> Self {
        Self::new(deflate(t))
    }

    pub fn with_free(mut self, free: [bool; PARAM_LEN]) -> Self {
        self.free = free;
        self
    }

    pub fn params(&self) -> &Vec6 {
        &self.params
    }

    pub fn set_params(&mut self, params: Vec6) {
        self.params = params;
    }

    pub fn free(&self) -> &[bool; PARAM_LEN] {
        &self.free
    }

    /// Number of free parameters.
    pub fn num_free(&self) -> usize {
        self.free.iter().filter(|f| **f).count()
    }

    /// Number of parameters needed to inflate / deflate this transform.
    pub fn get_length(&self) -> usize {
        PARAM_LEN
    }

    /// Plain parameter list.
    pub fn params_to_config(&self) -> [Real; PARAM_LEN] {
        let mut out = [0.0; PARAM_LEN];
        out.copy_from_slice(self.params.as_slice());
        out
    }

    pub fn to_config(&self) -> TransformConfig {
        TransformConfig {
            params: self.params_to_config(),
            free: self.free.map(i64::from),
        }
    }

    /// Homogeneous transform for the current parameters.
    pub fn inflate(&self) -> Mat4 {
        inflate(&self.params)
    }

    /// Replace the parameters with the deflated form of `t`, keeping the mask.
    pub fn deflate(&mut self, t: &Mat4) {
        self.params = deflate(t);
    }

    pub fn isometry(&self) -> Iso3 {
        let rot = self.params.fixed_rows::<3>(3).into_owned();
        Iso3::new(self.params.fixed_rows::<3>(0).into_owned(), rot)
    }
}
