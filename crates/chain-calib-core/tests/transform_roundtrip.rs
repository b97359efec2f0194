//! Round-trip behaviour of the 6-parameter transform encoding.
//!
//! Sweeps rotation angles in (0.01, π − 0.01) over a spread of unit axes and
//! checks that deflate(inflate(p)) reproduces both translation and rotation,
//! plus the documented degenerate cases.

use chain_calib_core::{deflate, inflate, Mat4, Real, SingleTransform, Vec3, Vec6};
use std::f64::consts::PI;

fn axes() -> Vec<Vec3> {
    let mut out = Vec::new();
    for i in 0..8 {
        let phi = i as Real * PI / 4.0;
        for theta in [0.3_f64, 1.2, 2.5] {
            out.push(Vec3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
    }
    out.push(Vec3::x());
    out.push(Vec3::y());
    out.push(-Vec3::z());
    out
}

#[test]
fn non_degenerate_roundtrip() {
    let translation = Vec3::new(0.25, -1.5, 3.0);
    let n = 40;
    for axis in axes() {
        for k in 0..=n {
            let angle = 0.01 + (PI - 0.02) * k as Real / n as Real;
            let rv = axis * angle;
            let p = Vec6::new(
                translation.x,
                translation.y,
                translation.z,
                rv.x,
                rv.y,
                rv.z,
            );
            let back = deflate(&inflate(&p));

            let dt = (back.fixed_rows::<3>(0) - translation).norm();
            assert!(dt < 1e-12, "translation drift {dt} for p={p}");

            let dr = (back.fixed_rows::<3>(3) - rv).norm();
            assert!(dr < 1e-8, "rotation mismatch {dr} for axis={axis} angle={angle}");
        }
    }
}

#[test]
fn inflated_rotation_is_orthonormal() {
    let p = Vec6::new(1.0, 2.0, 3.0, 0.7, -1.1, 0.4);
    let t = inflate(&p);
    let r = t.fixed_view::<3, 3>(0, 0).into_owned();
    let err = (r.transpose() * r - nalgebra::Matrix3::identity()).abs().max();
    assert!(err < 1e-12, "R^T R deviates by {err}");
    assert!((r.determinant() - 1.0).abs() < 1e-12);
    assert_eq!(t.row(3).into_owned(), nalgebra::RowVector4::new(0.0, 0.0, 0.0, 1.0));
}

#[test]
fn zero_rotation_collapses_axis() {
    let t = inflate(&Vec6::zeros());
    assert_eq!(t, Mat4::identity());
    assert_eq!(deflate(&Mat4::identity()), Vec6::zeros());

    // Any axis scaled to zero length is the same transform.
    let p = Vec6::new(0.5, 0.5, 0.5, 0.0, 0.0, 0.0);
    let back = deflate(&inflate(&p));
    assert!((back - p).norm() < 1e-15);
}

#[test]
fn full_turn_wraps_to_zero() {
    let p = Vec6::new(0.0, 0.0, 0.0, 0.0, 2.0 * PI, 0.0);
    let back = deflate(&inflate(&p));
    assert!(back.fixed_rows::<3>(3).norm() < 1e-6, "back={back}");
}

#[test]
fn infinite_entry_keeps_translation() {
    let mut t = inflate(&Vec6::new(1.0, -2.0, 3.0, 0.3, 0.0, 0.0));
    t[(3, 0)] = f64::NEG_INFINITY;
    let p = deflate(&t);
    assert_eq!(p, Vec6::new(1.0, -2.0, 3.0, 0.0, 0.0, 0.0));
}

#[test]
fn single_transform_update_preserves_mask() {
    let mut st = SingleTransform::new(Vec6::zeros()).with_free([true, true, true, false, false, false]);
    st.deflate(&inflate(&Vec6::new(0.0, 0.0, 1.0, 0.0, 0.5, 0.0)));
    assert_eq!(st.num_free(), 3);
    assert!((st.params()[4] - 0.5).abs() < 1e-12);
}
