//! Core value types for robot kinematic calibration.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Pt2`, `Mat4`, ...),
//! - the inbound message shapes delivered by camera and joint streams,
//! - the observation records that make up one [`CalibrationSample`],
//! - the 6-parameter rigid transform ([`SingleTransform`]) used as the
//!   optimizer's decision variable for each link of a calibration chain.
//!
//! Transform parameterization:
//! `p = [tx, ty, tz, rx, ry, rz]`, where `(rx, ry, rz)` is a rotation vector
//! (unit axis scaled by the angle in radians).

/// Linear algebra type aliases and helpers.
pub mod math;
/// Camera, image and joint-state message shapes.
pub mod messages;
/// Per-camera / per-chain observations and the composite sample.
pub mod observation;
/// 6-parameter rigid transform and free-parameter masks.
pub mod transform;

pub use math::*;
pub use messages::*;
pub use observation::*;
pub use transform::*;
