//! Synchronized multi-sensor sample acquisition.
//!
//! Camera bundles and joint-state broadcasts arrive asynchronously on their
//! own delivery paths and refresh per-group [`StreamBuffer`]s. A capture
//! request clears every group's freshness flag, blocks until all groups have
//! delivered again, runs the external corner detector on each camera in
//! registration order and assembles one [`CalibrationSample`].
//!
//! ```text
//! camera bundle ──► CameraInput ──► StreamBuffer<CameraBundle> ─┐
//! joint state ──► JointStateRouter ──► StreamBuffer<ChainObservation> ─┤
//!                                                                      ▼
//!                 CaptureService::trigger ──► SampleCollector::capture ──► SamplePublisher
//! ```
//!
//! The detector and the outbound publisher are traits so that the collector
//! can be driven from recorded data in tests.
//!
//! [`CalibrationSample`]: chain_calib_core::CalibrationSample

mod buffer;
mod collector;
mod config;
mod detector;
mod error;
mod image_conv;
mod joint_filter;
mod publisher;
mod service;

pub use buffer::*;
pub use collector::*;
pub use config::*;
pub use detector::*;
pub use error::*;
pub use image_conv::*;
pub use joint_filter::*;
pub use publisher::*;
pub use service::*;
