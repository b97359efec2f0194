//! Observation records that make up one calibration sample.
//!
//! A [`CalibrationSample`] bundles what every camera saw of the calibration
//! target together with the joint configuration of every kinematic chain at
//! (approximately) the same instant. Downstream estimators consume samples as
//! immutable records.

use crate::{CameraInfo, Pt2, Stamp};
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// One camera's contribution to a sample.
///
/// `image_points` are the detected target corners in detector order
/// (row-major over the pattern grid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraObservation {
    pub camera_id: String,
    pub stamp: Stamp,
    pub cam_info: CameraInfo,
    pub image_points: Vec<Pt2>,
    #[serde(default)]
    pub verbose: bool,
}

impl CameraObservation {
    /// # Errors
    ///
    /// Returns an error if `camera_id` is empty or no points were supplied.
    pub fn new(
        camera_id: impl Into<String>,
        cam_info: CameraInfo,
        image_points: Vec<Pt2>,
    ) -> Result<Self> {
        let camera_id = camera_id.into();
        ensure!(!camera_id.is_empty(), "camera id must not be empty");
        ensure!(
            !image_points.is_empty(),
            "camera {} has no image points",
            camera_id
        );
        Ok(Self {
            camera_id,
            stamp: cam_info.header.stamp,
            cam_info,
            image_points,
            verbose: false,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// A single named joint reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointValue {
    pub name: String,
    pub position: f64,
}

/// Joint configuration of one kinematic chain.
///
/// Joint order always follows the chain group's configured order, never the
/// order of the broadcast it was extracted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainObservation {
    pub chain_id: String,
    pub stamp: Stamp,
    pub joints: Vec<JointValue>,
}

impl ChainObservation {
    pub fn new(chain_id: impl Into<String>, stamp: Stamp, joints: Vec<JointValue>) -> Self {
        Self {
            chain_id: chain_id.into(),
            stamp,
            joints,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.joints.iter().map(|j| j.name.as_str())
    }

    pub fn positions(&self) -> Vec<f64> {
        self.joints.iter().map(|j| j.position).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.joints.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }
}

/// One complete, time-consistent set of sensor observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    /// Human-readable identifier, e.g. `sample01`.
    pub sample_id: String,
    /// Calibration target that was observed, e.g. `cb_9x6`.
    pub target_id: String,
    /// Chain the target is rigidly attached to.
    pub chain_id: String,
    pub cameras: Vec<CameraObservation>,
    pub chains: Vec<ChainObservation>,
}

impl CalibrationSample {
    /// # Errors
    ///
    /// Returns an error if any identifier is empty or there are no camera
    /// observations.
    pub fn new(
        sample_id: impl Into<String>,
        target_id: impl Into<String>,
        chain_id: impl Into<String>,
        cameras: Vec<CameraObservation>,
        chains: Vec<ChainObservation>,
    ) -> Result<Self> {
        let sample_id = sample_id.into();
        let target_id = target_id.into();
        let chain_id = chain_id.into();
        ensure!(!sample_id.is_empty(), "sample id must not be empty");
        ensure!(!target_id.is_empty(), "target id must not be empty");
        ensure!(!chain_id.is_empty(), "chain id must not be empty");
        ensure!(
            !cameras.is_empty(),
            "sample {} needs at least one camera observation",
            sample_id
        );
        Ok(Self {
            sample_id,
            target_id,
            chain_id,
            cameras,
            chains,
        })
    }

    pub fn camera(&self, camera_id: &str) -> Option<&CameraObservation> {
        self.cameras.iter().find(|c| c.camera_id == camera_id)
    }

    pub fn chain(&self, chain_id: &str) -> Option<&ChainObservation> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Spread in seconds between the earliest and latest observation stamp.
    pub fn time_skew(&self) -> f64 {
        let stamps = self
            .cameras
            .iter()
            .map(|c| c.stamp)
            .chain(self.chains.iter().map(|c| c.stamp));
        let (min, max) = stamps.fold((None::<Stamp>, None::<Stamp>), |(lo, hi), s| {
            (
                Some(lo.map_or(s, |l| l.min(s))),
                Some(hi.map_or(s, |h| h.max(s))),
            )
        });
        match (min, max) {
            (Some(lo), Some(hi)) => hi.as_secs_f64() - lo.as_secs_f64(),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Header;

    fn info_at(sec: i64) -> CameraInfo {
        CameraInfo::pinhole(Header::new(Stamp::new(sec, 0), "cam"), 640, 480, 500.0, 500.0, 320.0, 240.0)
    }

    #[test]
    fn camera_observation_takes_info_stamp() {
        let obs = CameraObservation::new("left", info_at(3), vec![Pt2::new(1.0, 2.0)]).unwrap();
        assert_eq!(obs.stamp, Stamp::new(3, 0));
        assert_eq!(obs.len(), 1);
        assert!(!obs.verbose);
    }

    #[test]
    fn camera_observation_rejects_empty_points() {
        assert!(CameraObservation::new("left", info_at(0), Vec::new()).is_err());
        assert!(CameraObservation::new("", info_at(0), vec![Pt2::origin()]).is_err());
    }

    #[test]
    fn sample_lookup_and_skew() {
        let cam = CameraObservation::new("left", info_at(10), vec![Pt2::new(1.0, 1.0)]).unwrap();
        let chain = ChainObservation::new(
            "arm_chain",
            Stamp::new(12, 500_000_000),
            vec![JointValue {
                name: "j1".into(),
                position: 0.1,
            }],
        );
        let sample = CalibrationSample::new("sample01", "cb_9x6", "arm_chain", vec![cam], vec![chain]).unwrap();

        assert!(sample.camera("left").is_some());
        assert!(sample.camera("right").is_none());
        assert_eq!(sample.chain("arm_chain").map(|c| c.positions()), Some(vec![0.1]));
        assert!((sample.time_skew() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn sample_requires_cameras() {
        assert!(CalibrationSample::new("sample01", "cb_9x6", "arm_chain", Vec::new(), Vec::new()).is_err());
    }

    #[test]
    fn sample_serde_roundtrip() {
        let cam = CameraObservation::new("left", info_at(1), vec![Pt2::new(4.0, 5.0)]).unwrap();
        let sample = CalibrationSample::new("sample02", "cb_9x6", "arm_chain", vec![cam], Vec::new()).unwrap();

        let json = serde_json::to_string(&sample).unwrap();
        let restored: CalibrationSample = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, sample);
    }
}
