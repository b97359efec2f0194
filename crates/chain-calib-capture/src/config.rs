//! Collector configuration.
//!
//! Joint-group orderings are external configuration: they must be supplied
//! before any capture can run, and a missing or empty list is a fatal
//! [`ConfigError`].

use crate::{ConfigError, PatternSize};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Which buffered image a camera runs detection on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectSource {
    /// Rectified mono image (stereo cameras).
    #[default]
    Rect,
    /// Color image (RGB-only sensors).
    Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub camera_id: String,
    #[serde(default)]
    pub detect_on: DetectSource,
}

impl CameraConfig {
    pub fn new(camera_id: impl Into<String>, detect_on: DetectSource) -> Self {
        Self {
            camera_id: camera_id.into(),
            detect_on,
        }
    }
}

/// Ordered joint names of one kinematic chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainGroupConfig {
    pub chain_id: String,
    pub joint_names: Vec<String>,
}

impl ChainGroupConfig {
    pub fn new<S: Into<String>>(
        chain_id: impl Into<String>,
        joint_names: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            joint_names: joint_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.is_empty() {
            return Err(ConfigError::EmptyId("chain id"));
        }
        if self.joint_names.is_empty() {
            return Err(ConfigError::NoJointNames {
                chain_id: self.chain_id.clone(),
            });
        }
        let mut seen = HashSet::new();
        for joint in &self.joint_names {
            if !seen.insert(joint.as_str()) {
                return Err(ConfigError::DuplicateJoint {
                    chain_id: self.chain_id.clone(),
                    joint: joint.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Wait and consistency settings for a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Re-check interval of the freshness wait.
    pub poll_interval_ms: u64,
    /// Give up waiting for fresh data after this long. `None` waits forever.
    pub wait_timeout_ms: Option<u64>,
    /// Maximum spread of observation stamps within one sample.
    pub max_skew_s: Option<f64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            wait_timeout_ms: None,
            max_skew_s: None,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}

/// Full collector configuration, usually loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Cameras in registration order; detection runs in this order.
    pub cameras: Vec<CameraConfig>,
    /// Chain groups in the order they appear in each sample.
    pub chains: Vec<ChainGroupConfig>,
    pub target_id: String,
    /// Chain the calibration target is attached to.
    pub chain_id: String,
    pub pattern: PatternSize,
    pub sample_prefix: String,
    pub first_sample_index: u32,
    pub timing: TimingConfig,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            cameras: vec![
                CameraConfig::new("left", DetectSource::Rect),
                CameraConfig::new("right", DetectSource::Rect),
                CameraConfig::new("kinect_rgb", DetectSource::Color),
            ],
            chains: Vec::new(),
            target_id: "cb_9x6".to_string(),
            chain_id: "arm_chain".to_string(),
            pattern: PatternSize::new(9, 6),
            sample_prefix: "sample".to_string(),
            first_sample_index: 1,
            timing: TimingConfig::default(),
        }
    }
}

impl CollectorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cameras.is_empty() {
            return Err(ConfigError::NoCameras);
        }
        let mut cameras = HashSet::new();
        for cam in &self.cameras {
            if cam.camera_id.is_empty() {
                return Err(ConfigError::EmptyId("camera id"));
            }
            if !cameras.insert(cam.camera_id.as_str()) {
                return Err(ConfigError::DuplicateCamera(cam.camera_id.clone()));
            }
        }

        if self.chains.is_empty() {
            return Err(ConfigError::NoChains);
        }
        let mut chains = HashSet::new();
        for chain in &self.chains {
            chain.validate()?;
            if !chains.insert(chain.chain_id.as_str()) {
                return Err(ConfigError::DuplicateChain(chain.chain_id.clone()));
            }
        }

        if self.target_id.is_empty() {
            return Err(ConfigError::EmptyId("target id"));
        }
        if self.sample_prefix.is_empty() {
            return Err(ConfigError::EmptyId("sample prefix"));
        }
        if !chains.contains(self.chain_id.as_str()) {
            return Err(ConfigError::UnknownTargetChain(self.chain_id.clone()));
        }
        if !self.pattern.is_valid() {
            return Err(ConfigError::InvalidPattern {
                cols: self.pattern.cols,
                rows: self.pattern.rows,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CollectorConfig {
        CollectorConfig {
            chains: vec![
                ChainGroupConfig::new("torso_chain", ["torso_lower", "torso_upper"]),
                ChainGroupConfig::new("arm_chain", ["arm_1", "arm_2", "arm_3"]),
            ],
            ..CollectorConfig::default()
        }
    }

    #[test]
    fn default_cameras_match_robot_layout() {
        let cfg = CollectorConfig::default();
        let ids: Vec<_> = cfg.cameras.iter().map(|c| c.camera_id.as_str()).collect();
        assert_eq!(ids, ["left", "right", "kinect_rgb"]);
        assert_eq!(cfg.cameras[2].detect_on, DetectSource::Color);
        assert_eq!(cfg.timing.poll_interval(), Duration::from_millis(5));
        assert_eq!(cfg.timing.wait_timeout(), None);
    }

    #[test]
    fn missing_joint_names_are_fatal() {
        assert_eq!(CollectorConfig::default().validate(), Err(ConfigError::NoChains));

        let mut cfg = valid();
        cfg.chains[0].joint_names.clear();
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NoJointNames {
                chain_id: "torso_chain".into()
            })
        );
    }

    #[test]
    fn rejects_inconsistent_ids() {
        assert!(valid().validate().is_ok());

        let mut cfg = valid();
        cfg.cameras.push(CameraConfig::new("left", DetectSource::Rect));
        assert_eq!(cfg.validate(), Err(ConfigError::DuplicateCamera("left".into())));

        let mut cfg = valid();
        cfg.chain_id = "leg_chain".into();
        assert_eq!(cfg.validate(), Err(ConfigError::UnknownTargetChain("leg_chain".into())));

        let mut cfg = valid();
        cfg.pattern = PatternSize::new(0, 6);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidPattern { .. })));

        let mut cfg = valid();
        cfg.chains[1].joint_names.push("arm_1".into());
        assert!(matches!(cfg.validate(), Err(ConfigError::DuplicateJoint { .. })));
    }

    #[test]
    fn json_with_defaults() {
        let json = r#"{
            "chains": [
                {"chain_id": "arm_chain", "joint_names": ["a", "b"]}
            ],
            "timing": {"wait_timeout_ms": 2000}
        }"#;
        let cfg: CollectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.cameras.len(), 3);
        assert_eq!(cfg.pattern, PatternSize::new(9, 6));
        assert_eq!(cfg.timing.poll_interval_ms, 5);
        assert_eq!(cfg.timing.wait_timeout(), Some(Duration::from_millis(2000)));
        assert!(cfg.validate().is_ok());
    }
}
