//! Inbound message shapes.
//!
//! These mirror the fields the collector actually reads from the camera and
//! joint-state streams; transport framing is left to the caller.

use serde::{Deserialize, Serialize};

/// Timestamp split into whole seconds and nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i64,
    pub nanosec: u32,
}

impl Stamp {
    pub fn new(sec: i64, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    /// Build a stamp from fractional seconds.
    pub fn from_secs_f64(t: f64) -> Self {
        let sec = t.floor();
        let nanosec = ((t - sec) * 1e9).round().min(999_999_999.0) as u32;
        Self {
            sec: sec as i64,
            nanosec,
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 * 1e-9
    }
}

/// Common message header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Stamp,
    #[serde(default)]
    pub frame_id: String,
}

impl Header {
    pub fn new(stamp: Stamp, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// Camera calibration metadata delivered alongside every image.
///
/// Matrices are row-major: `k` is 3×3, `r` is 3×3 and `p` is 3×4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub distortion_model: String,
    #[serde(default)]
    pub d: Vec<f64>,
    pub k: [f64; 9],
    pub r: [f64; 9],
    pub p: [f64; 12],
}

impl CameraInfo {
    /// Pinhole metadata with no distortion and identity rectification.
    pub fn pinhole(
        header: Header,
        width: u32,
        height: u32,
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
    ) -> Self {
        Self {
            header,
            width,
            height,
            distortion_model: "plumb_bob".to_string(),
            d: vec![0.0; 5],
            k: [fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0],
            r: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            p: [fx, 0.0, cx, 0.0, 0.0, fy, cy, 0.0, 0.0, 0.0, 1.0, 0.0],
        }
    }

    pub fn fx(&self) -> f64 {
        self.k[0]
    }

    pub fn fy(&self) -> f64 {
        self.k[4]
    }

    pub fn cx(&self) -> f64 {
        self.k[2]
    }

    pub fn cy(&self) -> f64 {
        self.k[5]
    }
}

/// Pixel layout of an [`Image`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Mono8,
    Mono16,
    Rgb8,
    Bgr8,
    Rgba8,
    Bgra8,
}

impl ImageEncoding {
    /// Bytes per pixel.
    pub fn pixel_size(self) -> usize {
        match self {
            ImageEncoding::Mono8 => 1,
            ImageEncoding::Mono16 => 2,
            ImageEncoding::Rgb8 | ImageEncoding::Bgr8 => 3,
            ImageEncoding::Rgba8 | ImageEncoding::Bgra8 => 4,
        }
    }
}

/// Raw image message. `step` is the row length in bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub header: Header,
    pub width: u32,
    pub height: u32,
    pub encoding: ImageEncoding,
    pub step: u32,
    /// Mono16 payloads are little-endian.
    pub data: Vec<u8>,
}

impl Image {
    /// Tightly packed image (`step = width * pixel_size`).
    pub fn packed(
        header: Header,
        width: u32,
        height: u32,
        encoding: ImageEncoding,
        data: Vec<u8>,
    ) -> Self {
        Self {
            header,
            width,
            height,
            encoding,
            step: width * encoding.pixel_size() as u32,
            data,
        }
    }
}

/// Joint-state broadcast covering an arbitrary subset of the robot's joints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    pub header: Header,
    pub name: Vec<String>,
    pub position: Vec<f64>,
}

impl JointState {
    pub fn contains(&self, joint: &str) -> bool {
        self.name.iter().any(|n| n == joint)
    }

    /// Position of `joint`, looked up by name.
    pub fn position_of(&self, joint: &str) -> Option<f64> {
        let idx = self.name.iter().position(|n| n == joint)?;
        self.position.get(idx).copied()
    }
}

/// Time-synchronized camera messages for one camera group.
///
/// Stereo cameras deliver all three parts; RGB-only sensors have no
/// rectified mono image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraBundle {
    pub info: CameraInfo,
    pub color: Image,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Image>,
}

impl CameraBundle {
    pub fn stamp(&self) -> Stamp {
        self.info.header.stamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_secs_conversion() {
        let s = Stamp::from_secs_f64(12.25);
        assert_eq!(s.sec, 12);
        assert_eq!(s.nanosec, 250_000_000);
        assert!((s.as_secs_f64() - 12.25).abs() < 1e-9);
        assert!(Stamp::new(1, 5) < Stamp::new(2, 0));
    }

    #[test]
    fn joint_state_lookup_by_name() {
        let js = JointState {
            header: Header::default(),
            name: vec!["a".into(), "b".into()],
            position: vec![0.5, -1.0],
        };
        assert!(js.contains("b"));
        assert_eq!(js.position_of("b"), Some(-1.0));
        assert_eq!(js.position_of("c"), None);
    }

    #[test]
    fn encoding_serializes_lowercase() {
        let json = serde_json::to_string(&ImageEncoding::Bgr8).unwrap();
        assert_eq!(json, "\"bgr8\"");
    }
}
