//! Offline sample collection from a recorded sensor log.
//!
//! A replay thread keeps re-delivering the selected frame at the collector's
//! poll interval, the way live drivers keep streaming, while the main thread
//! triggers captures through a [`CaptureService`].

use anyhow::{anyhow, ensure, Context, Result};
use chain_calib_capture::{
    to_mono8, CaptureResponse, CaptureService, CollectorConfig, DetectSource, FeatureDetector,
    PatternSize, PublishError, SampleCollector, SamplePublisher, SensorInputs,
};
use chain_calib_core::{CalibrationSample, CameraBundle, Image, JointState, Pt2};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use image::GrayImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Wait timeout applied when the configuration leaves it unbounded.
pub const DEFAULT_REPLAY_TIMEOUT_MS: u64 = 2_000;

/// One camera bundle as recorded, with the corners found in it (if any).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayCamera {
    pub camera_id: String,
    pub bundle: CameraBundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<Vec<Pt2>>,
}

/// Sensor state at one robot pose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayFrame {
    #[serde(default)]
    pub cameras: Vec<ReplayCamera>,
    #[serde(default)]
    pub joint_states: Vec<JointState>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayLog {
    pub frames: Vec<ReplayFrame>,
}

/// Everything one `collect` run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectReport {
    pub responses: Vec<CaptureResponse>,
    pub samples: Vec<CalibrationSample>,
}

type ImageKey = (u32, u32, Vec<u8>);

fn image_key(image: &GrayImage) -> ImageKey {
    (image.width(), image.height(), image.as_raw().clone())
}

/// Detector answering from corners recorded alongside the replayed images.
#[derive(Debug, Default)]
pub struct RecordedCorners {
    table: HashMap<ImageKey, Vec<Pt2>>,
}

impl RecordedCorners {
    pub fn from_frames(config: &CollectorConfig, frames: &[ReplayFrame]) -> Self {
        let mut table = HashMap::new();
        for cam in frames.iter().flat_map(|f| &f.cameras) {
            let Some(corners) = &cam.corners else {
                continue;
            };
            let Some(cfg) = config.cameras.iter().find(|c| c.camera_id == cam.camera_id) else {
                continue;
            };
            let image = match cfg.detect_on {
                DetectSource::Rect => cam.bundle.rect.as_ref(),
                DetectSource::Color => Some(&cam.bundle.color),
            };
            let Some(image) = image else {
                continue;
            };
            match to_mono8(image) {
                Ok(mono) => {
                    table.insert(image_key(&mono), corners.clone());
                }
                Err(err) => warn!("recorded image of {} unusable: {err}", cam.camera_id),
            }
        }
        Self { table }
    }

    /// Number of distinct detection images with recorded corners.
    pub fn detection_count(&self) -> usize {
        self.table.len()
    }
}

impl FeatureDetector for RecordedCorners {
    fn find_corners(&self, image: &GrayImage, pattern: PatternSize) -> Option<Vec<Pt2>> {
        self.table
            .get(&image_key(image))
            .filter(|c| c.len() == pattern.corner_count())
            .cloned()
    }
}

/// Keeps emitted samples; debug image echoes have no consumer in a replay.
#[derive(Debug, Clone)]
pub struct ReplayPublisher {
    samples: Sender<CalibrationSample>,
}

impl ReplayPublisher {
    pub fn new() -> (Self, Receiver<CalibrationSample>) {
        let (samples, rx) = unbounded();
        (Self { samples }, rx)
    }
}

impl SamplePublisher for ReplayPublisher {
    fn publish_sample(&self, sample: &CalibrationSample) -> Result<(), PublishError> {
        self.samples
            .send(sample.clone())
            .map_err(|_| PublishError::Disconnected)
    }

    fn publish_debug_image(&self, _camera_id: &str, _image: &Image) -> Result<(), PublishError> {
        Ok(())
    }
}

struct ReplayThread {
    select: Sender<usize>,
    ack: Receiver<()>,
    handle: JoinHandle<()>,
}

impl ReplayThread {
    fn spawn(frames: Arc<Vec<ReplayFrame>>, inputs: SensorInputs, tick: Duration) -> Self {
        let (select, select_rx) = unbounded::<usize>();
        let (ack_tx, ack) = unbounded();
        let handle = thread::spawn(move || {
            let mut current = None;
            loop {
                match select_rx.recv_timeout(tick) {
                    Ok(index) => {
                        current = Some(index);
                        if ack_tx.send(()).is_err() {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                if let Some(frame) = current.and_then(|i| frames.get(i)) {
                    deliver(&inputs, frame);
                }
            }
        });
        Self {
            select,
            ack,
            handle,
        }
    }

    /// Switch to `index`; every delivery after this returns is from that frame.
    fn select(&self, index: usize) -> Result<()> {
        self.select
            .send(index)
            .map_err(|_| anyhow!("replay thread stopped"))?;
        self.ack.recv().context("replay thread stopped")
    }

    fn stop(self) -> Result<()> {
        drop(self.select);
        self.handle
            .join()
            .map_err(|_| anyhow!("replay thread panicked"))
    }
}

fn deliver(inputs: &SensorInputs, frame: &ReplayFrame) {
    for cam in &frame.cameras {
        match inputs.camera(&cam.camera_id) {
            Some(input) => input.deliver(cam.bundle.clone()),
            None => debug!("replay: no camera group {}", cam.camera_id),
        }
    }
    for msg in &frame.joint_states {
        // validated up front by check_joint_states
        let _ = inputs.joints.on_joint_state(msg);
    }
}

/// Reject a log whose joint states do not fit the configured chain groups.
fn check_joint_states(inputs: &SensorInputs, frames: &[ReplayFrame]) -> Result<()> {
    for (index, frame) in frames.iter().enumerate() {
        for msg in &frame.joint_states {
            inputs
                .joints
                .check(msg)
                .with_context(|| format!("replay frame {index}: unusable joint state"))?;
        }
    }
    Ok(())
}

/// Trigger `count` captures (default: one per frame) against `log`.
pub fn run_collect(
    mut config: CollectorConfig,
    log: ReplayLog,
    count: Option<usize>,
) -> Result<CollectReport> {
    ensure!(!log.frames.is_empty(), "replay log has no frames");
    config
        .timing
        .wait_timeout_ms
        .get_or_insert(DEFAULT_REPLAY_TIMEOUT_MS);

    let n_frames = log.frames.len();
    let count = count.unwrap_or(n_frames);
    let detector = Arc::new(RecordedCorners::from_frames(&config, &log.frames));
    debug!("{} recorded detections loaded", detector.detection_count());
    let (publisher, samples) = ReplayPublisher::new();
    let (collector, inputs) = SampleCollector::from_config(&config, detector, Arc::new(publisher))
        .context("invalid collector configuration")?;
    check_joint_states(&inputs, &log.frames)?;
    let service = CaptureService::new(collector, &config);

    let replay = ReplayThread::spawn(Arc::new(log.frames), inputs, config.timing.poll_interval());
    let mut responses = Vec::with_capacity(count);
    for i in 0..count {
        replay.select(i % n_frames)?;
        responses.push(service.trigger());
    }
    replay.stop()?;

    let samples: Vec<_> = samples.try_iter().collect();
    info!(
        "replay finished: {} of {} captures succeeded",
        samples.len(),
        responses.len()
    );
    Ok(CollectReport { responses, samples })
}
