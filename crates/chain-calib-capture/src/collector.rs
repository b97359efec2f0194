//! One-shot sample capture across all camera and chain groups.

use crate::{
    to_mono8, CameraConfig, CancelToken, CaptureError, CollectorConfig, ConfigError, DetectSource,
    FeatureDetector, FreshnessFlag, JointStateRouter, PatternSize, SamplePublisher, StreamBuffer,
    TimingConfig, UpdateSignal,
};
use chain_calib_core::{
    CalibrationSample, CameraBundle, CameraObservation, ChainObservation, Image,
};
use log::{debug, info, warn};
use std::sync::Arc;

/// Delivery handle for one camera group.
#[derive(Debug, Clone)]
pub struct CameraInput {
    config: CameraConfig,
    buffer: Arc<StreamBuffer<CameraBundle>>,
}

impl CameraInput {
    pub fn new(config: CameraConfig, signal: Arc<UpdateSignal>) -> Self {
        let buffer = StreamBuffer::shared(config.camera_id.clone(), signal);
        Self { config, buffer }
    }

    pub fn camera_id(&self) -> &str {
        &self.config.camera_id
    }

    pub fn detect_on(&self) -> DetectSource {
        self.config.detect_on
    }

    pub fn buffer(&self) -> Arc<StreamBuffer<CameraBundle>> {
        Arc::clone(&self.buffer)
    }

    /// Delivery callback for a time-synchronized camera bundle.
    pub fn deliver(&self, bundle: CameraBundle) {
        self.buffer.publish(bundle);
    }
}

/// Delivery side of a collector: one input per camera plus the joint router.
#[derive(Debug)]
pub struct SensorInputs {
    pub cameras: Vec<CameraInput>,
    pub joints: JointStateRouter,
}

impl SensorInputs {
    pub fn camera(&self, camera_id: &str) -> Option<&CameraInput> {
        self.cameras.iter().find(|c| c.camera_id() == camera_id)
    }
}

/// Produces one [`CalibrationSample`] per capture request.
pub struct SampleCollector {
    cameras: Vec<CameraInput>,
    chains: Vec<Arc<StreamBuffer<ChainObservation>>>,
    detector: Arc<dyn FeatureDetector>,
    publisher: Arc<dyn SamplePublisher>,
    signal: Arc<UpdateSignal>,
    timing: TimingConfig,
}

impl SampleCollector {
    /// Build a collector and the matching delivery handles from `config`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] reported by [`CollectorConfig::validate`].
    pub fn from_config(
        config: &CollectorConfig,
        detector: Arc<dyn FeatureDetector>,
        publisher: Arc<dyn SamplePublisher>,
    ) -> Result<(Self, SensorInputs), ConfigError> {
        config.validate()?;
        let signal = UpdateSignal::shared();
        let cameras: Vec<CameraInput> = config
            .cameras
            .iter()
            .map(|c| CameraInput::new(c.clone(), Arc::clone(&signal)))
            .collect();
        let joints = JointStateRouter::from_config(&config.chains, &signal)?;

        let collector = Self {
            cameras: cameras.clone(),
            chains: joints.buffers(),
            detector,
            publisher,
            signal,
            timing: config.timing.clone(),
        };
        Ok((collector, SensorInputs { cameras, joints }))
    }

    pub fn signal(&self) -> Arc<UpdateSignal> {
        Arc::clone(&self.signal)
    }

    /// Token that aborts a capture blocked in the freshness wait.
    pub fn cancel_token(&self) -> CancelToken {
        CancelToken::new(self.signal())
    }

    pub fn camera_ids(&self) -> impl Iterator<Item = &str> {
        self.cameras.iter().map(CameraInput::camera_id)
    }

    /// Capture one sample.
    ///
    /// # Errors
    ///
    /// See [`SampleCollector::capture_with_cancel`].
    pub fn capture(
        &self,
        sample_id: &str,
        target_id: &str,
        chain_id: &str,
        pattern: PatternSize,
    ) -> Result<CalibrationSample, CaptureError> {
        self.run_capture(sample_id, target_id, chain_id, pattern, None)
    }

    /// Capture one sample, giving up early if `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::InvalidRequest`] for empty ids or an empty pattern,
    /// - [`CaptureError::SensorsUnavailable`] / [`CaptureError::Cancelled`]
    ///   from the freshness wait,
    /// - [`CaptureError::DetectionFailure`] for the first camera without a
    ///   pattern; nothing is published in that case,
    /// - [`CaptureError::SkewExceeded`] when a skew limit is configured.
    pub fn capture_with_cancel(
        &self,
        sample_id: &str,
        target_id: &str,
        chain_id: &str,
        pattern: PatternSize,
        cancel: &CancelToken,
    ) -> Result<CalibrationSample, CaptureError> {
        self.run_capture(sample_id, target_id, chain_id, pattern, Some(cancel))
    }

    fn run_capture(
        &self,
        sample_id: &str,
        target_id: &str,
        chain_id: &str,
        pattern: PatternSize,
        cancel: Option<&CancelToken>,
    ) -> Result<CalibrationSample, CaptureError> {
        validate_request(sample_id, target_id, chain_id, pattern)?;

        self.wait_for_fresh_data(cancel)?;

        let bundles = self
            .cameras
            .iter()
            .map(|cam| latest(&cam.buffer).map(|b| (cam, b)))
            .collect::<Result<Vec<_>, _>>()?;
        let chains = self
            .chains
            .iter()
            .map(|buf| latest(buf).map(|obs| obs.as_ref().clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut cameras = Vec::with_capacity(bundles.len());
        for (cam, bundle) in &bundles {
            cameras.push(self.detect(cam, bundle, pattern)?);
        }

        let sample = CalibrationSample::new(sample_id, target_id, chain_id, cameras, chains)
            .map_err(invalid_sample)?;

        if let Some(limit_s) = self.timing.max_skew_s {
            let skew_s = sample.time_skew();
            if skew_s > limit_s {
                warn!("sample {sample_id}: time skew {skew_s:.3}s over limit {limit_s:.3}s");
                return Err(CaptureError::SkewExceeded { skew_s, limit_s });
            }
        }

        for (cam, bundle) in &bundles {
            self.publish_debug(cam.camera_id(), &bundle.color);
        }
        if let Err(err) = self.publisher.publish_sample(&sample) {
            warn!("sample {sample_id} not published: {err}");
        }
        info!(
            "captured {sample_id}: {} cameras, {} chains",
            sample.cameras.len(),
            sample.chains.len()
        );
        Ok(sample)
    }

    fn wait_for_fresh_data(&self, cancel: Option<&CancelToken>) -> Result<(), CaptureError> {
        let flags: Vec<&dyn FreshnessFlag> = self
            .cameras
            .iter()
            .map(|c| &*c.buffer as &dyn FreshnessFlag)
            .chain(self.chains.iter().map(|b| &**b as &dyn FreshnessFlag))
            .collect();
        for flag in &flags {
            flag.clear_fresh();
        }
        self.signal.wait_all_fresh(
            &flags,
            self.timing.poll_interval(),
            self.timing.wait_timeout(),
            cancel,
        )
    }

    fn detect(
        &self,
        cam: &CameraInput,
        bundle: &CameraBundle,
        pattern: PatternSize,
    ) -> Result<CameraObservation, CaptureError> {
        let camera_id = cam.camera_id();
        let image = select_image(bundle, cam.detect_on()).ok_or_else(|| CaptureError::MissingImage {
            camera_id: camera_id.to_string(),
            detect_on: cam.detect_on(),
        })?;
        let mono = to_mono8(image).map_err(|source| CaptureError::Image {
            camera_id: camera_id.to_string(),
            source,
        })?;

        let corners = self
            .detector
            .find_corners(&mono, pattern)
            .filter(|c| !c.is_empty());
        let Some(image_points) = corners else {
            warn!("pattern not found: {camera_id}");
            return Err(CaptureError::DetectionFailure {
                camera_id: camera_id.to_string(),
            });
        };
        debug!("pattern found: {camera_id} ({} corners)", image_points.len());

        CameraObservation::new(camera_id, bundle.info.clone(), image_points).map_err(invalid_sample)
    }

    fn publish_debug(&self, camera_id: &str, image: &Image) {
        if let Err(err) = self.publisher.publish_debug_image(camera_id, image) {
            debug!("debug image for {camera_id} dropped: {err}");
        }
    }
}

fn validate_request(
    sample_id: &str,
    target_id: &str,
    chain_id: &str,
    pattern: PatternSize,
) -> Result<(), CaptureError> {
    for (what, id) in [("sample id", sample_id), ("target id", target_id), ("chain id", chain_id)] {
        if id.is_empty() {
            return Err(CaptureError::InvalidRequest(format!("{what} must not be empty")));
        }
    }
    if !pattern.is_valid() {
        return Err(CaptureError::InvalidRequest(format!(
            "pattern size {}x{} must be positive",
            pattern.cols, pattern.rows
        )));
    }
    Ok(())
}

fn invalid_sample(err: anyhow::Error) -> CaptureError {
    CaptureError::InvalidSample(format!("{err:#}"))
}

fn latest<T>(buffer: &StreamBuffer<T>) -> Result<Arc<T>, CaptureError> {
    buffer
        .latest()
        .ok_or_else(|| CaptureError::SensorsUnavailable {
            missing: vec![buffer.name().to_string()],
        })
}

fn select_image(bundle: &CameraBundle, source: DetectSource) -> Option<&Image> {
    match source {
        DetectSource::Rect => bundle.rect.as_ref(),
        DetectSource::Color => Some(&bundle.color),
    }
}
