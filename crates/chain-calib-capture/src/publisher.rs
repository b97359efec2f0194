//! Outbound side of the collector.

use crate::PublishError;
use chain_calib_core::{CalibrationSample, Image};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

/// Sink for emitted samples and best-effort debug image echoes.
pub trait SamplePublisher: Send + Sync {
    fn publish_sample(&self, sample: &CalibrationSample) -> Result<(), PublishError>;

    /// Must not block.
    fn publish_debug_image(&self, camera_id: &str, image: &Image) -> Result<(), PublishError>;
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl SamplePublisher for NullPublisher {
    fn publish_sample(&self, _sample: &CalibrationSample) -> Result<(), PublishError> {
        Ok(())
    }

    fn publish_debug_image(&self, _camera_id: &str, _image: &Image) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Debug copy of one camera's color image.
#[derive(Debug, Clone)]
pub struct DebugImage {
    pub camera_id: String,
    pub image: Image,
}

/// Publishes onto crossbeam channels.
///
/// Samples go to an unbounded channel; debug images to a bounded one and are
/// dropped when it is full.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    samples: Sender<CalibrationSample>,
    images: Sender<DebugImage>,
}

impl ChannelPublisher {
    pub fn new(image_capacity: usize) -> (Self, Receiver<CalibrationSample>, Receiver<DebugImage>) {
        let (samples, sample_rx) = unbounded();
        let (images, image_rx) = bounded(image_capacity.max(1));
        (Self { samples, images }, sample_rx, image_rx)
    }
}

impl SamplePublisher for ChannelPublisher {
    fn publish_sample(&self, sample: &CalibrationSample) -> Result<(), PublishError> {
        self.samples
            .send(sample.clone())
            .map_err(|_| PublishError::Disconnected)
    }

    fn publish_debug_image(&self, camera_id: &str, image: &Image) -> Result<(), PublishError> {
        let msg = DebugImage {
            camera_id: camera_id.to_string(),
            image: image.clone(),
        };
        self.images.try_send(msg).map_err(|err| match err {
            TrySendError::Full(_) => PublishError::Full,
            TrySendError::Disconnected(_) => PublishError::Disconnected,
        })
    }
}
