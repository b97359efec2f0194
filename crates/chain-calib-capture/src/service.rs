//! Request/response trigger around a [`SampleCollector`].

use crate::{CancelToken, CaptureError, CollectorConfig, PatternSize, SampleCollector};
use chain_calib_core::CalibrationSample;
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Reply to one capture trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub success: bool,
    pub sample_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Capture trigger with an internally incrementing sample counter.
///
/// Every attempt reserves the next index up front, so a failed capture still
/// consumes its identifier. Triggers are serialized: a second caller blocks
/// until the capture in flight finishes, while the counter itself is only
/// locked for the reservation.
pub struct CaptureService {
    collector: SampleCollector,
    target_id: String,
    chain_id: String,
    pattern: PatternSize,
    sample_prefix: String,
    counter: Mutex<u32>,
    in_flight: Mutex<()>,
    cancel: CancelToken,
}

impl CaptureService {
    pub fn new(collector: SampleCollector, config: &CollectorConfig) -> Self {
        let cancel = collector.cancel_token();
        Self {
            collector,
            target_id: config.target_id.clone(),
            chain_id: config.chain_id.clone(),
            pattern: config.pattern,
            sample_prefix: config.sample_prefix.clone(),
            counter: Mutex::new(config.first_sample_index),
            in_flight: Mutex::new(()),
            cancel,
        }
    }

    pub fn collector(&self) -> &SampleCollector {
        &self.collector
    }

    /// Index the next trigger will reserve.
    pub fn next_index(&self) -> u32 {
        *self.counter.lock()
    }

    /// Abort the capture currently blocked waiting for sensor data.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Capture the next sample and return it.
    pub fn trigger_sample(&self) -> (String, Result<CalibrationSample, CaptureError>) {
        let _in_flight = self.in_flight.lock();
        let index = {
            let mut counter = self.counter.lock();
            let index = *counter;
            *counter += 1;
            index
        };
        let sample_id = format!("{}{:02}", self.sample_prefix, index);
        info!("capturing sample {index:02}");

        self.cancel.reset();
        let result = self.collector.capture_with_cancel(
            &sample_id,
            &self.target_id,
            &self.chain_id,
            self.pattern,
            &self.cancel,
        );
        (sample_id, result)
    }

    /// Capture the next sample; failures are folded into the response.
    pub fn trigger(&self) -> CaptureResponse {
        let (sample_id, result) = self.trigger_sample();
        match result {
            Ok(_) => CaptureResponse {
                success: true,
                sample_id,
                error: None,
            },
            Err(err) => {
                warn!("capture of {sample_id} failed: {err}");
                CaptureResponse {
                    success: false,
                    sample_id,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
