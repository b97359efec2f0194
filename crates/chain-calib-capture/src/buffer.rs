//! Per-group state cells with freshness flags.
//!
//! Every sensor group owns one [`StreamBuffer`]. Its delivery path replaces
//! the buffered value and raises the freshness flag in a single locked update;
//! the collector clears the flags at the start of a capture and then blocks on
//! the shared [`UpdateSignal`] until all flags are raised again.

use crate::CaptureError;
use log::debug;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wake-up signal shared by all buffers of one collector.
///
/// Every fresh transition bumps an epoch counter and wakes all waiters.
#[derive(Debug, Default)]
pub struct UpdateSignal {
    epoch: Mutex<u64>,
    condvar: Condvar,
}

impl UpdateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn notify(&self) {
        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.condvar.notify_all();
    }

    /// Number of notifications so far.
    pub fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    /// Block until every flag in `flags` is fresh.
    ///
    /// Flags are re-checked whenever a buffer signals and at least every
    /// `poll_interval`. With `timeout == None` the wait is unbounded.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::SensorsUnavailable`] listing the still-stale groups
    ///   once `timeout` elapses,
    /// - [`CaptureError::Cancelled`] if `cancel` fires.
    pub fn wait_all_fresh(
        &self,
        flags: &[&dyn FreshnessFlag],
        poll_interval: Duration,
        timeout: Option<Duration>,
        cancel: Option<&CancelToken>,
    ) -> Result<(), CaptureError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut epoch = self.epoch.lock();
        loop {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(CaptureError::Cancelled);
            }
            let missing = stale_groups(flags);
            if missing.is_empty() {
                return Ok(());
            }

            let mut wait = poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(CaptureError::SensorsUnavailable { missing });
                }
                wait = wait.min(deadline - now);
            }
            self.condvar.wait_for(&mut epoch, wait);
        }
    }
}

fn stale_groups(flags: &[&dyn FreshnessFlag]) -> Vec<String> {
    flags
        .iter()
        .filter(|f| !f.is_fresh())
        .map(|f| f.name().to_string())
        .collect()
}

/// Cooperative cancellation for a blocked capture.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    signal: Arc<UpdateSignal>,
}

impl CancelToken {
    pub fn new(signal: Arc<UpdateSignal>) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            signal,
        }
    }

    /// Request cancellation and wake any waiter.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.signal.notify();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

/// Type-erased view of a buffer's freshness flag.
pub trait FreshnessFlag: Send + Sync {
    fn name(&self) -> &str;
    fn is_fresh(&self) -> bool;
    fn clear_fresh(&self);
}

#[derive(Debug)]
struct Slot<T> {
    value: Option<Arc<T>>,
    fresh: bool,
    updates: u64,
}

/// Latest complete bundle of one sensor group plus its freshness flag.
#[derive(Debug)]
pub struct StreamBuffer<T> {
    name: String,
    slot: Mutex<Slot<T>>,
    signal: Arc<UpdateSignal>,
}

impl<T> StreamBuffer<T> {
    pub fn new(name: impl Into<String>, signal: Arc<UpdateSignal>) -> Self {
        Self {
            name: name.into(),
            slot: Mutex::new(Slot {
                value: None,
                fresh: false,
                updates: 0,
            }),
            signal,
        }
    }

    pub fn shared(name: impl Into<String>, signal: Arc<UpdateSignal>) -> Arc<Self> {
        Arc::new(Self::new(name, signal))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the buffered value and mark it fresh.
    pub fn publish(&self, value: T) {
        {
            let mut slot = self.slot.lock();
            slot.value = Some(Arc::new(value));
            slot.fresh = true;
            slot.updates += 1;
        }
        self.signal.notify();
    }

    /// Most recent value, fresh or not.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.slot.lock().value.clone()
    }

    /// Return the value if it is fresh and clear the flag.
    pub fn take_fresh(&self) -> Option<Arc<T>> {
        let mut slot = self.slot.lock();
        if !slot.fresh {
            return None;
        }
        slot.fresh = false;
        slot.value.clone()
    }

    /// Total number of values published into this buffer.
    pub fn update_count(&self) -> u64 {
        self.slot.lock().updates
    }
}

impl<T: Send + Sync> FreshnessFlag for StreamBuffer<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_fresh(&self) -> bool {
        self.slot.lock().fresh
    }

    fn clear_fresh(&self) {
        debug!("clearing freshness of {}", self.name);
        self.slot.lock().fresh = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn publish_sets_fresh_once() {
        let signal = UpdateSignal::shared();
        let buf = StreamBuffer::new("left", signal.clone());
        assert!(!buf.is_fresh());
        assert!(buf.latest().is_none());

        buf.publish(7);
        assert!(buf.is_fresh());
        assert_eq!(signal.epoch(), 1);
        assert_eq!(buf.take_fresh().as_deref(), Some(&7));
        assert!(!buf.is_fresh());
        assert!(buf.take_fresh().is_none());
        assert_eq!(buf.latest().as_deref(), Some(&7));
    }

    #[test]
    fn clear_keeps_value() {
        let buf = StreamBuffer::new("arm_chain", UpdateSignal::shared());
        buf.publish("a");
        buf.publish("b");
        buf.clear_fresh();
        assert!(!buf.is_fresh());
        assert_eq!(buf.latest().as_deref(), Some(&"b"));
        assert_eq!(buf.update_count(), 2);
    }

    #[test]
    fn wait_returns_when_all_groups_refresh() {
        let signal = UpdateSignal::shared();
        let a = StreamBuffer::shared("a", signal.clone());
        let b = StreamBuffer::shared("b", signal.clone());

        let (a2, b2) = (a.clone(), b.clone());
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            a2.publish(1u32);
            thread::sleep(Duration::from_millis(10));
            b2.publish(2u32);
        });

        let flags: [&dyn FreshnessFlag; 2] = [&*a, &*b];
        let result = signal.wait_all_fresh(
            &flags,
            Duration::from_millis(5),
            Some(Duration::from_secs(5)),
            None,
        );
        assert!(result.is_ok(), "{result:?}");
        producer.join().unwrap();
    }

    #[test]
    fn timeout_names_stale_groups() {
        let signal = UpdateSignal::shared();
        let a = StreamBuffer::new("left", signal.clone());
        let b = StreamBuffer::<()>::new("right", signal.clone());
        a.publish(());

        let start = Instant::now();
        let err = signal
            .wait_all_fresh(
                &[&a, &b],
                Duration::from_millis(2),
                Some(Duration::from_millis(20)),
                None,
            )
            .unwrap_err();
        assert!(start.elapsed() >= Duration::from_millis(19));
        assert_eq!(
            err,
            CaptureError::SensorsUnavailable {
                missing: vec!["right".into()]
            }
        );
    }

    #[test]
    fn cancel_unblocks_waiter() {
        let signal = UpdateSignal::shared();
        let buf = Arc::new(StreamBuffer::<u8>::new("kinect_rgb", signal.clone()));
        let token = CancelToken::new(signal.clone());

        let t2 = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            t2.cancel();
        });

        let err = signal
            .wait_all_fresh(&[&*buf], Duration::from_secs(1), None, Some(&token))
            .unwrap_err();
        assert_eq!(err, CaptureError::Cancelled);
        canceller.join().unwrap();

        token.reset();
        assert!(!token.is_cancelled());
    }
}
