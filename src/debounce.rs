//! Debounced input processing
//!
//! Bursts of `input_changed` calls collapse into one call of the processor,
//! with the last value, once the input has been quiet for the configured
//! delay. `input_done` skips the wait. A value equal to the one processed
//! last is never processed twice in a row.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::config::DebounceConfig;

type Processor<T> = Arc<dyn Fn(T) + Send + Sync>;

struct Slot<T> {
    last_processed: Option<T>,
    /// Whether any input has arrived yet
    started: bool,
}

struct Inner<T> {
    /// Bumped on every change; a timer only fires if it still holds the
    /// value it was started with
    seq: AtomicU64,
    slot: Mutex<Slot<T>>,
    config: DebounceConfig,
    processor: Processor<T>,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Collapses rapid input into single processing calls
pub struct Debouncer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Debouncer {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("seq", &self.inner.seq.load(Ordering::Acquire))
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    pub fn new<F>(config: DebounceConfig, processor: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Debouncer {
            inner: Arc::new(Inner {
                seq: AtomicU64::new(0),
                slot: Mutex::new(Slot {
                    last_processed: None,
                    started: false,
                }),
                config,
                processor: Arc::new(processor),
            }),
        }
    }

    /// Schedule `value` for processing after the quiet period, replacing
    /// whatever was pending. The very first value goes through at once
    /// when `immediate_first` is set. Must be called inside a tokio runtime.
    pub fn input_changed(&self, value: T) -> JoinHandle<()> {
        let (seq, delay) = {
            let mut slot = self.inner.lock();
            let seq = self.inner.seq.fetch_add(1, Ordering::AcqRel) + 1;
            let delay = if !slot.started && self.inner.config.immediate_first {
                std::time::Duration::ZERO
            } else {
                self.inner.config.delay
            };
            slot.started = true;
            (seq, delay)
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            fire(&inner, seq, value);
        })
    }

    /// Process `value` now, dropping anything still waiting
    pub fn input_done(&self, value: T) {
        let seq = {
            let mut slot = self.inner.lock();
            slot.started = true;
            self.inner.seq.fetch_add(1, Ordering::AcqRel) + 1
        };
        fire(&self.inner, seq, value);
    }

    /// Drop anything still waiting
    pub fn cancel(&self) {
        let _slot = self.inner.lock();
        self.inner.seq.fetch_add(1, Ordering::AcqRel);
    }

    /// The value handed to the processor most recently
    pub fn last_processed(&self) -> Option<T> {
        self.inner.lock().last_processed.clone()
    }
}

fn fire<T: Clone + PartialEq>(inner: &Inner<T>, seq: u64, value: T) {
    {
        let mut slot = inner.lock();
        if inner.seq.load(Ordering::Acquire) != seq {
            log::trace!("debounced value {} superseded", seq);
            return;
        }
        if slot.last_processed.as_ref() == Some(&value) {
            log::trace!("debounced value {} unchanged, skipped", seq);
            return;
        }
        slot.last_processed = Some(value.clone());
    }
    (inner.processor)(value);
}
