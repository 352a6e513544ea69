//! Allocation tracing, for diagnosing leaked objects during development.
//!
//! Every shared memory object reports one `allocated` event when it is constructed and one
//! `deallocated` event when it is dropped, keyed by its name. Objects are handed a tracer through
//! [`ShmOptions::tracer`](crate::ShmOptions::tracer); by default they get a [`NoopTracer`].
//!
//! ```
//! use std::sync::Arc;
//! use shm_ptr::tracer::CountingTracer;
//!
//! let tracer = Arc::new(CountingTracer::new("my-service"));
//! let mut options = shm_ptr::ShmOptions::new();
//! options.tracer(tracer.clone());
//! // .. open objects through `options`, then:
//! print!("{}", shm_ptr::tracer::AllocationTracer::report(&*tracer));
//! ```
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, PoisonError};

use crate::trace::debug;

/// Receives allocation events.
pub trait AllocationTracer: Send + Sync {
    /// The resource `key` was allocated.
    fn allocated(&self, key: &str);
    /// The resource `key` was released.
    fn deallocated(&self, key: &str);
    /// A free-form annotation about an address.
    fn note(&self, message: &str, address: *const u8);
    /// A textual summary of what was recorded.
    fn report(&self) -> String;
}

/// Ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTracer;

impl AllocationTracer for NoopTracer {
    fn allocated(&self, _: &str) {}

    fn deallocated(&self, _: &str) {}

    fn note(&self, _: &str, _: *const u8) {}

    fn report(&self) -> String {
        String::new()
    }
}

/// Counts allocations per key.
///
/// Each allocation increments the count of its key, each deallocation decrements it. A key
/// that does not return to zero has leaked, or been released more often than acquired. Records
/// are never removed so this grows with the number of distinct keys; it is meant for short
/// debugging sessions.
#[derive(Debug)]
pub struct CountingTracer {
    tag: String,
    counts: Mutex<BTreeMap<String, i64>>,
}

impl CountingTracer {
    pub fn new(tag: impl Into<String>) -> Self {
        CountingTracer {
            tag: tag.into(),
            counts: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The current count of `key`, zero if it was never seen.
    pub fn count(&self, key: &str) -> i64 {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.get(key).copied().unwrap_or(0)
    }

    fn add(&self, key: &str, delta: i64) -> i64 {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let count = counts.entry(key.to_owned()).or_insert(0);
        *count += delta;
        *count
    }
}

// The counts and annotations are only read by the log macros.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
impl AllocationTracer for CountingTracer {
    fn allocated(&self, key: &str) {
        let count = self.add(key, 1);
        debug!(tag = %self.tag, key, count, "allocated");
    }

    fn deallocated(&self, key: &str) {
        let count = self.add(key, -1);
        debug!(tag = %self.tag, key, count, "deallocated");
    }

    fn note(&self, message: &str, address: *const u8) {
        debug!(tag = %self.tag, ?address, "{message}");
    }

    fn report(&self) -> String {
        let counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let mut report = String::new();

        let _ = writeln!(
            report,
            "allocation tracer report: tag: {} records: {}",
            self.tag,
            counts.len()
        );

        for (key, count) in counts.iter() {
            let _ = writeln!(report, "\t{key}: count: {count}");
        }

        report
    }
}
