//! Per-iteration event recorder.
//!
//! The `Recorder` is the sink user code (or nested tasks it spawns) talks
//! to via `record_panic`/`record_recursion_depth`. Events fan out to every
//! validator that implements the corresponding sink, serialized under a
//! short lock the way the teacher's `FaultInjector::pattern_state` guards
//! its own small bit of shared state (`fault.rs`).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::validator::{EventSink, Validator};

/// Fresh once per iteration. Broadcasts panic and recursion-depth events
/// to every registered sink.
#[derive(Default)]
pub struct Recorder {
    sinks: Mutex<Vec<Arc<dyn EventSink>>>,
}

impl Recorder {
    /// Build a recorder fanning out to the given validators' event
    /// sinks (validators that don't implement one are simply absent
    /// from the list).
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self {
            sinks: Mutex::new(sinks),
        }
    }

    /// Record a panic occurrence (message text, if recovered).
    pub fn record_panic(&self, message: &str) {
        let sinks = self.sinks.lock().clone();
        for sink in &sinks {
            sink.record_panic(message);
        }
    }

    /// Record a recursion-depth sample.
    pub fn record_recursion_depth(&self, depth: usize) {
        let sinks = self.sinks.lock().clone();
        for sink in &sinks {
            sink.record_recursion(depth);
        }
    }

    /// Build a recorder fanning out to whichever of the given validators
    /// expose an event sink. `Validator::as_event_sink` is borrowed
    /// (`&self`) so it stays callable through a `dyn Validator<T>`
    /// object; this wraps each validator's owning `Arc` in a small
    /// forwarding adapter to get an owned, `'static` `Arc<dyn
    /// EventSink>` per the iteration-scoped `Recorder` this feeds.
    pub fn from_validators<T: Send + Sync + 'static>(validators: &[Arc<dyn Validator<T>>]) -> Self {
        let sinks = validators
            .iter()
            .filter(|v| v.as_event_sink().is_some())
            .map(|v| Arc::new(ValidatorSink(v.clone())) as Arc<dyn EventSink>)
            .collect();
        Self::new(sinks)
    }
}

struct ValidatorSink<T: Send + Sync + 'static>(Arc<dyn Validator<T>>);

impl<T: Send + Sync + 'static> EventSink for ValidatorSink<T> {
    fn record_panic(&self, message: &str) {
        if let Some(sink) = self.0.as_event_sink() {
            sink.record_panic(message);
        }
    }

    fn record_recursion(&self, depth: usize) {
        if let Some(sink) = self.0.as_event_sink() {
            sink.record_recursion(depth);
        }
    }
}
