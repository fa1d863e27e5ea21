//! Registry of active playback sources.
//!
//! Starting one preview should silence the others. Players register a stop
//! callback under their id; whoever starts playing calls
//! [`PlaybackRegistry::stop_all_except`] with its own id.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type StopCallback = Arc<dyn Fn() + Send + Sync>;

/// Injectable set of stoppable playback sources.
#[derive(Default)]
pub struct PlaybackRegistry {
    sources: Mutex<HashMap<String, StopCallback>>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id`, replacing any previous callback for it.
    pub fn register(&self, id: impl Into<String>, stop: impl Fn() + Send + Sync + 'static) {
        self.sources.lock().insert(id.into(), Arc::new(stop));
    }

    /// Returns whether `id` was registered.
    pub fn unregister(&self, id: &str) -> bool {
        self.sources.lock().remove(id).is_some()
    }

    /// Stop every source other than `id`. Returns how many were stopped.
    pub fn stop_all_except(&self, id: &str) -> usize {
        // Callbacks run unlocked so they may call back into the registry.
        let to_stop: Vec<StopCallback> = self
            .sources
            .lock()
            .iter()
            .filter(|(source, _)| source.as_str() != id)
            .map(|(_, stop)| Arc::clone(stop))
            .collect();
        for stop in &to_stop {
            stop();
        }
        debug!(except = id, stopped = to_stop.len(), "Stopped other playback sources");
        to_stop.len()
    }

    pub fn len(&self) -> usize {
        self.sources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.lock().is_empty()
    }
}
