//! MusicVerse Audio - Waveform peaks off the interactive thread
//!
//! Architecture:
//! - `peaks`: Pure max-envelope extraction and normalization
//! - `decoder`: `AudioDecoder` seam with a WAV implementation
//! - `protocol`: Correlation-id request/response messages for workers
//! - `worker`: Thread pool plus a client that routes responses by id
//! - `cache`: LRU + on-disk cache of computed peaks
//! - `registry`: "Stop every other player" registry
//! - `WaveformService`: Top-level orchestrator

pub mod cache;
pub mod decoder;
pub mod peaks;
pub mod protocol;
pub mod registry;
pub mod worker;

pub use cache::{CacheEntry, PeakCache, PeakStore};
pub use decoder::{AudioDecoder, DecodedAudio, WavDecoder};
pub use peaks::{compute_peaks, ensure_finite, PeakArray};
pub use protocol::{CorrelationId, WorkerRequest, WorkerResponse};
pub use registry::PlaybackRegistry;
pub use worker::{PeakClient, PeakWorkerPool, PendingPeaks, WorkerOutcome};

use musicverse_core::{Result, StudioConfig};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Cached, worker-backed peak extraction for the waveform views.
pub struct WaveformService {
    client: PeakClient,
    store: Mutex<PeakStore>,
    peak_count: usize,
}

impl WaveformService {
    /// Build from config with a memory-only cache.
    pub fn new(config: &StudioConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Build from config, persisting peaks under `dir`.
    pub fn with_cache_dir(config: &StudioConfig, dir: impl Into<PathBuf>) -> Result<Self> {
        Self::build(config, Some(dir.into()))
    }

    fn build(config: &StudioConfig, dir: Option<PathBuf>) -> Result<Self> {
        config.validate()?;
        let memory = PeakCache::new(
            config.peak_cache_capacity,
            Duration::from_secs(config.peak_cache_ttl_secs),
        )?;
        let store = match dir {
            Some(dir) => PeakStore::with_dir(memory, dir),
            None => PeakStore::in_memory(memory),
        };
        info!(
            threads = config.worker_threads,
            peak_count = config.peak_count,
            "Initializing waveform service"
        );
        Ok(Self {
            client: PeakClient::spawn(config.worker_threads)?,
            store: Mutex::new(store),
            peak_count: config.peak_count,
        })
    }

    /// Peaks for `source_id` at the configured resolution, decoding `bytes`
    /// only on a cache miss.
    pub async fn peaks_for(
        &self,
        source_id: &str,
        bytes: &[u8],
        decoder: &dyn AudioDecoder,
    ) -> Result<CacheEntry> {
        let key = cache_key(source_id, self.peak_count);
        if let Some(entry) = self.store.lock().get(&key) {
            debug!(source_id, peak_count = self.peak_count, "Waveform cache hit");
            return Ok(entry);
        }

        let audio = decoder.decode(bytes)?;
        let duration_secs = audio.duration_secs();
        let peaks = self
            .client
            .request(audio.samples, audio.sample_rate, self.peak_count)?
            .wait()
            .await?;

        Ok(self.store.lock().set(&key, peaks, duration_secs))
    }

    /// Forget all cached peaks.
    pub fn clear_cache(&self) {
        self.store.lock().clear();
    }

    pub fn client(&self) -> &PeakClient {
        &self.client
    }

    pub fn peak_count(&self) -> usize {
        self.peak_count
    }
}

/// Peaks are cached per source and resolution.
fn cache_key(source_id: &str, peak_count: usize) -> String {
    format!("{}#{}", source_id, peak_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_separates_resolutions() {
        assert_ne!(cache_key("track", 10), cache_key("track", 20));
        assert_eq!(cache_key("track", 100), cache_key("track", 100));
    }
}
