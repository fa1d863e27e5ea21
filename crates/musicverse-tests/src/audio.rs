//! Integration tests for the waveform pipeline.

use musicverse_audio::protocol::handle_message;
use musicverse_audio::{PeakClient, WavDecoder, WaveformService, WorkerResponse};
use musicverse_core::{ErrorKind, StudioConfig};
use std::io::Cursor;
use std::time::Duration;

fn wav_bytes(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    bytes
}

fn test_config() -> StudioConfig {
    StudioConfig {
        worker_threads: 2,
        peak_count: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn service_decodes_extracts_and_caches() {
    let service = WaveformService::new(&test_config()).unwrap();
    let pattern = [1.0f32, -1.0, 0.5, -0.5];
    let samples: Vec<f32> = (0..1000).map(|i| pattern[i % 4]).collect();
    let bytes = wav_bytes(&samples, 1000);

    let first = service
        .peaks_for("track-1", &bytes, &WavDecoder)
        .await
        .unwrap();
    assert_eq!(first.peaks.len(), 10);
    assert!((first.duration_secs - 1.0).abs() < 1e-9);
    assert!(first.peaks.iter().all(|&p| (0.0..=1.0).contains(&p)));

    // Cache hit: garbage bytes are never decoded.
    let second = service
        .peaks_for("track-1", b"not audio", &WavDecoder)
        .await
        .unwrap();
    assert_eq!(second, first);
}

#[tokio::test]
async fn service_surfaces_decode_errors() {
    let service = WaveformService::new(&test_config()).unwrap();
    let err = service
        .peaks_for("broken", b"not audio", &WavDecoder)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AudioDecode);
}

#[tokio::test]
async fn service_persists_across_instances() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let bytes = wav_bytes(&vec![0.25f32; 4000], 8000);

    let first = {
        let service = WaveformService::with_cache_dir(&test_config(), tmp.path()).unwrap();
        service.peaks_for("stem/vocals", &bytes, &WavDecoder).await.unwrap()
    };

    let service = WaveformService::with_cache_dir(&test_config(), tmp.path()).unwrap();
    let reloaded = service
        .peaks_for("stem/vocals", b"", &WavDecoder)
        .await
        .unwrap();
    assert_eq!(reloaded, first);
}

#[tokio::test]
async fn shared_cache_dir_keeps_resolutions_apart() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let bytes = wav_bytes(&vec![0.5f32; 2000], 8000);

    let coarse = WaveformService::with_cache_dir(&test_config(), tmp.path()).unwrap();
    let entry = coarse.peaks_for("track", &bytes, &WavDecoder).await.unwrap();
    assert_eq!(entry.peaks.len(), 10);

    let fine_config = StudioConfig {
        peak_count: 20,
        ..test_config()
    };
    let fine = WaveformService::with_cache_dir(&fine_config, tmp.path()).unwrap();
    let entry = fine.peaks_for("track", &bytes, &WavDecoder).await.unwrap();
    assert_eq!(entry.peaks.len(), 20);

    // Both resolutions stay cached side by side.
    let again = coarse.peaks_for("track", b"", &WavDecoder).await.unwrap();
    assert_eq!(again.peaks.len(), 10);
}

#[tokio::test]
async fn many_requests_in_flight_match_their_ids() {
    let client = PeakClient::spawn(4).unwrap();
    let mut pending = Vec::new();
    for n in 1..=16usize {
        let samples = vec![0.5f32; n * 100];
        pending.push((n, client.request(samples, 44100, n).unwrap()));
    }
    // Await in reverse to make completion order irrelevant.
    for (n, request) in pending.into_iter().rev() {
        let peaks = request
            .wait_timeout(Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(peaks.len(), n);
    }
}

#[test]
fn json_protocol_end_to_end() {
    let request = serde_json::json!({
        "type": "generate-peaks",
        "id": "req-42",
        "audioData": vec![0.0f32; 100],
        "sampleRate": 44100,
        "targetPeaks": 4,
    });
    let reply = handle_message(&request.to_string()).unwrap().unwrap();
    let response: WorkerResponse = serde_json::from_str(&reply).unwrap();
    assert_eq!(response.id().as_str(), "req-42");
    assert_eq!(response.into_result().unwrap(), vec![0.0; 4]);
}
