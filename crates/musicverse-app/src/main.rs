//! MusicVerse Studio command-line tools
//!
//! Entry point for running the studio utilities outside the web client:
//!
//! ```text
//! musicverse peaks <file.wav> [count]   compute waveform peaks for a WAV file
//! musicverse worker                     peak worker speaking JSON lines on stdin/stdout
//! musicverse mixer                      mixer history session driven by stdin commands
//! musicverse config                     print the effective configuration
//! ```
//!
//! Logs go to stderr; stdout carries only command output.

use anyhow::{bail, Context, Result};
use musicverse_audio::protocol::decode_request;
use musicverse_audio::{PeakWorkerPool, WavDecoder, WaveformService};
use musicverse_core::StudioConfig;
use musicverse_mixer::{MixerHistory, MixerSnapshot};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let config = load_config()?;
    init_logging(&config)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("peaks") => run_peaks(&config, &args[1..]),
        Some("worker") => run_worker(&config),
        Some("mixer") => run_mixer(&config),
        Some("config") => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        _ => {
            eprintln!("usage: musicverse <peaks FILE [COUNT] | worker | mixer | config>");
            std::process::exit(2);
        }
    }
}

fn load_config() -> Result<StudioConfig> {
    let config = match StudioConfig::default_path() {
        Some(path) => StudioConfig::load_or_default(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => StudioConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &StudioConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run_peaks(config: &StudioConfig, args: &[String]) -> Result<()> {
    let path = match args.first() {
        Some(path) => PathBuf::from(path),
        None => bail!("peaks needs a WAV file path"),
    };
    let mut config = config.clone();
    if let Some(count) = args.get(1) {
        config.peak_count = count
            .parse()
            .with_context(|| format!("Invalid peak count: {}", count))?;
    }

    let bytes =
        std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let service = match StudioConfig::default_cache_dir() {
        Some(dir) => WaveformService::with_cache_dir(&config, dir)?,
        None => WaveformService::new(&config)?,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let source_id = path.display().to_string();
    let entry = runtime.block_on(service.peaks_for(&source_id, &bytes, &WavDecoder))?;

    info!(
        file = %path.display(),
        peaks = entry.peaks.len(),
        duration_secs = entry.duration_secs,
        "Computed waveform"
    );
    println!("{}", serde_json::to_string(&entry)?);
    Ok(())
}

fn run_worker(config: &StudioConfig) -> Result<()> {
    let mut pool = PeakWorkerPool::spawn(config.worker_threads)?;
    let outcomes = pool.outcomes().clone();
    let printer = std::thread::Builder::new()
        .name("peak-printer".to_string())
        .spawn(move || -> Result<()> {
            let stdout = std::io::stdout();
            for outcome in outcomes.iter() {
                let mut out = stdout.lock();
                writeln!(out, "{}", outcome.into_response().to_json()?)?;
                out.flush()?;
            }
            Ok(())
        })?;

    info!("Peak worker reading requests from stdin");
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match decode_request(&line) {
            Ok(request) => pool.post(request)?,
            Err(error_response) => {
                warn!(id = %error_response.id(), "Rejected worker message");
                println!("{}", error_response.to_json()?);
            }
        }
    }

    // Drains queued requests, then the printer sees the channel close.
    pool.shutdown();
    match printer.join() {
        Ok(result) => result,
        Err(_) => bail!("peak printer panicked"),
    }
}

fn run_mixer(config: &StudioConfig) -> Result<()> {
    let mut history = MixerHistory::new(config.history_max_entries)?;
    let stdout = std::io::stdout();

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let (command, rest) = match line.trim().split_once(' ') {
            Some((command, rest)) => (command.to_string(), rest.trim().to_string()),
            None => (line.trim().to_string(), String::new()),
        };

        let restored = match command.as_str() {
            "" => continue,
            "record" => {
                let recorded = MixerSnapshot::from_json(&rest)
                    .and_then(|snapshot| history.record(&snapshot));
                if let Err(e) = recorded {
                    warn!(error = %e, "Snapshot rejected");
                    let mut out = stdout.lock();
                    writeln!(out, "{}", serde_json::json!({ "error": e.to_string() }))?;
                    continue;
                }
                None
            }
            "undo" => history.undo(),
            "redo" => history.redo(),
            "clear" => {
                history.clear();
                None
            }
            other => {
                warn!(command = other, "Unknown mixer command");
                continue;
            }
        };

        let status = history.status();
        let reply = serde_json::json!({
            "canUndo": status.can_undo,
            "canRedo": status.can_redo,
            "historyLength": status.len,
            "currentIndex": status.index.map_or(-1, |i| i as i64),
            "snapshot": restored,
        });
        let mut out = stdout.lock();
        writeln!(out, "{}", reply)?;
        out.flush()?;
    }
    Ok(())
}
