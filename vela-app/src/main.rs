//! Vela - real-time stereo effects chain
//!
//! Plays a built-in plucked-string pattern through the effects chain on the
//! default output device. Effects are driven by line commands on stdin.

mod commands;
mod source;

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing_subscriber::EnvFilter;

use commands::Command;
use source::PluckSource;
use vela_audio::{FxEngine, FxEvent, FxProcessor, ImpulseCache};
use vela_settings::Settings;

/// Frames processed per chunk inside the audio callback
const CHUNK_FRAMES: usize = 8192;

/// How often the meter is logged
const METER_LOG_INTERVAL: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut settings = Settings::load();

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no audio output device found")?;
    let config = device
        .default_output_config()
        .context("failed to get audio config")?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    tracing::info!(sample_rate, channels, "opened output device");

    let cache = Arc::new(ImpulseCache::new());
    let (mut engine, processor) = FxEngine::start(sample_rate as f32, cache)?;
    engine.apply_state(settings.chain)?;
    engine.set_order(settings.order)?;

    let stream = device.build_output_stream(
        &config.into(),
        audio_callback(processor, PluckSource::new(sample_rate as f32), channels),
        |err| tracing::error!(error = %err, "audio stream error"),
        None,
    )?;
    stream.play()?;

    let lines = spawn_stdin_reader();
    println!("{}", commands::HELP);

    let mut last_meter_log = Instant::now();
    loop {
        match lines.recv_timeout(Duration::from_millis(50)) {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => {
                let command = match commands::parse(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                match command {
                    Command::Quit => break,
                    Command::Help => println!("{}", commands::HELP),
                    Command::Save => match settings.save() {
                        Ok(()) => tracing::info!(
                            path = %Settings::config_path().display(),
                            "settings saved"
                        ),
                        Err(e) => tracing::warn!(error = %e, "failed to save settings"),
                    },
                    other => match commands::apply(&other, &mut settings.chain) {
                        Ok(Some(fx)) => {
                            if let Err(e) = engine.send(fx) {
                                tracing::warn!(error = %e, "command not delivered");
                            }
                        }
                        Ok(None) => {}
                        Err(e) => println!("{}", e),
                    },
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            // stdin closed
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let mut latest = None;
        while let Some(event) = engine.try_recv_event() {
            latest = Some(event);
        }
        if let Some(FxEvent::Meter {
            compressor_reduction_db,
            peak_l,
            peak_r,
        }) = latest
        {
            if last_meter_log.elapsed() >= METER_LOG_INTERVAL {
                tracing::info!(
                    peak_l = format_args!("{:.3}", peak_l),
                    peak_r = format_args!("{:.3}", peak_r),
                    reduction_db = format_args!("{:.1}", compressor_reduction_db),
                    "meter"
                );
                last_meter_log = Instant::now();
            }
        }
    }

    engine.shutdown();
    // Let the callback pick up the shutdown before the stream stops
    thread::sleep(Duration::from_millis(100));
    drop(stream);
    Ok(())
}

/// Build the output callback. The processor and the source are owned by it.
fn audio_callback(
    mut processor: FxProcessor,
    mut source: PluckSource,
    channels: usize,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    // Pre-allocated stereo scratch (no allocation in the audio callback)
    let mut stereo = vec![0.0f32; CHUNK_FRAMES * 2];

    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        if channels == 2 {
            for chunk in data.chunks_mut(CHUNK_FRAMES * 2) {
                source.fill(chunk);
                processor.process(chunk);
            }
            return;
        }

        // Mono or multichannel: run in stereo, then map onto the device layout
        for chunk in data.chunks_mut(CHUNK_FRAMES * channels) {
            let frames = chunk.len() / channels;
            let scratch = &mut stereo[..frames * 2];
            source.fill(scratch);
            processor.process(scratch);

            for (out, frame) in chunk.chunks_exact_mut(channels).zip(scratch.chunks_exact(2)) {
                if channels == 1 {
                    out[0] = (frame[0] + frame[1]) * 0.5;
                } else {
                    out[0] = frame[0];
                    out[1] = frame[1];
                    out[2..].fill(0.0);
                }
            }
        }
    }
}

/// Read stdin lines on a background thread
///
/// The receiver disconnects when stdin closes.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();

    let spawned = thread::Builder::new()
        .name("vela-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!(error = %e, "failed to spawn stdin reader");
    }

    rx
}
