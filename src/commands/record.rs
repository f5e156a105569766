//! Recording and processing a journal entry.
//!
//! The recorder loop and the record screen run concurrently on the current task
//! via `tokio::join!`; the capture stream never leaves this thread. Recording
//! can also be stopped from outside with SIGUSR1.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::backend::{EdgeFunctionClient, JournalBackend};
use crate::config::{data_dir, OrbConfig};
use crate::history::HistoryManager;
use crate::journal::{process_recording, EntryOutcome, ProcessingStage};
use crate::recording::{
    CpalSink, DevicePermission, OrbTui, Recorder, RecorderHandle, RecorderSnapshot,
    RecordingController, ScreenInput, ScreenView,
};
use crate::ui::WordReveal;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// How the record screen ended.
#[derive(Debug)]
enum ScreenExit {
    Cancelled,
    Failed(String),
    Completed(EntryOutcome),
}

/// Records an entry, processes it, and shows the orb's response.
///
/// # Errors
/// - If the configuration is invalid or the user is not signed in
/// - If the terminal cannot be driven
pub async fn handle_record() -> Result<(), anyhow::Error> {
    tracing::info!("=== orb Recorder Started ===");

    let config = OrbConfig::load()?;
    let session = super::auth::active_session(&config).await?;

    let normalizer = config.audio.normalizer()?;
    let timing = config.audio.tick_timing()?;
    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, noise_floor={}dB, voice_threshold={}dB",
        config.audio.device,
        config.audio.sample_rate,
        normalizer.noise_floor(),
        normalizer.voice_threshold()
    );

    let sink = CpalSink::new(config.audio.device.clone(), config.audio.sample_rate);
    let permission = DevicePermission::new(config.audio.device.clone());
    let controller = RecordingController::new(sink, normalizer, data_dir()?.join("recordings"));
    let (recorder, handle) = Recorder::new(controller, permission, timing);

    let backend = EdgeFunctionClient::new(
        &config.backend.url,
        &config.backend.anon_key,
        &session.access_token,
    );

    let stop_signal = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&stop_signal))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    let mut tui = OrbTui::new()?;
    let screen = run_screen(&mut tui, handle, &backend, &config, &stop_signal);
    let ((), exit) = tokio::join!(recorder.run(), screen);
    tui.cleanup()?;
    drop(tui);

    match exit? {
        ScreenExit::Cancelled => tracing::info!("Recording cancelled"),
        ScreenExit::Failed(message) => return Err(anyhow::anyhow!(message)),
        ScreenExit::Completed(outcome) => {
            if let Some(error) = outcome.error {
                return Err(anyhow::anyhow!(error));
            }
            if let Some(response) = outcome.response {
                println!("{response}");
            }
        }
    }

    tracing::info!("=== orb Recorder Exited Successfully ===");
    Ok(())
}

/// Drives the record screen through recording, processing and the result.
///
/// Owns the only recorder handle; dropping it on return shuts the recorder down.
async fn run_screen(
    tui: &mut OrbTui,
    handle: RecorderHandle,
    backend: &impl JournalBackend,
    config: &OrbConfig,
    stop_signal: &AtomicBool,
) -> anyhow::Result<ScreenExit> {
    let target_secs = config.display.target_duration_secs as f64;
    let snapshots = handle.subscribe();

    if let Err(e) = handle.start().await? {
        tracing::error!("Failed to start recording: {}", e);
        let message = format!("{e}\n\nCheck your audio configuration with 'orb list-devices'.");
        show_until_key(tui, |tui, delta| {
            let snapshot = snapshots.borrow().clone();
            let screen = ScreenView {
                error: Some(&message),
                ..base_view(&snapshot, ProcessingStage::Idle, target_secs)
            };
            tui.render(&screen, delta)
        })
        .await?;
        return Ok(ScreenExit::Failed(e.to_string()));
    }

    let mut last_frame = Instant::now();
    let asset = loop {
        if stop_signal.swap(false, Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: stopping via external trigger");
            break handle.stop().await?;
        }
        match tui.poll_input()? {
            ScreenInput::Stop => break handle.stop().await?,
            ScreenInput::Cancel => {
                handle.cancel().await?;
                return Ok(ScreenExit::Cancelled);
            }
            ScreenInput::None | ScreenInput::Other => {}
        }

        let snapshot = snapshots.borrow().clone();
        tui.push_intensity(snapshot.intensity);
        let screen = base_view(&snapshot, ProcessingStage::Idle, target_secs);
        tui.render(&screen, last_frame.elapsed())?;
        last_frame = Instant::now();
        sleep(FRAME_INTERVAL).await;
    };

    if let Some(asset) = &asset {
        tracing::info!(
            "Recorded {:.1}s at {}Hz to {}",
            asset.duration_secs(),
            asset.sample_rate(),
            asset.path().display()
        );
    }

    let stage = Cell::new(ProcessingStage::Idle);
    let pipeline = process_recording(backend, asset, &config.audio.output_format, |s| {
        tracing::debug!("Processing stage: {:?}", s);
        stage.set(s);
    });
    tokio::pin!(pipeline);

    let outcome = loop {
        tokio::select! {
            outcome = &mut pipeline => break outcome,
            _ = sleep(FRAME_INTERVAL) => {
                if tui.poll_input()? == ScreenInput::Cancel {
                    tracing::info!("Processing abandoned by user");
                    handle.finish().await?;
                    return Ok(ScreenExit::Cancelled);
                }
                let snapshot = snapshots.borrow().clone();
                let screen = base_view(&snapshot, stage.get(), target_secs);
                tui.render(&screen, last_frame.elapsed())?;
                last_frame = Instant::now();
            }
        }
    };
    handle.finish().await?;

    if let Some(entry) = &outcome.entry {
        match HistoryManager::new(&data_dir()?).and_then(|mut h| h.save_entry(entry)) {
            Ok(id) => tracing::info!("Journal entry {} saved", id),
            Err(e) => tracing::warn!("Failed to save entry to history: {}", e),
        }
    }

    let reveal = WordReveal::new(
        outcome.response.as_deref().unwrap_or_default(),
        Duration::from_millis(config.display.word_delay_ms),
    );
    let shown_at = Instant::now();
    show_until_key(tui, |tui, delta| {
        let snapshot = snapshots.borrow().clone();
        let revealed = reveal.text_at(shown_at.elapsed());
        let screen = ScreenView {
            response: outcome.response.as_ref().map(|_| revealed.as_str()),
            transcription: outcome.transcription.as_deref(),
            error: outcome.error.as_deref(),
            ..base_view(&snapshot, ProcessingStage::Complete, target_secs)
        };
        tui.render(&screen, delta)
    })
    .await?;

    Ok(ScreenExit::Completed(outcome))
}

fn base_view(
    snapshot: &RecorderSnapshot,
    stage: ProcessingStage,
    target_secs: f64,
) -> ScreenView<'_> {
    ScreenView {
        snapshot,
        stage,
        response: None,
        transcription: None,
        error: None,
        target_secs,
    }
}

/// Renders frames with `draw` until a key is pressed.
async fn show_until_key<F>(tui: &mut OrbTui, mut draw: F) -> anyhow::Result<()>
where
    F: FnMut(&mut OrbTui, Duration) -> anyhow::Result<()>,
{
    let mut last_frame = Instant::now();
    loop {
        draw(tui, last_frame.elapsed())?;
        last_frame = Instant::now();
        if tui.poll_input()? != ScreenInput::None {
            return Ok(());
        }
        sleep(FRAME_INTERVAL).await;
    }
}
