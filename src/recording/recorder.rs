//! Event loop driving the recording controller.
//!
//! Commands and both sampling ticks are handled by a single `select!` loop, so
//! every mutation of the session happens on one task and a tick can never run
//! concurrently with a transition. The tick intervals only exist while the
//! controller is recording; leaving `Recording` drops them before the capture is
//! sealed or discarded.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::controller::{RecorderSnapshot, RecordingController, RecordingState};
use super::sink::{AssetHandle, CaptureSink, PermissionProvider, RecorderError};

/// Period of the level sampling tick.
pub const DEFAULT_LEVEL_INTERVAL: Duration = Duration::from_millis(50);

/// Period of the elapsed-time tick.
pub const DEFAULT_DURATION_INTERVAL: Duration = Duration::from_millis(100);

/// Tick periods used while recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTiming {
    pub level: Duration,
    pub duration: Duration,
}

impl Default for TickTiming {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL_INTERVAL,
            duration: DEFAULT_DURATION_INTERVAL,
        }
    }
}

/// Requests accepted by the recorder loop.
#[derive(Debug)]
pub enum RecorderCommand {
    Start {
        reply: oneshot::Sender<Result<bool, RecorderError>>,
    },
    Stop {
        reply: oneshot::Sender<Option<AssetHandle>>,
    },
    Cancel,
    Finish,
}

/// Cloneable front end for talking to a running [`Recorder`].
#[derive(Clone)]
pub struct RecorderHandle {
    commands: mpsc::Sender<RecorderCommand>,
    snapshots: watch::Receiver<RecorderSnapshot>,
}

impl RecorderHandle {
    /// Starts recording, asking for microphone permission first if needed.
    ///
    /// Resolves to `Ok(false)` if the recorder was not idle.
    ///
    /// # Errors
    /// - `PermissionDenied` or `DeviceUnavailable` from the start transition
    /// - If the recorder loop has shut down
    pub async fn start(&self) -> anyhow::Result<Result<bool, RecorderError>> {
        let (reply, response) = oneshot::channel();
        self.send(RecorderCommand::Start { reply }).await?;
        Ok(response.await?)
    }

    /// Stops recording and takes ownership of the sealed asset.
    ///
    /// Resolves to `None` if the recorder was not recording.
    pub async fn stop(&self) -> anyhow::Result<Option<AssetHandle>> {
        let (reply, response) = oneshot::channel();
        self.send(RecorderCommand::Stop { reply }).await?;
        Ok(response.await?)
    }

    pub async fn cancel(&self) -> anyhow::Result<()> {
        self.send(RecorderCommand::Cancel).await
    }

    pub async fn finish(&self) -> anyhow::Result<()> {
        self.send(RecorderCommand::Finish).await
    }

    /// A receiver notified on every tick and transition.
    pub fn subscribe(&self) -> watch::Receiver<RecorderSnapshot> {
        self.snapshots.clone()
    }

    async fn send(&self, command: RecorderCommand) -> anyhow::Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Recorder is no longer running"))
    }
}

/// Owns the controller and serializes everything that touches it.
pub struct Recorder<S: CaptureSink, P: PermissionProvider> {
    controller: RecordingController<S>,
    permission: P,
    timing: TickTiming,
    commands: mpsc::Receiver<RecorderCommand>,
    snapshots: watch::Sender<RecorderSnapshot>,
    level_ticker: Option<Interval>,
    duration_ticker: Option<Interval>,
}

impl<S: CaptureSink, P: PermissionProvider> Recorder<S, P> {
    pub fn new(
        controller: RecordingController<S>,
        permission: P,
        timing: TickTiming,
    ) -> (Self, RecorderHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

        let recorder = Self {
            controller,
            permission,
            timing,
            commands: command_rx,
            snapshots: snapshot_tx,
            level_ticker: None,
            duration_ticker: None,
        };
        let handle = RecorderHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (recorder, handle)
    }

    /// Processes commands and ticks until every handle has been dropped.
    ///
    /// A recording still in progress at shutdown is cancelled.
    pub async fn run(mut self) {
        tracing::debug!(
            "Recorder loop started (level every {:?}, duration every {:?})",
            self.timing.level,
            self.timing.duration
        );

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = next_tick(&mut self.level_ticker) => {
                    self.controller.on_level_tick();
                    self.publish();
                }
                _ = next_tick(&mut self.duration_ticker) => {
                    self.controller.on_duration_tick(self.timing.duration);
                    self.publish();
                }
            }
        }

        if self.controller.state() == RecordingState::Recording {
            self.stop_ticks();
            self.controller.cancel();
        }
        tracing::debug!("Recorder loop exited");
    }

    async fn handle_command(&mut self, command: RecorderCommand) {
        match command {
            RecorderCommand::Start { reply } => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            RecorderCommand::Stop { reply } => {
                self.stop_ticks();
                let asset = if self.controller.stop() {
                    self.controller.take_asset()
                } else {
                    None
                };
                let _ = reply.send(asset);
            }
            RecorderCommand::Cancel => {
                self.stop_ticks();
                self.controller.cancel();
            }
            RecorderCommand::Finish => {
                self.controller.finish();
            }
        }
        // Ticks only survive a command that left the controller recording.
        if self.controller.state() != RecordingState::Recording {
            self.stop_ticks();
        }
        self.publish();
    }

    async fn start(&mut self) -> Result<bool, RecorderError> {
        if self.controller.state() != RecordingState::Idle {
            return Ok(false);
        }

        let mut granted = self.permission.is_granted();
        if !granted {
            tracing::info!("Requesting microphone permission");
            granted = self.permission.request().await;
        }

        let started = self.controller.start(granted)?;
        if started {
            self.level_ticker = Some(ticker(self.timing.level));
            self.duration_ticker = Some(ticker(self.timing.duration));
        }
        Ok(started)
    }

    fn stop_ticks(&mut self) {
        self.level_ticker = None;
        self.duration_ticker = None;
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.controller.snapshot());
    }
}

/// An interval whose first tick is one full period after now.
fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::controller::tests::FakeSink;
    use crate::recording::level::LevelNormalizer;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakePermission {
        granted: AtomicBool,
        grant_on_request: bool,
        requests: Arc<AtomicUsize>,
    }

    impl FakePermission {
        fn new(granted: bool, grant_on_request: bool) -> Self {
            Self {
                granted: AtomicBool::new(granted),
                grant_on_request,
                requests: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait::async_trait]
    impl PermissionProvider for FakePermission {
        fn is_granted(&self) -> bool {
            self.granted.load(Ordering::SeqCst)
        }

        async fn request(&self) -> bool {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.granted.store(self.grant_on_request, Ordering::SeqCst);
            self.grant_on_request
        }
    }

    fn recorder(
        sink: FakeSink,
        permission: FakePermission,
    ) -> (Recorder<FakeSink, FakePermission>, RecorderHandle) {
        let controller = RecordingController::new(
            sink,
            LevelNormalizer::default(),
            PathBuf::from("/tmp/orb-test"),
        );
        Recorder::new(controller, permission, TickTiming::default())
    }

    fn latest(handle: &RecorderHandle) -> RecorderSnapshot {
        handle.subscribe().borrow().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rising_loudness_publishes_non_decreasing_intensity() {
        let levels: Vec<f32> = (0..12).map(|i| -45.0 + 25.0 * i as f32 / 11.0).collect();
        let sink = FakeSink::with_levels(levels);
        let (recorder, handle) = recorder(sink.clone(), FakePermission::new(true, true));

        let driver = async move {
            let mut updates = handle.subscribe();
            assert_eq!(handle.start().await.unwrap(), Ok(true));

            let mut published = Vec::new();
            let deadline = tokio::time::sleep(Duration::from_millis(600));
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    changed = updates.changed() => {
                        changed.unwrap();
                        let snapshot = updates.borrow_and_update().clone();
                        if snapshot.is_recording() {
                            published.push(snapshot.intensity);
                        }
                    }
                }
            }

            let asset = handle.stop().await.unwrap().expect("sealed asset");
            let snapshot = latest(&handle);
            assert_eq!(snapshot.state, RecordingState::Transcribing);
            assert_eq!(snapshot.intensity, 0.0);
            assert!((snapshot.elapsed_secs - 0.6).abs() <= 0.1);
            assert!((asset.duration_secs() - snapshot.elapsed_secs).abs() < 1e-9);
            assert!(!published.is_empty());
            assert!(published.windows(2).all(|w| w[0] <= w[1]));
            assert!(handle.stop().await.unwrap().is_none());
        };

        tokio::join!(recorder.run(), driver);

        let log = sink.log.borrow();
        assert_eq!(log.sealed, 1);
        assert!((11..=12).contains(&log.reads));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_stop() {
        let sink = FakeSink::default();
        let (recorder, handle) = recorder(sink.clone(), FakePermission::new(true, true));

        let driver = async move {
            handle.start().await.unwrap().unwrap();
            tokio::time::sleep(Duration::from_millis(230)).await;
            handle.stop().await.unwrap();
            let frozen = latest(&handle);
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(latest(&handle), frozen);
            assert!((frozen.elapsed_secs - 0.2).abs() < 1e-9);
        };

        tokio::join!(recorder.run(), driver);
        assert_eq!(sink.log.borrow().reads, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_resets_and_discards() {
        let sink = FakeSink::default();
        let (recorder, handle) = recorder(sink.clone(), FakePermission::new(true, true));

        let driver = async move {
            handle.start().await.unwrap().unwrap();
            tokio::time::sleep(Duration::from_millis(350)).await;
            handle.cancel().await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
            let snapshot = latest(&handle);
            assert_eq!(snapshot.state, RecordingState::Idle);
            assert_eq!(snapshot.elapsed_secs, 0.0);
            assert!(snapshot.asset_path.is_none());
        };

        tokio::join!(recorder.run(), driver);
        let log = sink.log.borrow();
        assert_eq!(log.discarded, 1);
        assert_eq!(log.sealed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permission_requested_once_before_start() {
        let permission = FakePermission::new(false, true);
        let requests = Arc::clone(&permission.requests);
        let (recorder, handle) = recorder(FakeSink::default(), permission);

        let driver = async move {
            assert_eq!(handle.start().await.unwrap(), Ok(true));
            assert!(latest(&handle).is_recording());
            handle.stop().await.unwrap();
            handle.finish().await.unwrap();
            assert_eq!(handle.start().await.unwrap(), Ok(true));
        };

        tokio::join!(recorder.run(), driver);
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_permission_leaves_recorder_idle() {
        let (recorder, handle) = recorder(FakeSink::default(), FakePermission::new(false, false));

        let driver = async move {
            assert_eq!(
                handle.start().await.unwrap(),
                Err(RecorderError::PermissionDenied)
            );
            assert_eq!(latest(&handle).state, RecordingState::Idle);
        };

        tokio::join!(recorder.run(), driver);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_returns_to_idle() {
        let (recorder, handle) = recorder(FakeSink::default(), FakePermission::new(true, true));

        let driver = async move {
            handle.start().await.unwrap().unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            let asset = handle.stop().await.unwrap();
            assert!(asset.is_some());
            assert_eq!(latest(&handle).state, RecordingState::Transcribing);
            handle.finish().await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
            assert_eq!(latest(&handle).state, RecordingState::Idle);
            assert_eq!(handle.start().await.unwrap(), Ok(true));
            assert_eq!(latest(&handle).elapsed_secs, 0.0);
        };

        tokio::join!(recorder.run(), driver);
    }
}
