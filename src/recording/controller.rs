//! Recording lifecycle state machine.
//!
//! `Idle --start--> Recording --stop--> Transcribing --finish--> Idle`, with
//! `Recording --cancel--> Idle` as the abort path. Transitions requested from the
//! wrong state are ignored rather than reported. Tick handlers are no-ops outside
//! `Recording`, so a late tick can never publish against a sealed or discarded
//! capture.

use std::path::PathBuf;
use std::time::Duration;

use super::level::LevelNormalizer;
use super::sink::{AssetHandle, Capture, CaptureSink, RecorderError};

/// Lifecycle state of the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Transcribing,
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Transcribing => write!(f, "transcribing"),
        }
    }
}

/// Observable view of the session, published on every tick and transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecorderSnapshot {
    pub state: RecordingState,
    /// Normalized intensity in `[0, 1]`; zero outside `Recording`.
    pub intensity: f32,
    /// Last raw level in dBFS.
    pub raw_db: f32,
    pub elapsed_secs: f64,
    /// Location of the sealed recording, once there is one.
    pub asset_path: Option<PathBuf>,
}

impl RecorderSnapshot {
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }
}

/// Owns the capture sink and the session fields it drives.
pub struct RecordingController<S: CaptureSink> {
    sink: S,
    normalizer: LevelNormalizer,
    recordings_dir: PathBuf,
    state: RecordingState,
    capture: Option<S::Capture>,
    asset: Option<AssetHandle>,
    sealed_path: Option<PathBuf>,
    raw_db: f32,
    intensity: f32,
    elapsed: Duration,
}

impl<S: CaptureSink> RecordingController<S> {
    /// Creates an idle controller writing recordings into `recordings_dir`.
    pub fn new(sink: S, normalizer: LevelNormalizer, recordings_dir: PathBuf) -> Self {
        Self {
            sink,
            normalizer,
            recordings_dir,
            state: RecordingState::Idle,
            capture: None,
            asset: None,
            sealed_path: None,
            raw_db: normalizer.noise_floor(),
            intensity: 0.0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn snapshot(&self) -> RecorderSnapshot {
        RecorderSnapshot {
            state: self.state,
            intensity: self.intensity,
            raw_db: self.raw_db,
            elapsed_secs: self.elapsed_secs(),
            asset_path: self.sealed_path.clone(),
        }
    }

    /// Begins a new recording.
    ///
    /// Returns `Ok(false)` when the controller is not idle (the request is
    /// ignored and nothing changes).
    ///
    /// # Errors
    /// - `PermissionDenied` if `permission_granted` is false
    /// - `DeviceUnavailable` if the sink cannot be opened
    pub fn start(&mut self, permission_granted: bool) -> Result<bool, RecorderError> {
        if self.state != RecordingState::Idle {
            tracing::debug!("Ignoring start while {}", self.state);
            return Ok(false);
        }
        if !permission_granted {
            tracing::warn!("Cannot start recording: microphone permission not granted");
            return Err(RecorderError::PermissionDenied);
        }

        let path = self
            .recordings_dir
            .join(format!("{}.wav", uuid::Uuid::new_v4()));
        let capture = self.sink.open(&path).map_err(|e| {
            tracing::error!("Failed to open capture sink: {}", e);
            e
        })?;

        if let Some(stale) = self.asset.take() {
            tracing::debug!("Discarding unconsumed recording before starting a new one");
            stale.discard();
        }

        self.capture = Some(capture);
        self.sealed_path = None;
        self.elapsed = Duration::ZERO;
        self.intensity = 0.0;
        self.raw_db = self.normalizer.noise_floor();
        self.state = RecordingState::Recording;
        tracing::info!("Recording started: {}", path.display());
        Ok(true)
    }

    /// Seals the capture and moves to `Transcribing`.
    ///
    /// Returns `false` when not recording.
    pub fn stop(&mut self) -> bool {
        if self.state != RecordingState::Recording {
            tracing::debug!("Ignoring stop while {}", self.state);
            return false;
        }

        self.state = RecordingState::Transcribing;
        self.intensity = 0.0;
        if let Some(capture) = self.capture.take() {
            let asset = capture.seal(self.elapsed_secs());
            tracing::info!(
                "Recording stopped: {:.2}s sealed to {}",
                self.elapsed_secs(),
                asset.path().display()
            );
            self.sealed_path = Some(asset.path().to_path_buf());
            self.asset = Some(asset);
        }
        true
    }

    /// Discards the capture and returns to `Idle`.
    ///
    /// Returns `false` when not recording.
    pub fn cancel(&mut self) -> bool {
        if self.state != RecordingState::Recording {
            tracing::debug!("Ignoring cancel while {}", self.state);
            return false;
        }

        self.state = RecordingState::Idle;
        if let Some(capture) = self.capture.take() {
            capture.discard();
        }
        self.elapsed = Duration::ZERO;
        self.intensity = 0.0;
        tracing::info!("Recording cancelled");
        true
    }

    /// Acknowledges that downstream processing finished.
    ///
    /// Returns `false` when not transcribing.
    pub fn finish(&mut self) -> bool {
        if self.state != RecordingState::Transcribing {
            tracing::debug!("Ignoring finish while {}", self.state);
            return false;
        }
        self.state = RecordingState::Idle;
        tracing::debug!("Transcription finished, recorder idle");
        true
    }

    /// Hands the sealed recording to the caller.
    pub fn take_asset(&mut self) -> Option<AssetHandle> {
        self.asset.take()
    }

    /// Samples the capture level and refreshes the intensity.
    pub fn on_level_tick(&mut self) {
        if self.state != RecordingState::Recording {
            return;
        }
        if let Some(capture) = &self.capture {
            self.raw_db = capture.read_level();
            self.intensity = self.normalizer.normalize(self.raw_db);
        }
    }

    /// Advances the elapsed time by one duration tick.
    pub fn on_duration_tick(&mut self, period: Duration) {
        if self.state != RecordingState::Recording {
            return;
        }
        self.elapsed += period;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::rc::Rc;

    /// Shared record of what happened to the fake captures.
    #[derive(Debug, Default)]
    pub(crate) struct SinkLog {
        pub levels: VecDeque<f32>,
        pub opened: Vec<PathBuf>,
        pub sealed: usize,
        pub discarded: usize,
        pub reads: usize,
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeSink {
        pub log: Rc<RefCell<SinkLog>>,
        pub unavailable: bool,
    }

    impl FakeSink {
        pub fn with_levels(levels: impl IntoIterator<Item = f32>) -> Self {
            let sink = Self::default();
            sink.log.borrow_mut().levels.extend(levels);
            sink
        }
    }

    pub(crate) struct FakeCapture {
        log: Rc<RefCell<SinkLog>>,
        path: PathBuf,
    }

    impl CaptureSink for FakeSink {
        type Capture = FakeCapture;

        fn open(&mut self, path: &Path) -> Result<FakeCapture, RecorderError> {
            if self.unavailable {
                return Err(RecorderError::DeviceUnavailable("no device".into()));
            }
            self.log.borrow_mut().opened.push(path.to_path_buf());
            Ok(FakeCapture {
                log: Rc::clone(&self.log),
                path: path.to_path_buf(),
            })
        }
    }

    impl Capture for FakeCapture {
        fn read_level(&self) -> f32 {
            let mut log = self.log.borrow_mut();
            log.reads += 1;
            log.levels.pop_front().unwrap_or(-160.0)
        }

        fn seal(self, duration_secs: f64) -> AssetHandle {
            self.log.borrow_mut().sealed += 1;
            AssetHandle::new(self.path, duration_secs, 16000)
        }

        fn discard(self) {
            self.log.borrow_mut().discarded += 1;
        }
    }

    fn controller(sink: FakeSink) -> RecordingController<FakeSink> {
        RecordingController::new(sink, LevelNormalizer::default(), PathBuf::from("/tmp/orb-test"))
    }

    const TICK: Duration = Duration::from_millis(100);

    #[test]
    fn test_start_requires_permission() {
        let sink = FakeSink::default();
        let mut ctl = controller(sink.clone());
        assert_eq!(ctl.start(false), Err(RecorderError::PermissionDenied));
        assert_eq!(ctl.state(), RecordingState::Idle);
        assert!(sink.log.borrow().opened.is_empty());
    }

    #[test]
    fn test_start_reports_unavailable_device() {
        let sink = FakeSink {
            unavailable: true,
            ..Default::default()
        };
        let mut ctl = controller(sink);
        assert!(matches!(
            ctl.start(true),
            Err(RecorderError::DeviceUnavailable(_))
        ));
        assert_eq!(ctl.state(), RecordingState::Idle);
    }

    #[test]
    fn test_start_while_recording_is_ignored() {
        let sink = FakeSink::with_levels([-20.0]);
        let mut ctl = controller(sink.clone());
        assert_eq!(ctl.start(true), Ok(true));
        ctl.on_level_tick();
        ctl.on_duration_tick(TICK);
        let before = ctl.snapshot();

        assert_eq!(ctl.start(true), Ok(false));
        assert_eq!(ctl.snapshot(), before);
        assert_eq!(sink.log.borrow().opened.len(), 1);
    }

    #[test]
    fn test_stop_from_idle_is_ignored() {
        let mut ctl = controller(FakeSink::default());
        assert!(!ctl.stop());
        assert_eq!(ctl.state(), RecordingState::Idle);
        assert!(ctl.take_asset().is_none());
    }

    #[test]
    fn test_stop_freezes_elapsed_and_seals_once() {
        let sink = FakeSink::with_levels([-10.0]);
        let mut ctl = controller(sink.clone());
        ctl.start(true).unwrap();
        ctl.on_level_tick();
        for _ in 0..3 {
            ctl.on_duration_tick(TICK);
        }
        assert!(ctl.snapshot().intensity > 0.0);

        assert!(ctl.stop());
        assert_eq!(ctl.state(), RecordingState::Transcribing);
        assert_eq!(ctl.snapshot().intensity, 0.0);
        assert!((ctl.elapsed_secs() - 0.3).abs() < 1e-9);

        // Late ticks must not move anything.
        ctl.on_duration_tick(TICK);
        ctl.on_level_tick();
        assert!((ctl.elapsed_secs() - 0.3).abs() < 1e-9);
        assert_eq!(ctl.snapshot().intensity, 0.0);
        assert_eq!(sink.log.borrow().reads, 1);

        assert!(ctl.snapshot().asset_path.is_some());
        let asset = ctl.take_asset().unwrap();
        assert!((asset.duration_secs() - 0.3).abs() < 1e-9);
        assert!(ctl.take_asset().is_none());
        assert_eq!(sink.log.borrow().sealed, 1);
    }

    #[test]
    fn test_cancel_discards_and_resets() {
        let sink = FakeSink::with_levels([-5.0]);
        let mut ctl = controller(sink.clone());
        ctl.start(true).unwrap();
        ctl.on_level_tick();
        ctl.on_duration_tick(TICK);

        assert!(ctl.cancel());
        assert_eq!(ctl.state(), RecordingState::Idle);
        assert_eq!(ctl.elapsed_secs(), 0.0);
        assert_eq!(ctl.snapshot().intensity, 0.0);
        assert!(ctl.take_asset().is_none());
        let log = sink.log.borrow();
        assert_eq!(log.discarded, 1);
        assert_eq!(log.sealed, 0);
    }

    #[test]
    fn test_cancel_outside_recording_is_ignored() {
        let mut ctl = controller(FakeSink::default());
        assert!(!ctl.cancel());
        ctl.start(true).unwrap();
        ctl.stop();
        assert!(!ctl.cancel());
        assert_eq!(ctl.state(), RecordingState::Transcribing);
    }

    #[test]
    fn test_finish_keeps_taken_asset_valid() {
        let mut ctl = controller(FakeSink::default());
        ctl.start(true).unwrap();
        ctl.stop();
        let asset = ctl.take_asset();
        assert!(ctl.finish());
        assert_eq!(ctl.state(), RecordingState::Idle);
        assert!(asset.is_some());
        assert!(!ctl.finish());
    }

    #[test]
    fn test_start_only_from_idle() {
        let mut ctl = controller(FakeSink::default());
        ctl.start(true).unwrap();
        ctl.stop();
        assert_eq!(ctl.start(true), Ok(false));
        assert_eq!(ctl.state(), RecordingState::Transcribing);
    }

    #[test]
    fn test_new_recording_resets_elapsed_and_replaces_unconsumed_asset() {
        let sink = FakeSink::default();
        let mut ctl = controller(sink.clone());
        ctl.start(true).unwrap();
        ctl.on_duration_tick(TICK);
        ctl.stop();
        let first = ctl.snapshot().asset_path.unwrap();
        ctl.finish();

        ctl.start(true).unwrap();
        assert_eq!(ctl.elapsed_secs(), 0.0);
        assert!(ctl.snapshot().asset_path.is_none());
        ctl.stop();
        let second = ctl.take_asset().unwrap();
        assert_ne!(second.path(), first.as_path());
    }

    #[test]
    fn test_rising_loudness_scenario() {
        // 12 level ticks at 50ms from -45 dB to -20 dB, duration ticks at 100ms.
        let levels: Vec<f32> = (0..12).map(|i| -45.0 + 25.0 * i as f32 / 11.0).collect();
        let sink = FakeSink::with_levels(levels);
        let mut ctl = controller(sink.clone());
        ctl.start(true).unwrap();

        let mut published = Vec::new();
        for tick in 1..=12 {
            ctl.on_level_tick();
            published.push(ctl.snapshot().intensity);
            if tick % 2 == 0 {
                ctl.on_duration_tick(TICK);
            }
        }

        assert!(published.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(published[0], 0.0);

        assert!(ctl.stop());
        assert!((ctl.elapsed_secs() - 0.6).abs() <= 0.1);
        assert!(ctl.take_asset().is_some());
        assert_eq!(sink.log.borrow().sealed, 1);
    }
}
