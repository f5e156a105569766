//! Processing stages of a journal entry and how the orb presents them.

use std::time::Duration;

/// Where a recorded entry is in the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingStage {
    #[default]
    Idle,
    /// Audio is being transcribed
    Listening,
    /// The transcription is being analyzed and a follow-up generated
    Thinking,
    Complete,
}

impl ProcessingStage {
    /// Status label shown under the orb while not recording.
    pub fn label(&self) -> &'static str {
        match self {
            ProcessingStage::Idle => "What's on your mind?",
            ProcessingStage::Listening => "Listening...",
            ProcessingStage::Thinking => "Processing...",
            ProcessingStage::Complete => "",
        }
    }
}

/// Visual state of the orb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrbStage {
    #[default]
    Idle,
    Transcribing,
    Thinking,
    Complete,
}

impl OrbStage {
    /// Orb stage for the current recorder and pipeline state.
    ///
    /// While recording the orb always shows `Transcribing`.
    pub fn resolve(is_recording: bool, stage: ProcessingStage) -> Self {
        if is_recording {
            return OrbStage::Transcribing;
        }
        match stage {
            ProcessingStage::Idle => OrbStage::Idle,
            ProcessingStage::Listening => OrbStage::Transcribing,
            ProcessingStage::Thinking => OrbStage::Thinking,
            ProcessingStage::Complete => OrbStage::Complete,
        }
    }

    pub fn numeric_value(&self) -> f32 {
        match self {
            OrbStage::Idle => 0.0,
            OrbStage::Transcribing => 1.0,
            OrbStage::Thinking => 2.0,
            OrbStage::Complete => 3.0,
        }
    }

    /// How long the orb takes to move into this stage.
    pub fn transition_duration(&self) -> Duration {
        match self {
            OrbStage::Idle => Duration::from_millis(500),
            OrbStage::Transcribing => Duration::from_millis(250),
            OrbStage::Thinking => Duration::from_millis(350),
            OrbStage::Complete => Duration::from_millis(300),
        }
    }
}

/// Eases the orb's numeric stage value toward the current stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageAnimation {
    stage: OrbStage,
    from: f32,
    /// Time since the last stage change
    elapsed: Duration,
}

impl StageAnimation {
    /// Starts settled on `stage`.
    pub fn new(stage: OrbStage) -> Self {
        Self {
            stage,
            from: stage.numeric_value(),
            elapsed: stage.transition_duration(),
        }
    }

    /// Moves toward `stage`, starting from the value currently shown.
    pub fn set_stage(&mut self, stage: OrbStage) {
        if stage == self.stage {
            return;
        }
        self.from = self.value();
        self.stage = stage;
        self.elapsed = Duration::ZERO;
    }

    pub fn advance(&mut self, delta: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta);
    }

    /// Current numeric stage value, eased in and out between stages.
    pub fn value(&self) -> f32 {
        let total = self.stage.transition_duration().as_secs_f32();
        let t = (self.elapsed.as_secs_f32() / total).clamp(0.0, 1.0);
        let eased = if t < 0.5 {
            2.0 * t * t
        } else {
            1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
        };
        self.from + (self.stage.numeric_value() - self.from) * eased
    }
}
