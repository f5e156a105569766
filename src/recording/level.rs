//! Microphone level measurement and normalization.
//!
//! Raw loudness is measured in dBFS (0 = loudest, negative below full scale) and
//! mapped onto a `[0, 1]` intensity for the orb. The mapping is a two-segment
//! piecewise-linear curve: everything between the noise floor and the voice
//! threshold is squeezed into the bottom 30% of the range, and the speech range
//! above the threshold gets the remaining 70%.

/// Default noise floor in dBFS. Anything quieter reads as zero intensity.
pub const DEFAULT_NOISE_FLOOR_DB: f32 = -45.0;

/// Default voice threshold in dBFS, where expected speech loudness begins.
pub const DEFAULT_VOICE_THRESHOLD_DB: f32 = -35.0;

/// Share of the output range reserved for levels below the voice threshold.
const AMBIENT_SHARE: f32 = 0.3;

/// dBFS value reported for digital silence.
pub const SILENCE_DB: f32 = -160.0;

/// Maps a raw decibel reading onto `[0, 1]`.
///
/// Callers must guarantee `noise_floor < voice_threshold < 0`; the curve is
/// undefined when the two calibration points coincide.
pub fn normalize(raw_db: f32, noise_floor: f32, voice_threshold: f32) -> f32 {
    let clamped = raw_db.clamp(noise_floor, 0.0);
    let range = -noise_floor;
    let linear = (clamped - noise_floor) / range;
    let threshold_point = (voice_threshold - noise_floor) / range;

    let scaled = if linear < threshold_point {
        linear * AMBIENT_SHARE / threshold_point
    } else {
        AMBIENT_SHARE + (linear - threshold_point) / (1.0 - threshold_point) * (1.0 - AMBIENT_SHARE)
    };

    scaled.clamp(0.0, 1.0)
}

/// Normalizer bound to one pair of calibration constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelNormalizer {
    noise_floor: f32,
    voice_threshold: f32,
}

impl LevelNormalizer {
    /// Creates a normalizer, returning `None` for a degenerate calibration.
    pub fn new(noise_floor: f32, voice_threshold: f32) -> Option<Self> {
        if noise_floor < voice_threshold && voice_threshold < 0.0 {
            Some(Self {
                noise_floor,
                voice_threshold,
            })
        } else {
            None
        }
    }

    pub fn normalize(&self, raw_db: f32) -> f32 {
        normalize(raw_db, self.noise_floor, self.voice_threshold)
    }

    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    pub fn voice_threshold(&self) -> f32 {
        self.voice_threshold
    }
}

impl Default for LevelNormalizer {
    fn default() -> Self {
        Self {
            noise_floor: DEFAULT_NOISE_FLOOR_DB,
            voice_threshold: DEFAULT_VOICE_THRESHOLD_DB,
        }
    }
}

/// Computes the RMS level of the most recent `window` samples in dBFS.
///
/// Returns [`SILENCE_DB`] for an empty buffer or pure silence.
pub fn rms_dbfs(samples: &[i16], window: usize) -> f32 {
    if samples.is_empty() || window == 0 {
        return SILENCE_DB;
    }

    let count = window.min(samples.len());
    let recent = &samples[samples.len() - count..];

    let sum_of_squares: i64 = recent.iter().map(|&x| (x as i64).pow(2)).sum();
    let mean_square = sum_of_squares as f64 / count as f64;
    let rms = mean_square.sqrt() as f32;

    if rms > 0.0 {
        (20.0 * (rms / i16::MAX as f32).log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn norm(db: f32) -> f32 {
        normalize(db, DEFAULT_NOISE_FLOOR_DB, DEFAULT_VOICE_THRESHOLD_DB)
    }

    #[test]
    fn test_boundaries_are_exact() {
        assert!(norm(-45.0).abs() < EPS);
        assert!((norm(0.0) - 1.0).abs() < EPS);
        assert!((norm(-35.0) - 0.3).abs() < EPS);
    }

    #[test]
    fn test_out_of_range_input_is_clamped() {
        assert_eq!(norm(SILENCE_DB), 0.0);
        assert!((norm(6.0) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_output_bounded_and_monotonic() {
        let mut previous = -1.0;
        let mut db = -45.0;
        while db <= 0.0 {
            let value = norm(db);
            assert!((0.0..=1.0).contains(&value), "{db} dB -> {value}");
            assert!(value >= previous, "not monotonic at {db} dB");
            previous = value;
            db += 0.25;
        }
    }

    #[test]
    fn test_segments_are_linear() {
        // Halfway to the threshold is halfway through the ambient share.
        assert!((norm(-40.0) - 0.15).abs() < EPS);
        // Halfway between threshold and 0 dB.
        assert!((norm(-17.5) - 0.65).abs() < EPS);
    }

    #[test]
    fn test_normalizer_rejects_degenerate_calibration() {
        assert!(LevelNormalizer::new(-45.0, -45.0).is_none());
        assert!(LevelNormalizer::new(-30.0, -40.0).is_none());
        assert!(LevelNormalizer::new(-45.0, 0.0).is_none());
        let custom = LevelNormalizer::new(-60.0, -30.0).unwrap();
        assert!((custom.normalize(-30.0) - 0.3).abs() < EPS);
    }

    #[test]
    fn test_rms_dbfs() {
        assert_eq!(rms_dbfs(&[], 10), SILENCE_DB);
        assert_eq!(rms_dbfs(&[0; 64], 64), SILENCE_DB);

        let full_scale = vec![i16::MAX; 32];
        assert!(rms_dbfs(&full_scale, 32).abs() < 0.01);

        // Only the trailing window counts.
        let mut samples = vec![i16::MAX; 100];
        samples.extend(vec![0; 10]);
        assert_eq!(rms_dbfs(&samples, 10), SILENCE_DB);

        let half = vec![i16::MAX / 2; 16];
        assert!((rms_dbfs(&half, 16) + 6.02).abs() < 0.05);
    }
}
