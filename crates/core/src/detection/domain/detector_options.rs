use thiserror::Error;

pub const DEFAULT_INPUT_SIZE: u32 = 416;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

#[derive(Error, Debug, PartialEq)]
pub enum OptionsError {
    #[error("input size {0} must be a positive multiple of 32")]
    InputSize(u32),
    #[error("score threshold {0} must be within (0, 1)")]
    ScoreThreshold(f64),
}

/// Fast single-pass configuration of the tiny face detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TinyFaceDetectorOptions {
    pub input_size: u32,
    pub score_threshold: f64,
}

impl Default for TinyFaceDetectorOptions {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

impl TinyFaceDetectorOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(OptionsError::InputSize(self.input_size));
        }
        if !(self.score_threshold > 0.0 && self.score_threshold < 1.0) {
            return Err(OptionsError::ScoreThreshold(self.score_threshold));
        }
        Ok(())
    }

    /// Output grid cells per side: the network downsamples by 32.
    pub fn grid_size(&self) -> usize {
        (self.input_size / 32) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let options = TinyFaceDetectorOptions::default();
        assert_eq!(options.input_size, 416);
        assert_eq!(options.score_threshold, 0.5);
        assert_eq!(options.grid_size(), 13);
        assert!(options.validate().is_ok());
    }

    #[rstest]
    #[case(0)]
    #[case(100)]
    #[case(417)]
    fn test_invalid_input_size(#[case] size: u32) {
        let options = TinyFaceDetectorOptions {
            input_size: size,
            ..Default::default()
        };
        assert_eq!(options.validate(), Err(OptionsError::InputSize(size)));
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(f64::NAN)]
    fn test_invalid_threshold(#[case] threshold: f64) {
        let options = TinyFaceDetectorOptions {
            score_threshold: threshold,
            ..Default::default()
        };
        assert!(matches!(
            options.validate(),
            Err(OptionsError::ScoreThreshold(_))
        ));
    }
}
