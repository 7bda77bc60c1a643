use std::fmt;

use crate::shared::constants::RECORDING_FPS;
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    Vp9,
    Vp8,
}

impl VideoCodec {
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::Vp9 => "video/webm;codecs=vp9",
            VideoCodec::Vp8 => "video/webm;codecs=vp8",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: VideoCodec,
}

impl EncoderSettings {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fps: RECORDING_FPS,
            codec: VideoCodec::Vp9,
        }
    }
}

/// A contiguous slice of the encoded container stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedChunk(pub Vec<u8>);

impl EncodedChunk {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Streams frames into a container, handing back bytes as they become
/// available. Concatenating every returned chunk in order yields the
/// complete file.
pub trait MediaEncoder: Send {
    fn start(&mut self, settings: &EncoderSettings) -> Result<(), Box<dyn std::error::Error>>;

    /// `pts` counts frames at the settings' frame rate and must increase.
    fn encode(
        &mut self,
        frame: &Frame,
        pts: i64,
    ) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>>;

    /// Flushes the encoder and writes the container trailer.
    fn finish(&mut self) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_vp9_at_30fps() {
        let settings = EncoderSettings::new(640, 480);
        assert_eq!(settings.fps, 30);
        assert_eq!(settings.codec.mime_type(), "video/webm;codecs=vp9");
    }
}
