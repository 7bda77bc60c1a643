use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::recording::domain::file_delivery::FileDelivery;
use crate::recording::domain::media_encoder::{EncodedChunk, EncoderSettings, MediaEncoder};
use crate::recording::domain::recording_history::RecordingHistory;
use crate::recording::domain::recording_record::RecordingRecord;
use crate::shared::frame::Frame;

pub const SAVED_MESSAGE: &str = "Video saved successfully and downloaded to your device.";
pub const SAVED_WITHOUT_HISTORY_MESSAGE: &str =
    "Video downloaded. Could not save to local storage.";

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("no recording in progress")]
    NotRecording,
    #[error("recording could not be encoded: {0}")]
    Encode(String),
    #[error("recording could not be saved: {0}")]
    Delivery(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Stopped,
}

/// Outcome of a stopped recording. The file is always delivered;
/// `persisted` says whether the history entry was stored too.
#[derive(Debug)]
pub struct SavedRecording {
    pub path: PathBuf,
    pub record: RecordingRecord,
    pub persisted: Result<(), String>,
}

impl SavedRecording {
    pub fn message(&self) -> &'static str {
        match self.persisted {
            Ok(()) => SAVED_MESSAGE,
            Err(_) => SAVED_WITHOUT_HISTORY_MESSAGE,
        }
    }
}

/// Records the annotated overlay into a WebM file.
pub struct RecordingController {
    encoder: Box<dyn MediaEncoder>,
    delivery: Box<dyn FileDelivery>,
    history: Box<dyn RecordingHistory>,
    state: RecordingState,
    chunks: Vec<EncodedChunk>,
    fps: u32,
    last_pts: Option<i64>,
    started: Option<Instant>,
}

impl RecordingController {
    pub fn new(
        encoder: Box<dyn MediaEncoder>,
        delivery: Box<dyn FileDelivery>,
        history: Box<dyn RecordingHistory>,
    ) -> Self {
        Self {
            encoder,
            delivery,
            history,
            state: RecordingState::Idle,
            chunks: Vec::new(),
            fps: crate::shared::constants::RECORDING_FPS,
            last_pts: None,
            started: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Time since `start`, while recording.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started
            .filter(|_| self.is_recording())
            .map(|started| started.elapsed())
    }

    pub fn history(&self) -> &dyn RecordingHistory {
        self.history.as_ref()
    }

    pub fn start(&mut self, width: u32, height: u32) -> Result<(), RecordingError> {
        if self.is_recording() {
            return Err(RecordingError::AlreadyRecording);
        }
        let settings = EncoderSettings::new(width, height);
        self.encoder
            .start(&settings)
            .map_err(|e| RecordingError::Encode(e.to_string()))?;
        log::info!(
            "Recording started: {width}x{height} @ {} fps ({})",
            settings.fps,
            settings.codec
        );
        self.chunks.clear();
        self.fps = settings.fps;
        self.last_pts = None;
        self.started = Some(Instant::now());
        self.state = RecordingState::Recording;
        Ok(())
    }

    /// Encodes `frame` if it advances the presentation index. No-op unless
    /// recording.
    pub fn capture(&mut self, frame: &Frame, elapsed: Duration) -> Result<(), RecordingError> {
        if !self.is_recording() {
            return Ok(());
        }
        let pts = (elapsed.as_secs_f64() * self.fps as f64).floor() as i64;
        if self.last_pts.is_some_and(|last| pts <= last) {
            return Ok(());
        }
        let produced = self
            .encoder
            .encode(frame, pts)
            .map_err(|e| RecordingError::Encode(e.to_string()))?;
        self.last_pts = Some(pts);
        self.keep(produced);
        Ok(())
    }

    /// Finalizes the file, delivers it and appends it to the history.
    pub fn stop(&mut self, at: DateTime<Utc>) -> Result<SavedRecording, RecordingError> {
        if !self.is_recording() {
            return Err(RecordingError::NotRecording);
        }
        self.state = RecordingState::Stopped;
        self.started = None;

        let trailing = self
            .encoder
            .finish()
            .map_err(|e| RecordingError::Encode(e.to_string()))?;
        self.keep(trailing);

        let blob: Vec<u8> = std::mem::take(&mut self.chunks)
            .into_iter()
            .flat_map(|chunk| chunk.0)
            .collect();
        let record = RecordingRecord::new(at, blob.len() as u64);

        let path = self
            .delivery
            .deliver(&record.filename, &blob)
            .map_err(|e| RecordingError::Delivery(e.to_string()))?;
        log::info!("Recording saved to {} ({} bytes)", path.display(), blob.len());

        let persisted = self.history.append(record.clone()).map_err(|e| {
            log::warn!("Could not store recording history: {e}");
            e.to_string()
        });

        Ok(SavedRecording {
            path,
            record,
            persisted,
        })
    }

    fn keep(&mut self, produced: Vec<EncodedChunk>) {
        self.chunks
            .extend(produced.into_iter().filter(|chunk| !chunk.is_empty()));
    }
}
