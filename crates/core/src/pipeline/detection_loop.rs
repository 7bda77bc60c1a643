use std::time::Instant;

use thiserror::Error;

use crate::capture::capture_session::{CaptureSession, CaptureState};
use crate::detection::domain::face_detector::{FaceDetector, LandmarkDetector};
use crate::models::domain::model_registry::ModelRegistry;
use crate::overlay::domain::overlay_surface::{BoxStyle, OverlaySurface};
use crate::shared::cancellation::CancellationToken;

use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use super::refresh_pacer::RefreshPacer;

const LANDMARK_COLOR: [u8; 4] = [0, 200, 255, 255];

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("models are not loaded")]
    ModelsNotLoaded,
    #[error("face detection failed: {0}")]
    Detector(String),
    #[error("camera error: {0}")]
    Capture(String),
}

/// What to do when the detector fails on a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FrameErrorPolicy {
    /// Log, report the frame as failed and keep going.
    #[default]
    SkipFrame,
    /// Stop the loop with [`LoopError::Detector`].
    Abort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Paused,
    Ended,
    Stopped,
    NoFrame,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Drawn { faces: usize },
    FrameFailed(String),
}

/// Called after every iteration with the freshly drawn overlay.
pub trait FrameObserver {
    fn on_tick(&mut self, outcome: &TickOutcome, overlay: &dyn OverlaySurface);
}

impl<F> FrameObserver for F
where
    F: FnMut(&TickOutcome, &dyn OverlaySurface),
{
    fn on_tick(&mut self, outcome: &TickOutcome, overlay: &dyn OverlaySurface) {
        self(outcome, overlay)
    }
}

/// Per-frame draw, detect, annotate cycle over one capture session.
///
/// Owns the session, detector and overlay; at most one loop exists per
/// session.
pub struct DetectionLoop {
    capture: CaptureSession,
    detector: Box<dyn FaceDetector>,
    landmarks: Option<Box<dyn LandmarkDetector>>,
    overlay: Box<dyn OverlaySurface>,
    style: BoxStyle,
    policy: FrameErrorPolicy,
    logger: Box<dyn PipelineLogger>,
    refresh_hz: u32,
    ticks: u64,
}

impl DetectionLoop {
    /// Requires every model bundle to be loaded. Sizes the overlay to the
    /// capture's native dimensions before anything is drawn.
    pub fn new<M>(
        capture: CaptureSession,
        detector: Box<dyn FaceDetector>,
        mut overlay: Box<dyn OverlaySurface>,
        registry: &ModelRegistry<M>,
    ) -> Result<Self, LoopError> {
        if !registry.all_loaded() {
            return Err(LoopError::ModelsNotLoaded);
        }
        let (width, height) = capture.dimensions();
        overlay.resize(width, height);
        Ok(Self {
            capture,
            detector,
            landmarks: None,
            overlay,
            style: BoxStyle::default(),
            policy: FrameErrorPolicy::default(),
            logger: Box::new(NullPipelineLogger),
            refresh_hz: super::refresh_pacer::DEFAULT_REFRESH_HZ,
            ticks: 0,
        })
    }

    pub fn with_landmarks(mut self, landmarks: Box<dyn LandmarkDetector>) -> Self {
        self.landmarks = Some(landmarks);
        self
    }

    pub fn with_policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_style(mut self, style: BoxStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_refresh_hz(mut self, hz: u32) -> Self {
        self.refresh_hz = hz;
        self
    }

    pub fn overlay(&self) -> &dyn OverlaySurface {
        self.overlay.as_ref()
    }

    pub fn capture(&self) -> &CaptureSession {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut CaptureSession {
        &mut self.capture
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One iteration: draw the frame, detect, rescale, draw the boxes.
    pub fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        if let Some(reason) = skip_reason(self.capture.state()) {
            return Ok(TickOutcome::Skipped(reason));
        }
        let frame = match self.capture.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                return Ok(TickOutcome::Skipped(
                    skip_reason(self.capture.state()).unwrap_or(SkipReason::NoFrame),
                ))
            }
            Err(e) => return Err(LoopError::Capture(e.to_string())),
        };
        self.ticks += 1;

        let t0 = Instant::now();
        self.overlay.draw_frame(&frame);
        self.logger
            .timing("draw", t0.elapsed().as_secs_f64() * 1000.0);

        let t0 = Instant::now();
        let detection = match self.detector.detect(&frame) {
            Ok(detection) => detection,
            Err(e) => {
                let message = e.to_string();
                return match self.policy {
                    FrameErrorPolicy::SkipFrame => {
                        log::warn!("Detection failed on frame {}: {message}", frame.sequence());
                        self.logger.tick(self.ticks);
                        Ok(TickOutcome::FrameFailed(message))
                    }
                    FrameErrorPolicy::Abort => Err(LoopError::Detector(message)),
                };
            }
        };
        self.logger
            .timing("detect", t0.elapsed().as_secs_f64() * 1000.0);

        let t0 = Instant::now();
        let (width, height) = self.overlay.dimensions();
        let resized = detection.resized(width, height);
        for face in &resized.boxes {
            self.overlay.draw_box(face, &self.style);
        }

        if let Some(landmarks) = self.landmarks.as_mut() {
            let sx = width as f64 / detection.image_width.max(1) as f64;
            let sy = height as f64 / detection.image_height.max(1) as f64;
            for face in &detection.boxes {
                match landmarks.landmarks(&frame, face) {
                    Ok(points) => self
                        .overlay
                        .draw_points(points.scaled(sx, sy).points(), LANDMARK_COLOR),
                    Err(e) => log::debug!("Landmarks skipped: {e}"),
                }
            }
        }
        self.logger
            .timing("annotate", t0.elapsed().as_secs_f64() * 1000.0);

        let faces = resized.boxes.len();
        self.logger.metric("faces", faces as f64);
        self.logger.tick(self.ticks);
        Ok(TickOutcome::Drawn { faces })
    }

    /// Ticks until `cancel` fires, pacing iterations at the refresh rate.
    ///
    /// Cancellation is observed between iterations only. The capture is
    /// stopped on every exit path.
    pub fn run(
        &mut self,
        cancel: &CancellationToken,
        observer: &mut dyn FrameObserver,
    ) -> Result<(), LoopError> {
        let mut pacer = RefreshPacer::new(self.refresh_hz);
        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }
            let outcome = match self.tick() {
                Ok(outcome) => outcome,
                Err(e) => break Err(e),
            };
            observer.on_tick(&outcome, self.overlay.as_ref());
            if cancel.is_cancelled() || !pacer.wait(cancel) {
                break Ok(());
            }
        };
        self.capture.stop();
        self.logger.summary();
        result
    }
}

fn skip_reason(state: CaptureState) -> Option<SkipReason> {
    match state {
        CaptureState::Playing => None,
        CaptureState::Paused => Some(SkipReason::Paused),
        CaptureState::Ended => Some(SkipReason::Ended),
        CaptureState::Stopped => Some(SkipReason::Stopped),
    }
}
