use std::time::Instant;

use crate::capture::domain::camera_source::{CameraSource, CaptureError, CaptureRequest};
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Playing,
    Paused,
    Ended,
    Stopped,
}

/// An open camera stream. Dropping the session releases the device.
pub struct CaptureSession {
    source: Box<dyn CameraSource>,
    width: u32,
    height: u32,
    state: CaptureState,
    started_at: Instant,
}

impl CaptureSession {
    /// Opens `source` with `request`. Failures are not retried.
    pub fn start(
        mut source: Box<dyn CameraSource>,
        request: &CaptureRequest,
    ) -> Result<Self, CaptureError> {
        let (width, height) = source.open(request)?;
        if width == 0 || height == 0 {
            source.stop();
            return Err(CaptureError::DeviceUnavailable(format!(
                "camera reported invalid size {width}x{height}"
            )));
        }
        if (width, height) != (request.width, request.height) {
            log::info!(
                "Camera delivers {width}x{height} (requested {}x{})",
                request.width,
                request.height
            );
        }
        Ok(Self {
            source,
            width,
            height,
            state: CaptureState::Playing,
            started_at: Instant::now(),
        })
    }

    /// Native pixel size of the stream.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == CaptureState::Playing
    }

    pub fn pause(&mut self) {
        if self.state == CaptureState::Playing {
            self.state = CaptureState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == CaptureState::Paused {
            self.state = CaptureState::Playing;
        }
    }

    /// Next frame while playing. `Ok(None)` when paused, stopped or ended.
    /// A read error ends the stream and is returned once.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if self.state != CaptureState::Playing {
            return Ok(None);
        }
        let next = match self.source.next_frame() {
            Ok(next) => next,
            Err(e) => {
                log::warn!("Camera read failed: {e}");
                self.state = CaptureState::Ended;
                return Err(e);
            }
        };
        match next {
            Some(frame) => Ok(Some(frame.with_captured_at(self.started_at.elapsed()))),
            None => {
                log::info!("Camera stream ended");
                self.state = CaptureState::Ended;
                Ok(None)
            }
        }
    }

    pub fn stop(&mut self) {
        if self.state != CaptureState::Stopped {
            self.source.stop();
            self.state = CaptureState::Stopped;
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
