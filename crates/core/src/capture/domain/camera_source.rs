use thiserror::Error;

use crate::shared::constants::{CAPTURE_HEIGHT, CAPTURE_WIDTH};
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
}

/// Camera orientation hint. Only honored where the platform exposes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// What to ask the camera for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Platform device name; `None` picks the default camera.
    pub device: Option<String>,
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
    pub audio: bool,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            device: None,
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
            facing: FacingMode::User,
            audio: false,
        }
    }
}

impl CaptureRequest {
    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device.filter(|d| !d.trim().is_empty());
        self
    }
}

/// A live video source.
///
/// `open` returns the native frame size, which may differ from the request.
/// `next_frame` blocks until the next frame and returns `Ok(None)` once the
/// stream has ended.
pub trait CameraSource: Send {
    fn open(&mut self, request: &CaptureRequest) -> Result<(u32, u32), CaptureError>;

    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases the device. Must be idempotent.
    fn stop(&mut self);
}
