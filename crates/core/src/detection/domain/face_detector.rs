use crate::shared::face_box::{DetectionResult, FaceBox};
use crate::shared::frame::Frame;

use super::face_landmarks::FaceLandmarks;

/// Domain interface for face detection.
///
/// Boxes come back in the pixel space named by the result's
/// `image_width`/`image_height`; callers rescale to their own surface.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, Box<dyn std::error::Error>>;
}

/// Locates the 68 facial landmarks inside an already detected face.
pub trait LandmarkDetector: Send {
    fn landmarks(
        &mut self,
        frame: &Frame,
        face: &FaceBox,
    ) -> Result<FaceLandmarks, Box<dyn std::error::Error>>;
}
