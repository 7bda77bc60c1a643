use std::sync::Arc;

use crate::detection::domain::face_detector::LandmarkDetector;
use crate::detection::domain::face_landmarks::{FaceLandmarks, LANDMARK_COUNT};
use crate::models::infrastructure::onnx_bundle_loader::OnnxModel;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::image_tensor::{square_tensor, Normalization, SquareCrop};

const DEFAULT_INPUT_SIZE: u32 = 112;

const NORMALIZATION: Normalization = Normalization {
    mean: [122.782, 117.001, 104.298],
    scale: 255.0,
};

/// 68-point landmark regressor on ONNX Runtime. Runs on a square crop
/// centred on each detected face.
pub struct OnnxLandmarkNet {
    model: Arc<OnnxModel>,
    input_size: u32,
}

impl OnnxLandmarkNet {
    pub fn new(model: Arc<OnnxModel>) -> Self {
        let input_size = model.input_size().unwrap_or(DEFAULT_INPUT_SIZE);
        Self { model, input_size }
    }
}

/// Square crop sharing the face box's centre, sized by its longer side.
pub fn face_crop(face: &FaceBox) -> SquareCrop {
    let side = face.width.max(face.height);
    SquareCrop {
        x: face.x + face.width / 2.0 - side / 2.0,
        y: face.y + face.height / 2.0 - side / 2.0,
        side,
    }
}

impl LandmarkDetector for OnnxLandmarkNet {
    fn landmarks(
        &mut self,
        frame: &Frame,
        face: &FaceBox,
    ) -> Result<FaceLandmarks, Box<dyn std::error::Error>> {
        let crop = face_crop(face);
        if crop.side <= 0.0 {
            return Err("empty face box".into());
        }
        let input = square_tensor(frame, crop, self.input_size, NORMALIZATION, self.model.layout());

        let values: Vec<f32> = {
            let mut session = self.model.session()?;
            let input_value = ort::value::Tensor::from_array(input)?;
            let outputs = session.run(ort::inputs![input_value])?;
            if outputs.len() == 0 {
                return Err("Landmark model produced no outputs".into());
            }
            let tensor = outputs[0].try_extract_array::<f32>()?;
            tensor.iter().copied().collect()
        };

        if values.len() != LANDMARK_COUNT * 2 {
            return Err(format!(
                "Landmark model returned {} values, expected {}",
                values.len(),
                LANDMARK_COUNT * 2
            )
            .into());
        }
        Ok(FaceLandmarks::from_relative(
            &values, crop.x, crop.y, crop.side,
        )?)
    }
}
