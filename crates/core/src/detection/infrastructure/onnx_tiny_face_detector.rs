/// Tiny face detector (YOLOv2-style, single class) on ONNX Runtime.
///
/// Pads the frame to a square, runs one pass at the configured input size
/// and decodes the anchor grid into boxes in frame pixels.
use std::sync::Arc;

use crate::detection::domain::detector_options::TinyFaceDetectorOptions;
use crate::detection::domain::face_detector::FaceDetector;
use crate::models::infrastructure::onnx_bundle_loader::{OnnxModel, TensorLayout};
use crate::shared::face_box::{DetectionResult, FaceBox};
use crate::shared::frame::Frame;

use super::image_tensor::{square_tensor, Normalization, SquareCrop};

/// Anchor box sizes in grid-cell units.
const ANCHORS: [(f32, f32); 5] = [
    (1.603231, 2.094468),
    (6.041143, 7.080126),
    (2.882459, 3.518061),
    (4.266906, 5.178857),
    (9.041765, 10.66308),
];

/// `x, y, w, h, objectness` per anchor.
const BOX_ENCODING: usize = 5;

const NORMALIZATION: Normalization = Normalization {
    mean: [117.001, 114.697, 97.404],
    scale: 256.0,
};

const NMS_IOU_THRESH: f64 = 0.4;

pub struct OnnxTinyFaceDetector {
    model: Arc<OnnxModel>,
    options: TinyFaceDetectorOptions,
}

impl OnnxTinyFaceDetector {
    pub fn new(
        model: Arc<OnnxModel>,
        options: TinyFaceDetectorOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        options.validate()?;
        let mut options = options;
        if let Some(size) = model.input_size() {
            if size != options.input_size {
                log::warn!(
                    "Detector model has a fixed input of {size}px, ignoring configured {}px",
                    options.input_size
                );
                options.input_size = size;
            }
        }
        Ok(Self { model, options })
    }

    pub fn options(&self) -> TinyFaceDetectorOptions {
        self.options
    }
}

impl FaceDetector for OnnxTinyFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, Box<dyn std::error::Error>> {
        let crop = SquareCrop::padded_frame(frame);
        let input = square_tensor(
            frame,
            crop,
            self.options.input_size,
            NORMALIZATION,
            self.model.layout(),
        );

        let (shape, data) = {
            let mut session = self.model.session()?;
            let input_value = ort::value::Tensor::from_array(input)?;
            let outputs = session.run(ort::inputs![input_value])?;
            if outputs.len() == 0 {
                return Err("Tiny face detector produced no outputs".into());
            }
            let tensor = outputs[0].try_extract_array::<f32>()?;
            let shape = tensor.shape().to_vec();
            let data: Vec<f32> = tensor.iter().copied().collect();
            (shape, data)
        };

        let grid = GridOutput::from_shape(&shape)?;
        let boxes = decode_grid(&data, grid, self.options.score_threshold as f32)
            .into_iter()
            .map(|b| b.scaled(crop.side, crop.side))
            .map(|b| b.clamped(frame.width() as f64, frame.height() as f64))
            .filter(|b| b.area() > 0.0)
            .collect::<Vec<_>>();

        Ok(DetectionResult::new(
            FaceBox::non_max_suppression(&boxes, NMS_IOU_THRESH),
            frame.width(),
            frame.height(),
        ))
    }
}

/// Geometry of the raw output tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct GridOutput {
    cells: usize,
    layout: TensorLayout,
}

impl GridOutput {
    /// Accepts `[1, S, S, 25]` or `[1, 25, S, S]`.
    fn from_shape(shape: &[usize]) -> Result<Self, String> {
        let channels = ANCHORS.len() * BOX_ENCODING;
        match shape {
            [1, h, w, c] if *c == channels && h == w => Ok(Self {
                cells: *h,
                layout: TensorLayout::Nhwc,
            }),
            [1, c, h, w] if *c == channels && h == w => Ok(Self {
                cells: *h,
                layout: TensorLayout::Nchw,
            }),
            _ => Err(format!("Unexpected tiny face detector output shape: {shape:?}")),
        }
    }

    fn value(&self, data: &[f32], row: usize, col: usize, channel: usize) -> f32 {
        let s = self.cells;
        let channels = ANCHORS.len() * BOX_ENCODING;
        match self.layout {
            TensorLayout::Nhwc => data[(row * s + col) * channels + channel],
            TensorLayout::Nchw => data[(channel * s + row) * s + col],
        }
    }
}

/// Decodes the anchor grid into boxes relative to the padded square
/// (`0.0..=1.0`), keeping those whose score clears `threshold`.
fn decode_grid(data: &[f32], grid: GridOutput, threshold: f32) -> Vec<FaceBox> {
    let s = grid.cells as f32;
    let mut boxes = Vec::new();
    for row in 0..grid.cells {
        for col in 0..grid.cells {
            for (a, &(anchor_w, anchor_h)) in ANCHORS.iter().enumerate() {
                let base = a * BOX_ENCODING;
                let score = sigmoid(grid.value(data, row, col, base + 4));
                if score <= threshold {
                    continue;
                }
                let cx = (col as f32 + sigmoid(grid.value(data, row, col, base))) / s;
                let cy = (row as f32 + sigmoid(grid.value(data, row, col, base + 1))) / s;
                let w = grid.value(data, row, col, base + 2).exp() * anchor_w / s;
                let h = grid.value(data, row, col, base + 3).exp() * anchor_h / s;
                boxes.push(FaceBox::new(
                    (cx - w / 2.0) as f64,
                    (cy - h / 2.0) as f64,
                    w as f64,
                    h as f64,
                    score as f64,
                ));
            }
        }
    }
    boxes
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
