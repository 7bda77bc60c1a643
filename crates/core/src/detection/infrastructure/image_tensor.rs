use ndarray::Array4;

use crate::models::infrastructure::onnx_bundle_loader::TensorLayout;
use crate::shared::frame::Frame;

/// Per-channel normalization: `(pixel - mean[c]) / scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub scale: f32,
}

/// Square region of a frame, in frame pixels. May extend past the frame
/// edges; pixels outside read as black.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SquareCrop {
    pub x: f64,
    pub y: f64,
    pub side: f64,
}

impl SquareCrop {
    /// The whole frame anchored top-left, padded to a square on the short
    /// side.
    pub fn padded_frame(frame: &Frame) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            side: frame.width().max(frame.height()) as f64,
        }
    }
}

/// Samples `crop` into a `size x size` float tensor with nearest-neighbour
/// lookup, in the given memory layout.
pub fn square_tensor(
    frame: &Frame,
    crop: SquareCrop,
    size: u32,
    norm: Normalization,
    layout: TensorLayout,
) -> Array4<f32> {
    let s = size as usize;
    let src = frame.as_ndarray();
    let fw = frame.width() as i64;
    let fh = frame.height() as i64;
    let step = crop.side / s as f64;

    let mut tensor = match layout {
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
    };

    for y in 0..s {
        let src_y = (crop.y + (y as f64 + 0.5) * step).floor() as i64;
        for x in 0..s {
            let src_x = (crop.x + (x as f64 + 0.5) * step).floor() as i64;
            let inside = src_x >= 0 && src_y >= 0 && src_x < fw && src_y < fh;
            for c in 0..3 {
                let raw = if inside {
                    src[[src_y as usize, src_x as usize, c]] as f32
                } else {
                    0.0
                };
                let value = (raw - norm.mean[c]) / norm.scale;
                match layout {
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                }
            }
        }
    }

    tensor
}
