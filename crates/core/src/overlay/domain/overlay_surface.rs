use crate::shared::constants::{BOX_COLOR, BOX_LABEL, BOX_LINE_WIDTH};
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// How a detection box is drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoxStyle {
    pub label: Option<String>,
    pub line_width: u32,
    /// RGBA; alpha 255 is opaque.
    pub color: [u8; 4],
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self {
            label: Some(BOX_LABEL.to_string()),
            line_width: BOX_LINE_WIDTH,
            color: BOX_COLOR,
        }
    }
}

/// The drawable surface frames and annotations are composited on.
///
/// `draw_frame` fully overwrites the surface, so anything drawn before it
/// is gone afterwards.
pub trait OverlaySurface: Send {
    fn resize(&mut self, width: u32, height: u32);

    fn dimensions(&self) -> (u32, u32);

    /// Paints `frame` over the whole surface, scaling if sizes differ.
    fn draw_frame(&mut self, frame: &Frame);

    fn draw_box(&mut self, face: &FaceBox, style: &BoxStyle);

    fn draw_points(&mut self, points: &[(f64, f64)], color: [u8; 4]);

    /// Current surface content as a frame.
    fn snapshot(&self) -> Frame;
}
