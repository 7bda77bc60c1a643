use image::{ImageBuffer, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::overlay::domain::overlay_surface::{BoxStyle, OverlaySurface};
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

use super::label_font::{for_each_lit_pixel, text_width, GLYPH_HEIGHT};

const LABEL_PADDING: u32 = 2;
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255];
const POINT_RADIUS: i32 = 1;

/// In-memory RGB canvas.
pub struct RasterOverlay {
    image: RgbImage,
    sequence: u64,
}

impl RasterOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: ImageBuffer::new(width, height),
            sequence: 0,
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    fn blend(&mut self, x: i64, y: i64, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.image.width() as i64 || y >= self.image.height() as i64 {
            return;
        }
        let px = self.image.get_pixel_mut(x as u32, y as u32);
        *px = Rgb(mix(px.0, color));
    }

    fn draw_label(&mut self, text: &str, face: &FaceBox, color: [u8; 4]) {
        let w = text_width(text) + 2 * LABEL_PADDING;
        let h = GLYPH_HEIGHT + 2 * LABEL_PADDING;
        let x = face.x.round() as i64;
        // Above the box when there is room, otherwise just inside its top edge.
        let top = face.y.round() as i64;
        let y = if top >= h as i64 { top - h as i64 } else { top.max(0) };

        if color[3] == 255 {
            draw_filled_rect_mut(
                &mut self.image,
                Rect::at(x as i32, y as i32).of_size(w, h),
                Rgb([color[0], color[1], color[2]]),
            );
        } else {
            for dy in 0..h as i64 {
                for dx in 0..w as i64 {
                    self.blend(x + dx, y + dy, color);
                }
            }
        }

        let [r, g, b] = LABEL_TEXT_COLOR;
        let mut lit = Vec::new();
        for_each_lit_pixel(text, |dx, dy| lit.push((dx, dy)));
        for (dx, dy) in lit {
            self.blend(
                x + (LABEL_PADDING + dx) as i64,
                y + (LABEL_PADDING + dy) as i64,
                [r, g, b, 255],
            );
        }
    }
}

fn mix(base: [u8; 3], color: [u8; 4]) -> [u8; 3] {
    let a = color[3] as u32;
    let mut out = [0u8; 3];
    for c in 0..3 {
        out[c] = ((color[c] as u32 * a + base[c] as u32 * (255 - a)) / 255) as u8;
    }
    out
}

impl OverlaySurface for RasterOverlay {
    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = ImageBuffer::new(width, height);
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn draw_frame(&mut self, frame: &Frame) {
        self.sequence = frame.sequence();
        let (w, h) = self.image.dimensions();
        if (frame.width(), frame.height()) == (w, h) {
            self.image.copy_from_slice(frame.data());
            return;
        }
        if frame.width() == 0 || frame.height() == 0 {
            self.image.fill(0);
            return;
        }
        for y in 0..h {
            let src_y = ((y as u64 * frame.height() as u64) / h as u64) as u32;
            for x in 0..w {
                let src_x = ((x as u64 * frame.width() as u64) / w as u64) as u32;
                self.image.put_pixel(x, y, Rgb(frame.pixel(src_x, src_y)));
            }
        }
    }

    fn draw_box(&mut self, face: &FaceBox, style: &BoxStyle) {
        let x = face.x.round() as i32;
        let y = face.y.round() as i32;
        let w = face.width.round() as i64;
        let h = face.height.round() as i64;
        let rgb = Rgb([style.color[0], style.color[1], style.color[2]]);

        for inset in 0..style.line_width.max(1) as i64 {
            let iw = w - 2 * inset;
            let ih = h - 2 * inset;
            if iw < 1 || ih < 1 {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(iw as u32, ih as u32);
            if style.color[3] == 255 {
                draw_hollow_rect_mut(&mut self.image, rect, rgb);
            } else {
                let (l, t) = (rect.left() as i64, rect.top() as i64);
                let (r, b) = (rect.right() as i64, rect.bottom() as i64);
                for px in l..=r {
                    self.blend(px, t, style.color);
                    if b != t {
                        self.blend(px, b, style.color);
                    }
                }
                for py in (t + 1)..b {
                    self.blend(l, py, style.color);
                    if r != l {
                        self.blend(r, py, style.color);
                    }
                }
            }
        }

        if let Some(label) = style.label.as_deref().filter(|l| !l.is_empty()) {
            self.draw_label(label, face, style.color);
        }
    }

    fn draw_points(&mut self, points: &[(f64, f64)], color: [u8; 4]) {
        let rgb = Rgb([color[0], color[1], color[2]]);
        for &(x, y) in points {
            draw_filled_circle_mut(
                &mut self.image,
                (x.round() as i32, y.round() as i32),
                POINT_RADIUS,
                rgb,
            );
        }
    }

    fn snapshot(&self) -> Frame {
        let (w, h) = self.image.dimensions();
        Frame::new(self.image.as_raw().clone(), w, h, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: [u8; 3] = [0, 255, 0];

    fn solid(w: u32, h: u32, value: u8, seq: u64) -> Frame {
        Frame::new(vec![value; (w * h * 3) as usize], w, h, seq)
    }

    fn unlabeled() -> BoxStyle {
        BoxStyle {
            label: None,
            ..BoxStyle::default()
        }
    }

    #[test]
    fn test_resize_changes_dimensions() {
        let mut overlay = RasterOverlay::new(1, 1);
        overlay.resize(640, 480);
        assert_eq!(overlay.dimensions(), (640, 480));
    }

    #[test]
    fn test_draw_frame_same_size_copies() {
        let mut overlay = RasterOverlay::new(4, 4);
        overlay.draw_frame(&solid(4, 4, 77, 9));
        let snap = overlay.snapshot();
        assert!(snap.data().iter().all(|&v| v == 77));
        assert_eq!(snap.sequence(), 9);
    }

    #[test]
    fn test_draw_frame_scales_to_surface() {
        let mut overlay = RasterOverlay::new(8, 6);
        overlay.draw_frame(&solid(4, 3, 200, 1));
        assert!(overlay.snapshot().data().iter().all(|&v| v == 200));
    }

    #[test]
    fn test_draw_frame_erases_previous_boxes() {
        let mut overlay = RasterOverlay::new(20, 20);
        overlay.draw_frame(&solid(20, 20, 0, 1));
        overlay.draw_box(&FaceBox::new(2.0, 2.0, 10.0, 10.0, 0.9), &unlabeled());
        assert_eq!(overlay.image().get_pixel(2, 2).0, GREEN);
        overlay.draw_frame(&solid(20, 20, 0, 2));
        assert!(overlay.snapshot().data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_box_stroke_is_two_pixels() {
        let mut overlay = RasterOverlay::new(20, 20);
        overlay.draw_box(&FaceBox::new(2.0, 2.0, 10.0, 10.0, 0.9), &unlabeled());
        let img = overlay.image();
        assert_eq!(img.get_pixel(2, 6).0, GREEN);
        assert_eq!(img.get_pixel(3, 6).0, GREEN);
        assert_eq!(img.get_pixel(4, 6).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(11, 6).0, GREEN);
        assert_eq!(img.get_pixel(10, 6).0, GREEN);
        assert_eq!(img.get_pixel(9, 6).0, [0, 0, 0]);
    }

    #[test]
    fn test_label_drawn_above_box() {
        let mut overlay = RasterOverlay::new(100, 100);
        overlay.draw_box(&FaceBox::new(10.0, 50.0, 40.0, 40.0, 0.9), &BoxStyle::default());
        let img = overlay.image();
        // Label background sits right above the box's top edge.
        assert_eq!(img.get_pixel(10, 49).0, GREEN);
        let white = (10..50)
            .flat_map(|x| (34..50).map(move |y| (x, y)))
            .any(|(x, y)| img.get_pixel(x, y).0 == [255, 255, 255]);
        assert!(white);
    }

    #[test]
    fn test_box_partly_outside_does_not_panic() {
        let mut overlay = RasterOverlay::new(10, 10);
        overlay.draw_box(&FaceBox::new(-5.0, -5.0, 30.0, 30.0, 0.9), &BoxStyle::default());
        overlay.draw_box(&FaceBox::new(3.0, 3.0, 1.0, 1.0, 0.9), &BoxStyle::default());
    }

    #[test]
    fn test_translucent_box_blends() {
        let mut overlay = RasterOverlay::new(10, 10);
        let style = BoxStyle {
            label: None,
            line_width: 1,
            color: [255, 255, 255, 128],
        };
        overlay.draw_box(&FaceBox::new(1.0, 1.0, 5.0, 5.0, 0.9), &style);
        let px = overlay.image().get_pixel(1, 1).0;
        assert!(px[0] > 100 && px[0] < 200);
    }

    #[test]
    fn test_points_are_drawn() {
        let mut overlay = RasterOverlay::new(10, 10);
        overlay.draw_points(&[(5.0, 5.0)], [255, 0, 0, 255]);
        assert_eq!(overlay.image().get_pixel(5, 5).0, [255, 0, 0]);
    }
}
