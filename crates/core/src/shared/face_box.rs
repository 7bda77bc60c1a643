/// A located face: axis-aligned box plus detector confidence.
///
/// Geometry is in the pixel space of whatever image the box was produced
/// for; [`DetectionResult`] carries that space's dimensions so boxes can be
/// moved onto a differently sized surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub score: f64,
}

impl FaceBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64, score: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &FaceBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Scales the box by independent x/y factors.
    pub fn scaled(&self, sx: f64, sy: f64) -> FaceBox {
        FaceBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            score: self.score,
        }
    }

    /// Clips the box to `[0, width) x [0, height)`.
    pub fn clamped(&self, width: f64, height: f64) -> FaceBox {
        let x1 = self.x.clamp(0.0, width);
        let y1 = self.y.clamp(0.0, height);
        let x2 = self.right().clamp(0.0, width);
        let y2 = self.bottom().clamp(0.0, height);
        FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            score: self.score,
        }
    }

    /// Greedy non-maximum suppression: highest score first, dropping any box
    /// whose IoU with an already-kept box exceeds the threshold.
    pub fn non_max_suppression(boxes: &[FaceBox], iou_threshold: f64) -> Vec<FaceBox> {
        let mut sorted = boxes.to_vec();
        sorted.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept: Vec<FaceBox> = Vec::with_capacity(sorted.len());
        for candidate in sorted {
            if kept.iter().all(|k| candidate.iou(k) <= iou_threshold) {
                kept.push(candidate);
            }
        }
        kept
    }
}

/// All faces found in one image, in that image's pixel space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    pub boxes: Vec<FaceBox>,
    pub image_width: u32,
    pub image_height: u32,
}

impl DetectionResult {
    pub fn new(boxes: Vec<FaceBox>, image_width: u32, image_height: u32) -> Self {
        Self {
            boxes,
            image_width,
            image_height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Moves every box from the detector's working resolution to a surface of
    /// `width x height`.
    pub fn resized(&self, width: u32, height: u32) -> DetectionResult {
        if self.image_width == 0 || self.image_height == 0 {
            return DetectionResult::new(Vec::new(), width, height);
        }
        let sx = width as f64 / self.image_width as f64;
        let sy = height as f64 / self.image_height as f64;
        DetectionResult {
            boxes: self.boxes.iter().map(|b| b.scaled(sx, sy)).collect(),
            image_width: width,
            image_height: height,
        }
    }
}
