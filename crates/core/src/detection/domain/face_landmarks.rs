//! 68-point face landmarks in image pixel coordinates.

pub const LANDMARK_COUNT: usize = 68;

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<(f64, f64)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, String> {
        if points.len() != LANDMARK_COUNT {
            return Err(format!(
                "expected {LANDMARK_COUNT} landmarks, got {}",
                points.len()
            ));
        }
        Ok(Self { points })
    }

    /// Builds landmarks from a flat `[x0, y0, x1, y1, ...]` vector of
    /// coordinates relative to a square crop at `(x, y)` of side `side`.
    pub fn from_relative(values: &[f32], x: f64, y: f64, side: f64) -> Result<Self, String> {
        if values.len() < LANDMARK_COUNT * 2 {
            return Err(format!(
                "expected {} landmark values, got {}",
                LANDMARK_COUNT * 2,
                values.len()
            ));
        }
        let points = values
            .chunks_exact(2)
            .take(LANDMARK_COUNT)
            .map(|p| (x + p[0] as f64 * side, y + p[1] as f64 * side))
            .collect();
        Self::new(points)
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> FaceLandmarks {
        FaceLandmarks {
            points: self.points.iter().map(|(x, y)| (x * sx, y * sy)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wrong_count_rejected() {
        assert!(FaceLandmarks::new(vec![(0.0, 0.0); 5]).is_err());
    }

    #[test]
    fn test_from_relative_maps_into_crop() {
        let mut values = vec![0.0f32; LANDMARK_COUNT * 2];
        values[0] = 0.5;
        values[1] = 0.25;
        let lm = FaceLandmarks::from_relative(&values, 100.0, 50.0, 200.0).unwrap();
        assert_relative_eq!(lm.points()[0].0, 200.0);
        assert_relative_eq!(lm.points()[0].1, 100.0);
        assert_relative_eq!(lm.points()[1].0, 100.0);
    }

    #[test]
    fn test_from_relative_too_short() {
        assert!(FaceLandmarks::from_relative(&[0.1; 10], 0.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_scaled() {
        let lm = FaceLandmarks::new(vec![(10.0, 20.0); LANDMARK_COUNT]).unwrap();
        let scaled = lm.scaled(2.0, 0.5);
        assert_relative_eq!(scaled.points()[67].0, 20.0);
        assert_relative_eq!(scaled.points()[67].1, 10.0);
    }
}
