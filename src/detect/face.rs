use crate::detect::draw;
use crate::detect::regions::{suppress_overlaps, CellGrid};
use crate::detect::{Detections, Detector, ModelKind, PipelineConfig};
use image::DynamicImage;

const CELL_SIZE: u32 = 16;
const SAMPLE_STEP: u32 = 2;
const MAX_OVERLAP: f32 = 0.3;
const MIN_ASPECT: f32 = 0.5;
const MAX_ASPECT: f32 = 1.6;
const MIN_REGION_AREA: u32 = CELL_SIZE * CELL_SIZE * 2;

/// Face-detection variant. Classifies skin-tone pixels per grid cell,
/// merges skin-dominated cells into boxes and keeps the ones with a
/// face-like aspect ratio. Count semantics: number of faces boxed.
pub struct FaceDetector {
    cell_size: u32,
}

impl FaceDetector {
    pub fn new() -> Self {
        Self {
            cell_size: CELL_SIZE,
        }
    }

    fn is_skin(r: u8, g: u8, b: u8) -> bool {
        r > 95 && g > 40 && b > 20 && r > g && r > b && r.saturating_sub(g) > 15
    }

    /// Fraction of sampled pixels in the cell classified as skin.
    fn skin_fraction(rgb: &image::RgbImage, x0: u32, y0: u32, cell: u32) -> f32 {
        let (width, height) = rgb.dimensions();
        let mut skin = 0u32;
        let mut samples = 0u32;

        let mut y = y0;
        while y < (y0 + cell).min(height) {
            let mut x = x0;
            while x < (x0 + cell).min(width) {
                let p = rgb.get_pixel(x, y).0;
                if Self::is_skin(p[0], p[1], p[2]) {
                    skin += 1;
                }
                samples += 1;
                x += SAMPLE_STEP;
            }
            y += SAMPLE_STEP;
        }
        if samples == 0 {
            0.0
        } else {
            skin as f32 / samples as f32
        }
    }
}

impl Detector for FaceDetector {
    fn kind(&self) -> ModelKind {
        ModelKind::FaceDetector
    }

    fn analyze(&mut self, image: &DynamicImage, config: &PipelineConfig) -> Detections {
        let rgb = image.to_rgb8();
        let mut grid = CellGrid::new(image.width(), image.height(), self.cell_size);

        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let score = Self::skin_fraction(
                    &rgb,
                    col * self.cell_size,
                    row * self.cell_size,
                    self.cell_size,
                );
                grid.set(col, row, score);
            }
        }

        let candidates = grid.extract_regions(config.threshold.max(0.3) as f32);
        let kept: Vec<_> = suppress_overlaps(candidates, MAX_OVERLAP)
            .into_iter()
            .filter(|r| {
                let aspect = r.width as f32 / r.height as f32;
                r.score >= config.threshold as f32
                    && r.width * r.height >= MIN_REGION_AREA
                    && (MIN_ASPECT..=MAX_ASPECT).contains(&aspect)
            })
            .collect();

        let mut annotated = image.clone();
        for region in &kept {
            draw::rectangle(
                &mut annotated,
                region.x,
                region.y,
                region.width,
                region.height,
                draw::GREEN,
            );
        }

        Detections {
            image: annotated,
            count: kept.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    const SKIN: Rgb<u8> = Rgb([210, 140, 110]);

    fn frame_with_faces(boxes: &[(u32, u32, u32, u32)]) -> DynamicImage {
        let mut buffer =
            ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(192, 128, Rgb([60, 60, 60]));
        for &(x0, y0, w, h) in boxes {
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    buffer.put_pixel(x, y, SKIN);
                }
            }
        }
        DynamicImage::ImageRgb8(buffer)
    }

    #[test]
    fn skin_rule_accepts_skin_and_rejects_gray() {
        assert!(FaceDetector::is_skin(210, 140, 110));
        assert!(!FaceDetector::is_skin(60, 60, 60));
        assert!(!FaceDetector::is_skin(110, 200, 110));
    }

    #[test]
    fn no_faces_in_gray_frame() {
        let mut detector = FaceDetector::new();
        let config = PipelineConfig::new(ModelKind::FaceDetector, 0.5, false);
        assert_eq!(detector.analyze(&frame_with_faces(&[]), &config).count, 0);
    }

    #[test]
    fn counts_two_separated_faces() {
        let mut detector = FaceDetector::new();
        let config = PipelineConfig::new(ModelKind::FaceDetector, 0.5, false);
        let frame = frame_with_faces(&[(16, 32, 48, 64), (128, 32, 48, 64)]);
        assert_eq!(detector.analyze(&frame, &config).count, 2);
    }

    #[test]
    fn wide_skin_band_is_not_a_face() {
        let mut detector = FaceDetector::new();
        let config = PipelineConfig::new(ModelKind::FaceDetector, 0.5, false);
        let frame = frame_with_faces(&[(0, 48, 192, 32)]);
        assert_eq!(detector.analyze(&frame, &config).count, 0);
    }
}
