use crate::detect::draw;
use crate::detect::regions::{luma_contrast, suppress_overlaps, CellGrid};
use crate::detect::{Detections, Detector, ModelKind, PipelineConfig};
use crate::error::PipelineError;
use image::DynamicImage;

const CELL_SIZE: u32 = 16;
const SAMPLE_STEP: u32 = 2;
const MAX_OVERLAP: f32 = 0.4;
// A region smaller than one cell pair is noise, not an object.
const MIN_REGION_AREA: u32 = CELL_SIZE * CELL_SIZE * 2;

/// Object-detection variant. Scores local contrast per grid cell,
/// merges hot cells into candidate boxes and keeps the ones whose
/// score clears the configured threshold after overlap suppression.
/// Count semantics: number of boxes kept.
pub struct ObjectDetector {
    cell_size: u32,
}

impl ObjectDetector {
    pub fn new() -> Result<Self, PipelineError> {
        if CELL_SIZE == 0 || !CELL_SIZE.is_power_of_two() {
            return Err(PipelineError::Init(
                "yolov4",
                "cell size must be a power of two".to_string(),
            ));
        }
        Ok(Self {
            cell_size: CELL_SIZE,
        })
    }
}

impl Detector for ObjectDetector {
    fn kind(&self) -> ModelKind {
        ModelKind::ObjectDetector
    }

    fn analyze(&mut self, image: &DynamicImage, config: &PipelineConfig) -> Detections {
        let luma = image.to_luma8();
        let mut grid = CellGrid::new(image.width(), image.height(), self.cell_size);

        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let score = luma_contrast(
                    &luma,
                    col * self.cell_size,
                    row * self.cell_size,
                    self.cell_size,
                    SAMPLE_STEP,
                );
                grid.set(col, row, score);
            }
        }

        let candidates = grid.extract_regions(config.threshold.max(0.05) as f32);
        let kept: Vec<_> = suppress_overlaps(candidates, MAX_OVERLAP)
            .into_iter()
            .filter(|r| r.score >= config.threshold as f32 && r.width * r.height >= MIN_REGION_AREA)
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

    fn flat_image() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(
            128,
            128,
            Rgb([90, 90, 90]),
        ))
    }

    fn striped_patch() -> DynamicImage {
        let mut buffer =
            ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(128, 128, Rgb([90, 90, 90]));
        for y in 32..96 {
            for x in 32..96 {
                let v = if x % 4 < 2 { 255 } else { 0 };
                buffer.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
        DynamicImage::ImageRgb8(buffer)
    }

    #[test]
    fn flat_frame_yields_no_detections() {
        let mut detector = ObjectDetector::new().unwrap();
        let config = PipelineConfig::new(ModelKind::ObjectDetector, 0.5, false);
        let result = detector.analyze(&flat_image(), &config);
        assert_eq!(result.count, 0);
    }

    #[test]
    fn high_contrast_patch_is_boxed() {
        let mut detector = ObjectDetector::new().unwrap();
        let config = PipelineConfig::new(ModelKind::ObjectDetector, 0.5, false);
        let result = detector.analyze(&striped_patch(), &config);
        assert_eq!(result.count, 1);
    }

    #[test]
    fn raising_threshold_to_max_drops_everything() {
        let mut detector = ObjectDetector::new().unwrap();
        let config = PipelineConfig::new(ModelKind::ObjectDetector, 1.0, false);
        let result = detector.analyze(&striped_patch(), &config);
        assert_eq!(result.count, 0);
    }
}
