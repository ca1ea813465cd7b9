use crate::detect::draw;
use crate::detect::regions::{luma_contrast, CellGrid};
use crate::detect::{Detections, Detector, ModelKind, PipelineConfig};
use image::DynamicImage;

const CELL_SIZE: u32 = 16;
const SAMPLE_STEP: u32 = 2;
// A standing figure occupies a tall, narrow slice of the frame.
const MIN_HEIGHT_RATIO: f32 = 0.4;
const MAX_WIDTH_RATIO: f32 = 0.6;

/// Pose-estimation variant. Looks for one tall contiguous region of
/// texture and, when found, burns a stick-figure skeleton over it.
/// Count semantics: 1 if a pose is present, otherwise 0.
pub struct PoseEstimator {
    cell_size: u32,
}

impl PoseEstimator {
    pub fn new() -> Self {
        Self {
            cell_size: CELL_SIZE,
        }
    }

    fn draw_skeleton(image: &mut DynamicImage, x: u32, y: u32, width: u32, height: u32) {
        let center_x = x + width / 2;
        let head = (height / 6).max(4);

        // head
        draw::rectangle(image, center_x.saturating_sub(head / 2), y, head, head, draw::ORANGE);
        // spine
        draw::vertical_line(image, center_x, y + head, height - head, draw::ORANGE);
        // shoulders and hips
        draw::horizontal_line(image, x, y + head + height / 8, width, draw::ORANGE);
        draw::horizontal_line(image, x, y + height * 2 / 3, width, draw::ORANGE);
    }
}

impl Detector for PoseEstimator {
    fn kind(&self) -> ModelKind {
        ModelKind::PoseEstimator
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

        let figure = grid
            .extract_regions(config.threshold.max(0.05) as f32)
            .into_iter()
            .filter(|r| {
                r.height as f32 >= image.height() as f32 * MIN_HEIGHT_RATIO
                    && r.width as f32 <= image.width() as f32 * MAX_WIDTH_RATIO
                    && r.score >= config.threshold as f32
            })
            .max_by(|a, b| a.score.total_cmp(&b.score));

        let mut annotated = image.clone();
        let count = match figure {
            Some(region) => {
                Self::draw_skeleton(
                    &mut annotated,
                    region.x,
                    region.y,
                    region.width,
                    region.height,
                );
                1
            }
            None => 0,
        };

        Detections {
            image: annotated,
            count,
        }
    }
}
