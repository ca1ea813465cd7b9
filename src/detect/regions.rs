//! Grid-based region extraction shared by the box-producing variants.
//! The image is scored cell by cell; adjacent hot cells merge into
//! rectangular regions which are then overlap-suppressed.

/// Axis-aligned pixel-space region with a 0..1 score.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
}

impl Region {
    fn right(&self) -> u32 {
        self.x + self.width
    }

    fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn iou(&self, other: &Region) -> f32 {
        let ix = self.x.max(other.x);
        let iy = self.y.max(other.y);
        let ir = self.right().min(other.right());
        let ib = self.bottom().min(other.bottom());
        if ir <= ix || ib <= iy {
            return 0.0;
        }
        let intersection = ((ir - ix) * (ib - iy)) as f32;
        let union = (self.width * self.height + other.width * other.height) as f32 - intersection;
        intersection / union
    }
}

/// Per-cell scores over a fixed grid, `cell_size` pixels per cell.
pub struct CellGrid {
    pub cols: u32,
    pub rows: u32,
    pub cell_size: u32,
    scores: Vec<f32>,
}

impl CellGrid {
    pub fn new(image_width: u32, image_height: u32, cell_size: u32) -> Self {
        let cols = image_width.div_ceil(cell_size).max(1);
        let rows = image_height.div_ceil(cell_size).max(1);
        Self {
            cols,
            rows,
            cell_size,
            scores: vec![0.0; (cols * rows) as usize],
        }
    }

    pub fn set(&mut self, col: u32, row: u32, score: f32) {
        self.scores[(row * self.cols + col) as usize] = score;
    }

    fn get(&self, col: u32, row: u32) -> f32 {
        self.scores[(row * self.cols + col) as usize]
    }

    /// Flood-fills 4-connected cells whose score is at least `cutoff`
    /// into bounding-box regions. Region score is the mean cell score.
    pub fn extract_regions(&self, cutoff: f32) -> Vec<Region> {
        let mut visited = vec![false; self.scores.len()];
        let mut regions = Vec::new();

        for row in 0..self.rows {
            for col in 0..self.cols {
                let index = (row * self.cols + col) as usize;
                if visited[index] || self.get(col, row) < cutoff {
                    continue;
                }

                let mut stack = vec![(col, row)];
                let (mut min_c, mut max_c, mut min_r, mut max_r) = (col, col, row, row);
                let mut total = 0.0;
                let mut cells = 0u32;

                while let Some((c, r)) = stack.pop() {
                    let i = (r * self.cols + c) as usize;
                    if visited[i] || self.get(c, r) < cutoff {
                        continue;
                    }
                    visited[i] = true;
                    total += self.get(c, r);
                    cells += 1;
                    min_c = min_c.min(c);
                    max_c = max_c.max(c);
                    min_r = min_r.min(r);
                    max_r = max_r.max(r);

                    if c > 0 {
                        stack.push((c - 1, r));
                    }
                    if c + 1 < self.cols {
                        stack.push((c + 1, r));
                    }
                    if r > 0 {
                        stack.push((c, r - 1));
                    }
                    if r + 1 < self.rows {
                        stack.push((c, r + 1));
                    }
                }

                regions.push(Region {
                    x: min_c * self.cell_size,
                    y: min_r * self.cell_size,
                    width: (max_c - min_c + 1) * self.cell_size,
                    height: (max_r - min_r + 1) * self.cell_size,
                    score: total / cells as f32,
                });
            }
        }
        regions
    }
}

/// Contrast score of one cell: normalized luminance standard deviation
/// over a subsampled window, 0..1.
pub fn luma_contrast(
    luma: &image::GrayImage,
    x0: u32,
    y0: u32,
    cell: u32,
    sample_step: u32,
) -> f32 {
    let (width, height) = luma.dimensions();
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut samples = 0u32;

    let mut y = y0;
    while y < (y0 + cell).min(height) {
        let mut x = x0;
        while x < (x0 + cell).min(width) {
            let v = luma.get_pixel(x, y).0[0] as f32;
            sum += v;
            sum_sq += v * v;
            samples += 1;
            x += sample_step;
        }
        y += sample_step;
    }
    if samples == 0 {
        return 0.0;
    }
    let mean = sum / samples as f32;
    let variance = (sum_sq / samples as f32 - mean * mean).max(0.0);
    (variance.sqrt() / 128.0).min(1.0)
}

/// Greedy overlap suppression: keep the best-scoring region, drop any
/// remaining region overlapping it beyond `max_iou`, repeat.
pub fn suppress_overlaps(mut regions: Vec<Region>, max_iou: f32) -> Vec<Region> {
    regions.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Region> = Vec::new();
    for region in regions {
        if kept.iter().all(|k| k.iou(&region) <= max_iou) {
            kept.push(region);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_hot_cells_merge_into_one_region() {
        let mut grid = CellGrid::new(64, 64, 16);
        grid.set(1, 1, 0.9);
        grid.set(2, 1, 0.7);
        grid.set(1, 2, 0.8);
        let regions = grid.extract_regions(0.5);
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!((region.x, region.y), (16, 16));
        assert_eq!((region.width, region.height), (32, 32));
        assert!((region.score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn disjoint_cells_stay_separate() {
        let mut grid = CellGrid::new(128, 64, 16);
        grid.set(0, 0, 0.9);
        grid.set(6, 3, 0.9);
        assert_eq!(grid.extract_regions(0.5).len(), 2);
    }

    #[test]
    fn suppression_drops_heavy_overlap() {
        let a = Region {
            x: 0,
            y: 0,
            width: 40,
            height: 40,
            score: 0.9,
        };
        let b = Region {
            x: 4,
            y: 4,
            width: 40,
            height: 40,
            score: 0.6,
        };
        let c = Region {
            x: 100,
            y: 100,
            width: 20,
            height: 20,
            score: 0.7,
        };
        let kept = suppress_overlaps(vec![a.clone(), b, c.clone()], 0.4);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], a);
        assert_eq!(kept[1], c);
    }

    #[test]
    fn iou_of_disjoint_regions_is_zero() {
        let a = Region {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
            score: 1.0,
        };
        let b = Region {
            x: 20,
            y: 20,
            width: 10,
            height: 10,
            score: 1.0,
        };
        assert_eq!(a.iou(&b), 0.0);
    }
}
