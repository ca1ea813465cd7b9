//! Plain pixel-write annotation helpers. Boxes, skeleton lines and the
//! FPS overlay are burned directly into the frame before re-encoding.

use image::{DynamicImage, GenericImage, Rgba};

pub const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const ORANGE: Rgba<u8> = Rgba([245, 117, 66, 255]);

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

fn put(image: &mut DynamicImage, x: u32, y: u32, color: Rgba<u8>) {
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

pub fn horizontal_line(image: &mut DynamicImage, x: u32, y: u32, length: u32, color: Rgba<u8>) {
    for dx in 0..length {
        put(image, x + dx, y, color);
    }
}

pub fn vertical_line(image: &mut DynamicImage, x: u32, y: u32, length: u32, color: Rgba<u8>) {
    for dy in 0..length {
        put(image, x, y + dy, color);
    }
}

/// Hollow rectangle, two pixels thick.
pub fn rectangle(
    image: &mut DynamicImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: Rgba<u8>,
) {
    for t in 0..2 {
        horizontal_line(image, x, y + t, width, color);
        horizontal_line(image, x, (y + height).saturating_sub(t + 1), width, color);
        vertical_line(image, x + t, y, height, color);
        vertical_line(image, (x + width).saturating_sub(t + 1), y, height, color);
    }
}

// 5x7 bitmap glyphs for the FPS overlay, one row per byte, low 5 bits.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        '0' => [0x0e, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0e],
        '1' => [0x04, 0x0c, 0x04, 0x04, 0x04, 0x04, 0x0e],
        '2' => [0x0e, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1f],
        '3' => [0x1f, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0e],
        '4' => [0x02, 0x06, 0x0a, 0x12, 0x1f, 0x02, 0x02],
        '5' => [0x1f, 0x10, 0x1e, 0x01, 0x01, 0x11, 0x0e],
        '6' => [0x06, 0x08, 0x10, 0x1e, 0x11, 0x11, 0x0e],
        '7' => [0x1f, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0e, 0x11, 0x11, 0x0e, 0x11, 0x11, 0x0e],
        '9' => [0x0e, 0x11, 0x11, 0x0f, 0x01, 0x02, 0x0c],
        'F' => [0x1f, 0x10, 0x10, 0x1e, 0x10, 0x10, 0x10],
        'P' => [0x1e, 0x11, 0x11, 0x1e, 0x10, 0x10, 0x10],
        'S' => [0x0f, 0x10, 0x10, 0x0e, 0x01, 0x01, 0x1e],
        ':' => [0x00, 0x04, 0x04, 0x00, 0x04, 0x04, 0x00],
        ' ' => [0x00; 7],
        _ => return None,
    };
    Some(rows)
}

/// Draws `text` at (x, y), `scale` pixels per glyph dot. Characters
/// outside the glyph table are skipped.
pub fn text(image: &mut DynamicImage, text: &str, x: u32, y: u32, scale: u32, color: Rgba<u8>) {
    let mut cursor = x;
    for c in text.chars() {
        let Some(rows) = glyph(c) else {
            continue;
        };
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        put(
                            image,
                            cursor + col * scale + dx,
                            y + row as u32 * scale + dy,
                            color,
                        );
                    }
                }
            }
        }
        cursor += (GLYPH_WIDTH + 1) * scale;
    }
}

/// Top-left FPS readout.
pub fn fps_overlay(image: &mut DynamicImage, fps: u32) {
    text(image, &format!("FPS: {}", fps), 10, 10, 2, GREEN);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageBuffer, Rgb};

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(
            width,
            height,
            Rgb([0, 0, 0]),
        ))
    }

    #[test]
    fn rectangle_touches_all_four_edges() {
        let mut image = blank(64, 64);
        rectangle(&mut image, 8, 8, 16, 16, GREEN);
        assert_eq!(image.get_pixel(8, 8), GREEN);
        assert_eq!(image.get_pixel(23, 8), GREEN);
        assert_eq!(image.get_pixel(8, 23), GREEN);
        assert_eq!(image.get_pixel(23, 23), GREEN);
        assert_ne!(image.get_pixel(16, 16), GREEN);
    }

    #[test]
    fn drawing_out_of_bounds_is_clipped() {
        let mut image = blank(16, 16);
        rectangle(&mut image, 10, 10, 200, 200, GREEN);
        text(&mut image, "FPS: 999", 0, 0, 4, GREEN);
    }

    #[test]
    fn fps_overlay_marks_pixels() {
        let mut image = blank(128, 64);
        fps_overlay(&mut image, 24);
        let lit = (0..128)
            .flat_map(|x| (0..64).map(move |y| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y) == GREEN)
            .count();
        assert!(lit > 0);
    }
}
