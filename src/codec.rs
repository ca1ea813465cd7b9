use crate::error::FrameError;
use image::DynamicImage;
use std::io::Cursor;

/// Decodes one compressed camera payload into pixels. Malformed input is
/// a recoverable `FrameError::Decode`; the caller skips the frame and
/// keeps reading.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, FrameError> {
    image::load_from_memory(bytes).map_err(FrameError::Decode)
}

/// Re-encodes an annotated image to JPEG for the video channel.
pub fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, FrameError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .to_rgb8()
        .write_to(&mut buffer, image::ImageFormat::Jpeg)
        .map_err(FrameError::Encode)?;
    Ok(buffer.into_inner())
}
