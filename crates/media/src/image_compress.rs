use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{GenericImageView, ImageReader};

/// Inputs at or above these sizes get progressively more aggressive JPEG
/// quality tiers.
const LARGE_INPUT: usize = 4 * 1024 * 1024;
const MEDIUM_INPUT: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ImageCompressError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

pub(crate) struct EncodedImage {
    pub data: Vec<u8>,
    pub mime_type: &'static str,
}

fn jpeg_quality_for(input_len: usize) -> u8 {
    if input_len >= LARGE_INPUT {
        70
    } else if input_len >= MEDIUM_INPUT {
        75
    } else {
        82
    }
}

/// Decodes, downscales to `max_edge`, and re-encodes an image.
///
/// Opaque images become JPEG at a size-tiered quality; images with an
/// alpha channel stay PNG. Whether the result actually shrank is judged
/// by the caller — this function only produces the candidate encoding.
pub(crate) fn compress_image(
    data: &[u8],
    max_edge: u32,
) -> Result<EncodedImage, ImageCompressError> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
    let mut img = reader.decode()?;

    let (width, height) = img.dimensions();
    if width.max(height) > max_edge {
        // resize preserves aspect ratio within the bounding box.
        img = img.resize(max_edge, max_edge, image::imageops::FilterType::Lanczos3);
    }

    let mut out = Vec::new();
    if img.color().has_alpha() {
        img.to_rgba8()
            .write_with_encoder(PngEncoder::new(Cursor::new(&mut out)))?;
        Ok(EncodedImage {
            data: out,
            mime_type: "image/png",
        })
    } else {
        let quality = jpeg_quality_for(data.len());
        img.to_rgb8().write_with_encoder(JpegEncoder::new_with_quality(
            Cursor::new(&mut out),
            quality,
        ))?;
        Ok(EncodedImage {
            data: out,
            mime_type: "image/jpeg",
        })
    }
}
