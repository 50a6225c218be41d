use std::io::Cursor;

use image::io::{Limits, Reader};
use image::DynamicImage;

use crate::error::{AppError, Result};

/// Decodes an uploaded payload, sniffing the format from its content.
///
/// `field` names the upload in error messages. Images wider or taller than
/// `max_dimension` are rejected before their pixels are allocated.
pub fn decode_image(field: &str, data: &[u8], max_dimension: u32) -> Result<DynamicImage> {
    let invalid = |reason: String| AppError::InvalidImage {
        field: field.to_string(),
        reason,
    };

    if data.is_empty() {
        return Err(invalid("empty payload".to_string()));
    }

    let mut reader = Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| invalid(e.to_string()))?;

    if reader.format().is_none() {
        return Err(invalid("unrecognized image format".to_string()));
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(max_dimension);
    limits.max_image_height = Some(max_dimension);
    reader.limits(limits);

    let image = reader.decode().map_err(|e| invalid(e.to_string()))?;
    log::debug!(
        "Decoded '{}': {}x{} {:?}",
        field,
        image.width(),
        image.height(),
        image.color()
    );

    Ok(image)
}
