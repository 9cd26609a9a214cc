//! Decoding raw bytes into square thumbnails.
//!
//! Images are first shrunk to a bounded intermediate size. The centered square
//! of that intermediate is then cut out and scaled to the target ("cover"), so
//! the final resize never allocates more than `target × target` pixels.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits};

use crate::domain::entities::CachedBitmap;
use crate::domain::errors::TransformError;

/// Default thumbnail edge length in pixels.
pub const DEFAULT_DECODE_SIZE: u32 = 96;
/// Smallest accepted thumbnail edge.
pub const MIN_DECODE_SIZE: u32 = 32;
/// Largest accepted thumbnail edge, also the intermediate cap.
pub const MAX_DECODE_SIZE: u32 = 512;

/// Largest accepted source edge in pixels.
pub const MAX_SOURCE_DIMENSION: u32 = 16_384;
/// Allocation ceiling for a single full-resolution decode.
const MAX_DECODE_ALLOC: u64 = 1024 * 1024 * 1024;

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_SOURCE_DIMENSION);
    limits.max_image_height = Some(MAX_SOURCE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

/// Decodes `bytes` into a `target_size × target_size` bitmap.
///
/// # Errors
/// Returns [`TransformError`] if the input is empty, not a recognised image
/// format, larger than the decode limits, or fails to decode.
pub fn decode(bytes: &[u8], target_size: u32) -> Result<CachedBitmap, TransformError> {
    if bytes.is_empty() {
        return Err(TransformError::EmptyInput);
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(TransformError::UnknownFormat);
    }
    reader.limits(decode_limits());

    let target = target_size.max(1);
    let decoded = reader.decode()?;
    let loaded = bound_intermediate(decoded, target);
    cover_crop(&loaded, target)
}

/// Shrinks `image` to fit inside `2 × target` (capped at 512px), keeping its
/// aspect ratio. Images already inside the bound are returned untouched.
#[must_use]
pub fn bound_intermediate(image: DynamicImage, target: u32) -> DynamicImage {
    let bound = target.saturating_mul(2).min(MAX_DECODE_SIZE);
    if image.width() <= bound && image.height() <= bound {
        return image;
    }
    image.resize(bound, bound, FilterType::Triangle)
}

/// Cuts the centered square out of `image` and scales it to
/// `target × target`.
///
/// # Errors
/// Returns [`TransformError::ZeroDimensions`] for an empty image.
pub fn cover_crop(image: &DynamicImage, target: u32) -> Result<CachedBitmap, TransformError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(TransformError::ZeroDimensions { width, height });
    }

    let side = width.min(height);
    let (x, y) = crop_origin(width, height, side);
    let square = image.crop_imm(x, y, side, side);

    let thumbnail = if side == target {
        square
    } else {
        square.resize_exact(target, target, FilterType::Triangle)
    };
    Ok(CachedBitmap::new(thumbnail))
}

/// Top-left corner of a centered `target` square inside `width × height`,
/// clamped so the square stays in bounds.
#[must_use]
pub fn crop_origin(width: u32, height: u32, target: u32) -> (u32, u32) {
    let clamp = |side: u32| {
        let offset = side.saturating_sub(target) / 2;
        offset.min(side.saturating_sub(target))
    };
    (clamp(width), clamp(height))
}

/// Clamps a configured decode size into the accepted range.
#[must_use]
pub fn clamp_decode_size(size: u32) -> u32 {
    size.clamp(MIN_DECODE_SIZE, MAX_DECODE_SIZE)
}
