//! Image fixtures shared by the cache tests.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Encodes an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("png encoding");
    buf
}

/// A single-colour RGBA PNG.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    encode_png(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba(rgba),
    )))
}

/// A PNG split into red, green and blue vertical thirds.
pub fn three_band_png(width: u32, height: u32) -> Vec<u8> {
    let third = width / 3;
    let image = RgbaImage::from_fn(width, height, |x, _| {
        if x < third {
            Rgba([255, 0, 0, 255])
        } else if x < third * 2 {
            Rgba([0, 255, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    });
    encode_png(&DynamicImage::ImageRgba8(image))
}
