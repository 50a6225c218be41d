#![allow(dead_code)]

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use imagesim::{Embedding, ImageEncoder, Result};

/// Deterministic stand-in for the CLIP model: the mean colour plus a bias term
pub struct MeanColorEncoder;

impl ImageEncoder for MeanColorEncoder {
    fn name(&self) -> &str {
        "mean-color"
    }

    fn encode(&self, images: &[&DynamicImage]) -> Result<Vec<Embedding>> {
        Ok(images
            .iter()
            .map(|img| {
                let rgb = img.to_rgb8();
                let count = (rgb.width() * rgb.height()).max(1) as f32;
                let mut sums = [0.0f32; 3];
                for pixel in rgb.pixels() {
                    for (sum, &channel) in sums.iter_mut().zip(pixel.0.iter()) {
                        *sum += channel as f32 / 255.0;
                    }
                }
                Embedding::from(vec![sums[0] / count, sums[1] / count, sums[2] / count, 1.0])
            })
            .collect())
    }
}

/// Encoder whose output cannot be normalized
pub struct ZeroEncoder;

impl ImageEncoder for ZeroEncoder {
    fn name(&self) -> &str {
        "zero"
    }

    fn encode(&self, images: &[&DynamicImage]) -> Result<Vec<Embedding>> {
        Ok(images.iter().map(|_| Embedding::zeros(512)).collect())
    }
}

/// Encoder that takes longer than any reasonable test timeout
pub struct SlowEncoder;

impl ImageEncoder for SlowEncoder {
    fn name(&self) -> &str {
        "slow"
    }

    fn encode(&self, images: &[&DynamicImage]) -> Result<Vec<Embedding>> {
        std::thread::sleep(std::time::Duration::from_millis(1500));
        MeanColorEncoder.encode(images)
    }
}

pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    }))
}

pub fn encode(img: &DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

pub fn png(img: &DynamicImage) -> Vec<u8> {
    encode(img, ImageOutputFormat::Png)
}
