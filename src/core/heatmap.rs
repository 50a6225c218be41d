use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageOutputFormat, Luma, Rgb, RgbImage};
use imageproc::map::{map_colors, map_colors2};

use crate::error::Result;

/// Side length of the square diff heatmap
pub const DIFF_SIZE: u32 = 224;

/// Mean absolute per-channel difference, one `f32` per pixel
pub type DiffMap = ImageBuffer<Luma<f32>, Vec<f32>>;

fn to_diff_input(img: &DynamicImage) -> RgbImage {
    imageops::resize(&img.to_rgb8(), DIFF_SIZE, DIFF_SIZE, FilterType::CatmullRom)
}

/// Per-pixel difference of two images after resizing both to 224x224 RGB
pub fn diff_map(a: &DynamicImage, b: &DynamicImage) -> DiffMap {
    let a = to_diff_input(a);
    let b = to_diff_input(b);

    map_colors2(&a, &b, |p: Rgb<u8>, q: Rgb<u8>| {
        let total: f32 = p
            .0
            .iter()
            .zip(q.0.iter())
            .map(|(&x, &y)| (x as f32 - y as f32).abs())
            .sum();
        Luma([total / 3.0])
    })
}

/// Render a grayscale heatmap of where two images differ.
///
/// The largest difference maps to 255. When the resized images are
/// pixel-identical there is nothing to scale against and the heatmap is
/// all black.
pub fn diff_heatmap(a: &DynamicImage, b: &DynamicImage) -> GrayImage {
    let diff = diff_map(a, b);
    let max = diff.pixels().map(|p| p[0]).fold(0.0f32, f32::max);

    if max == 0.0 {
        log::debug!("Images are identical after resizing, heatmap is black");
        return GrayImage::new(DIFF_SIZE, DIFF_SIZE);
    }

    map_colors(&diff, |p: Luma<f32>| Luma([(p[0] / max * 255.0) as u8]))
}

/// Encode a grayscale image as PNG
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)?;
    Ok(buf)
}

/// Wrap bytes in a `data:<mime>;base64,<...>` URI
pub fn to_data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(data))
}

/// Split a base64 data URI into its MIME type and decoded bytes
pub fn parse_data_uri(uri: &str) -> Option<(&str, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let data = BASE64.decode(payload).ok()?;
    Some((mime, data))
}

/// Heatmap of two images as a `data:image/png;base64,...` URI
pub fn render_visualization(a: &DynamicImage, b: &DynamicImage) -> Result<String> {
    let heatmap = diff_heatmap(a, b);
    let png = encode_png(&heatmap)?;
    Ok(to_data_uri("image/png", &png))
}
