use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::{Array1, Array3, Array4, ArrayView3, Axis};

use crate::error::{AppError, Result};

/// An embedding vector produced by an [`ImageEncoder`]
pub type Embedding = Array1<f32>;

/// Side length of the square CLIP input
pub const CLIP_INPUT_SIZE: u32 = 224;

/// Per-channel mean used by the CLIP image processor
pub const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];

/// Per-channel standard deviation used by the CLIP image processor
pub const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Turns images into fixed-length embedding vectors.
///
/// Implementations are shared read-only across requests, so they must be
/// `Send + Sync`. `encode` returns one vector per input, in input order.
pub trait ImageEncoder: Send + Sync {
    /// Short human-readable identifier, used in logs
    fn name(&self) -> &str;

    /// Encode a batch of images
    fn encode(&self, images: &[&DynamicImage]) -> Result<Vec<Embedding>>;
}

/// Encode a batch and check the encoder kept its contract
pub fn encode_batch(encoder: &dyn ImageEncoder, images: &[&DynamicImage]) -> Result<Vec<Embedding>> {
    let embeddings = encoder.encode(images)?;

    if embeddings.len() != images.len() {
        return Err(AppError::ModelInference(format!(
            "{} returned {} embeddings for {} images",
            encoder.name(),
            embeddings.len(),
            images.len()
        )));
    }
    if let Some(first) = embeddings.first() {
        if first.is_empty() || embeddings.iter().any(|e| e.len() != first.len()) {
            return Err(AppError::ModelInference(format!(
                "{} returned embeddings of inconsistent length",
                encoder.name()
            )));
        }
    }

    Ok(embeddings)
}

/// Square region of the source image that survives CLIP's resize + center crop.
///
/// The processor scales the shorter side to 224 (long side truncated) and
/// then crops the middle 224x224. Mapping that crop back to source pixels
/// lets the resize touch only the kept square. Returns `(left, top, side)`.
fn center_crop_box(width: u32, height: u32) -> (u32, u32, u32) {
    let size = CLIP_INPUT_SIZE as u64;
    let short = width.min(height) as u64;
    let long = width.max(height) as u64;

    let scaled_long = (size * long / short).max(size);
    let offset = (scaled_long - size) / 2;
    let source_offset = ((offset * short) as f64 / size as f64).round() as u64;
    let source_offset = source_offset.min(long - short) as u32;

    if width <= height {
        (0, source_offset, short as u32)
    } else {
        (source_offset, 0, short as u32)
    }
}

/// Preprocess an image the way the CLIP processor does.
///
/// Takes the centered square, resizes it to 224x224, scales to `[0, 1]`
/// and normalizes each channel. The result is laid out CHW.
pub fn preprocess_image(img: &DynamicImage) -> Array3<f32> {
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();
    let size = CLIP_INPUT_SIZE;

    let (left, top, side) = center_crop_box(width, height);
    let square = imageops::crop_imm(&rgb_img, left, top, side, side);
    let cropped = imageops::resize(&*square, size, size, FilterType::CatmullRom);

    Array3::from_shape_fn((3, size as usize, size as usize), |(c, y, x)| {
        let value = cropped.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
        (value - CLIP_MEAN[c]) / CLIP_STD[c]
    })
}

/// Preprocess several images into a single NCHW batch
pub fn preprocess_batch(images: &[&DynamicImage]) -> Result<Array4<f32>> {
    let tensors: Vec<Array3<f32>> = images.iter().map(|img| preprocess_image(img)).collect();
    let views: Vec<ArrayView3<'_, f32>> = tensors.iter().map(|t| t.view()).collect();

    ndarray::stack(Axis(0), &views)
        .map_err(|e| AppError::ModelInference(format!("Failed to build input batch: {}", e)))
}

#[cfg(feature = "embeddings")]
pub use self::clip::ClipEncoder;

#[cfg(feature = "embeddings")]
mod clip {
    use std::path::Path;
    use std::sync::Mutex;

    use image::DynamicImage;
    use tch::{CModule, Device, Kind, Tensor};

    use super::{preprocess_batch, Embedding, ImageEncoder, CLIP_INPUT_SIZE};
    use crate::error::{AppError, Result};

    /// CLIP image tower loaded from a TorchScript export.
    ///
    /// The module must map `pixel_values` of shape `[N, 3, 224, 224]` to
    /// image features of shape `[N, D]`, i.e. a trace of
    /// `CLIPModel.get_image_features`.
    pub struct ClipEncoder {
        // CModule is not Sync
        model: Mutex<CModule>,
        device: Device,
        name: String,
    }

    impl std::fmt::Debug for ClipEncoder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ClipEncoder")
                .field("name", &self.name)
                .field("device", &self.device)
                .finish_non_exhaustive()
        }
    }

    impl ClipEncoder {
        /// Load the model on the first CUDA device if there is one, else the CPU
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            let device = Device::cuda_if_available();

            let mut model = CModule::load_on_device(path, device).map_err(|e| {
                AppError::ModelInference(format!(
                    "Failed to load model from {}: {}",
                    path.display(),
                    e
                ))
            })?;
            model.set_eval();

            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(String::from)
                .unwrap_or_else(|| "clip".to_string());
            log::info!("Loaded image encoder '{}' on {:?}", name, device);

            Ok(Self {
                model: Mutex::new(model),
                device,
                name,
            })
        }
    }

    impl ImageEncoder for ClipEncoder {
        fn name(&self) -> &str {
            &self.name
        }

        fn encode(&self, images: &[&DynamicImage]) -> Result<Vec<Embedding>> {
            if images.is_empty() {
                return Ok(Vec::new());
            }

            let batch = preprocess_batch(images)?;
            let data = batch.as_slice().ok_or_else(|| {
                AppError::ModelInference("Input batch is not contiguous".to_string())
            })?;
            let size = CLIP_INPUT_SIZE as i64;
            let input = Tensor::of_slice(data)
                .reshape(&[images.len() as i64, 3, size, size])
                .to_kind(Kind::Float)
                .to_device(self.device);

            let model = self
                .model
                .lock()
                .map_err(|_| AppError::ModelInference("Encoder lock poisoned".to_string()))?;
            let output = tch::no_grad(|| model.forward_ts(&[input]))?
                .to_device(Device::Cpu)
                .to_kind(Kind::Float);
            drop(model);

            let (rows, _dim) = output.size2()?;
            if rows != images.len() as i64 {
                return Err(AppError::ModelInference(format!(
                    "Expected {} feature rows, model returned {}",
                    images.len(),
                    rows
                )));
            }

            (0..rows)
                .map(|i| {
                    let row = Vec::<f32>::try_from(output.get(i))?;
                    Ok(Embedding::from(row))
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct FixedEncoder(Vec<Embedding>);

    impl ImageEncoder for FixedEncoder {
        fn name(&self) -> &str {
            "fixed"
        }

        fn encode(&self, _images: &[&DynamicImage]) -> Result<Vec<Embedding>> {
            Ok(self.0.clone())
        }
    }

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let tensor = preprocess_image(&solid(300, 150, [255, 0, 0]));
        assert_eq!(tensor.shape(), &[3, 224, 224]);

        let red = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        let green = (0.0 - CLIP_MEAN[1]) / CLIP_STD[1];
        assert!((tensor[[0, 100, 100]] - red).abs() < 1e-5);
        assert!((tensor[[1, 0, 223]] - green).abs() < 1e-5);
    }

    #[test]
    fn test_preprocess_center_crop() {
        // Left half black, right half white; the crop keeps the middle
        let img = RgbImage::from_fn(448, 224, |x, _| {
            if x < 224 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let tensor = preprocess_image(&DynamicImage::ImageRgb8(img));
        let black = (0.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        let white = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];

        assert!((tensor[[0, 112, 0]] - black).abs() < 1e-5);
        assert!((tensor[[0, 112, 223]] - white).abs() < 1e-5);
    }

    #[test]
    fn test_center_crop_box() {
        assert_eq!(center_crop_box(224, 224), (0, 0, 224));
        assert_eq!(center_crop_box(448, 224), (112, 0, 224));
        assert_eq!(center_crop_box(300, 150), (75, 0, 150));
        // Long side is truncated: 224 * 10 / 3 = 746, offset 261
        assert_eq!(center_crop_box(10, 3), (3, 0, 3));
        assert_eq!(center_crop_box(3, 10), (0, 3, 3));
        assert_eq!(center_crop_box(1, 8192), (0, 4096, 1));
    }

    #[test]
    fn test_preprocess_extreme_aspect_ratio() {
        let img = RgbImage::from_fn(1, 8192, |_, y| Rgb([(y % 256) as u8, 0, 0]));
        let started = std::time::Instant::now();
        let tensor = preprocess_image(&DynamicImage::ImageRgb8(img));

        assert_eq!(tensor.shape(), &[3, 224, 224]);
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        // 4096 % 256 == 0, so the single kept pixel is black
        let black = (0.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        assert!((tensor[[0, 0, 0]] - black).abs() < 1e-5);
    }

    #[test]
    fn test_preprocess_batch() {
        let (a, b) = (solid(10, 10, [0, 0, 0]), solid(640, 480, [9, 9, 9]));
        let batch = preprocess_batch(&[&a, &b]).unwrap();
        assert_eq!(batch.shape(), &[2, 3, 224, 224]);
        assert!(batch.is_standard_layout());
    }

    #[test]
    fn test_encode_batch_count_mismatch() {
        let encoder = FixedEncoder(vec![Embedding::from(vec![1.0, 0.0])]);
        let (a, b) = (solid(2, 2, [0, 0, 0]), solid(2, 2, [1, 1, 1]));
        let images = [&a, &b];

        let err = encode_batch(&encoder, &images).unwrap_err();
        assert!(matches!(err, AppError::ModelInference(_)));
    }

    #[test]
    fn test_encode_batch_length_mismatch() {
        let encoder = FixedEncoder(vec![
            Embedding::from(vec![1.0, 0.0]),
            Embedding::from(vec![1.0, 0.0, 0.0]),
        ]);
        let (a, b) = (solid(2, 2, [0, 0, 0]), solid(2, 2, [1, 1, 1]));
        let images = [&a, &b];

        assert!(encode_batch(&encoder, &images).is_err());
    }

    #[test]
    fn test_encode_batch_ok() {
        let encoder = FixedEncoder(vec![
            Embedding::from(vec![1.0, 0.0]),
            Embedding::from(vec![0.0, 1.0]),
        ]);
        let (a, b) = (solid(2, 2, [0, 0, 0]), solid(2, 2, [1, 1, 1]));
        let images = [&a, &b];

        let embeddings = encode_batch(&encoder, &images).unwrap();
        assert_eq!(embeddings.len(), 2);
    }
}
