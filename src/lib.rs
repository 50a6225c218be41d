#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # imagesim
//!
//! An HTTP service and library that scores how semantically similar two
//! images are and shows where their pixels differ.
//!
//! ## Features
//!
//! - **Embeddings**: CLIP image features from a TorchScript export, behind the
//!   [`ImageEncoder`] trait so other encoders can be plugged in
//! - **Similarity**: cosine similarity of L2-normalized embeddings
//! - **Heatmaps**: 224x224 grayscale map of per-pixel differences, returned
//!   as a PNG data URI
//! - **Web API**: `POST /compute` with two multipart uploads, `GET /ping`
//!
//! ## Model
//!
//! The `embeddings` feature loads `MODEL_PATH`, a traced
//! `CLIPModel.get_image_features` taking `pixel_values` of shape
//! `[N, 3, 224, 224]` (e.g. from `openai/clip-vit-base-patch32`).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imagesim::{compare_images, core::decode::decode_image, ImageEncoder, Result};
//!
//! fn run(encoder: &dyn ImageEncoder, a: &[u8], b: &[u8]) -> Result<()> {
//!     let first = decode_image("a", a, 8192)?;
//!     let second = decode_image("b", b, 8192)?;
//!     let comparison = compare_images(encoder, &first, &second)?;
//!     println!("similarity: {:.3}", comparison.similarity_score);
//!     Ok(())
//! }
//! ```

use image::DynamicImage;

// Internal modules
#[cfg(feature = "api")]
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
pub mod models;
mod state;
mod utils;

/// Build-time information generated by `built`.
#[allow(dead_code, unreachable_pub, missing_docs)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Public API exports
pub use crate::{
    core::embeddings::{Embedding, ImageEncoder},
    error::{AppError, Result},
    models::comparison::Comparison,
    state::{AppState, Config},
};

#[cfg(feature = "api")]
pub use crate::api::{create_router, handlers::{compute_similarity, ping}};

#[cfg(feature = "embeddings")]
pub use crate::core::embeddings::ClipEncoder;

/// Initialize logging with default settings
///
/// Honors `RUST_LOG`, defaulting to `info`. `tracing` events from the HTTP
/// layers are forwarded through the same logger.
///
/// # Errors
///
/// Returns an error if a global logger is already installed.
///
/// # Example
///
/// ```no_run
/// use imagesim::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::Config(format!("Failed to initialize logging: {}", e)))?;

    log::info!(
        "Initializing imagesim {} (built {})",
        built_info::PKG_VERSION,
        built_info::BUILT_TIME_UTC
    );
    Ok(())
}

/// Compare two decoded images
///
/// Both images are embedded in one batched encoder call and scored by
/// cosine similarity; independently, their pixel difference is rendered
/// as a heatmap data URI.
///
/// # Errors
///
/// [`AppError::ModelInference`] if the encoder fails or breaks its
/// contract, [`AppError::DegenerateEmbedding`] if an embedding has zero
/// norm, [`AppError::Image`] if the heatmap cannot be encoded.
pub fn compare_images(
    encoder: &dyn ImageEncoder,
    first: &DynamicImage,
    second: &DynamicImage,
) -> Result<Comparison> {
    let embeddings = crate::core::embeddings::encode_batch(encoder, &[first, second])?;
    let similarity_score =
        crate::core::similarity::cosine_similarity(&embeddings[0], &embeddings[1])?;
    log::debug!("{} similarity: {:.4}", encoder.name(), similarity_score);

    let visualization = crate::core::heatmap::render_visualization(first, second)?;

    Ok(Comparison {
        similarity_score,
        visualization,
    })
}
