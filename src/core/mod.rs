//! Core functionality for decoding, embedding and comparing images

/// Decodes uploaded payloads into images.
pub mod decode;
/// Image encoders producing embedding vectors.
pub mod embeddings;
/// Pixel-difference heatmaps and their data-URI encoding.
pub mod heatmap;
/// Normalization and cosine similarity of embeddings.
pub mod similarity;
