use serde::{Deserialize, Serialize};

/// Similarity score and difference heatmap for a pair of images.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Comparison {
    /// Cosine similarity of the two image embeddings, in `[-1, 1]`.
    pub similarity_score: f32,
    /// Grayscale difference heatmap as a `data:image/png;base64,...` URI.
    pub visualization: String,
}
