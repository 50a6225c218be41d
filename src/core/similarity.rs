use ndarray::Array1;

use crate::error::{AppError, Result};

/// Scale a vector to unit L2 norm.
///
/// A zero or non-finite norm cannot be normalized and is reported as
/// [`AppError::DegenerateEmbedding`] instead of producing NaN.
pub fn l2_normalize(v: &Array1<f32>) -> Result<Array1<f32>> {
    if v.iter().any(|x| !x.is_finite()) {
        return Err(AppError::DegenerateEmbedding(
            "embedding contains non-finite values".to_string(),
        ));
    }

    let norm = v.dot(v).sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(AppError::DegenerateEmbedding(format!(
            "embedding norm is {}",
            norm
        )));
    }

    Ok(v.mapv(|x| x / norm))
}

/// Cosine similarity of two embeddings, in `[-1, 1]`
pub fn cosine_similarity(a: &Array1<f32>, b: &Array1<f32>) -> Result<f32> {
    if a.len() != b.len() {
        return Err(AppError::ModelInference(format!(
            "embedding lengths differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let a = l2_normalize(a)?;
    let b = l2_normalize(b)?;

    // Rounding can push the dot product of unit vectors slightly past 1
    Ok(a.dot(&b).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        // Test with identical vectors
        let a = Array1::from(vec![1.0, 0.0, 0.0]);
        let b = Array1::from(vec![1.0, 0.0, 0.0]);
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 1e-6);

        // Test with orthogonal vectors
        let a = Array1::from(vec![1.0, 0.0]);
        let b = Array1::from(vec![0.0, 1.0]);
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-6);

        // Test with opposite vectors
        let a = Array1::from(vec![1.0, 0.0]);
        let b = Array1::from(vec![-1.0, 0.0]);
        assert!((cosine_similarity(&a, &b).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_invariance_and_symmetry() {
        let a = Array1::from(vec![0.3, -1.2, 4.0, 0.01]);
        let b = Array1::from(vec![2.0, 0.5, -0.7, 3.3]);
        let scaled = a.mapv(|x| x * 1000.0);

        let ab = cosine_similarity(&a, &b).unwrap();
        let ba = cosine_similarity(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-6);
        assert!((cosine_similarity(&scaled, &b).unwrap() - ab).abs() < 1e-5);
        assert!((-1.0..=1.0).contains(&ab));
    }

    #[test]
    fn test_l2_normalize() {
        let v = l2_normalize(&Array1::from(vec![3.0, 4.0])).unwrap();
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_degenerate() {
        let zero = Array1::from(vec![0.0; 512]);
        let one = Array1::from(vec![1.0; 512]);
        let err = cosine_similarity(&zero, &one).unwrap_err();
        assert!(matches!(err, AppError::DegenerateEmbedding(_)));
    }

    #[test]
    fn test_nan_is_degenerate() {
        let v = Array1::from(vec![1.0, f32::NAN]);
        assert!(matches!(
            l2_normalize(&v).unwrap_err(),
            AppError::DegenerateEmbedding(_)
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let a = Array1::from(vec![1.0, 0.0]);
        let b = Array1::from(vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            cosine_similarity(&a, &b).unwrap_err(),
            AppError::ModelInference(_)
        ));
    }
}
