//! Related-content ranking by embedding similarity.

use engine_core::{ContentItem, EmbeddingVector, Error, RelatedItem, Result};
use tracing::debug;

/// Cosine similarity in [-1, 1]. Never NaN.
///
/// Fails with `ModelMismatch` or `DimensionMismatch` when the vectors are
/// not comparable. A zero-norm or non-finite vector scores 0.
pub fn cosine_similarity(a: &EmbeddingVector, b: &EmbeddingVector) -> Result<f64> {
    a.ensure_comparable(b)?;
    if !a.is_finite() || !b.is_finite() {
        return Ok(0.0);
    }

    let dot: f64 = a
        .values
        .iter()
        .zip(b.values.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();

    let denom = a.norm() * b.norm();
    if denom <= f64::EPSILON {
        return Ok(0.0);
    }
    let score = dot / denom;
    if !score.is_finite() {
        return Ok(0.0);
    }
    Ok(score.clamp(-1.0, 1.0))
}

/// Ranks `pool` by similarity to the item `target_id`.
///
/// The target and items without a comparable embedding are never
/// candidates. Ties keep pool order. A target without an embedding yields
/// an empty list.
pub fn related(target_id: &str, pool: &[ContentItem], k: usize) -> Result<Vec<RelatedItem>> {
    let target = pool
        .iter()
        .find(|item| item.id == target_id)
        .ok_or_else(|| Error::not_found(format!("content item '{}'", target_id)))?;

    // A corrupt target vector ranks nothing rather than everything at 0
    let Some(target_vec) = target.embedding.as_ref().filter(|v| v.is_finite()) else {
        return Ok(Vec::new());
    };

    let mut scored: Vec<RelatedItem> = pool
        .iter()
        .filter(|item| item.id != target.id)
        .filter_map(|item| {
            let candidate = item.embedding.as_ref().filter(|v| v.is_finite())?;
            match cosine_similarity(target_vec, candidate) {
                Ok(score) => Some(RelatedItem {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    kind: item.kind,
                    score,
                }),
                Err(e) => {
                    debug!(item = %item.id, error = %e, "Skipping incomparable embedding");
                    None
                }
            }
        })
        .collect();

    // sort_by is stable, so equal scores keep pool order
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    Ok(scored)
}
