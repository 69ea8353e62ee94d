//! Top-K source selection.
//!
//! Bounds active playback to the K loudest stations. Only stations with a
//! strictly positive volume are ever selected.

/// Indices of at most `k` stations with the highest volume, loudest first.
///
/// Ties keep catalog order.
pub fn select_top_k(volumes: &[f32], k: usize) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..volumes.len()).filter(|&i| volumes[i] > 0.0).collect();
    // Stable sort: equal volumes stay in catalog order.
    ranked.sort_by(|&a, &b| volumes[b].total_cmp(&volumes[a]));
    ranked.truncate(k);
    ranked
}

/// Membership mask for [`select_top_k`], indexed like `volumes`.
pub fn selection_mask(volumes: &[f32], k: usize) -> Vec<bool> {
    let mut mask = vec![false; volumes.len()];
    for i in select_top_k(volumes, k) {
        mask[i] = true;
    }
    mask
}
