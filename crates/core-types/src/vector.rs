//! Small dense-vector helpers shared by the embedders and the index.

/// Tolerance used when checking the unit-norm invariant of stored embeddings.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-3;

/// Inner product. Callers guarantee equal lengths.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Scale `v` to unit length. Zero vectors are left untouched.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// `‖v‖₂ = 1 ± UNIT_NORM_TOLERANCE`.
pub fn is_unit(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() <= UNIT_NORM_TOLERANCE
}
