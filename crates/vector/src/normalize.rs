use ndarray::{ArrayView1, ArrayViewMut1};
use vecbulk_common::{Result, VecBulkError};

/// Euclidean norm
pub fn l2_norm(vector: ArrayView1<f64>) -> f64 {
    vector.dot(&vector).sqrt()
}

/// Scale a vector to unit length in place
///
/// A zero vector cannot be scaled and yields `DivideByZero` instead of NaN components.
pub fn normalize_in_place(mut vector: ArrayViewMut1<f64>) -> Result<()> {
    let norm = l2_norm(vector.view());
    if norm == 0.0 {
        return Err(VecBulkError::divide_by_zero("vector has zero norm"));
    }

    vector.mapv_inplace(|x| x / norm);
    Ok(())
}
