use serde::{Serialize, Deserialize};

use crate::error::{TrainerError, TrainerResult};

/// N-dimensional row-major tensor.
///
/// Carries sequence batches (`[batch, time, height, width, channels]`) and the
/// recurrent carry state (`[2, batch, height, width, filters]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// Wraps `data` with the given shape; the element count must match.
    pub fn from_vec(shape: &[usize], data: Vec<f64>) -> TrainerResult<Tensor> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(TrainerError::shape_mismatch(
                "tensor data",
                &[expected],
                &[data.len()],
            ));
        }
        Ok(Tensor { shape: shape.to_vec(), data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat offset of a full or partial index (missing trailing axes are 0).
    fn offset(&self, index: &[usize]) -> usize {
        assert!(index.len() <= self.shape.len(), "index has too many axes");
        let mut offset = 0;
        let mut stride = self.data.len();
        for (axis, &i) in index.iter().enumerate() {
            assert!(i < self.shape[axis], "index {i} out of bounds on axis {axis}");
            stride /= self.shape[axis];
            offset += i * stride;
        }
        offset
    }

    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[self.offset(index)]
    }

    /// Contiguous run of the last axis at `prefix` (all axes but the last).
    pub fn lane(&self, prefix: &[usize]) -> &[f64] {
        assert_eq!(prefix.len() + 1, self.shape.len(), "lane prefix must omit only the last axis");
        let start = self.offset(prefix);
        let width = self.shape[self.shape.len() - 1];
        &self.data[start..start + width]
    }

    pub fn lane_mut(&mut self, prefix: &[usize]) -> &mut [f64] {
        assert_eq!(prefix.len() + 1, self.shape.len(), "lane prefix must omit only the last axis");
        let start = self.offset(prefix);
        let width = self.shape[self.shape.len() - 1];
        &mut self.data[start..start + width]
    }

    /// Returns `Err(ShapeMismatch)` unless the tensor has exactly `expected`.
    pub fn expect_shape(&self, what: &str, expected: &[usize]) -> TrainerResult<()> {
        if self.shape != expected {
            return Err(TrainerError::shape_mismatch(what, expected, &self.shape));
        }
        Ok(())
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&x| x == 0.0)
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_has_product_of_shape_elements() {
        let t = Tensor::zeros(&[2, 3, 4, 5, 6]);
        assert_eq!(t.len(), 720);
        assert!(t.is_zero());
    }

    #[test]
    fn from_vec_rejects_wrong_length() {
        let err = Tensor::from_vec(&[2, 2], vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, TrainerError::ShapeMismatch { .. }));
    }

    #[test]
    fn row_major_indexing_and_lanes() {
        let data: Vec<f64> = (0..24).map(|x| x as f64).collect();
        let mut t = Tensor::from_vec(&[2, 3, 4], data).unwrap();
        assert_eq!(t.get(&[1, 2, 3]), 23.0);
        assert_eq!(t.lane(&[1, 0]), &[12.0, 13.0, 14.0, 15.0]);
        t.lane_mut(&[0, 1]).copy_from_slice(&[0.0; 4]);
        assert_eq!(t.get(&[0, 1, 2]), 0.0);
    }

    #[test]
    fn expect_shape_reports_both_shapes() {
        let t = Tensor::zeros(&[1, 2]);
        assert!(t.expect_shape("state", &[1, 2]).is_ok());
        match t.expect_shape("state", &[2, 1]) {
            Err(TrainerError::ShapeMismatch { expected, got, .. }) => {
                assert_eq!(expected, vec![2, 1]);
                assert_eq!(got, vec![1, 2]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
