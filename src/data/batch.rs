use crate::error::TrainerResult;
use crate::math::tensor::Tensor;

/// Input of one training iteration.
///
/// `warmup` is run only to produce a recurrent state; `train` is run from
/// that state and drives the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPair {
    pub warmup: Tensor,
    pub train: Tensor,
}

impl BatchPair {
    pub fn new(warmup: Tensor, train: Tensor) -> BatchPair {
        BatchPair { warmup, train }
    }

    /// Both sub-batches must have exactly `expected` as their shape.
    pub fn check_shape(&self, expected: &[usize]) -> TrainerResult<()> {
        self.warmup.expect_shape("warmup batch", expected)?;
        self.train.expect_shape("train batch", expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrainerError;

    #[test]
    fn shape_check_names_the_offending_sub_batch() {
        let pair = BatchPair::new(Tensor::zeros(&[1, 2, 3, 3, 1]), Tensor::zeros(&[1, 2, 3, 4, 1]));
        match pair.check_shape(&[1, 2, 3, 3, 1]) {
            Err(TrainerError::ShapeMismatch { what, .. }) => assert_eq!(what, "train batch"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
