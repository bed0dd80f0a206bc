/// Mean-squared error accumulated one prediction at a time.
///
/// The recurrent cell produces predictions pixel by pixel, so the loss is
/// accumulated incrementally. `total` is known up front (every
/// `(batch, t, y, x)` that has a next-frame target), which lets each residual be
/// turned into its gradient share immediately.
#[derive(Debug, Clone)]
pub struct MseLoss {
    total: usize,
    observed: usize,
    sum_sq: f64,
}

impl MseLoss {
    pub fn new(total: usize) -> MseLoss {
        MseLoss { total, observed: 0, sum_sq: 0.0 }
    }

    /// Records one prediction and returns ∂L/∂predicted for it, where
    /// L = (1/total) Σ (predicted - expected)².
    pub fn observe(&mut self, predicted: f64, expected: f64) -> f64 {
        let residual = predicted - expected;
        self.sum_sq += residual * residual;
        self.observed += 1;
        2.0 * residual / self.total.max(1) as f64
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    /// Mean over everything observed so far.
    pub fn value(&self) -> f64 {
        if self.observed == 0 {
            return 0.0;
        }
        self.sum_sq / self.observed as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_squared_residuals() {
        let mut mse = MseLoss::new(2);
        mse.observe(1.0, 0.0);
        mse.observe(0.0, 3.0);
        assert_eq!(mse.observed(), 2);
        assert!((mse.value() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn gradient_is_scaled_by_total() {
        let mut mse = MseLoss::new(4);
        assert!((mse.observe(2.0, 1.0) - 0.5).abs() < 1e-12);
    }
}
