//! Split gain and leaf weight computation

/// Regularization and splitting constraints used while growing a tree
#[derive(Clone, Debug, PartialEq)]
pub struct GainParams {
    /// L2 regularization on leaf weights (lambda)
    pub reg_lambda: f64,
    /// Minimum gain a split must exceed (gamma)
    pub min_split_gain: f64,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
    /// Minimum rows per child
    pub min_child_samples: usize,
}

impl Default for GainParams {
    fn default() -> Self {
        Self {
            reg_lambda: 0.0,
            min_split_gain: 0.0,
            min_child_weight: 1e-3,
            min_child_samples: 20,
        }
    }
}

impl GainParams {
    /// Split gain net of `min_split_gain`
    ///
    /// ```text
    /// gain = 0.5 * [G_L²/(H_L + λ) + G_R²/(H_R + λ) - G_P²/(H_P + λ)] - γ
    /// ```
    ///
    /// A split is only worth taking when this is strictly positive.
    #[inline]
    pub fn compute_gain(
        &self,
        grad_left: f64,
        hess_left: f64,
        grad_right: f64,
        hess_right: f64,
    ) -> f64 {
        let grad_parent = grad_left + grad_right;
        let hess_parent = hess_left + hess_right;

        let gain = 0.5
            * (self.score(grad_left, hess_left) + self.score(grad_right, hess_right)
                - self.score(grad_parent, hess_parent));
        gain - self.min_split_gain
    }

    /// Check the per-child weight and row count constraints
    #[inline]
    pub fn is_valid_split(
        &self,
        hess_left: f64,
        hess_right: f64,
        count_left: usize,
        count_right: usize,
    ) -> bool {
        hess_left >= self.min_child_weight
            && hess_right >= self.min_child_weight
            && count_left >= self.min_child_samples
            && count_right >= self.min_child_samples
    }

    /// Newton step for a leaf: `-G / (H + λ)`
    #[inline]
    pub fn leaf_weight(&self, grad_sum: f64, hess_sum: f64) -> f64 {
        let denominator = hess_sum + self.reg_lambda;
        if denominator <= 0.0 {
            0.0
        } else {
            -grad_sum / denominator
        }
    }

    #[inline]
    fn score(&self, grad: f64, hess: f64) -> f64 {
        let denominator = hess + self.reg_lambda;
        if denominator <= 0.0 {
            0.0
        } else {
            grad * grad / denominator
        }
    }
}
