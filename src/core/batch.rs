//! Flat sample batches handed to the policy-update engine.

/// Batch of (observation, action, advantage weight) triples in flat
/// row-major layout.
///
/// The engine consumes the whole batch at once; per-row views are provided
/// for kernels that walk samples individually.
#[derive(Debug, Clone)]
pub struct UpdateBatch {
    /// Observations, [len * obs_dim]
    pub observations: Vec<f64>,
    /// Actions, [len * act_dim]
    pub actions: Vec<f64>,
    /// Advantage weights, [len]
    pub weights: Vec<f64>,
    /// Observation dimension
    pub obs_dim: usize,
    /// Action dimension
    pub act_dim: usize,
}

impl UpdateBatch {
    /// Assemble a batch, checking that the flat columns agree on length.
    pub fn new(
        observations: Vec<f64>,
        actions: Vec<f64>,
        weights: Vec<f64>,
        obs_dim: usize,
        act_dim: usize,
    ) -> Self {
        let n = weights.len();
        assert_eq!(observations.len(), n * obs_dim);
        assert_eq!(actions.len(), n * act_dim);
        Self {
            observations,
            actions,
            weights,
            obs_dim,
            act_dim,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Check if the batch holds no samples.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Observation row `i`.
    pub fn observation(&self, i: usize) -> &[f64] {
        &self.observations[i * self.obs_dim..(i + 1) * self.obs_dim]
    }

    /// Action row `i`.
    pub fn action(&self, i: usize) -> &[f64] {
        &self.actions[i * self.act_dim..(i + 1) * self.act_dim]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_rows() {
        let batch = UpdateBatch::new(
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.1, 0.2],
            vec![1.0, -1.0],
            2,
            1,
        );
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.observation(1), &[3.0, 4.0]);
        assert_eq!(batch.action(0), &[0.1]);
    }

    #[test]
    #[should_panic]
    fn test_batch_length_mismatch() {
        UpdateBatch::new(vec![1.0, 2.0], vec![0.1], vec![1.0, -1.0], 2, 1);
    }
}
