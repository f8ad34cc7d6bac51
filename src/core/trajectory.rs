//! Trajectory containers and discounted-return computation.
//!
//! Trajectories carry raw environment interaction plus a `returns` column
//! that is filled in after collection:
//!
//! R_t = r_t + γ R_{t+1},  R_{T-1} = r_{T-1}
//!
//! All numerics are f64. The downstream curvature solve is sensitive to
//! accumulated rounding, so the whole pipeline stays in double precision.

use serde::{Deserialize, Serialize};

/// One environment step: observation, action taken, reward, absolute time.
///
/// `time` is the step index within its episode, kept as f64 because it is
/// consumed as a feature by time-aware value estimators.
#[derive(Debug, Clone)]
pub struct TrajectoryStep {
    /// Observation the action was taken from
    pub observation: Vec<f64>,
    /// Action taken
    pub action: Vec<f64>,
    /// Reward received
    pub reward: f64,
    /// Step index within the episode
    pub time: f64,
}

impl TrajectoryStep {
    /// Create a new step.
    pub fn new(observation: Vec<f64>, action: Vec<f64>, reward: f64, time: f64) -> Self {
        Self {
            observation,
            action,
            reward,
            time,
        }
    }
}

/// Ordered sequence of steps from one rollout.
///
/// `returns` is empty until [`compute_returns`] runs; afterwards it holds
/// one discounted return per step.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    /// Ordered steps
    pub steps: Vec<TrajectoryStep>,
    /// Environment/rollout index that generated this trajectory
    pub env_id: usize,
    /// Per-step discounted returns (empty until computed)
    pub returns: Vec<f64>,
}

impl Trajectory {
    /// Create a new empty trajectory.
    pub fn new(env_id: usize) -> Self {
        Self {
            steps: Vec::new(),
            env_id,
            returns: Vec::new(),
        }
    }

    /// Create a trajectory with pre-allocated capacity.
    pub fn with_capacity(env_id: usize, capacity: usize) -> Self {
        Self {
            steps: Vec::with_capacity(capacity),
            env_id,
            returns: Vec::new(),
        }
    }

    /// Add a step to the trajectory.
    pub fn push(&mut self, step: TrajectoryStep) {
        self.steps.push(step);
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the trajectory is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Observation dimension, 0 for an empty trajectory.
    pub fn obs_dim(&self) -> usize {
        self.steps.first().map_or(0, |s| s.observation.len())
    }

    /// Action dimension, 0 for an empty trajectory.
    pub fn act_dim(&self) -> usize {
        self.steps.first().map_or(0, |s| s.action.len())
    }

    /// Total undiscounted reward.
    pub fn total_reward(&self) -> f64 {
        self.steps.iter().map(|s| s.reward).sum()
    }

    /// Per-step rewards as a column.
    pub fn rewards(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.reward).collect()
    }

    /// Per-step times as a column.
    pub fn times(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.time).collect()
    }

    /// Observations flattened row-major into [len * obs_dim].
    pub fn observations_flat(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len() * self.obs_dim());
        for s in &self.steps {
            out.extend_from_slice(&s.observation);
        }
        out
    }

    /// Actions flattened row-major into [len * act_dim].
    pub fn actions_flat(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.len() * self.act_dim());
        for s in &self.steps {
            out.extend_from_slice(&s.action);
        }
        out
    }

    /// Iterate over steps.
    pub fn iter(&self) -> impl Iterator<Item = &TrajectoryStep> {
        self.steps.iter()
    }
}

/// Fill the trajectory's `returns` column with discounted returns.
///
/// R_t = r_t + γ R_{t+1}, accumulated back-to-front with no bootstrap
/// beyond the final step.
pub fn compute_returns(path: &mut Trajectory, gamma: f64) {
    let n = path.len();
    let mut returns = vec![0.0f64; n];
    let mut running = 0.0f64;
    for t in (0..n).rev() {
        running = path.steps[t].reward + gamma * running;
        returns[t] = running;
    }
    path.returns = returns;
}

/// Compute discounted returns for a batch of trajectories in place.
pub fn compute_returns_many(paths: &mut [Trajectory], gamma: f64) {
    for path in paths.iter_mut() {
        compute_returns(path, gamma);
    }
}

/// Total number of steps across a batch of trajectories.
pub fn total_steps(paths: &[Trajectory]) -> usize {
    paths.iter().map(|p| p.len()).sum()
}

/// Summary statistics over episode returns of a trajectory batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnSummary {
    /// Mean episode return
    pub mean: f64,
    /// Population standard deviation of episode returns
    pub std: f64,
    /// Minimum episode return
    pub min: f64,
    /// Maximum episode return
    pub max: f64,
}

impl ReturnSummary {
    /// Summarize total rewards over a batch of trajectories.
    ///
    /// An empty batch yields the all-zero summary.
    pub fn from_paths(paths: &[Trajectory]) -> Self {
        if paths.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }

        let totals: Vec<f64> = paths.iter().map(|p| p.total_reward()).collect();
        let n = totals.len() as f64;
        let mean = totals.iter().sum::<f64>() / n;
        let variance = totals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let min = totals.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = totals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Self {
            mean,
            std: variance.sqrt(),
            min,
            max,
        }
    }
}
