//! Configuration for off-policy NPG training.
//!
//! [`TrainerConfig`] fixes the shape of the update loop for the lifetime
//! of a trainer; [`TrainStepOptions`] carries the per-call sampling knobs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algorithms::NaturalGradientConfig;
use crate::sampler::SampleMode;

/// Configuration validation error.
///
/// Returned when configuration parameters are invalid or inconsistent.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count parameter must be positive.
    InvalidCount {
        field: &'static str,
        value: usize,
    },
    /// A parameter is outside its valid range.
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Both advantage sources are disabled.
    NoAdvantageSource,
    /// Sub-iterations past the first draw from replay, which is disabled.
    ReplayRequired { num_policy_updates: usize },
    /// The nested engine configuration is invalid.
    Engine { reason: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCount { field, value } => {
                write!(f, "{} must be > 0, got {}", field, value)
            }
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(f, "{} must be in [{}, {}], got {}", field, min, max, value)
            }
            ConfigError::NoAdvantageSource => {
                write!(
                    f,
                    "at least one of fit_on_policy / fit_off_policy must be enabled"
                )
            }
            ConfigError::ReplayRequired { num_policy_updates } => {
                write!(
                    f,
                    "fit_off_policy must be enabled when num_policy_updates > 1 (got {})",
                    num_policy_updates
                )
            }
            ConfigError::Engine { reason } => {
                write!(f, "engine: {}", reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for [`OffPolicyTrainer`](crate::runners::OffPolicyTrainer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    // Update loop settings
    /// Estimator-fit + policy-update sub-iterations per train step
    pub num_policy_updates: usize,
    /// States drawn from the replay buffer per replay advantage batch
    pub num_update_states: usize,
    /// Build sub-iteration 0's batch from the fresh trajectories
    pub fit_on_policy: bool,
    /// Build the remaining batches from the replay buffer
    pub fit_off_policy: bool,

    // Buffer settings
    /// Replay capacity in transitions (None = unbounded)
    pub buffer_capacity: Option<usize>,

    // Diagnostics settings
    /// Compare Q predictions against Monte-Carlo rollouts each step
    pub check_q_function: bool,

    /// Seed for the trainer RNG (rollout base seeds, replay sampling,
    /// action resampling)
    pub seed: u64,
    /// Policy-update engine settings
    pub engine: NaturalGradientConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            num_policy_updates: 4,
            num_update_states: 256,
            fit_on_policy: true,
            fit_off_policy: true,
            buffer_capacity: None,
            check_q_function: false,
            seed: 123,
            engine: NaturalGradientConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of sub-iterations per train step.
    pub fn with_num_policy_updates(mut self, n: usize) -> Self {
        self.num_policy_updates = n;
        self
    }

    /// Set the replay batch size in states.
    pub fn with_num_update_states(mut self, n: usize) -> Self {
        self.num_update_states = n;
        self
    }

    /// Enable or disable the on-policy advantage source.
    pub fn with_fit_on_policy(mut self, enabled: bool) -> Self {
        self.fit_on_policy = enabled;
        self
    }

    /// Enable or disable the replay advantage source.
    pub fn with_fit_off_policy(mut self, enabled: bool) -> Self {
        self.fit_off_policy = enabled;
        self
    }

    /// Set the replay capacity (None = unbounded).
    pub fn with_buffer_capacity(mut self, capacity: Option<usize>) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Enable the per-step Q-vs-Monte-Carlo check.
    pub fn with_check_q_function(mut self, enabled: bool) -> Self {
        self.check_q_function = enabled;
        self
    }

    /// Set the trainer RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the policy-update engine configuration.
    pub fn with_engine(mut self, engine: NaturalGradientConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Validate all configuration parameters.
    ///
    /// # Validation Rules
    /// - `num_policy_updates` must be > 0
    /// - at least one advantage source must be enabled
    /// - replay must be enabled when there is more than one sub-iteration
    /// - `num_update_states` must be > 0 when replay is enabled
    /// - a capacity, when given, must be > 0
    /// - the engine configuration must validate
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_policy_updates == 0 {
            return Err(ConfigError::InvalidCount {
                field: "num_policy_updates",
                value: 0,
            });
        }
        if !self.fit_on_policy && !self.fit_off_policy {
            return Err(ConfigError::NoAdvantageSource);
        }
        if self.num_policy_updates > 1 && !self.fit_off_policy {
            return Err(ConfigError::ReplayRequired {
                num_policy_updates: self.num_policy_updates,
            });
        }
        if self.fit_off_policy && self.num_update_states == 0 {
            return Err(ConfigError::InvalidCount {
                field: "num_update_states",
                value: 0,
            });
        }
        if self.buffer_capacity == Some(0) {
            return Err(ConfigError::InvalidCount {
                field: "buffer_capacity",
                value: 0,
            });
        }
        self.engine
            .validate()
            .map_err(|reason| ConfigError::Engine { reason })?;
        Ok(())
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

/// Per-call options for `train_step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainStepOptions {
    /// Iteration index keying the diagnostics; `train_step` fails fast
    /// when unset
    pub iteration: Option<usize>,
    /// Discount factor for the freshly drawn trajectories
    pub gamma: f64,
    /// Accepted for interface parity; the Q - V advantage path never
    /// reads it
    pub gae_lambda: f64,
    /// Per-rollout step cap
    pub horizon: usize,
    /// Draw whole trajectories or a transition budget
    pub sample_mode: SampleMode,
}

impl Default for TrainStepOptions {
    fn default() -> Self {
        Self {
            iteration: None,
            gamma: 0.995,
            gae_lambda: 0.97,
            horizon: 1_000_000,
            sample_mode: SampleMode::Trajectories,
        }
    }
}

impl TrainStepOptions {
    /// Create default options (no iteration set).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration index.
    pub fn with_iteration(mut self, iteration: usize) -> Self {
        self.iteration = Some(iteration);
        self
    }

    /// Set the discount factor.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the GAE lambda.
    pub fn with_gae_lambda(mut self, lambda: f64) -> Self {
        self.gae_lambda = lambda;
        self
    }

    /// Set the per-rollout step cap.
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set the sampling mode.
    pub fn with_sample_mode(mut self, mode: SampleMode) -> Self {
        self.sample_mode = mode;
        self
    }

    /// Validate the per-call parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gamma < 0.0 || self.gamma > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "gamma",
                value: self.gamma,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.gae_lambda < 0.0 || self.gae_lambda > 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "gae_lambda",
                value: self.gae_lambda,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.horizon == 0 {
            return Err(ConfigError::InvalidCount {
                field: "horizon",
                value: 0,
            });
        }
        Ok(())
    }
}
