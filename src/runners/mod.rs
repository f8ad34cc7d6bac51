//! Training runners.
//!
//! [`OffPolicyTrainer`] drives the whole algorithm: sampling through a
//! [`Sampler`](crate::sampler::Sampler), estimator fits from replay, and
//! natural-gradient policy updates, one [`train_step`] at a time.
//!
//! Configuration follows the builder-validate pattern:
//!
//! ```rust
//! use offpolicy_npg::runners::TrainerConfig;
//!
//! let config = TrainerConfig::new()
//!     .with_num_policy_updates(8)
//!     .with_num_update_states(512)
//!     .with_seed(42)
//!     .build()
//!     .expect("valid configuration");
//! ```
//!
//! [`train_step`]: OffPolicyTrainer::train_step

pub mod config;
pub mod trainer;


pub use config::{ConfigError, TrainStepOptions, TrainerConfig};
pub use trainer::{OffPolicyTrainer, TrainError};
