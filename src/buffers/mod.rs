//! Experience storage for off-policy training.

pub mod replay_buffer;

pub use replay_buffer::{ReplayBatch, ReplayBuffer, StoredTransition};
