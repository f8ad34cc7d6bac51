//! Core data types shared across the trainer.

pub mod batch;
pub mod trajectory;

pub use batch::UpdateBatch;
pub use trajectory::{
    compute_returns, compute_returns_many, total_steps, ReturnSummary, Trajectory, TrajectoryStep,
};
