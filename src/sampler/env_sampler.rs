//! Seeded environment rollouts, serial or rayon-parallel.

use std::marker::PhantomData;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;

use super::{Environment, SampleMode, SampleRequest, Sampler};
use crate::core::{Trajectory, TrajectoryStep};
use crate::policy::ActionSampler;

/// Sampler that builds one fresh environment per rollout from a factory.
///
/// Rollout `i` of a request is fully determined by `base_seed + i`:
/// the environment reset and the policy's action noise both draw from
/// that seed. With `num_workers > 1`, rollouts of a wave run on the rayon
/// pool; results are identical to the serial order.
pub struct EnvSampler<F, E> {
    factory: F,
    num_workers: usize,
    _marker: PhantomData<fn() -> E>,
}

impl<F, E> EnvSampler<F, E>
where
    F: Fn() -> E + Sync,
    E: Environment,
{
    /// Create a serial sampler.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            num_workers: 1,
            _marker: PhantomData,
        }
    }

    /// Set the number of parallel rollout workers.
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    /// Number of parallel rollout workers.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    fn rollout<P: ActionSampler>(
        &self,
        policy: &P,
        request: &SampleRequest,
        index: usize,
    ) -> Trajectory {
        let seed = request.base_seed.wrapping_add(index as u64);
        let mut env = (self.factory)();
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);

        let mut obs = env.reset(seed);
        let mut path = Trajectory::with_capacity(index, request.horizon);
        for t in 0..request.horizon {
            let action = policy.sample_actions(&obs, &mut rng);
            let step = env.step(&action);
            path.push(TrajectoryStep::new(obs, action, step.reward, t as f64));
            obs = step.observation;
            if step.done {
                break;
            }
        }
        path
    }

    fn run_wave<P: ActionSampler + Sync>(
        &self,
        policy: &P,
        request: &SampleRequest,
        start_index: usize,
        count: usize,
    ) -> Vec<Trajectory> {
        if self.num_workers > 1 {
            (start_index..start_index + count)
                .into_par_iter()
                .map(|i| self.rollout(policy, request, i))
                .collect()
        } else {
            (start_index..start_index + count)
                .map(|i| self.rollout(policy, request, i))
                .collect()
        }
    }
}

impl<F, E, P> Sampler<P> for EnvSampler<F, E>
where
    F: Fn() -> E + Sync,
    E: Environment,
    P: ActionSampler + Sync,
{
    fn sample(&mut self, policy: &P, request: &SampleRequest) -> Vec<Trajectory> {
        match request.mode {
            SampleMode::Trajectories => self.run_wave(policy, request, 0, request.count),
            SampleMode::Transitions => {
                let wave = self.num_workers.max(1);
                let mut paths = Vec::new();
                let mut collected = 0;
                let mut next_index = 0;
                while collected < request.count {
                    for path in self.run_wave(policy, request, next_index, wave) {
                        collected += path.len();
                        paths.push(path);
                    }
                    next_index += wave;
                }
                paths
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::LinearGaussianPolicy;
    use crate::sampler::EnvStep;

    /// 1-D drift environment: position moves by the action, reward is the
    /// negated distance from the origin, episode ends after `lifetime`
    /// steps.
    struct LineEnv {
        position: f64,
        ticks: usize,
        lifetime: usize,
    }

    impl LineEnv {
        fn new(lifetime: usize) -> Self {
            Self {
                position: 0.0,
                ticks: 0,
                lifetime,
            }
        }
    }

    impl Environment for LineEnv {
        fn obs_dim(&self) -> usize {
            1
        }
        fn act_dim(&self) -> usize {
            1
        }
        fn reset(&mut self, seed: u64) -> Vec<f64> {
            self.position = (seed % 7) as f64 * 0.1;
            self.ticks = 0;
            vec![self.position]
        }
        fn step(&mut self, action: &[f64]) -> EnvStep {
            self.position += action[0];
            self.ticks += 1;
            EnvStep {
                observation: vec![self.position],
                reward: -self.position.abs(),
                done: self.ticks >= self.lifetime,
            }
        }
    }

    fn request(count: usize, mode: SampleMode) -> SampleRequest {
        SampleRequest {
            count,
            mode,
            horizon: 10,
            base_seed: 42,
        }
    }

    #[test]
    fn test_trajectories_mode_counts_paths() {
        let mut sampler = EnvSampler::new(|| LineEnv::new(100));
        let policy = LinearGaussianPolicy::new(1, 1);

        let paths = sampler.sample(&policy, &request(4, SampleMode::Trajectories));
        assert_eq!(paths.len(), 4);
        for (i, path) in paths.iter().enumerate() {
            assert_eq!(path.env_id, i);
            assert_eq!(path.len(), 10);
        }
    }

    #[test]
    fn test_done_truncates_rollout() {
        let mut sampler = EnvSampler::new(|| LineEnv::new(3));
        let policy = LinearGaussianPolicy::new(1, 1);

        let paths = sampler.sample(&policy, &request(2, SampleMode::Trajectories));
        assert!(paths.iter().all(|p| p.len() == 3));
    }

    #[test]
    fn test_transitions_mode_reaches_count() {
        let mut sampler = EnvSampler::new(|| LineEnv::new(100));
        let policy = LinearGaussianPolicy::new(1, 1);

        let paths = sampler.sample(&policy, &request(25, SampleMode::Transitions));
        let total: usize = paths.iter().map(|p| p.len()).sum();
        assert!(total >= 25, "collected {} transitions", total);
    }

    #[test]
    fn test_rollouts_are_deterministic_per_seed() {
        let mut sampler = EnvSampler::new(|| LineEnv::new(100));
        let policy = LinearGaussianPolicy::new(1, 1);

        let first = sampler.sample(&policy, &request(3, SampleMode::Trajectories));
        let second = sampler.sample(&policy, &request(3, SampleMode::Trajectories));
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.actions_flat(), b.actions_flat());
            assert_eq!(a.observations_flat(), b.observations_flat());
        }

        let mut shifted = request(3, SampleMode::Trajectories);
        shifted.base_seed = 43;
        let third = sampler.sample(&policy, &shifted);
        assert_ne!(first[0].actions_flat(), third[0].actions_flat());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let policy = LinearGaussianPolicy::new(1, 1);
        let req = request(6, SampleMode::Trajectories);

        let mut serial = EnvSampler::new(|| LineEnv::new(100));
        let mut parallel = EnvSampler::new(|| LineEnv::new(100)).with_num_workers(4);

        let a = serial.sample(&policy, &req);
        let b = parallel.sample(&policy, &req);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.actions_flat(), y.actions_flat());
            assert_eq!(x.rewards(), y.rewards());
        }
    }
}
