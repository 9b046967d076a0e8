//! Vectorized environment pool for parallel execution
//!
//! Independent arenas share nothing, so a pool steps them in parallel with
//! Rayon. Inspired by EnvPool (<https://arxiv.org/abs/2206.10558>).
//!
//! # Example
//!
//! ```rust
//! use arena_rl::env::games::{BalanceBoard, BalanceConfig};
//! use arena_rl::env::pool::EnvPool;
//!
//! // Four boards, each with its own seed
//! let mut pool =
//!     EnvPool::try_new(|i| BalanceBoard::build(BalanceConfig::new().seed(i as u64)), 4).unwrap();
//!
//! let observations = pool.reset().unwrap();
//! assert_eq!(observations.len(), 4);
//!
//! let actions = vec![vec![0.0, 0.0]; 4];
//! let results = pool.step(&actions).unwrap();
//! assert_eq!(results.len(), 4);
//! ```

use anyhow::{anyhow, Result};
use rayon::prelude::*;

use crate::env::{Environment, SpaceInfo, StepResult};

/// A pool of environments for parallel execution
///
/// For N environments with average step time T a sequential loop costs
/// O(N * T); the pool costs roughly O(T) while N stays below the core count.
pub struct EnvPool<E: Environment> {
    /// Vector of environment instances
    envs: Vec<E>,

    /// Number of environments
    num_envs: usize,
}

impl<E> EnvPool<E>
where
    E: Environment + Send,
    E::Observation: Send,
    E::Action: Clone + Sync,
{
    /// Create a pool from an infallible factory
    ///
    /// # Panics
    ///
    /// Panics if `num_envs` is zero.
    pub fn new<F>(env_fn: F, num_envs: usize) -> Self
    where
        F: Fn() -> E,
    {
        assert!(num_envs > 0, "Pool needs at least one environment");
        let envs = (0..num_envs).map(|_| env_fn()).collect();
        Self { envs, num_envs }
    }

    /// Create a pool from a fallible factory that receives each slot's index
    pub fn try_new<F>(env_fn: F, num_envs: usize) -> Result<Self>
    where
        F: Fn(usize) -> Result<E>,
    {
        if num_envs == 0 {
            return Err(anyhow!("pool needs at least one environment"));
        }
        let envs = (0..num_envs).map(env_fn).collect::<Result<Vec<_>>>()?;
        Ok(Self { envs, num_envs })
    }

    /// Reset all environments in parallel
    ///
    /// Returns one initial observation per environment.
    pub fn reset(&mut self) -> Result<Vec<E::Observation>> {
        self.envs.par_iter_mut().map(|env| env.reset()).collect()
    }

    /// Step all environments in parallel with given actions
    ///
    /// # Panics
    ///
    /// Panics if the number of actions doesn't match the number of
    /// environments.
    pub fn step(&mut self, actions: &[E::Action]) -> Result<Vec<StepResult<E::Observation>>> {
        assert_eq!(
            actions.len(),
            self.num_envs,
            "Number of actions must match number of environments"
        );

        self.envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .map(|(env, action)| env.step(action.clone()))
            .collect()
    }

    /// Get the number of environments in the pool
    pub fn num_envs(&self) -> usize {
        self.num_envs
    }

    /// Get observation space information from first environment
    pub fn observation_space(&self) -> SpaceInfo {
        self.envs[0].observation_space()
    }

    /// Get action space information from first environment
    pub fn action_space(&self) -> SpaceInfo {
        self.envs[0].action_space()
    }

    /// Reset a specific environment by index
    pub fn reset_env(&mut self, env_id: usize) -> Result<E::Observation> {
        self.envs[env_id].reset()
    }

    /// Access one environment, e.g. to inspect its episode
    pub fn env(&self, env_id: usize) -> &E {
        &self.envs[env_id]
    }
}

/// Result of stepping an environment pool
///
/// Contains observations, rewards, and done flags for all environments.
#[derive(Debug, Clone)]
pub struct PoolStepResult<O> {
    /// Observations for each environment
    pub observations: Vec<O>,

    /// Rewards for each environment
    pub rewards: Vec<f32>,

    /// Termination flags for each environment
    pub terminated: Vec<bool>,

    /// Truncation flags for each environment
    pub truncated: Vec<bool>,
}

impl<E> EnvPool<E>
where
    E: Environment + Send,
    E::Observation: Send,
    E::Action: Clone + Sync,
{
    /// Step all environments and return structured result
    ///
    /// Unpacks the individual StepResults into parallel vectors.
    pub fn step_structured(
        &mut self,
        actions: &[E::Action],
    ) -> Result<PoolStepResult<E::Observation>> {
        let results = self.step(actions)?;

        let mut observations = Vec::with_capacity(self.num_envs);
        let mut rewards = Vec::with_capacity(self.num_envs);
        let mut terminated = Vec::with_capacity(self.num_envs);
        let mut truncated = Vec::with_capacity(self.num_envs);

        for result in results {
            observations.push(result.observation);
            rewards.push(result.reward);
            terminated.push(result.terminated);
            truncated.push(result.truncated);
        }

        Ok(PoolStepResult { observations, rewards, terminated, truncated })
    }
}
