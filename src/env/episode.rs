//! Episode lifecycle bookkeeping

use serde::{Deserialize, Serialize};

use super::{EnvError, TerminationCause};

/// Lifecycle phase of an agent's episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    /// No episode has been started yet
    Idle,
    /// Steps are accepted
    Running,
    /// A termination predicate fired; only reset is accepted
    Terminal,
}

/// State of one trial, from reset to termination
#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    index: usize,
    phase: EpisodePhase,
    elapsed: f32,
    steps: usize,
    reward: f32,
    cause: Option<TerminationCause>,
}

impl Episode {
    pub fn new() -> Self {
        Self {
            index: 0,
            phase: EpisodePhase::Idle,
            elapsed: 0.0,
            steps: 0,
            reward: 0.0,
            cause: None,
        }
    }

    /// Start a fresh episode, discarding whatever state the last one had
    pub fn begin(&mut self) {
        self.index += 1;
        self.phase = EpisodePhase::Running;
        self.elapsed = 0.0;
        self.steps = 0;
        self.reward = 0.0;
        self.cause = None;
    }

    /// Error unless steps are currently accepted
    pub fn ensure_running(&self) -> Result<(), EnvError> {
        match self.phase {
            EpisodePhase::Running => Ok(()),
            EpisodePhase::Idle => Err(EnvError::NotStarted),
            EpisodePhase::Terminal => Err(EnvError::EpisodeOver { episode: self.index }),
        }
    }

    /// Count one tick of `delta_time` seconds; negative deltas count as zero
    pub fn tick(&mut self, delta_time: f32) {
        self.elapsed += delta_time.max(0.0);
        self.steps += 1;
    }

    pub fn add_reward(&mut self, reward: f32) {
        self.reward += reward;
    }

    pub fn finish(&mut self, cause: TerminationCause) {
        self.phase = EpisodePhase::Terminal;
        self.cause = Some(cause);
    }

    /// 1-based index of the current episode, 0 before the first reset
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == EpisodePhase::Running
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == EpisodePhase::Terminal
    }

    /// Simulated seconds since reset
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Reward accumulated since reset
    pub fn reward(&self) -> f32 {
        self.reward
    }

    pub fn cause(&self) -> Option<TerminationCause> {
        self.cause
    }
}

impl Default for Episode {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut episode = Episode::new();
        assert_eq!(episode.phase(), EpisodePhase::Idle);
        assert_eq!(episode.ensure_running(), Err(EnvError::NotStarted));

        episode.begin();
        assert!(episode.is_running());
        assert_eq!(episode.index(), 1);

        episode.tick(0.02);
        episode.add_reward(0.1);
        episode.finish(TerminationCause::BallFell);
        assert!(episode.is_terminal());
        assert_eq!(episode.cause(), Some(TerminationCause::BallFell));
        assert_eq!(episode.ensure_running(), Err(EnvError::EpisodeOver { episode: 1 }));

        episode.begin();
        assert_eq!(episode.index(), 2);
        assert_eq!(episode.steps(), 0);
        assert_eq!(episode.reward(), 0.0);
        assert_eq!(episode.elapsed(), 0.0);
        assert_eq!(episode.cause(), None);
    }

    #[test]
    fn test_elapsed_never_decreases() {
        let mut episode = Episode::new();
        episode.begin();
        episode.tick(0.5);
        episode.tick(-1.0);
        assert_eq!(episode.elapsed(), 0.5);
        assert_eq!(episode.steps(), 2);
    }
}
