//! Termination predicates and their priority

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::Signal;

/// Class of a terminal event, declared in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Failure,
    Success,
    Timeout,
}

/// Why an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationCause {
    /// A ball dropped below the fall threshold
    BallFell,
    /// The car hit another car or the border
    Collided,
    /// All wheels in the bay, aligned and centred
    ParkedPrecisely,
    /// The required number of beacons is inside the bay
    BeaconsInBay,
    AllPelletsCollected,
    HitWall,
    CaughtMouse,
    CaughtByCat,
    EscapedWithCheese,
    TimedOut,
}

impl TerminationCause {
    pub fn outcome(self) -> Outcome {
        match self {
            Self::BallFell | Self::Collided | Self::HitWall | Self::CaughtByCat => Outcome::Failure,
            Self::ParkedPrecisely
            | Self::BeaconsInBay
            | Self::AllPelletsCollected
            | Self::CaughtMouse
            | Self::EscapedWithCheese => Outcome::Success,
            Self::TimedOut => Outcome::Timeout,
        }
    }
}

/// A fired predicate and the reward it assigns
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Termination {
    pub cause: TerminationCause,
    pub reward: f32,
}

impl Termination {
    pub fn new(cause: TerminationCause, reward: f32) -> Self {
        Self { cause, reward }
    }

    pub fn outcome(&self) -> Outcome {
        self.cause.outcome()
    }
}

/// What a scenario observed during one tick
///
/// Scenarios add non-terminal event rewards with [`Verdict::reward`] and
/// report every predicate that holds with [`Verdict::fire`]; the loop then
/// picks the winner with [`Verdict::resolve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    bonus: f32,
    candidates: Vec<Termination>,
    signal: Option<Signal>,
}

impl Verdict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a non-terminal event reward
    pub fn reward(&mut self, amount: f32) {
        self.bonus += amount;
    }

    /// Report a predicate that holds this tick
    pub fn fire(&mut self, cause: TerminationCause, reward: f32) {
        self.candidates.push(Termination::new(cause, reward));
    }

    /// Request a cosmetic feedback signal without ending the episode
    pub fn signal(&mut self, signal: Signal) {
        self.signal.get_or_insert(signal);
    }

    pub fn bonus(&self) -> f32 {
        self.bonus
    }

    pub fn candidates(&self) -> &[Termination] {
        &self.candidates
    }

    pub fn cosmetic_signal(&self) -> Option<Signal> {
        self.signal
    }

    /// Highest-priority fired predicate: failure, then success, then timeout.
    /// Within a class the first one reported wins.
    pub fn resolve(&self) -> Option<Termination> {
        self.candidates.iter().copied().min_by_key(Termination::outcome)
    }
}

/// How an arena treats running out of time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// No time limit
    #[default]
    Disabled,

    /// Past `limit` seconds a success signal is shown but the episode goes on
    Cosmetic { limit: f32 },

    /// Past `limit` seconds the episode ends with `reward`
    Terminal { limit: f32, reward: f32 },
}

impl TimeoutPolicy {
    pub fn limit(&self) -> Option<f32> {
        match *self {
            Self::Disabled => None,
            Self::Cosmetic { limit } | Self::Terminal { limit, .. } => Some(limit),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.limit() {
            Some(limit) if limit.is_nan() || limit <= 0.0 => {
                Err(anyhow!("timeout limit must be positive"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_beats_timeout_and_success() {
        let mut verdict = Verdict::new();
        verdict.fire(TerminationCause::TimedOut, -15.0);
        verdict.fire(TerminationCause::AllPelletsCollected, 5.0);
        verdict.fire(TerminationCause::HitWall, -15.0);

        let winner = verdict.resolve().unwrap();
        assert_eq!(winner.cause, TerminationCause::HitWall);
    }

    #[test]
    fn test_success_beats_timeout() {
        let mut verdict = Verdict::new();
        verdict.fire(TerminationCause::TimedOut, -2.0);
        verdict.fire(TerminationCause::BeaconsInBay, 10.0);
        assert_eq!(verdict.resolve().unwrap().cause, TerminationCause::BeaconsInBay);
    }

    #[test]
    fn test_first_reported_wins_within_class() {
        let mut verdict = Verdict::new();
        verdict.fire(TerminationCause::ParkedPrecisely, 100.0);
        verdict.fire(TerminationCause::BeaconsInBay, 10.0);
        assert_eq!(verdict.resolve().unwrap().reward, 100.0);
    }

    #[test]
    fn test_bonus_accumulates() {
        let mut verdict = Verdict::new();
        verdict.reward(10.0);
        verdict.reward(10.0);
        assert_eq!(verdict.bonus(), 20.0);
        assert!(verdict.resolve().is_none());
    }

    #[test]
    fn test_timeout_policy_serde() {
        let policy: TimeoutPolicy =
            serde_json::from_str(r#"{"mode":"terminal","limit":80.0,"reward":-2.0}"#).unwrap();
        assert_eq!(policy, TimeoutPolicy::Terminal { limit: 80.0, reward: -2.0 });
        assert!(TimeoutPolicy::Cosmetic { limit: 0.0 }.validate().is_err());
        assert!(TimeoutPolicy::Disabled.validate().is_ok());
    }
}
