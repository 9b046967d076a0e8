//! Action vectors: declared ranges, clamping and manual input

use serde::{Deserialize, Serialize};

use super::{EnvError, SpaceInfo, SpaceType};

/// Legal interval for one action component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionRange {
    pub low: f32,
    pub high: f32,
}

impl ActionRange {
    /// `[-1, 1]`, the usual range of continuous policy outputs
    pub const SYMMETRIC: Self = Self { low: -1.0, high: 1.0 };

    /// `[0, 1]`, used for pedal-like inputs
    pub const UNIT: Self = Self { low: 0.0, high: 1.0 };

    /// # Panics
    ///
    /// Panics if `low > high` or either bound is NaN.
    pub fn new(low: f32, high: f32) -> Self {
        assert!(low <= high, "action range [{low}, {high}] is inverted");
        Self { low, high }
    }

    /// Checked constructor for bounds read from elsewhere, e.g. a space
    pub fn try_new(low: f32, high: f32) -> Result<Self, EnvError> {
        if low <= high {
            Ok(Self { low, high })
        } else {
            Err(EnvError::InvalidConfig(format!("action range [{low}, {high}] is inverted")))
        }
    }

    /// Clamp into the range; NaN maps to the value closest to zero
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            0.0_f32.clamp(self.low, self.high)
        } else {
            value.clamp(self.low, self.high)
        }
    }
}

/// Length and per-component ranges of an action vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    ranges: Vec<ActionRange>,
}

impl ActionSpec {
    pub fn new(ranges: Vec<ActionRange>) -> Self {
        Self { ranges }
    }

    /// `len` components sharing one range
    pub fn uniform(len: usize, range: ActionRange) -> Self {
        Self { ranges: vec![range; len] }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[ActionRange] {
        &self.ranges
    }

    /// Clamp every component into its range
    ///
    /// Out-of-range values are never rejected; a vector of the wrong length is.
    pub fn clamp(&self, action: &[f32]) -> Result<Vec<f32>, EnvError> {
        if action.len() != self.ranges.len() {
            return Err(EnvError::ActionShape { expected: self.ranges.len(), actual: action.len() });
        }
        Ok(action.iter().zip(&self.ranges).map(|(&value, range)| range.clamp(value)).collect())
    }

    /// The "do nothing" action
    pub fn neutral(&self) -> Vec<f32> {
        self.ranges.iter().map(|range| range.clamp(0.0)).collect()
    }

    /// Recover the spec behind a bounded space; `None` for unbounded ones
    pub fn from_space_info(space: &SpaceInfo) -> Result<Option<Self>, EnvError> {
        match &space.dtype {
            SpaceType::Bounded { low, high } => {
                let ranges = low
                    .iter()
                    .zip(high)
                    .map(|(&l, &h)| ActionRange::try_new(l, h))
                    .collect::<Result<_, _>>()?;
                Ok(Some(Self::new(ranges)))
            }
            SpaceType::Unbounded => Ok(None),
        }
    }

    pub fn space_info(&self) -> SpaceInfo {
        SpaceInfo {
            shape: vec![self.ranges.len()],
            dtype: SpaceType::Bounded {
                low: self.ranges.iter().map(|r| r.low).collect(),
                high: self.ranges.iter().map(|r| r.high).collect(),
            },
        }
    }
}

/// Snapshot of a human's controls
///
/// Axes follow the usual game-input convention: `horizontal` is left(-1) /
/// right(+1), `vertical` is back(-1) / forward(+1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualInput {
    pub horizontal: f32,
    pub vertical: f32,
    pub brake: bool,
}

impl ManualInput {
    pub fn new(horizontal: f32, vertical: f32) -> Self {
        Self { horizontal, vertical, brake: false }
    }

    pub fn braking(mut self) -> Self {
        self.brake = true;
        self
    }
}

/// Manual action source for debugging a scenario by hand
///
/// Implementations must return vectors with the same shape as the learned
/// policy's actions.
pub trait Heuristic {
    fn heuristic(&self, input: &ManualInput) -> Vec<f32>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_out_of_range() {
        let spec = ActionSpec::new(vec![ActionRange::SYMMETRIC, ActionRange::UNIT]);
        let clamped = spec.clamp(&[3.0, -2.0]).unwrap();
        assert_eq!(clamped, vec![1.0, 0.0]);
    }

    #[test]
    fn test_clamp_nan() {
        let spec = ActionSpec::uniform(1, ActionRange::new(0.5, 1.0));
        assert_eq!(spec.clamp(&[f32::NAN]).unwrap(), vec![0.5]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let spec = ActionSpec::uniform(2, ActionRange::SYMMETRIC);
        assert_eq!(spec.clamp(&[0.0]), Err(EnvError::ActionShape { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_neutral() {
        let spec = ActionSpec::new(vec![ActionRange::SYMMETRIC, ActionRange::new(0.2, 1.0)]);
        assert_eq!(spec.neutral(), vec![0.0, 0.2]);
    }

    #[test]
    fn test_space_info() {
        let spec = ActionSpec::new(vec![ActionRange::SYMMETRIC, ActionRange::UNIT]);
        let info = spec.space_info();
        assert_eq!(info.shape, vec![2]);
        assert_eq!(info.dtype, SpaceType::Bounded { low: vec![-1.0, 0.0], high: vec![1.0, 1.0] });
        assert_eq!(ActionSpec::from_space_info(&info), Ok(Some(spec)));

        let unbounded = SpaceInfo { shape: vec![3], dtype: SpaceType::Unbounded };
        assert_eq!(ActionSpec::from_space_info(&unbounded), Ok(None));
    }

    #[test]
    #[should_panic(expected = "is inverted")]
    fn test_inverted_range_panics() {
        let _ = ActionRange::new(1.0, -1.0);
    }

    #[test]
    fn test_inverted_space_rejected() {
        assert!(ActionRange::try_new(0.5, 0.5).is_ok());
        assert!(ActionRange::try_new(f32::NAN, 1.0).is_err());

        let inverted = SpaceInfo {
            shape: vec![1],
            dtype: SpaceType::Bounded { low: vec![2.0], high: vec![1.0] },
        };
        let err = ActionSpec::from_space_info(&inverted).unwrap_err();
        assert!(matches!(err, EnvError::InvalidConfig(_)));
    }
}
