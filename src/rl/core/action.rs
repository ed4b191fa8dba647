//! Action Space
//!
//! Discrete price actions: each action index selects a multiplier applied
//! to the base price.

use serde::{Deserialize, Serialize};

use crate::error::{PricingError, Result};

/// Discrete price-multiplier action space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceActionSpace {
    multipliers: Vec<f64>,
}

impl PriceActionSpace {
    /// Build from a non-empty list of positive multipliers
    pub fn new(multipliers: Vec<f64>) -> Result<Self> {
        if multipliers.is_empty() {
            return Err(PricingError::InvalidConfig(
                "action space needs at least one multiplier".to_string(),
            ));
        }
        if multipliers.iter().any(|m| !(*m > 0.0)) {
            return Err(PricingError::InvalidConfig(
                "price multipliers must be positive".to_string(),
            ));
        }
        Ok(Self { multipliers })
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }

    /// Multiplier for an action index
    pub fn multiplier(&self, action: usize) -> Result<f64> {
        self.multipliers
            .get(action)
            .copied()
            .ok_or(PricingError::InvalidAction {
                action,
                num_actions: self.multipliers.len(),
            })
    }

    /// All multipliers in action order
    pub fn multipliers(&self) -> &[f64] {
        &self.multipliers
    }

    /// Human-readable label, e.g. "1.10x"
    pub fn describe(&self, action: usize) -> String {
        match self.multipliers.get(action) {
            Some(m) => format!("{:.2}x", m),
            None => format!("invalid({})", action),
        }
    }
}

impl Default for PriceActionSpace {
    fn default() -> Self {
        Self {
            multipliers: crate::rl::config::ActionConfig::default().multipliers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_lookup() {
        let space = PriceActionSpace::new(vec![0.8, 0.9, 1.0, 1.1, 1.2]).unwrap();
        assert_eq!(space.len(), 5);
        assert_eq!(space.multiplier(2).unwrap(), 1.0);
        assert_eq!(space.describe(4), "1.20x");
    }

    #[test]
    fn test_out_of_range_action() {
        let space = PriceActionSpace::default();
        let err = space.multiplier(space.len()).unwrap_err();
        assert!(matches!(err, PricingError::InvalidAction { num_actions: 9, .. }));
    }

    #[test]
    fn test_rejects_bad_multipliers() {
        assert!(PriceActionSpace::new(vec![]).is_err());
        assert!(PriceActionSpace::new(vec![1.0, -0.5]).is_err());
    }
}
