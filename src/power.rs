//! Describing distributions of mining power

/// Numeric type used to represent mining power.
pub type PowerValue = f64;

/// Relative weight of an honest high-power node.
pub const HIGH_POWER_WEIGHT: PowerValue = 10.0;
/// Relative weight of an honest low-power node.
pub const LOW_POWER_WEIGHT: PowerValue = 1.0;

/// Determines how mining power is split between honest nodes and attackers.
///
/// Each attacker holds exactly its configured fraction of the network's
/// power. Honest nodes share the remainder, with high-power nodes weighted
/// [`HIGH_POWER_WEIGHT`] and low-power nodes [`LOW_POWER_WEIGHT`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PowerDistribution {
    attackers: Vec<PowerValue>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PowerError {
    #[error("power value {0} is not strictly between 0.0 and 1.0")]
    BadPowerValue(PowerValue),
    #[error("attacker power values sum to {0}, leaving no power to honest nodes")]
    BadAttackerSum(PowerValue),
    #[error("cannot distribute power without any honest nodes")]
    NoHonestNodes,
}

impl PowerDistribution {
    /// Creates a distribution in which attacker `i` holds `attackers[i]`.
    pub fn new<I>(attackers: I) -> Self
    where
        I: IntoIterator<Item = PowerValue>,
    {
        Self { attackers: attackers.into_iter().collect() }
    }

    /// Power values of the attackers, in order.
    #[inline]
    pub fn attackers(&self) -> &[PowerValue] {
        &self.attackers
    }

    /// Checks that every attacker value lies strictly between 0 and 1, and
    /// that the honest nodes keep some power.
    pub fn validate(&self) -> Result<(), PowerError> {
        use PowerError::*;

        if let Some(&val) =
            self.attackers.iter().find(|&&x| !(x > 0.0 && x < 1.0))
        {
            return Err(BadPowerValue(val));
        }

        let sum: PowerValue = self.attackers.iter().sum();
        if sum >= 1.0 {
            return Err(BadAttackerSum(sum));
        }

        Ok(())
    }

    /// Returns the share of each node: one value per entry of `high_power`
    /// (the honest nodes, in order), followed by one value per attacker.
    /// The shares sum to 1.
    pub fn shares(
        &self,
        high_power: &[bool],
    ) -> Result<Vec<PowerValue>, PowerError> {
        self.validate()?;
        if high_power.is_empty() {
            return Err(PowerError::NoHonestNodes);
        }

        let weight = |high: bool| {
            if high {
                HIGH_POWER_WEIGHT
            } else {
                LOW_POWER_WEIGHT
            }
        };
        let total_weight: PowerValue =
            high_power.iter().map(|&high| weight(high)).sum();
        let honest_power = 1.0 - self.attackers.iter().sum::<PowerValue>();

        Ok(high_power
            .iter()
            .map(|&high| honest_power * weight(high) / total_weight)
            .chain(self.attackers.iter().copied())
            .collect())
    }
}

/// Helper trait for turning inclusive integer ranges into percentages.
/// # Example
/// ```
/// use p2p_sim::power::Percent;
///
/// for p in (10..=40usize).step_by(10).percent() {
///    println!("{}", p);
/// }
/// ```
pub trait Percent {
    /// Returns an iterator over percentage values. Can be used with
    /// [`SimulationBuilder`](crate::simulation::SimulationBuilder) to sweep
    /// attacker power.
    fn percent(self) -> impl Iterator<Item = PowerValue>;
}

impl<I> Percent for I
where
    I: Iterator<Item = usize>,
{
    fn percent(self) -> impl Iterator<Item = PowerValue> {
        self.map(|n| {
            assert!(n <= 100, "invalid percent {}", n);
            n as PowerValue / 100.0
        })
    }
}
