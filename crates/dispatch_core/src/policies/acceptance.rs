//! Courier acceptance policies: how a notified courier decides to take or
//! decline an instruction after its think time.

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;
use rand::Rng;

use crate::scenario::params::AcceptancePolicyKind;

pub trait AcceptancePolicy: Send + Sync {
    /// Think time before the decision lands.
    fn think_secs(&self) -> u64;

    /// Whether the courier accepts, given its acceptance rate.
    fn accepts(&self, acceptance_rate: f64, rng: &mut StdRng) -> bool;
}

/// Weighted coin flip on the courier's acceptance rate.
pub struct UniformAcceptancePolicy {
    pub think_secs: u64,
}

impl AcceptancePolicy for UniformAcceptancePolicy {
    fn think_secs(&self) -> u64 {
        self.think_secs
    }

    fn accepts(&self, acceptance_rate: f64, rng: &mut StdRng) -> bool {
        rng.gen::<f64>() < acceptance_rate
    }
}

/// Always accepts. Useful to isolate dispatch behavior from courier churn.
pub struct AbsoluteAcceptancePolicy {
    pub think_secs: u64,
}

impl AcceptancePolicy for AbsoluteAcceptancePolicy {
    fn think_secs(&self) -> u64 {
        self.think_secs
    }

    fn accepts(&self, _acceptance_rate: f64, _rng: &mut StdRng) -> bool {
        true
    }
}

#[derive(Resource)]
pub struct AcceptancePolicyResource(pub Box<dyn AcceptancePolicy>);

pub fn build_acceptance_policy(
    kind: AcceptancePolicyKind,
    think_secs: u64,
) -> Box<dyn AcceptancePolicy> {
    match kind {
        AcceptancePolicyKind::Uniform => Box::new(UniformAcceptancePolicy { think_secs }),
        AcceptancePolicyKind::Absolute => Box::new(AbsoluteAcceptancePolicy { think_secs }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn uniform_policy_follows_the_acceptance_rate_extremes() {
        let policy = UniformAcceptancePolicy { think_secs: 20 };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(policy.accepts(1.0, &mut rng));
        assert!(!policy.accepts(0.0, &mut rng));
    }

    #[test]
    fn absolute_policy_ignores_the_rate() {
        let policy = AbsoluteAcceptancePolicy { think_secs: 20 };
        let mut rng = StdRng::seed_from_u64(7);
        assert!(policy.accepts(0.0, &mut rng));
    }
}
