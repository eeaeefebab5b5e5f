//! Cancellation policies: whether a still-pending order gets canceled when
//! its evaluation deadline fires.

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;
use rand::Rng;

use crate::scenario::params::CancellationPolicyKind;

pub trait CancellationPolicy: Send + Sync {
    fn should_cancel(&self, has_courier: bool, rng: &mut StdRng) -> bool;
}

/// Cancel iff no courier was ever assigned.
pub struct StaticCancellationPolicy;

impl CancellationPolicy for StaticCancellationPolicy {
    fn should_cancel(&self, has_courier: bool, _rng: &mut StdRng) -> bool {
        !has_courier
    }
}

/// Cancel with a fixed probability when no courier was assigned, modeling an
/// impatient user rather than the platform.
pub struct RandomCancellationPolicy {
    pub cancellation_probability: f64,
}

impl CancellationPolicy for RandomCancellationPolicy {
    fn should_cancel(&self, has_courier: bool, rng: &mut StdRng) -> bool {
        !has_courier && rng.gen::<f64>() <= self.cancellation_probability
    }
}

#[derive(Resource)]
pub struct CancellationPolicyResource(pub Box<dyn CancellationPolicy>);

pub fn build_cancellation_policy(kind: CancellationPolicyKind) -> Box<dyn CancellationPolicy> {
    match kind {
        CancellationPolicyKind::Static => Box::new(StaticCancellationPolicy),
        CancellationPolicyKind::Random => Box::new(RandomCancellationPolicy {
            cancellation_probability: 0.75,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn static_policy_spares_orders_with_a_courier() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(StaticCancellationPolicy.should_cancel(false, &mut rng));
        assert!(!StaticCancellationPolicy.should_cancel(true, &mut rng));
    }

    #[test]
    fn random_policy_never_cancels_assigned_orders() {
        let policy = RandomCancellationPolicy {
            cancellation_probability: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert!(!policy.should_cancel(true, &mut rng));
        assert!(policy.should_cancel(false, &mut rng));
    }
}
