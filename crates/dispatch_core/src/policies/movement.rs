//! Movement-evaluation policies: whether an idle courier relocates, and
//! where to.

use bevy_ecs::prelude::Resource;
use h3o::CellIndex;
use rand::rngs::StdRng;
use rand::Rng;

use crate::scenario::params::MovementEvaluationPolicyKind;
use crate::spatial::{grouping_cell_center, neighbor_grouping_cells};

pub trait MovementEvaluationPolicy: Send + Sync {
    /// Optional destination for a relocation, `None` to stay put.
    fn destination(&self, current: CellIndex, rng: &mut StdRng) -> Option<CellIndex>;
}

/// With probability `move_probability`, relocate to the center of a random
/// neighboring zone.
pub struct NeighborsMovementPolicy {
    pub move_probability: f64,
}

impl MovementEvaluationPolicy for NeighborsMovementPolicy {
    fn destination(&self, current: CellIndex, rng: &mut StdRng) -> Option<CellIndex> {
        if rng.gen::<f64>() > self.move_probability {
            return None;
        }
        let neighbors = neighbor_grouping_cells(current);
        if neighbors.is_empty() {
            return None;
        }
        let chosen = neighbors[rng.gen_range(0..neighbors.len())];
        Some(grouping_cell_center(chosen))
    }
}

/// Never relocates.
pub struct StillMovementPolicy;

impl MovementEvaluationPolicy for StillMovementPolicy {
    fn destination(&self, _current: CellIndex, _rng: &mut StdRng) -> Option<CellIndex> {
        None
    }
}

#[derive(Resource)]
pub struct MovementEvaluationPolicyResource(pub Box<dyn MovementEvaluationPolicy>);

pub fn build_movement_policy(
    kind: MovementEvaluationPolicyKind,
    move_probability: f64,
) -> Box<dyn MovementEvaluationPolicy> {
    match kind {
        MovementEvaluationPolicyKind::Neighbors => {
            Box::new(NeighborsMovementPolicy { move_probability })
        }
        MovementEvaluationPolicyKind::Still => Box::new(StillMovementPolicy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn cell() -> CellIndex {
        CellIndex::try_from(0x8a1fb46622dffff).expect("valid cell")
    }

    #[test]
    fn neighbors_policy_moves_to_a_different_zone_when_it_moves() {
        let policy = NeighborsMovementPolicy {
            move_probability: 1.0,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let destination = policy.destination(cell(), &mut rng).expect("destination");
        assert_ne!(
            crate::spatial::grouping_cell(destination),
            crate::spatial::grouping_cell(cell())
        );
    }

    #[test]
    fn still_policy_never_moves() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(StillMovementPolicy.destination(cell(), &mut rng).is_none());
    }
}
