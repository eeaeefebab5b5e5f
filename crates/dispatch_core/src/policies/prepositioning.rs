//! Prepositioning policies: when and where to proactively move idle couriers
//! ahead of demand, without an order attached.

use bevy_ecs::prelude::Resource;
use std::collections::BTreeMap;

use h3o::CellIndex;

use crate::matching::types::{CourierSnapshot, OrderSnapshot};
use crate::model::{Instruction, Notification, NotificationKind, Route, Stop};
use crate::scenario::params::PrepositioningPolicyKind;
use crate::spatial::{grouping_cell, grouping_cell_center};

pub trait PrepositioningTimingPolicy: Send + Sync {
    fn should_run(&self, now: u64) -> bool;
}

/// Evaluate prepositioning on a fixed interval.
pub struct FixedPrepositioningTimingPolicy {
    pub interval_secs: u64,
}

impl PrepositioningTimingPolicy for FixedPrepositioningTimingPolicy {
    fn should_run(&self, now: u64) -> bool {
        self.interval_secs > 0 && now > 0 && now % self.interval_secs == 0
    }
}

#[derive(Resource)]
pub struct PrepositioningTimingPolicyResource(pub Box<dyn PrepositioningTimingPolicy>);

pub trait PrepositioningPolicy: Send + Sync {
    /// Prepositioning instructions for idle couriers, given the orders still
    /// buffering (placed, not yet matchable).
    fn execute(&self, placed: &[OrderSnapshot], idle: &[CourierSnapshot]) -> Vec<Notification>;
}

/// Never preposition.
pub struct NaivePrepositioningPolicy;

impl PrepositioningPolicy for NaivePrepositioningPolicy {
    fn execute(&self, _placed: &[OrderSnapshot], _idle: &[CourierSnapshot]) -> Vec<Notification> {
        Vec::new()
    }
}

/// Send idle couriers outside the busiest zone toward its center, the zone
/// being the grouping cell with the most buffering pick-ups.
pub struct DemandWeightedPrepositioningPolicy;

impl PrepositioningPolicy for DemandWeightedPrepositioningPolicy {
    fn execute(&self, placed: &[OrderSnapshot], idle: &[CourierSnapshot]) -> Vec<Notification> {
        let mut demand: BTreeMap<CellIndex, usize> = BTreeMap::new();
        for order in placed {
            *demand.entry(order.group_cell).or_insert(0) += 1;
        }
        let Some((&hotspot, _)) = demand.iter().max_by_key(|(cell, count)| (**count, **cell))
        else {
            return Vec::new();
        };

        idle.iter()
            .filter(|courier| grouping_cell(courier.location) != hotspot)
            .map(|courier| Notification {
                courier: courier.entity,
                kind: NotificationKind::Prepositioning,
                instruction: Instruction::NewRoute(Route {
                    stops: vec![Stop::preposition(grouping_cell_center(hotspot))],
                    ..Route::default()
                }),
            })
            .collect()
    }
}

#[derive(Resource)]
pub struct PrepositioningPolicyResource(pub Box<dyn PrepositioningPolicy>);

pub fn build_prepositioning_policy(
    kind: PrepositioningPolicyKind,
) -> Box<dyn PrepositioningPolicy> {
    match kind {
        PrepositioningPolicyKind::Naive => Box::new(NaivePrepositioningPolicy),
        PrepositioningPolicyKind::DemandWeighted => Box::new(DemandWeightedPrepositioningPolicy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    use crate::ecs::CourierState;
    use crate::model::VehicleClass;

    fn cell() -> CellIndex {
        CellIndex::try_from(0x8a1fb46622dffff).expect("valid cell")
    }

    fn far_cell() -> CellIndex {
        // Outside the grouping cell of `cell()`.
        grouping_cell(cell())
            .grid_disk::<Vec<_>>(2)
            .into_iter()
            .rev()
            .find(|c| *c != grouping_cell(cell()))
            .map(grouping_cell_center)
            .expect("far cell")
    }

    fn order_at(entity: bevy_ecs::prelude::Entity, pick_up: CellIndex) -> OrderSnapshot {
        OrderSnapshot {
            entity,
            pick_up,
            drop_off: pick_up,
            group_cell: grouping_cell(pick_up),
            placement_at: 0,
            preparation_at: 60,
            ready_at: 300,
            expected_drop_off_at: 2_400,
            pick_up_service_secs: 120,
            drop_off_service_secs: 120,
        }
    }

    #[test]
    fn demand_weighted_policy_targets_the_busiest_zone() {
        let mut world = World::new();
        let orders: Vec<OrderSnapshot> = (0..3)
            .map(|_| order_at(world.spawn_empty().id(), cell()))
            .collect();
        let couriers = vec![CourierSnapshot {
            entity: world.spawn_empty().id(),
            location: far_cell(),
            state: CourierState::Idle,
            vehicle: VehicleClass::Motorcycle,
            active_route: None,
        }];

        let notifications = DemandWeightedPrepositioningPolicy.execute(&orders, &couriers);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Prepositioning);
        let Instruction::NewRoute(route) = &notifications[0].instruction else {
            panic!("expected a route instruction");
        };
        assert_eq!(grouping_cell(route.stops[0].location), grouping_cell(cell()));
    }

    #[test]
    fn naive_policy_sends_nothing() {
        assert!(NaivePrepositioningPolicy.execute(&[], &[]).is_empty());
    }
}
