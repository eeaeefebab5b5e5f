//! Greedy matching: one order at a time to the nearest feasible idle
//! courier, no bundling, no optimizer. The naive baseline the myopic policy
//! is measured against.

use std::collections::BTreeSet;

use bevy_ecs::prelude::Entity;

use crate::model::{Instruction, Notification, NotificationKind, Route};
use crate::routing::RouteProviderResource;
use crate::scenario::params::DispatchConfig;
use crate::spatial::distance_km_between_cells;

use super::policy::MatchingPolicy;
use super::types::{CourierSnapshot, OrderSnapshot};

pub struct GreedyMatchingPolicy;

impl MatchingPolicy for GreedyMatchingPolicy {
    fn execute(
        &self,
        orders: &[OrderSnapshot],
        couriers: &[CourierSnapshot],
        routing: &RouteProviderResource,
        config: &DispatchConfig,
        _now: u64,
    ) -> Vec<Notification> {
        let idle: Vec<&CourierSnapshot> = couriers
            .iter()
            .filter(|courier| courier.is_idle() && courier.active_route.is_none())
            .collect();

        let mut notifications = Vec::new();
        let mut notified: BTreeSet<Entity> = BTreeSet::new();

        for order in orders {
            let mut best: Option<(f64, &CourierSnapshot)> = None;
            for courier in &idle {
                if notified.contains(&courier.entity) {
                    continue;
                }
                if distance_km_between_cells(courier.location, order.pick_up)
                    > config.max_distance_km
                {
                    continue;
                }
                let time = routing.travel_secs(courier.location, order.pick_up, courier.vehicle)
                    + routing.travel_secs(order.pick_up, order.drop_off, courier.vehicle)
                    + (order.pick_up_service_secs + order.drop_off_service_secs) as f64;
                if best.map_or(true, |(t, _)| time < t) {
                    best = Some((time, courier));
                }
            }

            if let Some((_, courier)) = best {
                notified.insert(courier.entity);
                notifications.push(Notification {
                    courier: courier.entity,
                    kind: NotificationKind::PickUpDropOff,
                    instruction: Instruction::NewRoute(Route::from_order(
                        order.entity,
                        order.route_order(),
                    )),
                });
            }
        }

        notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;
    use h3o::CellIndex;

    use crate::ecs::CourierState;
    use crate::model::VehicleClass;
    use crate::routing::GridRouteProvider;
    use crate::spatial::grouping_cell;

    fn cell() -> CellIndex {
        CellIndex::try_from(0x8a1fb46622dffff).expect("valid cell")
    }

    fn order(world: &mut World, pick_up: CellIndex) -> OrderSnapshot {
        OrderSnapshot {
            entity: world.spawn_empty().id(),
            pick_up,
            drop_off: pick_up,
            group_cell: grouping_cell(pick_up),
            placement_at: 0,
            preparation_at: 0,
            ready_at: 0,
            expected_drop_off_at: 2_400,
            pick_up_service_secs: 120,
            drop_off_service_secs: 120,
        }
    }

    fn idle_at(world: &mut World, location: CellIndex) -> CourierSnapshot {
        CourierSnapshot {
            entity: world.spawn_empty().id(),
            location,
            state: CourierState::Idle,
            vehicle: VehicleClass::Motorcycle,
            active_route: None,
        }
    }

    #[test]
    fn assigns_the_co_located_courier() {
        let mut world = World::new();
        let orders = vec![order(&mut world, cell())];
        let away = cell()
            .grid_disk::<Vec<_>>(20)
            .into_iter()
            .rev()
            .next()
            .expect("cell 5 units away");
        let co_located = idle_at(&mut world, cell());
        let distant = idle_at(&mut world, away);

        let notifications = GreedyMatchingPolicy.execute(
            &orders,
            &[distant, co_located.clone()],
            &RouteProviderResource(Box::new(GridRouteProvider)),
            &DispatchConfig::default(),
            0,
        );

        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].courier, co_located.entity);
    }

    #[test]
    fn one_notification_per_courier() {
        let mut world = World::new();
        let orders = vec![order(&mut world, cell()), order(&mut world, cell())];
        let courier = idle_at(&mut world, cell());

        let notifications = GreedyMatchingPolicy.execute(
            &orders,
            &[courier],
            &RouteProviderResource(Box::new(GridRouteProvider)),
            &DispatchConfig::default(),
            0,
        );

        assert_eq!(notifications.len(), 1);
    }
}
