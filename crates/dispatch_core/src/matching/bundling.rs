//! Route bundling heuristic: groups matchable orders by their coarse spatial
//! key and greedily packs them into bounded multi-stop routes, reusing
//! couriers already mid-pickup at the same location when beneficial.

use std::collections::BTreeMap;

use bevy_ecs::prelude::Entity;
use h3o::CellIndex;

use crate::model::{Route, VehicleClass};
use crate::routing::RouteProviderResource;
use crate::scenario::params::DispatchConfig;
use crate::spatial::{distance_km_between_cells, grouping_cell};

use super::types::{CourierSnapshot, OrderSnapshot};

/// Builds candidate routes for one dispatch pass.
pub fn generate_routes(
    orders: &[OrderSnapshot],
    couriers: &[CourierSnapshot],
    now: u64,
    config: &DispatchConfig,
    routing: &RouteProviderResource,
) -> Vec<Route> {
    let target_size = target_bundle_size(orders, couriers, now, config);

    let mut groups: BTreeMap<CellIndex, Vec<&OrderSnapshot>> = BTreeMap::new();
    for order in orders {
        groups.entry(order.group_cell).or_default().push(order);
    }

    let mut routes = Vec::new();
    let mut singles = Vec::new();
    for group in groups.values() {
        if group.len() > 1 {
            routes.extend(group_routes(group, couriers, target_size, config, routing));
        } else {
            singles.extend(group.iter().map(|order| {
                let mut route = Route::from_order(order.entity, order.route_order());
                recompute(&mut route, routing);
                route
            }));
        }
    }

    routes.extend(singles);
    routes
}

/// Target orders per bundle: matchable demand ready within the lookahead
/// slack, spread over the idle couriers. Floor 1.
fn target_bundle_size(
    orders: &[OrderSnapshot],
    couriers: &[CourierSnapshot],
    now: u64,
    config: &DispatchConfig,
) -> usize {
    let ready_soon = orders
        .iter()
        .filter(|order| order.ready_at <= now + config.ready_time_slack_secs)
        .count();
    let idle = couriers.iter().filter(|c| c.is_idle()).count();
    if idle == 0 {
        return 1;
    }
    ready_soon.div_ceil(idle).max(1)
}

/// Routes for one multi-order group.
fn group_routes(
    group: &[&OrderSnapshot],
    couriers: &[CourierSnapshot],
    target_size: usize,
    config: &DispatchConfig,
    routing: &RouteProviderResource,
) -> Vec<Route> {
    let first = group[0];
    let capacity = target_size.min(config.max_orders_per_courier).max(1);

    // Couriers at this location: mid-pickup ones seed extendable slots, idle
    // ones only raise the number of fresh slots.
    let mut extendable: Vec<(Entity, Route, Vec<Entity>)> = Vec::new();
    let mut idle_here = 0usize;
    for courier in couriers {
        let at_location = distance_km_between_cells(courier.location, first.pick_up)
            <= config.max_distance_km
            && grouping_cell(courier.location) == first.group_cell;
        if !at_location {
            continue;
        }
        if courier.is_idle() {
            idle_here += 1;
        } else if courier.is_picking_up() {
            if let Some(route) = &courier.active_route {
                let initial: Vec<Entity> = route.orders.keys().copied().collect();
                let mut slot = route.clone();
                slot.add_placeholder_stops(capacity);
                extendable.push((courier.entity, slot, initial));
            }
        }
    }

    let fresh_slots = idle_here.max(group.len().div_ceil(target_size));

    let mut slots: Vec<(Route, Option<(Entity, Vec<Entity>)>)> = extendable
        .into_iter()
        .map(|(courier, slot, initial)| (slot, Some((courier, initial))))
        .collect();
    for _ in 0..fresh_slots {
        slots.push((Route::with_capacity(first.pick_up, capacity), None));
    }

    let mut sorted: Vec<&OrderSnapshot> = group.to_vec();
    sorted.sort_by_key(|order| (order.ready_at, order.entity));

    let mut singles = Vec::new();
    for order in sorted {
        match best_insertion(&slots, order, capacity, routing) {
            Some((slot_ix, position)) => {
                slots[slot_ix].0.add_order(order.entity, order.route_order(), position);
            }
            None => {
                let mut route = Route::from_order(order.entity, order.route_order());
                recompute(&mut route, routing);
                singles.push(route);
            }
        }
    }

    let mut routes = Vec::new();
    for (mut route, seed) in slots {
        route.prune_empty_stops();
        if let Some((courier, initial)) = seed {
            // Keep only the orders this pass added; the courier's committed
            // work is not re-offered.
            route.strip_orders(&initial);
            if !route.orders.is_empty() {
                route.initial_prospect = Some(courier);
            }
        }
        if !route.orders.is_empty() {
            recompute(&mut route, routing);
            routes.push(route);
        }
    }

    routes.extend(singles);
    routes
}

/// Cheapest (slot, position) insertion for an order: only after the pick-up
/// stop, immediately after a stop that already has orders, priced as the
/// added drop-off travel for the reference vehicle class.
fn best_insertion(
    slots: &[(Route, Option<(Entity, Vec<Entity>)>)],
    order: &OrderSnapshot,
    capacity: usize,
    routing: &RouteProviderResource,
) -> Option<(usize, usize)> {
    let mut best: Option<(f64, usize, usize)> = None;

    for (slot_ix, (route, _)) in slots.iter().enumerate() {
        if route.order_count() >= capacity {
            continue;
        }

        if route.orders.is_empty() {
            let cost = insertion_cost(order.pick_up, order, routing);
            if best.map_or(true, |(c, _, _)| cost < c) {
                best = Some((cost, slot_ix, 1));
            }
            continue;
        }

        for position in 1..route.stops.len() {
            let origin = &route.stops[position - 1];
            let destination = &route.stops[position];
            if origin.orders.is_empty() || !destination.orders.is_empty() {
                continue;
            }
            let cost = insertion_cost(origin.location, order, routing);
            if best.map_or(true, |(c, _, _)| cost < c) {
                best = Some((cost, slot_ix, position));
            }
        }
    }

    best.map(|(_, slot_ix, position)| (slot_ix, position))
}

fn insertion_cost(
    origin: CellIndex,
    order: &OrderSnapshot,
    routing: &RouteProviderResource,
) -> f64 {
    routing.travel_secs(origin, order.drop_off, VehicleClass::REFERENCE)
        + order.drop_off_service_secs as f64
}

fn recompute(route: &mut Route, routing: &RouteProviderResource) {
    route.recompute_times(|from, to, vehicle| routing.travel_secs(from, to, vehicle));
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    use crate::ecs::CourierState;
    use crate::model::StopKind;
    use crate::routing::GridRouteProvider;

    fn cell() -> CellIndex {
        CellIndex::try_from(0x8a1fb46622dffff).expect("valid cell")
    }

    fn drop_cell(k: usize) -> CellIndex {
        cell().grid_disk::<Vec<_>>(3)[10 + k]
    }

    fn routing() -> RouteProviderResource {
        RouteProviderResource(Box::new(GridRouteProvider))
    }

    fn order(world: &mut World, ready_at: u64, k: usize) -> OrderSnapshot {
        OrderSnapshot {
            entity: world.spawn_empty().id(),
            pick_up: cell(),
            drop_off: drop_cell(k),
            group_cell: grouping_cell(cell()),
            placement_at: 0,
            preparation_at: 60,
            ready_at,
            expected_drop_off_at: ready_at + 2_400,
            pick_up_service_secs: 120,
            drop_off_service_secs: 120,
        }
    }

    fn idle_courier(world: &mut World, location: CellIndex) -> CourierSnapshot {
        CourierSnapshot {
            entity: world.spawn_empty().id(),
            location,
            state: CourierState::Idle,
            vehicle: VehicleClass::Motorcycle,
            active_route: None,
        }
    }

    #[test]
    fn co_located_orders_bundle_into_one_route() {
        let mut world = World::new();
        let orders: Vec<OrderSnapshot> = (0..3)
            .map(|k| order(&mut world, 300 * k as u64, k))
            .collect();
        let couriers = vec![idle_courier(&mut world, cell())];
        let config = DispatchConfig::default();

        let routes = generate_routes(&orders, &couriers, 0, &config, &routing());

        assert_eq!(routes.len(), 1, "expected one bundled route, not singles");
        let route = &routes[0];
        assert_eq!(route.order_count(), 3);
        assert_eq!(route.stops[0].kind, StopKind::PickUp);
        assert_eq!(route.stops[0].orders.len(), 3);
        assert_eq!(route.stops.len(), 4);
    }

    #[test]
    fn bundles_never_exceed_the_per_courier_cap() {
        let mut world = World::new();
        let orders: Vec<OrderSnapshot> =
            (0..7).map(|k| order(&mut world, 60 * k as u64, k)).collect();
        let couriers = vec![idle_courier(&mut world, cell())];
        let config = DispatchConfig::default();

        let routes = generate_routes(&orders, &couriers, 3_600, &config, &routing());

        assert!(!routes.is_empty());
        for route in &routes {
            assert!(route.order_count() <= config.max_orders_per_courier);
        }
        let total: usize = routes.iter().map(|r| r.order_count()).sum();
        assert_eq!(total, 7);
    }

    #[test]
    fn orders_in_different_groups_stay_separate() {
        let mut world = World::new();
        let near = order(&mut world, 300, 0);
        let far_pick_up = grouping_cell(cell())
            .grid_disk::<Vec<_>>(3)
            .into_iter()
            .rev()
            .find(|c| *c != grouping_cell(cell()))
            .map(crate::spatial::grouping_cell_center)
            .expect("far cell");
        let mut far = order(&mut world, 300, 1);
        far.pick_up = far_pick_up;
        far.group_cell = grouping_cell(far_pick_up);
        let couriers = vec![idle_courier(&mut world, cell())];

        let routes = generate_routes(
            &[near, far],
            &couriers,
            0,
            &DispatchConfig::default(),
            &routing(),
        );

        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|route| route.order_count() == 1));
    }

    #[test]
    fn mid_pickup_courier_seeds_an_extendable_route() {
        let mut world = World::new();
        let committed = order(&mut world, 0, 0);
        // New orders drop off where the committed one does, so extending the
        // in-flight route is always the cheapest insertion.
        let mut incoming: Vec<OrderSnapshot> =
            (1..3).map(|k| order(&mut world, 60 * k as u64, 0)).collect();
        for order in &mut incoming {
            order.drop_off = committed.drop_off;
        }

        let mut active = Route::from_order(committed.entity, committed.route_order());
        active.recompute_times(|_, _, _| 0.0);
        let courier_entity = world.spawn_empty().id();
        let picking_up = CourierSnapshot {
            entity: courier_entity,
            location: cell(),
            state: CourierState::PickingUp,
            vehicle: VehicleClass::Motorcycle,
            active_route: Some(active),
        };
        // A far-off idle courier raises the target bundle size without
        // seeding a slot in this group.
        let far = crate::spatial::grouping_cell_center(
            grouping_cell(cell())
                .grid_disk::<Vec<_>>(3)
                .into_iter()
                .rev()
                .find(|c| *c != grouping_cell(cell()))
                .expect("far group"),
        );
        let idle_far = idle_courier(&mut world, far);

        let config = DispatchConfig::default();
        let routes = generate_routes(&incoming, &[picking_up, idle_far], 0, &config, &routing());

        let extended = routes
            .iter()
            .find(|route| route.initial_prospect == Some(courier_entity))
            .expect("extendable route");
        // Only the new orders are offered; the committed one is stripped.
        assert!(!extended.orders.contains_key(&committed.entity));
        assert!(!extended.orders.is_empty());
    }
}
