mod support;

use bevy_ecs::prelude::Entity;

use dispatch_core::clock::{EventKind, EventSubject, SimulationClock};
use dispatch_core::dispatcher::Dispatcher;
use dispatch_core::ecs::{Courier, CourierState, Order, OrderState};
use dispatch_core::runner::{initialize_simulation, run_until_empty_with_hook};
use dispatch_core::telemetry::SimTelemetry;
use dispatch_core::test_helpers::{cell_at, seed_cell, spawn_idle_courier, spawn_placed_order};

use support::world::{assert_partitions, build_test_world};

#[test]
fn delivers_one_order_end_to_end() {
    let (mut world, mut schedule) = build_test_world(42, 9_000);

    let order = spawn_placed_order(&mut world, seed_cell(), cell_at(3), 0, 60, 300);
    let courier = spawn_idle_courier(&mut world, seed_cell(), 1.0, 7_200);
    world.resource_mut::<SimulationClock>().schedule_at(
        7_200,
        EventKind::CourierLogOff,
        Some(EventSubject::Courier(courier)),
    );
    initialize_simulation(&mut world);

    let couriers: Vec<Entity> = vec![courier];
    let orders: Vec<Entity> = vec![order];
    let steps = run_until_empty_with_hook(&mut world, &mut schedule, 200_000, |world, _event| {
        assert_partitions(world, &couriers, &orders);
    });
    assert!(steps < 200_000, "runner did not converge");

    let dispatcher = world.resource::<Dispatcher>();
    assert!(dispatcher.fulfilled_orders.contains(&order));
    assert!(dispatcher.logged_off_couriers.contains(&courier));

    let order_data = world.entity(order).get::<Order>().expect("order");
    assert_eq!(order_data.state, OrderState::DroppedOff);
    assert_eq!(order_data.courier, Some(courier));

    // Monotonic timestamps for the fulfilled order.
    let pick_up_at = order_data.pick_up_at.expect("pick_up_at");
    let drop_off_at = order_data.drop_off_at.expect("drop_off_at");
    assert!(order_data.placement_at <= order_data.preparation_at);
    assert!(order_data.preparation_at <= order_data.ready_at);
    assert!(order_data.ready_at <= pick_up_at);
    assert!(pick_up_at <= drop_off_at);

    let courier_data = world.entity(courier).get::<Courier>().expect("courier");
    assert_eq!(courier_data.state, CourierState::LoggedOff);
    assert_eq!(courier_data.fulfilled, vec![order]);
    assert!(courier_data.active_route.is_none());

    let telemetry = world.resource::<SimTelemetry>();
    assert_eq!(telemetry.delivered_orders.len(), 1);
    let record = &telemetry.delivered_orders[0];
    assert_eq!(record.order, order);
    assert_eq!(record.courier, courier);
    assert!(record.ready_at <= record.pick_up_at);
    assert!(record.in_store_at <= record.pick_up_at);
    assert_eq!(telemetry.courier_shifts.len(), 1);
    // One delivery out-earns the two-hour floor? 3.0 < 16.0: floor binds.
    assert!(telemetry.courier_shifts[0].hourly_floor_applied);
}

#[test]
fn bundles_three_co_located_orders_onto_one_courier() {
    let (mut world, mut schedule) = build_test_world(7, 30_000);

    // Three orders sharing the pick-up group, ready five minutes apart.
    let orders: Vec<Entity> = (0..3)
        .map(|k| {
            spawn_placed_order(
                &mut world,
                seed_cell(),
                cell_at(3 + k as u32),
                0,
                60,
                120 + 300 * k,
            )
        })
        .collect();
    let courier = spawn_idle_courier(&mut world, seed_cell(), 1.0, 25_000);
    world.resource_mut::<SimulationClock>().schedule_at(
        25_000,
        EventKind::CourierLogOff,
        Some(EventSubject::Courier(courier)),
    );
    initialize_simulation(&mut world);

    let couriers = vec![courier];
    let steps = run_until_empty_with_hook(&mut world, &mut schedule, 400_000, |world, _event| {
        assert_partitions(world, &couriers, &orders);
    });
    assert!(steps < 400_000, "runner did not converge");

    let dispatcher = world.resource::<Dispatcher>();
    for order in &orders {
        assert!(
            dispatcher.fulfilled_orders.contains(order),
            "all bundled orders must be delivered"
        );
    }

    let courier_data = world.entity(courier).get::<Courier>().expect("courier");
    assert_eq!(courier_data.fulfilled.len(), 3);

    // One bundle, one notification: the heuristic did not split the group.
    let telemetry = world.resource::<SimTelemetry>();
    assert_eq!(telemetry.notifications_sent, 1);
    assert_eq!(telemetry.notifications_accepted, 1);
    assert_eq!(telemetry.delivered_orders.len(), 3);
}

#[test]
fn simulation_survives_an_unreachable_route_provider() {
    use dispatch_core::routing::{RouteProviderResource, UnreachableRouteProvider};

    let (mut world, mut schedule) = build_test_world(11, 9_000);
    world.insert_resource(RouteProviderResource(Box::new(UnreachableRouteProvider)));

    let order = spawn_placed_order(&mut world, seed_cell(), cell_at(3), 0, 60, 300);
    let courier = spawn_idle_courier(&mut world, seed_cell(), 1.0, 7_200);
    world.resource_mut::<SimulationClock>().schedule_at(
        7_200,
        EventKind::CourierLogOff,
        Some(EventSubject::Courier(courier)),
    );
    initialize_simulation(&mut world);

    let steps = run_until_empty_with_hook(&mut world, &mut schedule, 200_000, |_, _| {});
    assert!(steps < 200_000, "runner did not converge");

    // Degraded estimates (zero time, empty paths) still let the order flow
    // through to fulfillment.
    let dispatcher = world.resource::<Dispatcher>();
    assert!(dispatcher.fulfilled_orders.contains(&order));
}
