mod support;

use dispatch_core::clock::{EventKind, EventSubject, SimulationClock};
use dispatch_core::dispatcher::Dispatcher;
use dispatch_core::ecs::{Courier, Order, OrderState, PendingNotification, WaitKind};
use dispatch_core::model::{Instruction, Notification, NotificationKind, Route};
use dispatch_core::runner::run_until_empty;
use dispatch_core::test_helpers::{cell_at, seed_cell, spawn_idle_courier, spawn_placed_order};

use support::world::build_test_world;

#[test]
fn unassigned_order_cancels_after_its_deadline() {
    let (mut world, mut schedule) = build_test_world(5, 5_000);

    let order = spawn_placed_order(&mut world, seed_cell(), cell_at(3), 0, 60, 300);
    world.resource_mut::<SimulationClock>().schedule_at(
        3_660,
        EventKind::CancellationCheck,
        Some(EventSubject::Order(order)),
    );
    dispatch_core::runner::initialize_simulation(&mut world);

    run_until_empty(&mut world, &mut schedule, 100_000);

    let dispatcher = world.resource::<Dispatcher>();
    assert!(dispatcher.canceled_orders.contains(&order));
    assert_eq!(dispatcher.order_bucket_count(order), 1);

    let order_data = world.entity(order).get::<Order>().expect("order");
    assert_eq!(order_data.state, OrderState::Canceled);
    let cancellation_at = order_data.cancellation_at.expect("cancellation_at");
    assert!(cancellation_at >= order_data.preparation_at);
}

/// Builds the handshake by hand so the cancellation deadline and the
/// courier's acceptance land on the same instant, in a chosen order.
fn race_world(
    cancellation_first: bool,
) -> (
    bevy_ecs::prelude::World,
    bevy_ecs::prelude::Entity,
    bevy_ecs::prelude::Entity,
) {
    let (mut world, mut schedule) = build_test_world(13, 1_000);

    let order = spawn_placed_order(&mut world, seed_cell(), cell_at(3), 0, 60, 120);
    world.resource_mut::<Dispatcher>().buffer_order(order);
    let courier = spawn_idle_courier(&mut world, seed_cell(), 1.0, 900);

    let summary = world
        .entity(order)
        .get::<Order>()
        .expect("order")
        .route_order();
    let notification = Notification {
        courier,
        kind: NotificationKind::PickUpDropOff,
        instruction: Instruction::NewRoute(Route::from_order(order, summary)),
    };

    {
        let mut clock = world.resource_mut::<SimulationClock>();
        if cancellation_first {
            clock.schedule_at(140, EventKind::CancellationCheck, Some(EventSubject::Order(order)));
            clock.schedule_at(
                140,
                EventKind::NotificationDecision,
                Some(EventSubject::Courier(courier)),
            );
        } else {
            clock.schedule_at(
                140,
                EventKind::NotificationDecision,
                Some(EventSubject::Courier(courier)),
            );
            clock.schedule_at(140, EventKind::CancellationCheck, Some(EventSubject::Order(order)));
        }
    }
    world
        .entity_mut(courier)
        .get_mut::<Courier>()
        .expect("courier")
        .begin_wait(WaitKind::Decision, 140);
    world.entity_mut(courier).insert(PendingNotification(notification));

    run_until_empty(&mut world, &mut schedule, 100_000);
    (world, order, courier)
}

#[test]
fn cancellation_winning_the_race_nullifies_the_acceptance() {
    let (world, order, courier) = race_world(true);

    let dispatcher = world.resource::<Dispatcher>();
    assert!(dispatcher.canceled_orders.contains(&order));
    assert!(!dispatcher.assigned_orders.contains(&order));
    assert_eq!(dispatcher.order_bucket_count(order), 1);

    let order_data = world.entity(order).get::<Order>().expect("order");
    assert_eq!(order_data.state, OrderState::Canceled);
    assert_eq!(order_data.courier, None);

    // The emptied instruction was discarded silently.
    let courier_data = world.entity(courier).get::<Courier>().expect("courier");
    assert!(courier_data.active_route.is_none());
}

#[test]
fn acceptance_winning_the_race_blocks_the_cancellation() {
    let (world, order, courier) = race_world(false);

    let dispatcher = world.resource::<Dispatcher>();
    assert!(!dispatcher.canceled_orders.contains(&order));
    assert!(
        dispatcher.assigned_orders.contains(&order) || dispatcher.fulfilled_orders.contains(&order)
    );
    assert_eq!(dispatcher.order_bucket_count(order), 1);

    let order_data = world.entity(order).get::<Order>().expect("order");
    assert_ne!(order_data.state, OrderState::Canceled);
    assert_eq!(order_data.courier, Some(courier));
    assert!(order_data.cancellation_at.is_none());
}
