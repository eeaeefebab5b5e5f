//! Dispatcher listening loop: every simulated second, flush the order buffer
//! and run a dispatch pass when the buffering interval elapses, and a
//! prepositioning pass when its interval elapses.

use std::collections::BTreeSet;

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::ecs::{Courier, CourierState, Order, PendingNotification, Position, WaitKind};
use crate::matching::types::{CourierSnapshot, OrderSnapshot};
use crate::matching::MatchingPolicyResource;
use crate::model::Notification;
use crate::policies::acceptance::AcceptancePolicyResource;
use crate::policies::buffering::BufferingPolicyResource;
use crate::policies::prepositioning::{
    PrepositioningPolicyResource, PrepositioningTimingPolicyResource,
};
use crate::routing::RouteProviderResource;
use crate::scenario::params::DispatchConfig;
use crate::telemetry::SimTelemetry;

#[allow(clippy::too_many_arguments)]
pub fn dispatcher_tick_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut dispatcher: ResMut<Dispatcher>,
    buffering: Res<BufferingPolicyResource>,
    preposition_timing: Res<PrepositioningTimingPolicyResource>,
    prepositioning: Res<PrepositioningPolicyResource>,
    matching: Res<MatchingPolicyResource>,
    routing: Res<RouteProviderResource>,
    config: Res<DispatchConfig>,
    acceptance: Res<AcceptancePolicyResource>,
    mut telemetry: ResMut<SimTelemetry>,
    mut couriers: Query<(&mut Courier, &Position, Option<&PendingNotification>)>,
    orders: Query<&Order>,
) {
    if event.0.kind != EventKind::DispatcherTick {
        return;
    }
    let now = clock.now();
    // Couriers already notified in this tick (component inserts are deferred,
    // so the query alone cannot see them yet).
    let mut notified: BTreeSet<Entity> = BTreeSet::new();

    if buffering.0.should_flush(now) {
        let due: Vec<Entity> = dispatcher
            .placed_orders
            .iter()
            .copied()
            .filter(|entity| {
                orders
                    .get(*entity)
                    .map_or(false, |order| order.preparation_at <= now)
            })
            .collect();
        for entity in due {
            dispatcher.buffer_order(entity);
        }

        let order_snapshots: Vec<OrderSnapshot> = dispatcher
            .unassigned_orders
            .iter()
            .filter_map(|entity| {
                orders
                    .get(*entity)
                    .ok()
                    .map(|order| OrderSnapshot::from_order(*entity, order))
            })
            .collect();
        let courier_snapshots =
            eligible_couriers(&dispatcher, &couriers, &notified, &config);

        if !order_snapshots.is_empty() && !courier_snapshots.is_empty() {
            debug!(
                orders = order_snapshots.len(),
                couriers = courier_snapshots.len(),
                "dispatch pass"
            );
            let notifications = matching.execute(
                &order_snapshots,
                &courier_snapshots,
                &routing,
                &config,
                now,
            );
            send_notifications(
                notifications,
                &mut commands,
                &mut clock,
                &acceptance,
                &mut telemetry,
                &mut couriers,
                &mut notified,
            );
        }
    }

    if preposition_timing.0.should_run(now) {
        let placed: Vec<OrderSnapshot> = dispatcher
            .placed_orders
            .iter()
            .filter_map(|entity| {
                orders
                    .get(*entity)
                    .ok()
                    .map(|order| OrderSnapshot::from_order(*entity, order))
            })
            .collect();
        let idle: Vec<CourierSnapshot> = dispatcher
            .idle_couriers
            .iter()
            .copied()
            .filter(|entity| !notified.contains(entity))
            .filter_map(|entity| {
                couriers.get(entity).ok().and_then(|(courier, position, pending)| {
                    (pending.is_none() && !courier.has_active_work())
                        .then(|| CourierSnapshot::from_courier(entity, courier, position.0))
                })
            })
            .collect();

        let notifications = prepositioning.0.execute(&placed, &idle);
        if !notifications.is_empty() {
            debug!(count = notifications.len(), "prepositioning pass");
            send_notifications(
                notifications,
                &mut commands,
                &mut clock,
                &acceptance,
                &mut telemetry,
                &mut couriers,
                &mut notified,
            );
        }
    }

    clock.schedule_in(1, EventKind::DispatcherTick, None);
}

/// Eligible couriers for a dispatch pass: idle, or picking up with headroom
/// under the simultaneous-order cap; never one already mid-handshake.
fn eligible_couriers(
    dispatcher: &Dispatcher,
    couriers: &Query<(&mut Courier, &Position, Option<&PendingNotification>)>,
    notified: &BTreeSet<Entity>,
    config: &DispatchConfig,
) -> Vec<CourierSnapshot> {
    dispatcher
        .idle_couriers
        .iter()
        .chain(dispatcher.picking_up_couriers.iter())
        .copied()
        .filter(|entity| !notified.contains(entity))
        .filter_map(|entity| {
            let (courier, position, pending) = couriers.get(entity).ok()?;
            if pending.is_some() {
                return None;
            }
            // Idle means truly unoccupied; a mid-pickup courier must be at
            // its pick-up stop (not between stops) and under the cap.
            let eligible = match courier.state {
                CourierState::Idle => !courier.has_active_work(),
                CourierState::PickingUp => {
                    courier.active_stop_ix.is_some()
                        && courier.active_route.as_ref().map_or(false, |route| {
                            route.order_count() < config.max_orders_per_courier
                        })
                }
                _ => false,
            };
            eligible.then(|| CourierSnapshot::from_courier(entity, courier, position.0))
        })
        .collect()
}

/// Dispatches notifications asynchronously: each addressed courier gets the
/// pending instruction and a decision event after its think time. Multiple
/// handshakes may be in flight at once.
fn send_notifications(
    notifications: Vec<Notification>,
    commands: &mut Commands,
    clock: &mut SimulationClock,
    acceptance: &AcceptancePolicyResource,
    telemetry: &mut SimTelemetry,
    couriers: &mut Query<(&mut Courier, &Position, Option<&PendingNotification>)>,
    notified: &mut BTreeSet<Entity>,
) {
    for notification in notifications {
        let entity = notification.courier;
        let Ok((mut courier, _, pending)) = couriers.get_mut(entity) else {
            continue;
        };
        if pending.is_some() || notified.contains(&entity) {
            continue;
        }

        let due = clock.now() + acceptance.0.think_secs();
        // Interrupts whatever the courier was suspended on; the superseded
        // timeout event goes stale.
        courier.begin_wait(WaitKind::Decision, due);
        commands.entity(entity).insert(PendingNotification(notification));
        clock.schedule_at(
            due,
            EventKind::NotificationDecision,
            Some(EventSubject::Courier(entity)),
        );
        notified.insert(entity);
        telemetry.notifications_sent += 1;
    }
}
