//! Notification handshake: after its think time, the courier accepts or
//! rejects the pending instruction.
//!
//! Acceptance re-validates every order against the dispatcher registries
//! immediately before committing: orders settled by a competing path
//! (canceled, assigned elsewhere, fulfilled) are silently stripped, and an
//! instruction left empty is discarded. Rejection records the courier in
//! every contained order's rejection set and resumes the prior activity.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::ecs::{Courier, CourierState, Order, OrderState, PendingNotification, WaitKind};
use crate::model::{Instruction, Notification, NotificationKind};
use crate::policies::acceptance::AcceptancePolicyResource;
use crate::scenario::params::{CourierConfig, SimulationSeed};
use crate::telemetry::SimTelemetry;

#[allow(clippy::too_many_arguments)]
pub fn notification_decision_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut dispatcher: ResMut<Dispatcher>,
    acceptance: Res<AcceptancePolicyResource>,
    courier_config: Res<CourierConfig>,
    seed: Res<SimulationSeed>,
    mut telemetry: ResMut<SimTelemetry>,
    mut couriers: Query<(&mut Courier, Option<&PendingNotification>)>,
    mut orders: Query<&mut Order>,
) {
    if event.0.kind != EventKind::NotificationDecision {
        return;
    }
    let Some(EventSubject::Courier(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut courier, pending)) = couriers.get_mut(entity) else {
        return;
    };
    let Some(pending) = pending else {
        return;
    };
    let notification = pending.0.clone();
    commands.entity(entity).remove::<PendingNotification>();

    let now = clock.now();
    if !courier.wait_matches(WaitKind::Decision, now) {
        // The handshake itself was interrupted (e.g. the courier logged off
        // mid-think); treat as a rejection so the orders stay offerable.
        record_rejection(entity, &mut courier, &notification, &mut orders, &mut telemetry);
        return;
    }
    courier.clear_wait();

    let mut rng =
        StdRng::seed_from_u64(seed.0 ^ ((entity.index() as u64) << 24) ^ now);
    if acceptance.0.accepts(courier.acceptance_rate, &mut rng) {
        handle_acceptance(
            entity,
            &mut courier,
            notification,
            &mut dispatcher,
            &mut clock,
            &courier_config,
            &mut orders,
            &mut telemetry,
        );
    } else {
        record_rejection(entity, &mut courier, &notification, &mut orders, &mut telemetry);
        resume_prior_activity(entity, &mut courier, &mut clock, &courier_config);
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_acceptance(
    entity: Entity,
    courier: &mut Courier,
    mut notification: Notification,
    dispatcher: &mut Dispatcher,
    clock: &mut SimulationClock,
    courier_config: &CourierConfig,
    orders: &mut Query<&mut Order>,
    telemetry: &mut SimTelemetry,
) {
    telemetry.notifications_accepted += 1;
    let now = clock.now();

    if notification.kind == NotificationKind::Prepositioning {
        if courier.state == CourierState::Idle && !courier.has_active_work() {
            if let Instruction::NewRoute(route) = notification.instruction {
                courier.active_route = Some(route);
                schedule_continue(entity, courier, clock);
            }
        }
        return;
    }

    // Re-validate against races: strip orders settled since the offer.
    let stale: Vec<Entity> = notification
        .order_entities()
        .into_iter()
        .filter(|order| !dispatcher.unassigned_orders.contains(order))
        .collect();
    if !stale.is_empty() {
        debug!(courier = ?entity, stale = stale.len(), "stripping settled orders from instruction");
        notification.strip_orders(&stale);
    }
    if !notification.has_orders() {
        resume_prior_activity(entity, courier, clock, courier_config);
        return;
    }

    // The courier must still be in a state the instruction can commit into;
    // otherwise the instruction is nullified and the orders stay offerable.
    let commit_ok = match &notification.instruction {
        Instruction::NewRoute(_) => {
            courier.state == CourierState::Idle && !courier.has_active_work()
        }
        Instruction::ExtendRoute { .. } => {
            courier.state == CourierState::PickingUp && courier.active_stop_ix.is_some()
        }
    };
    if !commit_ok {
        resume_prior_activity(entity, courier, clock, courier_config);
        return;
    }

    for order_entity in notification.order_entities() {
        if !dispatcher.assign_order(order_entity) {
            continue;
        }
        if let Ok(mut order) = orders.get_mut(order_entity) {
            order.state = OrderState::InProgress;
            order.acceptance_at = Some(now);
            order.courier = Some(entity);
        }
    }

    match notification.instruction {
        Instruction::NewRoute(route) => {
            courier.active_route = Some(route);
            schedule_continue(entity, courier, clock);
        }
        Instruction::ExtendRoute { stops, orders: new_orders } => {
            let active_stop_ix = courier.active_stop_ix;
            if let Some(route) = courier.active_route.as_mut() {
                for (order_entity, summary) in &new_orders {
                    route.orders.insert(*order_entity, *summary);
                }
                // New orders join the pick-up currently being serviced.
                if let Some(ix) = active_stop_ix {
                    for order_entity in new_orders.keys() {
                        route.stops[ix].orders.insert(*order_entity);
                    }
                }
                for mut stop in stops {
                    stop.position = route.stops.len();
                    route.stops.push(stop);
                }
            }
            restart_pickup_service(entity, courier, clock);
        }
    }
}

fn record_rejection(
    entity: Entity,
    courier: &mut Courier,
    notification: &Notification,
    orders: &mut Query<&mut Order>,
    telemetry: &mut SimTelemetry,
) {
    telemetry.notifications_rejected += 1;
    if notification.kind != NotificationKind::PickUpDropOff {
        return;
    }
    for order_entity in notification.order_entities() {
        if let Ok(mut order) = orders.get_mut(order_entity) {
            order.record_rejection(entity);
        }
        if !courier.rejected_orders.contains(&order_entity) {
            courier.rejected_orders.push(order_entity);
        }
    }
}

/// After a rejection or a nullified acceptance, the courier picks up where
/// it was suspended: the idle loop, or the interrupted pick-up service.
pub(crate) fn resume_prior_activity(
    entity: Entity,
    courier: &mut Courier,
    clock: &mut SimulationClock,
    courier_config: &CourierConfig,
) {
    match courier.state {
        CourierState::Idle => {
            let due = clock.now() + courier_config.wait_to_move_secs;
            courier.begin_wait(WaitKind::NextRelocation, due);
            clock.schedule_at(
                due,
                EventKind::EvaluateRelocation,
                Some(EventSubject::Courier(entity)),
            );
        }
        CourierState::PickingUp => restart_pickup_service(entity, courier, clock),
        _ => {}
    }
}

/// (Re)starts the service wait at the active pick-up stop: service time plus
/// any remaining wait for the latest order to become ready.
pub(crate) fn restart_pickup_service(
    entity: Entity,
    courier: &mut Courier,
    clock: &mut SimulationClock,
) {
    let now = clock.now();
    let Some(ix) = courier.active_stop_ix else {
        // Between stops; let route execution take it from here.
        if courier.has_active_work() {
            schedule_continue(entity, courier, clock);
        }
        return;
    };
    let Some(route) = courier.active_route.as_ref() else {
        return;
    };
    let stop = &route.stops[ix];
    let service = stop.service_secs(&route.orders);
    let ready_slack = stop
        .latest_expected_at(&route.orders)
        .map(|ready| ready.saturating_sub(now))
        .unwrap_or(0);
    let due = now + service + ready_slack;
    courier.begin_wait(WaitKind::PickUpService, due);
    clock.schedule_at(
        due,
        EventKind::ServiceComplete,
        Some(EventSubject::Courier(entity)),
    );
}

/// Schedules the immediate continuation into route execution.
pub(crate) fn schedule_continue(entity: Entity, courier: &mut Courier, clock: &mut SimulationClock) {
    courier.begin_wait(WaitKind::Continue, clock.now());
    clock.schedule_in(
        0,
        EventKind::ExecuteNextStop,
        Some(EventSubject::Courier(entity)),
    );
}
