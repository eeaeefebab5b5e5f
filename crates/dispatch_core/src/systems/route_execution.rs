//! Route execution: a courier walks its active route stop by stop, moving,
//! servicing, and reporting pick-ups and drop-offs back to the dispatcher.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::ecs::{
    Courier, CourierPath, CourierState, MovePurpose, Order, OrderState, Position, WaitKind,
};
use crate::model::StopKind;
use crate::routing::RouteProviderResource;
use crate::scenario::params::{CourierConfig, PayRates};
use crate::telemetry::{DeliveredOrderRecord, SimTelemetry};

use super::log_off::finalize_log_off;
use super::notification::schedule_continue;

/// Advances to the next unvisited stop: travel there if needed, service it,
/// or wrap up the route when none remain.
#[allow(clippy::too_many_arguments)]
pub fn execute_next_stop_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut dispatcher: ResMut<Dispatcher>,
    routing: Res<RouteProviderResource>,
    courier_config: Res<CourierConfig>,
    pay: Res<PayRates>,
    mut telemetry: ResMut<SimTelemetry>,
    mut couriers: Query<(&mut Courier, &Position)>,
    mut orders: Query<&mut Order>,
) {
    if event.0.kind != EventKind::ExecuteNextStop {
        return;
    }
    let Some(EventSubject::Courier(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut courier, position)) = couriers.get_mut(entity) else {
        return;
    };
    let now = clock.now();
    if !courier.wait_matches(WaitKind::Continue, now) {
        return;
    }
    courier.clear_wait();

    let next = courier
        .active_route
        .as_ref()
        .and_then(|route| route.first_unvisited());
    match next {
        None => {
            // All stops visited: the route is done.
            courier.active_route = None;
            courier.active_stop_ix = None;
            if courier.log_off_deferred {
                finalize_log_off(entity, &mut courier, &mut dispatcher, &pay, &mut telemetry, now);
            } else {
                courier.state = CourierState::Idle;
                dispatcher.set_courier_idle(entity);
                let due = now + courier_config.wait_to_move_secs;
                courier.begin_wait(WaitKind::NextRelocation, due);
                clock.schedule_at(
                    due,
                    EventKind::EvaluateRelocation,
                    Some(EventSubject::Courier(entity)),
                );
            }
        }
        Some(stop_ix) => {
            let stop_location = courier.active_route.as_ref().map(|r| r.stops[stop_ix].location);
            let Some(stop_location) = stop_location else {
                return;
            };
            if position.0 == stop_location {
                arrive_at_stop(
                    entity,
                    &mut courier,
                    stop_ix,
                    &mut dispatcher,
                    &mut clock,
                    &mut orders,
                );
            } else {
                courier.state = CourierState::Moving;
                dispatcher.set_courier_moving(entity);
                let cells = routing.route_or_empty(position.0, stop_location);
                commands.entity(entity).insert(CourierPath {
                    cells,
                    next: 1,
                    purpose: MovePurpose::ToStop,
                    destination: stop_location,
                });
                courier.begin_wait(WaitKind::TravelStep, now);
                clock.schedule_in(0, EventKind::MoveStep, Some(EventSubject::Courier(entity)));
            }
        }
    }
}

/// Arrival at a stop: prepositions just get marked visited; pick-ups and
/// drop-offs start their service wait.
pub(crate) fn arrive_at_stop(
    entity: Entity,
    courier: &mut Courier,
    stop_ix: usize,
    dispatcher: &mut Dispatcher,
    clock: &mut SimulationClock,
    orders: &mut Query<&mut Order>,
) {
    let now = clock.now();
    let (kind, stop_orders, service) = {
        let Some(route) = courier.active_route.as_ref() else {
            return;
        };
        let stop = &route.stops[stop_ix];
        (
            stop.kind,
            stop.orders.iter().copied().collect::<Vec<Entity>>(),
            stop.service_secs(&route.orders),
        )
    };

    if kind == StopKind::Preposition {
        if let Some(route) = courier.active_route.as_mut() {
            route.stops[stop_ix].visited = true;
        }
        courier.active_stop_ix = None;
        schedule_continue(entity, courier, clock);
        return;
    }

    courier.active_stop_ix = Some(stop_ix);
    match kind {
        StopKind::PickUp => {
            courier.state = CourierState::PickingUp;
            dispatcher.set_courier_picking_up(entity);
            // The courier is in the store; orders get their in-store stamp.
            for order_entity in stop_orders {
                if let Ok(mut order) = orders.get_mut(order_entity) {
                    order.state = OrderState::InStore;
                    order.in_store_at = Some(now);
                }
            }
            super::notification::restart_pickup_service(entity, courier, clock);
        }
        StopKind::DropOff => {
            courier.state = CourierState::DroppingOff;
            dispatcher.set_courier_dropping_off(entity);
            let due = now + service;
            courier.begin_wait(WaitKind::DropOffService, due);
            clock.schedule_at(
                due,
                EventKind::ServiceComplete,
                Some(EventSubject::Courier(entity)),
            );
        }
        StopKind::Preposition => {}
    }
}

/// Service finished at the active stop: stamp the orders, mark the stop
/// visited, continue the route.
pub fn service_complete_system(
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut dispatcher: ResMut<Dispatcher>,
    mut telemetry: ResMut<SimTelemetry>,
    mut couriers: Query<&mut Courier>,
    mut orders: Query<&mut Order>,
) {
    if event.0.kind != EventKind::ServiceComplete {
        return;
    }
    let Some(EventSubject::Courier(entity)) = event.0.subject else {
        return;
    };
    let Ok(mut courier) = couriers.get_mut(entity) else {
        return;
    };
    let now = clock.now();
    let service_kind = courier.pending_wait().and_then(|wait| {
        (wait.due_at == now
            && matches!(wait.kind, WaitKind::PickUpService | WaitKind::DropOffService))
        .then_some(wait.kind)
    });
    let Some(service_kind) = service_kind else {
        return;
    };
    courier.clear_wait();

    let Some(stop_ix) = courier.active_stop_ix else {
        return;
    };
    let stop_orders: Vec<Entity> = courier
        .active_route
        .as_ref()
        .map(|route| route.stops[stop_ix].orders.iter().copied().collect())
        .unwrap_or_default();

    match service_kind {
        WaitKind::PickUpService => {
            for order_entity in stop_orders {
                if let Ok(mut order) = orders.get_mut(order_entity) {
                    order.state = OrderState::PickedUp;
                    order.pick_up_at = Some(now);
                }
            }
        }
        WaitKind::DropOffService => {
            for order_entity in stop_orders {
                if !dispatcher.fulfill_order(order_entity) {
                    continue;
                }
                if let Ok(mut order) = orders.get_mut(order_entity) {
                    order.state = OrderState::DroppedOff;
                    order.drop_off_at = Some(now);
                    courier.fulfilled.push(order_entity);
                    telemetry.delivered_orders.push(DeliveredOrderRecord {
                        order: order_entity,
                        courier: entity,
                        placement_at: order.placement_at,
                        preparation_at: order.preparation_at,
                        ready_at: order.ready_at,
                        acceptance_at: order.acceptance_at.unwrap_or(now),
                        in_store_at: order.in_store_at.unwrap_or(now),
                        pick_up_at: order.pick_up_at.unwrap_or(now),
                        drop_off_at: now,
                        expected_drop_off_at: order.expected_drop_off_at,
                    });
                }
            }
        }
        _ => {}
    }

    if let Some(route) = courier.active_route.as_mut() {
        route.stops[stop_ix].visited = true;
    }
    courier.active_stop_ix = None;
    schedule_continue(entity, &mut courier, &mut clock);
}
