//! Shift end: a courier with no committed work logs off immediately; one
//! mid-route defers until the route completes.

use bevy_ecs::prelude::{Commands, Entity, Query, Res, ResMut};
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::ecs::{Courier, CourierPath, CourierState, Order, PendingNotification};
use crate::scenario::params::PayRates;
use crate::telemetry::{CourierShiftRecord, SimTelemetry};

pub fn courier_log_off_system(
    mut commands: Commands,
    clock: Res<SimulationClock>,
    event: Res<CurrentEvent>,
    mut dispatcher: ResMut<Dispatcher>,
    pay: Res<PayRates>,
    mut telemetry: ResMut<SimTelemetry>,
    mut couriers: Query<(&mut Courier, Option<&PendingNotification>)>,
    mut orders: Query<&mut Order>,
) {
    if event.0.kind != EventKind::CourierLogOff {
        return;
    }
    let Some(EventSubject::Courier(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut courier, pending)) = couriers.get_mut(entity) else {
        return;
    };
    if courier.state == CourierState::LoggedOff {
        return;
    }

    if courier.has_active_work() {
        debug!(courier = ?entity, "log-off deferred until the active route completes");
        courier.log_off_deferred = true;
        return;
    }

    // An unanswered notification counts as rejected; its orders stay
    // offerable.
    if let Some(pending) = pending {
        for order_entity in pending.0.order_entities() {
            if let Ok(mut order) = orders.get_mut(order_entity) {
                order.record_rejection(entity);
            }
        }
        telemetry.notifications_rejected += 1;
        commands.entity(entity).remove::<PendingNotification>();
    }
    // A relocation in flight is simply abandoned.
    commands.entity(entity).remove::<CourierPath>();

    finalize_log_off(
        entity,
        &mut courier,
        &mut dispatcher,
        &pay,
        &mut telemetry,
        clock.now(),
    );
}

/// Terminal transition: compute earnings, record the shift, move the courier
/// to the logged-off bucket.
pub(crate) fn finalize_log_off(
    entity: Entity,
    courier: &mut Courier,
    dispatcher: &mut Dispatcher,
    pay: &PayRates,
    telemetry: &mut SimTelemetry,
    now: u64,
) {
    courier.clear_wait();
    courier.state = CourierState::LoggedOff;
    dispatcher.set_courier_logged_off(entity);

    let shift_secs = now.saturating_sub(courier.on_duty_at);
    let (earnings, hourly_floor_applied) = pay.earnings(courier.fulfilled.len(), shift_secs);
    telemetry.courier_shifts.push(CourierShiftRecord {
        courier: entity,
        on_duty_at: courier.on_duty_at,
        logged_off_at: now,
        fulfilled_orders: courier.fulfilled.len(),
        utilization_secs: courier.utilization_secs,
        earnings,
        hourly_floor_applied,
    });
}
