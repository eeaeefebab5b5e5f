//! Cancellation evaluation: fires once per order, a fixed delay after its
//! preparation time. Only orders still pending (placed or unassigned) are
//! cancellable; assignment and cancellation race safely because both paths
//! consult the registries before committing.

use bevy_ecs::prelude::{Query, Res, ResMut};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::ecs::{Order, OrderState};
use crate::policies::cancellation::CancellationPolicyResource;
use crate::scenario::params::SimulationSeed;
use crate::telemetry::{CanceledOrderRecord, SimTelemetry};

pub fn cancellation_check_system(
    clock: Res<SimulationClock>,
    event: Res<CurrentEvent>,
    mut dispatcher: ResMut<Dispatcher>,
    policy: Res<CancellationPolicyResource>,
    seed: Res<SimulationSeed>,
    mut telemetry: ResMut<SimTelemetry>,
    mut orders: Query<&mut Order>,
) {
    if event.0.kind != EventKind::CancellationCheck {
        return;
    }
    let Some(EventSubject::Order(entity)) = event.0.subject else {
        return;
    };
    let Ok(mut order) = orders.get_mut(entity) else {
        return;
    };

    let now = clock.now();
    let mut rng = StdRng::seed_from_u64(seed.0 ^ ((entity.index() as u64) << 8) ^ now);
    if !policy.0.should_cancel(order.courier.is_some(), &mut rng) {
        return;
    }
    if !dispatcher.cancel_order(entity) {
        // Settled by a competing path (accepted, fulfilled) first; exactly
        // one outcome wins.
        return;
    }

    order.state = OrderState::Canceled;
    order.cancellation_at = Some(now);
    telemetry.canceled_orders.push(CanceledOrderRecord {
        order: entity,
        placement_at: order.placement_at,
        preparation_at: order.preparation_at,
        cancellation_at: now,
    });
}
