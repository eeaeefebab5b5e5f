//! Spawning systems: orders submitted by users and couriers logging on, both
//! drained from pending queues by scheduled events.

use bevy_ecs::prelude::{Commands, Res, ResMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::ecs::{Courier, Order, OrderState, Position, WaitKind};
use crate::scenario::params::{
    CourierConfig, DispatchConfig, PendingCouriers, PendingOrders, ServiceTimeConfig,
    SimulationSeed,
};
use crate::spatial::grouping_cell;

/// Kicks off the dispatcher's listening loop.
pub fn simulation_started_system(mut clock: ResMut<SimulationClock>, event: Res<CurrentEvent>) {
    if event.0.kind != EventKind::SimulationStarted {
        return;
    }
    clock.schedule_in(1, EventKind::DispatcherTick, None);
}

/// Order submission: spawns the order entity, registers it as placed, and
/// schedules its cancellation evaluation a fixed delay after preparation.
pub fn order_submit_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut pending: ResMut<PendingOrders>,
    mut dispatcher: ResMut<Dispatcher>,
    seed: Res<SimulationSeed>,
    service_times: Res<ServiceTimeConfig>,
    dispatch_config: Res<DispatchConfig>,
) {
    if event.0.kind != EventKind::SubmitOrder {
        return;
    }
    let Some(submitted) = pending.0.pop_front() else {
        return;
    };

    let entity = commands.spawn_empty().id();
    let mut rng = StdRng::seed_from_u64(seed.0 ^ entity.index() as u64);
    let pick_up_service_secs =
        rng.gen_range(service_times.min_service_secs..=service_times.max_pick_up_service_secs);
    let drop_off_service_secs =
        rng.gen_range(service_times.min_service_secs..=service_times.max_drop_off_service_secs);

    commands.entity(entity).insert(Order {
        state: OrderState::Unassigned,
        courier: None,
        rejected_by: Vec::new(),
        pick_up: submitted.pick_up,
        drop_off: submitted.drop_off,
        group_cell: grouping_cell(submitted.pick_up),
        placement_at: submitted.placement_at,
        preparation_at: submitted.preparation_at,
        ready_at: submitted.ready_at,
        expected_drop_off_at: submitted.placement_at + service_times.target_drop_off_secs,
        acceptance_at: None,
        in_store_at: None,
        pick_up_at: None,
        drop_off_at: None,
        cancellation_at: None,
        pick_up_service_secs,
        drop_off_service_secs,
    });

    dispatcher.order_placed(entity);
    clock.schedule_at(
        submitted.preparation_at + dispatch_config.wait_to_cancel_secs,
        EventKind::CancellationCheck,
        Some(EventSubject::Order(entity)),
    );
}

/// Courier log-on: spawns the courier idle at its start position and
/// schedules both its idle loop and its shift-end log-off.
pub fn courier_spawn_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut pending: ResMut<PendingCouriers>,
    mut dispatcher: ResMut<Dispatcher>,
    seed: Res<SimulationSeed>,
    courier_config: Res<CourierConfig>,
) {
    if event.0.kind != EventKind::SpawnCourier {
        return;
    }
    let Some(logging_on) = pending.0.pop_front() else {
        return;
    };
    let now = clock.now();

    let entity = commands.spawn_empty().id();
    let mut rng = StdRng::seed_from_u64(seed.0 ^ entity.index() as u64);
    let acceptance_rate = rng.gen_range(courier_config.min_acceptance_rate..=1.0);

    let mut courier = Courier::new(
        logging_on.vehicle,
        acceptance_rate,
        now,
        logging_on.off_duty_at,
    );
    courier.begin_wait(WaitKind::NextRelocation, now + courier_config.wait_to_move_secs);
    commands
        .entity(entity)
        .insert((courier, Position(logging_on.position)));

    dispatcher.set_courier_idle(entity);
    clock.schedule_in(
        courier_config.wait_to_move_secs,
        EventKind::EvaluateRelocation,
        Some(EventSubject::Courier(entity)),
    );
    clock.schedule_at(
        logging_on.off_duty_at.max(now),
        EventKind::CourierLogOff,
        Some(EventSubject::Courier(entity)),
    );
}
