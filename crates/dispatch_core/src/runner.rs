//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each
//! step pops the next event from [`SimulationClock`], inserts it as
//! [`CurrentEvent`], then runs the schedule.

use bevy_ecs::prelude::Res;
use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::schedule::{apply_deferred, IntoSystemConfigs};

use crate::clock::{CurrentEvent, Event, EventKind, SimulationClock};
use crate::scenario::params::SimulationEndTime;
use crate::systems::{
    cancellation::cancellation_check_system,
    dispatcher_tick::dispatcher_tick_system,
    log_off::courier_log_off_system,
    movement::move_step_system,
    notification::notification_decision_system,
    relocation::evaluate_relocation_system,
    route_execution::{execute_next_stop_system, service_complete_system},
    spawner::{courier_spawn_system, order_submit_system, simulation_started_system},
};

// Condition functions for each event kind
fn is_simulation_started(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SimulationStarted)
        .unwrap_or(false)
}

fn is_submit_order(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SubmitOrder)
        .unwrap_or(false)
}

fn is_spawn_courier(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::SpawnCourier)
        .unwrap_or(false)
}

fn is_dispatcher_tick(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::DispatcherTick)
        .unwrap_or(false)
}

fn is_cancellation_check(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::CancellationCheck)
        .unwrap_or(false)
}

fn is_notification_decision(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::NotificationDecision)
        .unwrap_or(false)
}

fn is_evaluate_relocation(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::EvaluateRelocation)
        .unwrap_or(false)
}

fn is_move_step(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::MoveStep)
        .unwrap_or(false)
}

fn is_execute_next_stop(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ExecuteNextStop)
        .unwrap_or(false)
}

fn is_service_complete(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::ServiceComplete)
        .unwrap_or(false)
}

fn is_courier_log_off(event: Option<Res<CurrentEvent>>) -> bool {
    event
        .map(|e| e.0.kind == EventKind::CourierLogOff)
        .unwrap_or(false)
}

/// Runs one simulation step: pops the next event, inserts it as
/// [`CurrentEvent`], then runs the schedule. Returns `true` if an event was
/// processed, `false` if the clock was empty or the next event is at or past
/// [`SimulationEndTime`] (when that resource is present).
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> bool {
    let stop_at = world.get_resource::<SimulationEndTime>().map(|e| e.0);
    let next_ts = world
        .get_resource::<SimulationClock>()
        .and_then(|c| c.next_event_time());
    if let (Some(end), Some(ts)) = (stop_at, next_ts) {
        if ts >= end {
            return false;
        }
    }

    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    true
}

/// Runs one simulation step and invokes `hook` after the schedule completes.
pub fn run_next_event_with_hook<F>(world: &mut World, schedule: &mut Schedule, mut hook: F) -> bool
where
    F: FnMut(&World, &Event),
{
    let stop_at = world.get_resource::<SimulationEndTime>().map(|e| e.0);
    let next_ts = world
        .get_resource::<SimulationClock>()
        .and_then(|c| c.next_event_time());
    if let (Some(end), Some(ts)) = (stop_at, next_ts) {
        if ts >= end {
            return false;
        }
    }

    let event = match world.resource_mut::<SimulationClock>().pop_next() {
        Some(e) => e,
        None => return false,
    };
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    hook(world, &event);
    true
}

/// Runs simulation steps until the event queue is empty or `max_steps` is
/// reached. Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule) {
        steps += 1;
    }
    steps
}

/// Runs simulation steps until empty and invokes `hook` after each step.
pub fn run_until_empty_with_hook<F>(
    world: &mut World,
    schedule: &mut Schedule,
    max_steps: usize,
    mut hook: F,
) -> usize
where
    F: FnMut(&World, &Event),
{
    let mut steps = 0;
    while steps < max_steps && run_next_event_with_hook(world, schedule, &mut hook) {
        steps += 1;
    }
    steps
}

/// Builds the default simulation schedule: all event-reacting systems plus
/// [`apply_deferred`] so spawned entities and inserted components are applied
/// before the next step.
///
/// Systems are conditionally executed based on event type to reduce overhead.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();

    schedule.add_systems((
        // SimulationStarted
        simulation_started_system.run_if(is_simulation_started),
        // SubmitOrder
        order_submit_system.run_if(is_submit_order),
        // SpawnCourier
        courier_spawn_system.run_if(is_spawn_courier),
        // DispatcherTick
        dispatcher_tick_system.run_if(is_dispatcher_tick),
        // CancellationCheck
        cancellation_check_system.run_if(is_cancellation_check),
        // NotificationDecision
        notification_decision_system.run_if(is_notification_decision),
        // EvaluateRelocation
        evaluate_relocation_system.run_if(is_evaluate_relocation),
        // MoveStep
        move_step_system.run_if(is_move_step),
        // ExecuteNextStop
        execute_next_stop_system.run_if(is_execute_next_stop),
        // ServiceComplete
        service_complete_system.run_if(is_service_complete),
        // CourierLogOff
        courier_log_off_system.run_if(is_courier_log_off),
        // Always run apply_deferred so spawned entities are available
        apply_deferred,
    ));

    schedule
}

/// Initializes the simulation by scheduling the SimulationStarted event at
/// time 0. Call this after building the scenario and before running events.
pub fn initialize_simulation(world: &mut World) {
    let mut clock = world.resource_mut::<SimulationClock>();
    clock.schedule_at(0, EventKind::SimulationStarted, None);
}
