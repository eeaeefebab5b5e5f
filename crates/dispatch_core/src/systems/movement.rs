//! Movement: advances a courier cell-by-cell along its current path, one
//! `MoveStep` event per leg, then hands off to arrival handling.

use bevy_ecs::prelude::{Commands, Query, Res, ResMut};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::ecs::{Courier, CourierPath, CourierState, MovePurpose, Order, Position, WaitKind};
use crate::routing::RouteProviderResource;
use crate::scenario::params::CourierConfig;

use super::route_execution::arrive_at_stop;

#[allow(clippy::too_many_arguments)]
pub fn move_step_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut dispatcher: ResMut<Dispatcher>,
    routing: Res<RouteProviderResource>,
    courier_config: Res<CourierConfig>,
    mut couriers: Query<(&mut Courier, &mut Position, Option<&mut CourierPath>)>,
    mut orders: Query<&mut Order>,
) {
    if event.0.kind != EventKind::MoveStep {
        return;
    }
    let Some(EventSubject::Courier(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut courier, mut position, path)) = couriers.get_mut(entity) else {
        return;
    };
    let now = clock.now();
    if !courier.wait_matches(WaitKind::TravelStep, now) {
        return;
    }
    courier.clear_wait();
    let Some(mut path) = path else {
        return;
    };

    if path.next < path.cells.len() {
        // Advance one leg and come back for the next.
        let next_cell = path.cells[path.next];
        let step_secs =
            routing.travel_secs(position.0, next_cell, courier.vehicle).round() as u64;
        position.0 = next_cell;
        path.next += 1;
        if path.purpose == MovePurpose::ToStop {
            courier.utilization_secs += step_secs;
        }
        courier.begin_wait(WaitKind::TravelStep, now + step_secs);
        clock.schedule_in(
            step_secs,
            EventKind::MoveStep,
            Some(EventSubject::Courier(entity)),
        );
        return;
    }

    // Path exhausted (or empty, when the provider degraded): arrival.
    position.0 = path.destination;
    let purpose = path.purpose;
    commands.entity(entity).remove::<CourierPath>();

    match purpose {
        MovePurpose::Relocation => {
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
        MovePurpose::ToStop => {
            let Some(stop_ix) = courier
                .active_route
                .as_ref()
                .and_then(|route| route.first_unvisited())
            else {
                return;
            };
            arrive_at_stop(
                entity,
                &mut courier,
                stop_ix,
                &mut dispatcher,
                &mut clock,
                &mut orders,
            );
        }
    }
}
