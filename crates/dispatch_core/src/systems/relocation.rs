//! Spontaneous relocation: on its idle timeout, a courier asks the movement
//! policy for a destination and either travels there or keeps idling.

use bevy_ecs::prelude::{Commands, Query, Res, ResMut};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::ecs::{Courier, CourierPath, CourierState, MovePurpose, Position, WaitKind};
use crate::policies::movement::MovementEvaluationPolicyResource;
use crate::routing::RouteProviderResource;
use crate::scenario::params::{CourierConfig, SimulationSeed};

#[allow(clippy::too_many_arguments)]
pub fn evaluate_relocation_system(
    mut commands: Commands,
    mut clock: ResMut<SimulationClock>,
    event: Res<CurrentEvent>,
    mut dispatcher: ResMut<Dispatcher>,
    movement: Res<MovementEvaluationPolicyResource>,
    routing: Res<RouteProviderResource>,
    courier_config: Res<CourierConfig>,
    seed: Res<SimulationSeed>,
    mut couriers: Query<(&mut Courier, &Position)>,
) {
    if event.0.kind != EventKind::EvaluateRelocation {
        return;
    }
    let Some(EventSubject::Courier(entity)) = event.0.subject else {
        return;
    };
    let Ok((mut courier, position)) = couriers.get_mut(entity) else {
        return;
    };
    let now = clock.now();
    if !courier.wait_matches(WaitKind::NextRelocation, now) {
        return;
    }
    courier.clear_wait();
    if courier.state != CourierState::Idle || courier.has_active_work() {
        return;
    }

    let mut rng = StdRng::seed_from_u64(seed.0 ^ ((entity.index() as u64) << 16) ^ now);
    match movement.0.destination(position.0, &mut rng) {
        Some(destination) if destination != position.0 => {
            courier.state = CourierState::Moving;
            dispatcher.set_courier_moving(entity);
            let cells = routing.route_or_empty(position.0, destination);
            commands.entity(entity).insert(CourierPath {
                cells,
                next: 1,
                purpose: MovePurpose::Relocation,
                destination,
            });
            courier.begin_wait(WaitKind::TravelStep, now);
            clock.schedule_in(0, EventKind::MoveStep, Some(EventSubject::Courier(entity)));
        }
        _ => {
            let due = now + courier_config.wait_to_move_secs;
            courier.begin_wait(WaitKind::NextRelocation, due);
            clock.schedule_at(
                due,
                EventKind::EvaluateRelocation,
                Some(EventSubject::Courier(entity)),
            );
        }
    }
}
