//! Scenario building: resolves policies, inserts resources, and seeds the
//! pending order/courier queues with their submission events.

use bevy_ecs::prelude::World;
use h3o::{CellIndex, LatLng};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::{EventKind, SimulationClock};
use crate::dispatcher::Dispatcher;
use crate::matching::{build_matching_policy, MatchingPolicyResource};
use crate::policies::acceptance::{build_acceptance_policy, AcceptancePolicyResource};
use crate::policies::buffering::{BufferingPolicyResource, RollingHorizonBufferingPolicy};
use crate::policies::cancellation::{build_cancellation_policy, CancellationPolicyResource};
use crate::policies::movement::{build_movement_policy, MovementEvaluationPolicyResource};
use crate::policies::prepositioning::{
    build_prepositioning_policy, FixedPrepositioningTimingPolicy, PrepositioningPolicyResource,
    PrepositioningTimingPolicyResource,
};
use crate::routing::{build_route_provider, RouteProviderResource};
use crate::scenario::params::{
    PendingCourier, PendingCouriers, PendingOrder, PendingOrders, ScenarioParams,
    SimulationEndTime, SimulationSeed,
};
use crate::spatial::CELL_RESOLUTION;
use crate::telemetry::SimTelemetry;

/// Builds a world ready for [`crate::runner::initialize_simulation`]: all
/// resources inserted, policies resolved once from their kinds, and every
/// submission/log-on event scheduled.
pub fn build_world(params: &ScenarioParams) -> World {
    let mut world = World::new();

    world.insert_resource(SimulationClock::default());
    world.insert_resource(Dispatcher::default());
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(SimulationSeed(params.seed));
    world.insert_resource(params.dispatch);
    world.insert_resource(params.courier);
    world.insert_resource(params.pay);
    world.insert_resource(params.service_times);
    if let Some(end) = params.simulation_end_secs {
        world.insert_resource(SimulationEndTime(end));
    }

    world.insert_resource(MatchingPolicyResource(build_matching_policy(
        params.matching_policy,
    )));
    world.insert_resource(AcceptancePolicyResource(build_acceptance_policy(
        params.acceptance_policy,
        params.courier.think_secs,
    )));
    world.insert_resource(MovementEvaluationPolicyResource(build_movement_policy(
        params.movement_policy,
        params.courier.movement_probability,
    )));
    world.insert_resource(CancellationPolicyResource(build_cancellation_policy(
        params.cancellation_policy,
    )));
    world.insert_resource(BufferingPolicyResource(Box::new(
        RollingHorizonBufferingPolicy {
            interval_secs: params.dispatch.rolling_horizon_secs,
        },
    )));
    world.insert_resource(PrepositioningTimingPolicyResource(Box::new(
        FixedPrepositioningTimingPolicy {
            interval_secs: params.dispatch.prepositioning_secs,
        },
    )));
    world.insert_resource(PrepositioningPolicyResource(build_prepositioning_policy(
        params.prepositioning_policy,
    )));
    world.insert_resource(RouteProviderResource(build_route_provider(
        &params.route_provider,
    )));

    let mut rng = StdRng::seed_from_u64(params.seed);
    seed_orders(&mut world, params, &mut rng);
    seed_couriers(&mut world, params, &mut rng);

    world
}

fn seed_orders(world: &mut World, params: &ScenarioParams, rng: &mut StdRng) {
    let mut orders: Vec<PendingOrder> = (0..params.num_orders)
        .map(|_| {
            let placement_at = rng.gen_range(0..=params.placement_window_secs);
            let preparation_at = placement_at
                + rng.gen_range(params.min_preparation_secs..=params.max_preparation_secs);
            let ready_at =
                preparation_at + rng.gen_range(params.min_ready_secs..=params.max_ready_secs);
            PendingOrder {
                pick_up: random_cell(rng, params),
                drop_off: random_cell(rng, params),
                placement_at,
                preparation_at,
                ready_at,
            }
        })
        .collect();
    // Events pop in time order; the queue must drain in the same order.
    orders.sort_by_key(|order| order.placement_at);

    {
        let mut clock = world.resource_mut::<SimulationClock>();
        for order in &orders {
            clock.schedule_at(order.placement_at, EventKind::SubmitOrder, None);
        }
    }
    world.insert_resource(PendingOrders(orders.into()));
}

fn seed_couriers(world: &mut World, params: &ScenarioParams, rng: &mut StdRng) {
    let mut couriers: Vec<PendingCourier> = (0..params.num_couriers)
        .map(|_| {
            let on_duty_at = rng.gen_range(0..=params.placement_window_secs / 2);
            PendingCourier {
                position: random_cell(rng, params),
                vehicle: params.vehicle,
                on_duty_at,
                off_duty_at: on_duty_at + params.shift_secs,
            }
        })
        .collect();
    couriers.sort_by_key(|courier| courier.on_duty_at);

    {
        let mut clock = world.resource_mut::<SimulationClock>();
        for courier in &couriers {
            clock.schedule_at(courier.on_duty_at, EventKind::SpawnCourier, None);
        }
    }
    world.insert_resource(PendingCouriers(couriers.into()));
}

fn random_cell(rng: &mut StdRng, params: &ScenarioParams) -> CellIndex {
    let lat = rng.gen_range(params.lat_min..params.lat_max);
    let lng = rng.gen_range(params.lng_min..params.lng_max);
    LatLng::new(lat, lng)
        .map(|point| point.to_cell(CELL_RESOLUTION))
        .unwrap_or_else(|_| {
            // Bounds are validated by construction; fall back to the center.
            let center = LatLng::new(
                (params.lat_min + params.lat_max) / 2.0,
                (params.lng_min + params.lng_max) / 2.0,
            )
            .expect("scenario bounding box must be valid");
            center.to_cell(CELL_RESOLUTION)
        })
}
