//! Shared constructors for unit and integration tests (behind the
//! `test-helpers` feature).

use bevy_ecs::prelude::{Entity, World};
use h3o::CellIndex;

use crate::dispatcher::Dispatcher;
use crate::ecs::{Courier, Order, OrderState, Position};
use crate::model::VehicleClass;
use crate::scenario::params::{
    CourierConfig, DispatchConfig, PayRates, PendingCouriers, PendingOrders, ServiceTimeConfig,
    SimulationSeed,
};
use crate::telemetry::SimTelemetry;

/// A fixed valid resolution-9 cell.
pub fn seed_cell() -> CellIndex {
    CellIndex::try_from(0x8a1fb46622dffff).expect("valid cell")
}

/// A cell `k` grid steps out from [`seed_cell`].
pub fn cell_at(k: u32) -> CellIndex {
    seed_cell()
        .grid_disk::<Vec<_>>(k)
        .into_iter()
        .rev()
        .next()
        .expect("cell in disk")
}

/// Inserts every resource the simulation systems expect, with defaults and
/// the grid route provider.
pub fn insert_base_resources(world: &mut World, seed: u64) {
    use crate::clock::SimulationClock;
    use crate::matching::{build_matching_policy, MatchingPolicyResource};
    use crate::policies::acceptance::{build_acceptance_policy, AcceptancePolicyResource};
    use crate::policies::buffering::{BufferingPolicyResource, RollingHorizonBufferingPolicy};
    use crate::policies::cancellation::{build_cancellation_policy, CancellationPolicyResource};
    use crate::policies::movement::{build_movement_policy, MovementEvaluationPolicyResource};
    use crate::policies::prepositioning::{
        build_prepositioning_policy, FixedPrepositioningTimingPolicy,
        PrepositioningPolicyResource, PrepositioningTimingPolicyResource,
    };
    use crate::routing::{build_route_provider, RouteProviderKind, RouteProviderResource};
    use crate::scenario::params::{
        AcceptancePolicyKind, CancellationPolicyKind, MatchingPolicyKind,
        MovementEvaluationPolicyKind, PrepositioningPolicyKind,
    };

    let dispatch = DispatchConfig::default();
    let courier = CourierConfig::default();
    world.insert_resource(SimulationClock::default());
    world.insert_resource(Dispatcher::default());
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(SimulationSeed(seed));
    world.insert_resource(dispatch);
    world.insert_resource(courier);
    world.insert_resource(PayRates::default());
    world.insert_resource(ServiceTimeConfig::default());
    world.insert_resource(PendingOrders::default());
    world.insert_resource(PendingCouriers::default());
    world.insert_resource(MatchingPolicyResource(build_matching_policy(
        MatchingPolicyKind::Myopic,
    )));
    world.insert_resource(AcceptancePolicyResource(build_acceptance_policy(
        AcceptancePolicyKind::Uniform,
        courier.think_secs,
    )));
    world.insert_resource(MovementEvaluationPolicyResource(build_movement_policy(
        MovementEvaluationPolicyKind::Still,
        courier.movement_probability,
    )));
    world.insert_resource(CancellationPolicyResource(build_cancellation_policy(
        CancellationPolicyKind::Static,
    )));
    world.insert_resource(BufferingPolicyResource(Box::new(
        RollingHorizonBufferingPolicy {
            interval_secs: dispatch.rolling_horizon_secs,
        },
    )));
    world.insert_resource(PrepositioningTimingPolicyResource(Box::new(
        FixedPrepositioningTimingPolicy {
            interval_secs: dispatch.prepositioning_secs,
        },
    )));
    world.insert_resource(PrepositioningPolicyResource(build_prepositioning_policy(
        PrepositioningPolicyKind::Naive,
    )));
    world.insert_resource(RouteProviderResource(build_route_provider(
        &RouteProviderKind::Grid,
    )));
}

/// Spawns an order entity registered as placed with the dispatcher.
pub fn spawn_placed_order(
    world: &mut World,
    pick_up: CellIndex,
    drop_off: CellIndex,
    placement_at: u64,
    preparation_at: u64,
    ready_at: u64,
) -> Entity {
    let entity = world
        .spawn(Order {
            state: OrderState::Unassigned,
            courier: None,
            rejected_by: Vec::new(),
            pick_up,
            drop_off,
            group_cell: crate::spatial::grouping_cell(pick_up),
            placement_at,
            preparation_at,
            ready_at,
            expected_drop_off_at: placement_at + 2_400,
            acceptance_at: None,
            in_store_at: None,
            pick_up_at: None,
            drop_off_at: None,
            cancellation_at: None,
            pick_up_service_secs: 120,
            drop_off_service_secs: 120,
        })
        .id();
    world
        .resource_mut::<Dispatcher>()
        .order_placed(entity);
    entity
}

/// Spawns an idle courier registered with the dispatcher.
pub fn spawn_idle_courier(
    world: &mut World,
    position: CellIndex,
    acceptance_rate: f64,
    off_duty_at: u64,
) -> Entity {
    let entity = world
        .spawn((
            Courier::new(VehicleClass::Motorcycle, acceptance_rate, 0, off_duty_at),
            Position(position),
        ))
        .id();
    world.resource_mut::<Dispatcher>().set_courier_idle(entity);
    entity
}
