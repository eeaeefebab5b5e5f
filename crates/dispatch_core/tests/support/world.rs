use bevy_ecs::prelude::{Entity, Schedule, World};

use dispatch_core::dispatcher::Dispatcher;
use dispatch_core::runner::simulation_schedule;
use dispatch_core::scenario::params::SimulationEndTime;
use dispatch_core::test_helpers::insert_base_resources;

/// World with every simulation resource inserted, a bounded end time, and
/// the default schedule.
pub fn build_test_world(seed: u64, end_secs: u64) -> (World, Schedule) {
    let mut world = World::new();
    insert_base_resources(&mut world, seed);
    world.insert_resource(SimulationEndTime(end_secs));
    (world, simulation_schedule())
}

/// Partition invariant: each listed courier and order is in exactly one
/// registry bucket.
pub fn assert_partitions(world: &World, couriers: &[Entity], orders: &[Entity]) {
    let dispatcher = world.resource::<Dispatcher>();
    for courier in couriers {
        assert_eq!(
            dispatcher.courier_bucket_count(*courier),
            1,
            "courier {courier:?} must be in exactly one bucket"
        );
    }
    for order in orders {
        assert_eq!(
            dispatcher.order_bucket_count(*order),
            1,
            "order {order:?} must be in exactly one bucket"
        );
    }
}
