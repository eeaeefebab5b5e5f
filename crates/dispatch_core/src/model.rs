//! Value types shared by the dispatcher, bundling heuristic, and optimizer:
//! vehicles, stops, routes, and courier notifications.
//!
//! Routes are self-contained value data: they carry a per-order summary
//! ([`RouteOrder`]) so route construction and matching are pure functions.
//! Authoritative order state lives in the ECS ([`crate::ecs::Order`]) and is
//! synced by dispatcher systems.

use std::collections::{BTreeMap, BTreeSet};

use bevy_ecs::prelude::Entity;
use h3o::CellIndex;

/// Vehicle classes a courier can ride, with city average speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VehicleClass {
    Walker,
    Bicycle,
    Motorcycle,
    Car,
}

impl VehicleClass {
    pub const COUNT: usize = 4;

    /// Reference class used for bundling insertion costs.
    pub const REFERENCE: VehicleClass = VehicleClass::Motorcycle;

    pub fn average_speed_kmh(self) -> f64 {
        match self {
            VehicleClass::Walker => 5.0,
            VehicleClass::Bicycle => 15.0,
            VehicleClass::Motorcycle => 23.0,
            VehicleClass::Car => 25.0,
        }
    }

    pub fn index(self) -> usize {
        match self {
            VehicleClass::Walker => 0,
            VehicleClass::Bicycle => 1,
            VehicleClass::Motorcycle => 2,
            VehicleClass::Car => 3,
        }
    }
}

/// One duration per vehicle class, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VehicleTimes([f64; VehicleClass::COUNT]);

impl VehicleTimes {
    pub fn get(&self, vehicle: VehicleClass) -> f64 {
        self.0[vehicle.index()]
    }

    pub fn set(&mut self, vehicle: VehicleClass, secs: f64) {
        self.0[vehicle.index()] = secs;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    PickUp,
    DropOff,
    Preposition,
}

/// Per-order summary carried inside routes, copied from the ECS order at
/// bundling time so route math never touches shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOrder {
    pub pick_up: CellIndex,
    pub drop_off: CellIndex,
    pub ready_at: u64,
    pub expected_drop_off_at: u64,
    pub pick_up_service_secs: u64,
    pub drop_off_service_secs: u64,
}

/// A waypoint of a route: where to go, what to service there.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub location: CellIndex,
    pub position: usize,
    pub orders: BTreeSet<Entity>,
    pub kind: StopKind,
    pub visited: bool,
    /// Cumulative arrival offset from route start, per vehicle class.
    pub arrive_at: VehicleTimes,
}

impl Stop {
    pub fn new(location: CellIndex, position: usize, kind: StopKind) -> Self {
        Self {
            location,
            position,
            orders: BTreeSet::new(),
            kind,
            visited: false,
            arrive_at: VehicleTimes::default(),
        }
    }

    pub fn preposition(location: CellIndex) -> Self {
        Self::new(location, 0, StopKind::Preposition)
    }

    /// Service duration at this stop: the slowest of its orders.
    pub fn service_secs(&self, orders: &BTreeMap<Entity, RouteOrder>) -> u64 {
        self.orders
            .iter()
            .filter_map(|entity| orders.get(entity))
            .map(|order| match self.kind {
                StopKind::PickUp => order.pick_up_service_secs,
                StopKind::DropOff => order.drop_off_service_secs,
                StopKind::Preposition => 0,
            })
            .max()
            .unwrap_or(0)
    }

    /// Latest timestamp this stop is expected to be serviced at: the last
    /// ready time for pick-ups, the last promised drop-off for drop-offs.
    pub fn latest_expected_at(&self, orders: &BTreeMap<Entity, RouteOrder>) -> Option<u64> {
        self.orders
            .iter()
            .filter_map(|entity| orders.get(entity))
            .map(|order| match self.kind {
                StopKind::PickUp => order.ready_at,
                _ => order.expected_drop_off_at,
            })
            .max()
    }
}

/// An ordered bundle of stops assigned as one unit of work.
///
/// Invariant: `orders` is exactly the union of all stops' orders. Placeholder
/// stops (no orders yet) may exist during construction and are removed by
/// [`Route::prune_empty_stops`] before the route leaves the heuristic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    pub stops: Vec<Stop>,
    pub orders: BTreeMap<Entity, RouteOrder>,
    /// Courier already committed to the head of this route, preferred by the
    /// optimizer for continuity.
    pub initial_prospect: Option<Entity>,
    /// Total execution time per vehicle class, from the first stop.
    pub time: VehicleTimes,
}

impl Route {
    /// Single-order route: one pick-up, one drop-off.
    pub fn from_order(entity: Entity, order: RouteOrder) -> Self {
        let mut pick_up = Stop::new(order.pick_up, 0, StopKind::PickUp);
        pick_up.orders.insert(entity);
        let mut drop_off = Stop::new(order.drop_off, 1, StopKind::DropOff);
        drop_off.orders.insert(entity);

        let mut orders = BTreeMap::new();
        orders.insert(entity, order);

        Self {
            stops: vec![pick_up, drop_off],
            orders,
            initial_prospect: None,
            time: VehicleTimes::default(),
        }
    }

    /// Empty route slot with a placeholder pick-up stop and `capacity`
    /// placeholder drop-off slots, filled by the bundling heuristic.
    pub fn with_capacity(seed_location: CellIndex, capacity: usize) -> Self {
        let mut stops = Vec::with_capacity(capacity + 1);
        stops.push(Stop::new(seed_location, 0, StopKind::PickUp));
        for position in 1..=capacity {
            stops.push(Stop::new(seed_location, position, StopKind::DropOff));
        }
        Self {
            stops,
            orders: BTreeMap::new(),
            initial_prospect: None,
            time: VehicleTimes::default(),
        }
    }

    /// Appends `extra` placeholder drop-off slots (used when extending a
    /// courier's in-flight route).
    pub fn add_placeholder_stops(&mut self, extra: usize) {
        let Some(location) = self.stops.last().map(|stop| stop.location) else {
            return;
        };
        for _ in 0..extra {
            let position = self.stops.len();
            self.stops.push(Stop::new(location, position, StopKind::DropOff));
        }
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn first_stop(&self) -> Option<&Stop> {
        self.stops.first()
    }

    pub fn first_unvisited(&self) -> Option<usize> {
        self.stops.iter().position(|stop| !stop.visited)
    }

    /// Inserts an order: into the pick-up stop and into the drop-off slot at
    /// `position`. The pick-up stop adopts the order's location if it was an
    /// empty placeholder.
    pub fn add_order(&mut self, entity: Entity, order: RouteOrder, position: usize) {
        debug_assert!(position > 0 && position < self.stops.len());
        {
            let pick_up = &mut self.stops[0];
            if pick_up.orders.is_empty() {
                pick_up.location = order.pick_up;
            }
            pick_up.orders.insert(entity);
        }
        {
            let drop_off = &mut self.stops[position];
            if drop_off.orders.is_empty() {
                drop_off.location = order.drop_off;
                drop_off.kind = StopKind::DropOff;
            }
            drop_off.orders.insert(entity);
        }
        self.orders.insert(entity, order);
    }

    /// Drops placeholder stops that never received an order and renumbers.
    pub fn prune_empty_stops(&mut self) {
        self.stops
            .retain(|stop| !stop.orders.is_empty() || stop.kind == StopKind::Preposition);
        for (position, stop) in self.stops.iter_mut().enumerate() {
            stop.position = position;
        }
    }

    /// Removes orders (canceled, already assigned, or pre-existing on an
    /// extended route) together with any stops they leave empty, renumbering
    /// the remainder. Orders and stops always move together.
    pub fn strip_orders(&mut self, processed: &[Entity]) {
        for entity in processed {
            self.orders.remove(entity);
        }
        for stop in &mut self.stops {
            for entity in processed {
                stop.orders.remove(entity);
            }
        }
        self.prune_empty_stops();
    }

    /// Seconds since the oldest order in the route became ready.
    pub fn time_since_ready(&self, now: u64) -> u64 {
        self.orders
            .values()
            .map(|order| now.saturating_sub(order.ready_at))
            .max()
            .unwrap_or(0)
    }

    /// Latest ready time among orders at the first stop.
    pub fn first_stop_ready_at(&self) -> Option<u64> {
        self.first_stop()
            .and_then(|stop| stop.latest_expected_at(&self.orders))
    }

    /// Recomputes per-stop cumulative arrival offsets and the route total,
    /// for every vehicle class. `travel_secs(from, to, vehicle)` comes from
    /// the routing collaborator (zero when it is degraded).
    pub fn recompute_times<F>(&mut self, travel_secs: F)
    where
        F: Fn(CellIndex, CellIndex, VehicleClass) -> f64,
    {
        for vehicle in [
            VehicleClass::Walker,
            VehicleClass::Bicycle,
            VehicleClass::Motorcycle,
            VehicleClass::Car,
        ] {
            let mut elapsed = 0.0;
            let mut previous: Option<(CellIndex, u64)> = None;
            for ix in 0..self.stops.len() {
                if let Some((location, service)) = previous {
                    elapsed += service as f64 + travel_secs(location, self.stops[ix].location, vehicle);
                }
                self.stops[ix].arrive_at.set(vehicle, elapsed);
                let service = self.stops[ix].service_secs(&self.orders);
                previous = Some((self.stops[ix].location, service));
            }
            let total = elapsed + previous.map(|(_, service)| service as f64).unwrap_or(0.0);
            self.time.set(vehicle, total);
        }
    }
}

/// Kind of instruction offered to a courier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PickUpDropOff,
    Prepositioning,
}

impl NotificationKind {
    pub fn label(self) -> &'static str {
        match self {
            NotificationKind::PickUpDropOff => "pick_up_drop_off",
            NotificationKind::Prepositioning => "prepositioning",
        }
    }
}

/// The proposed work: a full route for an idle courier, or additional stops
/// for one already picking up.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    NewRoute(Route),
    ExtendRoute {
        stops: Vec<Stop>,
        orders: BTreeMap<Entity, RouteOrder>,
    },
}

/// A proposed instruction addressed to one courier, subject to accept/reject.
/// Never mutated after dispatch except to strip orders that went stale
/// between creation and the courier's response.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub courier: Entity,
    pub kind: NotificationKind,
    pub instruction: Instruction,
}

impl Notification {
    pub fn order_entities(&self) -> Vec<Entity> {
        match &self.instruction {
            Instruction::NewRoute(route) => route.orders.keys().copied().collect(),
            Instruction::ExtendRoute { orders, .. } => orders.keys().copied().collect(),
        }
    }

    pub fn has_orders(&self) -> bool {
        match &self.instruction {
            Instruction::NewRoute(route) => !route.orders.is_empty() && !route.stops.is_empty(),
            Instruction::ExtendRoute { orders, stops } => !orders.is_empty() && !stops.is_empty(),
        }
    }

    /// Strips orders already settled by a competing path (canceled, assigned
    /// to someone else, fulfilled), dropping stops they leave empty.
    pub fn strip_orders(&mut self, processed: &[Entity]) {
        match &mut self.instruction {
            Instruction::NewRoute(route) => route.strip_orders(processed),
            Instruction::ExtendRoute { stops, orders } => {
                for entity in processed {
                    orders.remove(entity);
                }
                for stop in stops.iter_mut() {
                    for entity in processed {
                        stop.orders.remove(entity);
                    }
                }
                stops.retain(|stop| !stop.orders.is_empty());
            }
        }
    }
}
