//! ECS components for orders and couriers.
//!
//! Couriers suspend only at explicit wait points. The pending wait is modeled
//! as an enumerated reason plus its due time; a courier-addressed timeout
//! event only fires if it matches the courier's current wait, so interrupting
//! an activity (e.g. a notification landing mid-pickup) is just overwriting
//! the wait — the superseded event becomes a no-op when it pops.

use bevy_ecs::prelude::{Component, Entity};
use h3o::CellIndex;

use crate::model::{Notification, Route, RouteOrder, VehicleClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Unassigned,
    InProgress,
    InStore,
    PickedUp,
    DroppedOff,
    Canceled,
}

#[derive(Debug, Clone, Component)]
pub struct Order {
    pub state: OrderState,
    /// Owning courier once assigned. At most one, ever.
    pub courier: Option<Entity>,
    /// Couriers that declined an instruction containing this order.
    pub rejected_by: Vec<Entity>,
    pub pick_up: CellIndex,
    pub drop_off: CellIndex,
    /// Coarse spatial key, computed once at creation.
    pub group_cell: CellIndex,
    pub placement_at: u64,
    pub preparation_at: u64,
    pub ready_at: u64,
    pub expected_drop_off_at: u64,
    pub acceptance_at: Option<u64>,
    pub in_store_at: Option<u64>,
    pub pick_up_at: Option<u64>,
    pub drop_off_at: Option<u64>,
    pub cancellation_at: Option<u64>,
    pub pick_up_service_secs: u64,
    pub drop_off_service_secs: u64,
}

impl Order {
    /// Records a rejection; rejecting the same notification twice does not
    /// duplicate the entry.
    pub fn record_rejection(&mut self, courier: Entity) {
        if !self.rejected_by.contains(&courier) {
            self.rejected_by.push(courier);
        }
    }

    /// Value summary carried inside routes.
    pub fn route_order(&self) -> RouteOrder {
        RouteOrder {
            pick_up: self.pick_up,
            drop_off: self.drop_off,
            ready_at: self.ready_at,
            expected_drop_off_at: self.expected_drop_off_at,
            pick_up_service_secs: self.pick_up_service_secs,
            drop_off_service_secs: self.drop_off_service_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourierState {
    Idle,
    Moving,
    PickingUp,
    DroppingOff,
    LoggedOff,
}

/// What a courier is currently suspended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    /// Idle timeout before the next relocation evaluation.
    NextRelocation,
    /// Think time before accepting/rejecting a notification.
    Decision,
    /// Service time at a pick-up stop (includes ready-time slack).
    PickUpService,
    /// Service time at a drop-off stop.
    DropOffService,
    /// One movement leg in flight.
    TravelStep,
    /// Immediate continuation to the next stop of the active route.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWait {
    pub kind: WaitKind,
    pub due_at: u64,
}

#[derive(Debug, Clone, Component)]
pub struct Courier {
    pub state: CourierState,
    pub vehicle: VehicleClass,
    /// Probability of accepting a notification, fixed per courier at log-on.
    pub acceptance_rate: f64,
    /// Committed, unfinished work. Non-null iff the courier has any.
    pub active_route: Option<Route>,
    /// Index into `active_route.stops` of the stop being serviced.
    pub active_stop_ix: Option<usize>,
    pub fulfilled: Vec<Entity>,
    pub rejected_orders: Vec<Entity>,
    /// Seconds spent travelling on committed work.
    pub utilization_secs: u64,
    pub on_duty_at: u64,
    pub off_duty_at: u64,
    /// Log-off requested while a route was active; honored when it completes.
    pub log_off_deferred: bool,
    wait: Option<PendingWait>,
}

impl Courier {
    pub fn new(vehicle: VehicleClass, acceptance_rate: f64, on_duty_at: u64, off_duty_at: u64) -> Self {
        Self {
            state: CourierState::Idle,
            vehicle,
            acceptance_rate,
            active_route: None,
            active_stop_ix: None,
            fulfilled: Vec::new(),
            rejected_orders: Vec::new(),
            utilization_secs: 0,
            on_duty_at,
            off_duty_at,
            log_off_deferred: false,
            wait: None,
        }
    }

    /// Starts (or replaces — interrupting) the pending wait.
    pub fn begin_wait(&mut self, kind: WaitKind, due_at: u64) {
        self.wait = Some(PendingWait { kind, due_at });
    }

    /// True iff a timeout event of `kind` firing at `now` is the one this
    /// courier is actually suspended on. Stale events do not match.
    pub fn wait_matches(&self, kind: WaitKind, now: u64) -> bool {
        self.wait == Some(PendingWait { kind, due_at: now })
    }

    pub fn clear_wait(&mut self) {
        self.wait = None;
    }

    pub fn pending_wait(&self) -> Option<PendingWait> {
        self.wait
    }

    pub fn active_stop(&self) -> Option<&crate::model::Stop> {
        let route = self.active_route.as_ref()?;
        route.stops.get(self.active_stop_ix?)
    }

    pub fn has_active_work(&self) -> bool {
        self.active_route.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Component)]
pub struct Position(pub CellIndex);

/// Why the courier is currently moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePurpose {
    /// Spontaneous relocation while idle; returns to idle on arrival.
    Relocation,
    /// Travelling to the next stop of the active route; billed as
    /// utilization.
    ToStop,
}

/// In-flight movement along a cell path.
#[derive(Debug, Clone, Component)]
pub struct CourierPath {
    pub cells: Vec<CellIndex>,
    pub next: usize,
    pub purpose: MovePurpose,
    pub destination: CellIndex,
}

/// Notification awaiting this courier's accept/reject decision.
#[derive(Debug, Clone, Component)]
pub struct PendingNotification(pub Notification);
