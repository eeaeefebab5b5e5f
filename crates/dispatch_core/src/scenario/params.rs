//! Configuration surface: named numeric/enum knobs for the dispatch core,
//! plus scenario-level parameters for building a runnable world.
//!
//! Defaults mirror a mid-size city deployment: couriers carry at most three
//! orders, match within 3 km, orders buffer on a two-minute rolling horizon.

use std::collections::VecDeque;

use bevy_ecs::prelude::Resource;
use h3o::CellIndex;

use crate::clock::{ONE_HOUR_SECS, ONE_MIN_SECS};
use crate::model::VehicleClass;
use crate::routing::RouteProviderKind;

/// Which exact assignment formulation the myopic optimizer solves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssignmentFormulation {
    /// Min-cost-flow relaxation over the prospect graph, rounded at a
    /// threshold.
    #[default]
    Flow,
    /// Explicit integer program with a boolean per prospect and a slack per
    /// route.
    Mip,
}

/// Dispatcher-side knobs: prospect filters, bundling, cadences.
#[derive(Debug, Clone, Copy, Resource)]
pub struct DispatchConfig {
    /// Maximum simultaneous orders a courier can carry.
    pub max_orders_per_courier: usize,
    /// Maximum great-circle distance between a courier and a route's first
    /// stop for the pair to be a prospect.
    pub max_distance_km: f64,
    /// Per-stop slack on expected service timestamps for urgent routes.
    pub max_stop_offset_secs: u64,
    /// A route is urgent once its most-overdue order has been ready this
    /// long.
    pub max_ready_time_secs: u64,
    /// Lookahead window counting orders as "ready soon" for the target
    /// bundle size.
    pub ready_time_slack_secs: u64,
    /// Penalty weight on arriving at the first stop past its ready time.
    pub delay_penalty: f64,
    /// Buffering interval: placed orders flush to the matchable pool on this
    /// cadence.
    pub rolling_horizon_secs: u64,
    /// Prepositioning evaluation interval.
    pub prepositioning_secs: u64,
    /// Delay after an order's preparation time before cancellation is
    /// evaluated.
    pub wait_to_cancel_secs: u64,
    pub formulation: AssignmentFormulation,
    /// When set, matched notifications that are premature (courier far from
    /// a not-yet-ready first stop) are downgraded to prepositioning moves.
    pub preposition_prematures: bool,
    /// Distance past which a not-yet-ready match counts as premature.
    pub premature_distance_km: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_orders_per_courier: 3,
            max_distance_km: 3.0,
            max_stop_offset_secs: 10 * ONE_MIN_SECS,
            max_ready_time_secs: 4 * ONE_MIN_SECS,
            ready_time_slack_secs: 10 * ONE_MIN_SECS,
            delay_penalty: 0.4,
            rolling_horizon_secs: 2 * ONE_MIN_SECS,
            prepositioning_secs: ONE_HOUR_SECS,
            wait_to_cancel_secs: ONE_HOUR_SECS,
            formulation: AssignmentFormulation::default(),
            preposition_prematures: false,
            premature_distance_km: 1.5,
        }
    }
}

/// Courier-side behavioral knobs.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CourierConfig {
    /// Think time before a courier answers a notification.
    pub think_secs: u64,
    /// Idle time before the courier re-evaluates relocating.
    pub wait_to_move_secs: u64,
    /// Probability an idle courier decides to relocate when evaluated.
    pub movement_probability: f64,
    /// Floor of the per-courier acceptance rate (sampled uniformly up to 1).
    pub min_acceptance_rate: f64,
}

impl Default for CourierConfig {
    fn default() -> Self {
        Self {
            think_secs: 20,
            wait_to_move_secs: 45 * ONE_MIN_SECS,
            movement_probability: 0.4,
            min_acceptance_rate: 0.4,
        }
    }
}

/// Courier compensation.
#[derive(Debug, Clone, Copy, Resource)]
pub struct PayRates {
    pub per_order: f64,
    pub per_hour: f64,
}

impl Default for PayRates {
    fn default() -> Self {
        Self {
            per_order: 3.0,
            per_hour: 8.0,
        }
    }
}

impl PayRates {
    /// Shift earnings: per-order pay with an hourly guarantee. Returns the
    /// amount and whether the guarantee was the binding side.
    pub fn earnings(&self, fulfilled_orders: usize, shift_secs: u64) -> (f64, bool) {
        let delivery = fulfilled_orders as f64 * self.per_order;
        let floor = shift_secs as f64 / ONE_HOUR_SECS as f64 * self.per_hour;
        if delivery > 0.0 {
            (delivery.max(floor), floor >= delivery)
        } else {
            (floor, true)
        }
    }
}

/// Per-order service time sampling ranges and the delivery promise window.
#[derive(Debug, Clone, Copy, Resource)]
pub struct ServiceTimeConfig {
    pub min_service_secs: u64,
    pub max_pick_up_service_secs: u64,
    pub max_drop_off_service_secs: u64,
    /// Promised delivery window from placement.
    pub target_drop_off_secs: u64,
}

impl Default for ServiceTimeConfig {
    fn default() -> Self {
        Self {
            min_service_secs: 2 * ONE_MIN_SECS,
            max_pick_up_service_secs: 10 * ONE_MIN_SECS,
            max_drop_off_service_secs: 5 * ONE_MIN_SECS,
            target_drop_off_secs: 40 * ONE_MIN_SECS,
        }
    }
}

/// Master seed; every stochastic decision derives from it plus a stable salt.
#[derive(Debug, Clone, Copy, Resource)]
pub struct SimulationSeed(pub u64);

/// When set, the runner stops once the next event is at or past this time.
#[derive(Debug, Clone, Copy, Resource)]
pub struct SimulationEndTime(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchingPolicyKind {
    /// One-order-at-a-time nearest feasible courier.
    Greedy,
    /// Bundling heuristic plus exact assignment optimizer.
    #[default]
    Myopic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcceptancePolicyKind {
    /// Weighted coin flip on the courier's acceptance rate.
    #[default]
    Uniform,
    /// Always accept.
    Absolute,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MovementEvaluationPolicyKind {
    /// Sometimes relocate to a random neighboring zone.
    #[default]
    Neighbors,
    /// Never relocate.
    Still,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CancellationPolicyKind {
    /// Cancel iff no courier was ever assigned.
    #[default]
    Static,
    /// Cancel with a probability when no courier was assigned.
    Random,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrepositioningPolicyKind {
    /// Never preposition.
    #[default]
    Naive,
    /// Send idle couriers toward the zone with the most upcoming demand.
    DemandWeighted,
}

/// An order waiting to be submitted at its placement time.
#[derive(Debug, Clone, Copy)]
pub struct PendingOrder {
    pub pick_up: CellIndex,
    pub drop_off: CellIndex,
    pub placement_at: u64,
    pub preparation_at: u64,
    pub ready_at: u64,
}

/// FIFO of orders to submit, consumed by `SubmitOrder` events.
#[derive(Debug, Default, Resource)]
pub struct PendingOrders(pub VecDeque<PendingOrder>);

/// A courier waiting to log on at its shift start.
#[derive(Debug, Clone, Copy)]
pub struct PendingCourier {
    pub position: CellIndex,
    pub vehicle: VehicleClass,
    pub on_duty_at: u64,
    pub off_duty_at: u64,
}

/// FIFO of couriers to log on, consumed by `SpawnCourier` events.
#[derive(Debug, Default, Resource)]
pub struct PendingCouriers(pub VecDeque<PendingCourier>);

/// Default bounding box: Bogotá, Colombia (approx).
const DEFAULT_LAT_MIN: f64 = 4.55;
const DEFAULT_LAT_MAX: f64 = 4.75;
const DEFAULT_LNG_MIN: f64 = -74.15;
const DEFAULT_LNG_MAX: f64 = -74.03;

/// Parameters for building a simulation scenario.
#[derive(Debug, Clone)]
pub struct ScenarioParams {
    pub num_orders: usize,
    pub num_couriers: usize,
    pub seed: u64,
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
    /// Orders place uniformly over [0, window].
    pub placement_window_secs: u64,
    /// Preparation starts this long after placement (uniform range).
    pub min_preparation_secs: u64,
    pub max_preparation_secs: u64,
    /// Food is ready this long after preparation starts (uniform range).
    pub min_ready_secs: u64,
    pub max_ready_secs: u64,
    /// Courier shift length.
    pub shift_secs: u64,
    pub vehicle: VehicleClass,
    pub matching_policy: MatchingPolicyKind,
    pub acceptance_policy: AcceptancePolicyKind,
    pub movement_policy: MovementEvaluationPolicyKind,
    pub cancellation_policy: CancellationPolicyKind,
    pub prepositioning_policy: PrepositioningPolicyKind,
    pub route_provider: RouteProviderKind,
    pub dispatch: DispatchConfig,
    pub courier: CourierConfig,
    pub pay: PayRates,
    pub service_times: ServiceTimeConfig,
    pub simulation_end_secs: Option<u64>,
}

impl Default for ScenarioParams {
    fn default() -> Self {
        Self {
            num_orders: 100,
            num_couriers: 20,
            seed: 0,
            lat_min: DEFAULT_LAT_MIN,
            lat_max: DEFAULT_LAT_MAX,
            lng_min: DEFAULT_LNG_MIN,
            lng_max: DEFAULT_LNG_MAX,
            placement_window_secs: ONE_HOUR_SECS,
            min_preparation_secs: 2 * ONE_MIN_SECS,
            max_preparation_secs: 10 * ONE_MIN_SECS,
            min_ready_secs: 5 * ONE_MIN_SECS,
            max_ready_secs: 15 * ONE_MIN_SECS,
            shift_secs: 4 * ONE_HOUR_SECS,
            vehicle: VehicleClass::Motorcycle,
            matching_policy: MatchingPolicyKind::default(),
            acceptance_policy: AcceptancePolicyKind::default(),
            movement_policy: MovementEvaluationPolicyKind::default(),
            cancellation_policy: CancellationPolicyKind::default(),
            prepositioning_policy: PrepositioningPolicyKind::default(),
            route_provider: RouteProviderKind::default(),
            dispatch: DispatchConfig::default(),
            courier: CourierConfig::default(),
            pay: PayRates::default(),
            service_times: ServiceTimeConfig::default(),
            simulation_end_secs: None,
        }
    }
}

impl ScenarioParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_matching_policy(mut self, kind: MatchingPolicyKind) -> Self {
        self.matching_policy = kind;
        self
    }

    pub fn with_simulation_end_secs(mut self, end: u64) -> Self {
        self.simulation_end_secs = Some(end);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earnings_prefer_delivery_pay_when_it_beats_the_floor() {
        let pay = PayRates::default();
        let (earnings, floor_applied) = pay.earnings(10, ONE_HOUR_SECS);
        assert_eq!(earnings, 30.0);
        assert!(!floor_applied);
    }

    #[test]
    fn earnings_fall_back_to_hourly_floor() {
        let pay = PayRates::default();
        let (earnings, floor_applied) = pay.earnings(0, 2 * ONE_HOUR_SECS);
        assert_eq!(earnings, 16.0);
        assert!(floor_applied);

        let (earnings, floor_applied) = pay.earnings(1, 2 * ONE_HOUR_SECS);
        assert_eq!(earnings, 16.0);
        assert!(floor_applied);
    }
}
