//! Myopic matching: bundle orders into candidate routes, filter
//! (courier, route) prospects, price them, solve the assignment exactly, and
//! turn the solution into notifications.

use tracing::{debug, warn};

use crate::model::{Instruction, Notification, NotificationKind, Route, Stop};
use crate::optimization::{self, MatchingProblem, Prospect};
use crate::routing::RouteProviderResource;
use crate::scenario::params::DispatchConfig;
use crate::spatial::distance_km_between_cells;

use super::bundling;
use super::policy::MatchingPolicy;
use super::types::{CourierSnapshot, OrderSnapshot};

pub struct MyopicMatchingPolicy;

impl MatchingPolicy for MyopicMatchingPolicy {
    fn execute(
        &self,
        orders: &[OrderSnapshot],
        couriers: &[CourierSnapshot],
        routing: &RouteProviderResource,
        config: &DispatchConfig,
        now: u64,
    ) -> Vec<Notification> {
        let routes = bundling::generate_routes(orders, couriers, now, config, routing);
        let prospects = generate_prospects(&routes, couriers, now, config, routing);
        if prospects.is_empty() {
            return Vec::new();
        }

        let costs = generate_costs(&routes, couriers, &prospects, now, config, routing);
        let problem = MatchingProblem::new(couriers.len(), routes.len(), prospects, costs);
        let Some(solution) = optimization::solve(&problem, config.formulation) else {
            warn!("assignment solve failed, emitting no notifications this pass");
            return Vec::new();
        };

        let notifications = process_solution(&problem, &solution, &routes, couriers, config, now);
        debug!(
            routes = routes.len(),
            prospects = problem.prospects.len(),
            notifications = notifications.len(),
            "myopic dispatch pass"
        );
        notifications
    }
}

/// Feasibility filter for a (courier, route) pair.
fn is_prospect(
    route: &Route,
    courier: &CourierSnapshot,
    now: u64,
    config: &DispatchConfig,
    routing: &RouteProviderResource,
) -> bool {
    let Some(first) = route.first_stop() else {
        return false;
    };

    let state_ok = courier.is_idle()
        || (courier.is_picking_up() && route.initial_prospect == Some(courier.entity));
    if !state_ok {
        return false;
    }

    if distance_km_between_cells(courier.location, first.location) > config.max_distance_km {
        return false;
    }

    // A route that is not yet urgent takes any nearby courier; an urgent one
    // only accepts couriers whose cumulative lateness across its stops stays
    // within the slack bound.
    if route.time_since_ready(now) < config.max_ready_time_secs {
        return true;
    }
    let time_to_first = routing.travel_secs(courier.location, first.location, courier.vehicle);
    let offset: u64 = route
        .stops
        .iter()
        .filter_map(|stop| {
            let expected = route_stop_expected(route, stop)?;
            let arrival = now as f64 + time_to_first + stop.arrive_at.get(courier.vehicle);
            Some((arrival - expected as f64).abs() as u64)
        })
        .sum();
    offset <= config.max_stop_offset_secs * route.stops.len() as u64
}

fn route_stop_expected(route: &Route, stop: &Stop) -> Option<u64> {
    stop.latest_expected_at(&route.orders)
}

fn generate_prospects(
    routes: &[Route],
    couriers: &[CourierSnapshot],
    now: u64,
    config: &DispatchConfig,
    routing: &RouteProviderResource,
) -> Vec<Prospect> {
    let mut prospects = Vec::new();
    for (route_ix, route) in routes.iter().enumerate() {
        for (courier_ix, courier) in couriers.iter().enumerate() {
            if is_prospect(route, courier, now, config, routing) {
                prospects.push(Prospect {
                    courier_ix,
                    route_ix,
                });
            }
        }
    }
    prospects
}

/// Benefit of a match: orders served per second of route execution, less a
/// penalty for arriving at the first stop after its food is ready.
fn generate_costs(
    routes: &[Route],
    couriers: &[CourierSnapshot],
    prospects: &[Prospect],
    now: u64,
    config: &DispatchConfig,
    routing: &RouteProviderResource,
) -> Vec<f64> {
    prospects
        .iter()
        .map(|prospect| {
            let route = &routes[prospect.route_ix];
            let courier = &couriers[prospect.courier_ix];
            let Some(first) = route.first_stop() else {
                return 0.0;
            };

            let time_to_first =
                routing.travel_secs(courier.location, first.location, courier.vehicle);
            let total = time_to_first + route.time.get(courier.vehicle);
            let arrival = now as f64 + time_to_first + first.arrive_at.get(courier.vehicle);
            let ready = route.first_stop_ready_at().unwrap_or(now) as f64;
            let delay = (arrival - ready).max(0.0);

            route.order_count() as f64 / total.max(1.0) - config.delay_penalty * delay
        })
        .collect()
}

/// Builds one notification per selected (courier, route) pair: the full route
/// for an idle courier, only the unvisited stops after the first for one
/// already picking up.
fn process_solution(
    problem: &MatchingProblem,
    solution: &[f64],
    routes: &[Route],
    couriers: &[CourierSnapshot],
    config: &DispatchConfig,
    now: u64,
) -> Vec<Notification> {
    problem
        .selected_prospects(solution)
        .into_iter()
        .map(|prospect| {
            let route = &routes[prospect.route_ix];
            let courier = &couriers[prospect.courier_ix];

            if courier.is_picking_up() {
                return Notification {
                    courier: courier.entity,
                    kind: NotificationKind::PickUpDropOff,
                    instruction: Instruction::ExtendRoute {
                        stops: route
                            .stops
                            .iter()
                            .skip(1)
                            .filter(|stop| !stop.visited)
                            .cloned()
                            .collect(),
                        orders: route.orders.clone(),
                    },
                };
            }

            if config.preposition_prematures {
                if let Some(premature) = preposition_if_premature(route, courier, config, now) {
                    return premature;
                }
            }

            Notification {
                courier: courier.entity,
                kind: NotificationKind::PickUpDropOff,
                instruction: Instruction::NewRoute(route.clone()),
            }
        })
        .collect()
}

/// Downgrades a match to a prepositioning move when the courier is far from
/// a first stop whose orders are not ready yet.
fn preposition_if_premature(
    route: &Route,
    courier: &CourierSnapshot,
    config: &DispatchConfig,
    now: u64,
) -> Option<Notification> {
    let first = route.first_stop()?;
    let none_ready = route.orders.values().all(|order| order.ready_at > now);
    let far = distance_km_between_cells(courier.location, first.location)
        > config.premature_distance_km;
    if none_ready && far {
        Some(Notification {
            courier: courier.entity,
            kind: NotificationKind::Prepositioning,
            instruction: Instruction::NewRoute(Route {
                stops: vec![Stop::preposition(first.location)],
                ..Route::default()
            }),
        })
    } else {
        None
    }
}
