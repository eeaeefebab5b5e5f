//! Pluggable routing collaborator: waypoints and travel estimates between
//! cells.
//!
//! The provider is stored as a `Box<dyn RouteProvider>` ECS resource,
//! constructed from [`RouteProviderKind`] during scenario building. Providers
//! may fail (the real collaborator is a network service); callers go through
//! the degrading helpers on [`RouteProviderResource`], which substitute an
//! empty path or zero estimate and log instead of propagating the fault.

use bevy_ecs::prelude::Resource;
use h3o::CellIndex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::VehicleClass;
use crate::spatial::{distance_km_between_cells, grid_path_cells_cached};

/// Result of a route query between two cells.
#[derive(Clone, Debug)]
pub struct RouteResult {
    /// Ordered cells along the route used for step-by-step movement.
    pub cells: Vec<CellIndex>,
    /// Great-circle distance in kilometres.
    pub distance_km: f64,
}

/// Distance and duration estimate for one leg.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TravelEstimate {
    pub distance_km: f64,
    pub duration_secs: f64,
}

/// Which routing backend to use.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RouteProviderKind {
    /// H3 grid-path waypoints with haversine distances, zero external
    /// dependencies.
    #[default]
    Grid,
}

/// Trait for routing backends. Implementations must be `Send + Sync` so the
/// provider can be stored as a shared ECS resource.
pub trait RouteProvider: Send + Sync {
    /// Ordered waypoints between two cells. `None` if the backend failed or
    /// no route exists.
    fn route(&self, from: CellIndex, to: CellIndex) -> Option<RouteResult>;

    /// Distance/duration estimate for one vehicle class. `None` on failure.
    fn estimate_travel(
        &self,
        from: CellIndex,
        to: CellIndex,
        vehicle: VehicleClass,
    ) -> Option<TravelEstimate>;
}

/// ECS resource wrapping a boxed route provider, with degrading accessors.
#[derive(Resource)]
pub struct RouteProviderResource(pub Box<dyn RouteProvider>);

impl RouteProviderResource {
    /// Travel duration in seconds, zero when the provider is degraded.
    pub fn travel_secs(&self, from: CellIndex, to: CellIndex, vehicle: VehicleClass) -> f64 {
        self.estimate_or_zero(from, to, vehicle).duration_secs
    }

    /// Travel estimate, substituting a zero estimate on provider failure.
    pub fn estimate_or_zero(
        &self,
        from: CellIndex,
        to: CellIndex,
        vehicle: VehicleClass,
    ) -> TravelEstimate {
        match self.0.estimate_travel(from, to, vehicle) {
            Some(estimate) => estimate,
            None => {
                warn!(?from, ?to, "route provider failed to estimate travel, using zero");
                TravelEstimate::default()
            }
        }
    }

    /// Route cells, substituting the empty path on provider failure.
    pub fn route_or_empty(&self, from: CellIndex, to: CellIndex) -> Vec<CellIndex> {
        match self.0.route(from, to) {
            Some(result) => result.cells,
            None => {
                warn!(?from, ?to, "route provider failed to route, using empty path");
                Vec::new()
            }
        }
    }
}

/// Routes along the H3 hexagonal grid using cached grid paths and haversine
/// distances.
pub struct GridRouteProvider;

impl RouteProvider for GridRouteProvider {
    fn route(&self, from: CellIndex, to: CellIndex) -> Option<RouteResult> {
        let cells = grid_path_cells_cached(from, to)?;
        Some(RouteResult {
            cells,
            distance_km: distance_km_between_cells(from, to),
        })
    }

    fn estimate_travel(
        &self,
        from: CellIndex,
        to: CellIndex,
        vehicle: VehicleClass,
    ) -> Option<TravelEstimate> {
        let distance_km = distance_km_between_cells(from, to);
        let duration_secs = if distance_km > 0.0 {
            (distance_km / vehicle.average_speed_kmh()) * 3600.0
        } else {
            0.0
        };
        Some(TravelEstimate {
            distance_km,
            duration_secs,
        })
    }
}

pub fn build_route_provider(kind: &RouteProviderKind) -> Box<dyn RouteProvider> {
    match kind {
        RouteProviderKind::Grid => Box::new(GridRouteProvider),
    }
}

/// Provider that always fails; exercises the degraded path in tests.
#[cfg(any(test, feature = "test-helpers"))]
pub struct UnreachableRouteProvider;

#[cfg(any(test, feature = "test-helpers"))]
impl RouteProvider for UnreachableRouteProvider {
    fn route(&self, _from: CellIndex, _to: CellIndex) -> Option<RouteResult> {
        None
    }

    fn estimate_travel(
        &self,
        _from: CellIndex,
        _to: CellIndex,
        _vehicle: VehicleClass,
    ) -> Option<TravelEstimate> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> CellIndex {
        CellIndex::try_from(0x8a1fb46622dffff).expect("valid cell")
    }

    fn far_cell() -> CellIndex {
        cell()
            .grid_disk::<Vec<_>>(4)
            .into_iter()
            .last()
            .expect("far cell")
    }

    #[test]
    fn grid_provider_estimates_scale_with_vehicle_speed() {
        let provider = GridRouteProvider;
        let walk = provider
            .estimate_travel(cell(), far_cell(), VehicleClass::Walker)
            .expect("estimate");
        let ride = provider
            .estimate_travel(cell(), far_cell(), VehicleClass::Motorcycle)
            .expect("estimate");

        assert_eq!(walk.distance_km, ride.distance_km);
        assert!(walk.duration_secs > ride.duration_secs);
    }

    #[test]
    fn unreachable_provider_degrades_to_zero_estimate() {
        let resource = RouteProviderResource(Box::new(UnreachableRouteProvider));
        let estimate = resource.estimate_or_zero(cell(), far_cell(), VehicleClass::Car);
        assert_eq!(estimate, TravelEstimate::default());
        assert!(resource.route_or_empty(cell(), far_cell()).is_empty());
    }
}
