//! Input shapes for matching policies: immutable snapshots of the orders and
//! couriers a dispatch pass considers. Taken from the ECS at pass time so
//! bundling and optimization stay pure.

use bevy_ecs::prelude::Entity;
use h3o::CellIndex;

use crate::ecs::{Courier, CourierState, Order};
use crate::model::{Route, RouteOrder, VehicleClass};

#[derive(Debug, Clone, Copy)]
pub struct OrderSnapshot {
    pub entity: Entity,
    pub pick_up: CellIndex,
    pub drop_off: CellIndex,
    pub group_cell: CellIndex,
    pub placement_at: u64,
    pub preparation_at: u64,
    pub ready_at: u64,
    pub expected_drop_off_at: u64,
    pub pick_up_service_secs: u64,
    pub drop_off_service_secs: u64,
}

impl OrderSnapshot {
    pub fn from_order(entity: Entity, order: &Order) -> Self {
        Self {
            entity,
            pick_up: order.pick_up,
            drop_off: order.drop_off,
            group_cell: order.group_cell,
            placement_at: order.placement_at,
            preparation_at: order.preparation_at,
            ready_at: order.ready_at,
            expected_drop_off_at: order.expected_drop_off_at,
            pick_up_service_secs: order.pick_up_service_secs,
            drop_off_service_secs: order.drop_off_service_secs,
        }
    }

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

#[derive(Debug, Clone)]
pub struct CourierSnapshot {
    pub entity: Entity,
    pub location: CellIndex,
    pub state: CourierState,
    pub vehicle: VehicleClass,
    /// Clone of the courier's committed route, present when mid-pickup.
    pub active_route: Option<Route>,
}

impl CourierSnapshot {
    pub fn from_courier(entity: Entity, courier: &Courier, location: CellIndex) -> Self {
        Self {
            entity,
            location,
            state: courier.state,
            vehicle: courier.vehicle,
            active_route: courier.active_route.clone(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == CourierState::Idle
    }

    pub fn is_picking_up(&self) -> bool {
        self.state == CourierState::PickingUp
    }

    pub fn carried_orders(&self) -> usize {
        self.active_route
            .as_ref()
            .map(|route| route.order_count())
            .unwrap_or(0)
    }
}
