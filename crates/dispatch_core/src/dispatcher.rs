//! Dispatcher registries: the authoritative partitions of orders and
//! couriers.
//!
//! Five courier buckets and five order buckets, each a `BTreeSet` for
//! deterministic iteration. The sets — not the components — are the source of
//! truth for which bucket an entity is in, and every transition goes through
//! a method here so an entity can never be in two buckets at once.

use std::collections::BTreeSet;

use bevy_ecs::prelude::{Entity, Resource};

#[derive(Debug, Default, Resource)]
pub struct Dispatcher {
    pub placed_orders: BTreeSet<Entity>,
    pub unassigned_orders: BTreeSet<Entity>,
    pub assigned_orders: BTreeSet<Entity>,
    pub fulfilled_orders: BTreeSet<Entity>,
    pub canceled_orders: BTreeSet<Entity>,

    pub idle_couriers: BTreeSet<Entity>,
    pub moving_couriers: BTreeSet<Entity>,
    pub picking_up_couriers: BTreeSet<Entity>,
    pub dropping_off_couriers: BTreeSet<Entity>,
    pub logged_off_couriers: BTreeSet<Entity>,
}

impl Dispatcher {
    // ----- order transitions -------------------------------------------------

    /// A newly submitted order enters the placed bucket.
    pub fn order_placed(&mut self, order: Entity) {
        self.remove_order(order);
        self.placed_orders.insert(order);
    }

    /// Buffering: a placed order whose preparation time arrived becomes
    /// matchable.
    pub fn buffer_order(&mut self, order: Entity) -> bool {
        if !self.placed_orders.remove(&order) {
            return false;
        }
        self.unassigned_orders.insert(order)
    }

    /// Acceptance commit: only an unassigned order can be assigned; stale
    /// orders fail here and get stripped by the caller.
    pub fn assign_order(&mut self, order: Entity) -> bool {
        if !self.unassigned_orders.remove(&order) {
            return false;
        }
        self.assigned_orders.insert(order)
    }

    pub fn fulfill_order(&mut self, order: Entity) -> bool {
        if !self.assigned_orders.remove(&order) {
            return false;
        }
        self.fulfilled_orders.insert(order)
    }

    /// Cancellation is only possible while placed or unassigned; terminal.
    pub fn cancel_order(&mut self, order: Entity) -> bool {
        if self.order_is_processed(order) {
            return false;
        }
        let was_pending =
            self.placed_orders.remove(&order) || self.unassigned_orders.remove(&order);
        if was_pending {
            self.canceled_orders.insert(order);
        }
        was_pending
    }

    /// True when the order has been settled by some path: it must be stripped
    /// from any in-flight instruction rather than committed again.
    pub fn order_is_processed(&self, order: Entity) -> bool {
        self.assigned_orders.contains(&order)
            || self.fulfilled_orders.contains(&order)
            || self.canceled_orders.contains(&order)
    }

    fn remove_order(&mut self, order: Entity) {
        self.placed_orders.remove(&order);
        self.unassigned_orders.remove(&order);
        self.assigned_orders.remove(&order);
        self.fulfilled_orders.remove(&order);
        self.canceled_orders.remove(&order);
    }

    /// Number of order buckets currently containing this order. Exactly one
    /// for every known order, at every tick.
    pub fn order_bucket_count(&self, order: Entity) -> usize {
        [
            &self.placed_orders,
            &self.unassigned_orders,
            &self.assigned_orders,
            &self.fulfilled_orders,
            &self.canceled_orders,
        ]
        .iter()
        .filter(|bucket| bucket.contains(&order))
        .count()
    }

    // ----- courier transitions ----------------------------------------------

    pub fn set_courier_idle(&mut self, courier: Entity) {
        self.remove_courier(courier);
        self.idle_couriers.insert(courier);
    }

    pub fn set_courier_moving(&mut self, courier: Entity) {
        self.remove_courier(courier);
        self.moving_couriers.insert(courier);
    }

    pub fn set_courier_picking_up(&mut self, courier: Entity) {
        self.remove_courier(courier);
        self.picking_up_couriers.insert(courier);
    }

    pub fn set_courier_dropping_off(&mut self, courier: Entity) {
        self.remove_courier(courier);
        self.dropping_off_couriers.insert(courier);
    }

    pub fn set_courier_logged_off(&mut self, courier: Entity) {
        self.remove_courier(courier);
        self.logged_off_couriers.insert(courier);
    }

    fn remove_courier(&mut self, courier: Entity) {
        self.idle_couriers.remove(&courier);
        self.moving_couriers.remove(&courier);
        self.picking_up_couriers.remove(&courier);
        self.dropping_off_couriers.remove(&courier);
        self.logged_off_couriers.remove(&courier);
    }

    /// Number of courier buckets currently containing this courier. Exactly
    /// one for every live courier, at every tick.
    pub fn courier_bucket_count(&self, courier: Entity) -> usize {
        [
            &self.idle_couriers,
            &self.moving_couriers,
            &self.picking_up_couriers,
            &self.dropping_off_couriers,
            &self.logged_off_couriers,
        ]
        .iter()
        .filter(|bucket| bucket.contains(&courier))
        .count()
    }
}
