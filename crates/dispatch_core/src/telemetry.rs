//! Telemetry / KPIs: terminal records for orders and courier shifts.
//!
//! The persistence collaborator consumes these read-only snapshots at shift
//! end; the core performs no writes itself (see `telemetry_export` for the
//! parquet sink).

use bevy_ecs::prelude::{Entity, Resource};

/// One fulfilled order, recorded when its drop-off completes.
/// Timestamps are simulated seconds; use the helpers for derived KPIs.
#[derive(Debug, Clone)]
pub struct DeliveredOrderRecord {
    pub order: Entity,
    pub courier: Entity,
    pub placement_at: u64,
    pub preparation_at: u64,
    pub ready_at: u64,
    pub acceptance_at: u64,
    pub in_store_at: u64,
    pub pick_up_at: u64,
    pub drop_off_at: u64,
    pub expected_drop_off_at: u64,
}

impl DeliveredOrderRecord {
    /// Time from entering the matchable pool to courier acceptance.
    pub fn time_to_accept(&self) -> u64 {
        self.acceptance_at.saturating_sub(self.preparation_at)
    }

    /// Time from ready to pick-up (food waiting on the counter).
    pub fn ready_to_pick_up(&self) -> u64 {
        self.pick_up_at.saturating_sub(self.ready_at)
    }

    /// Click-to-door time.
    pub fn total_delivery_time(&self) -> u64 {
        self.drop_off_at.saturating_sub(self.placement_at)
    }

    /// Seconds delivered past the promised drop-off, zero when on time.
    pub fn lateness(&self) -> u64 {
        self.drop_off_at.saturating_sub(self.expected_drop_off_at)
    }
}

/// One canceled order.
#[derive(Debug, Clone)]
pub struct CanceledOrderRecord {
    pub order: Entity,
    pub placement_at: u64,
    pub preparation_at: u64,
    pub cancellation_at: u64,
}

/// One courier shift, recorded at log-off.
#[derive(Debug, Clone)]
pub struct CourierShiftRecord {
    pub courier: Entity,
    pub on_duty_at: u64,
    pub logged_off_at: u64,
    pub fulfilled_orders: usize,
    pub utilization_secs: u64,
    pub earnings: f64,
    /// The hourly guarantee paid more than per-order earnings would have.
    pub hourly_floor_applied: bool,
}

impl CourierShiftRecord {
    pub fn shift_secs(&self) -> u64 {
        self.logged_off_at.saturating_sub(self.on_duty_at)
    }

    /// Fraction of the shift spent travelling on committed work.
    pub fn utilization_ratio(&self) -> f64 {
        let shift = self.shift_secs();
        if shift == 0 {
            0.0
        } else {
            self.utilization_secs as f64 / shift as f64
        }
    }
}

/// Collects simulation telemetry. Insert as a resource to record outcomes.
#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub delivered_orders: Vec<DeliveredOrderRecord>,
    pub canceled_orders: Vec<CanceledOrderRecord>,
    pub courier_shifts: Vec<CourierShiftRecord>,
    pub notifications_sent: usize,
    pub notifications_accepted: usize,
    pub notifications_rejected: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    #[test]
    fn delivered_order_kpis_derive_from_timestamps() {
        let mut world = World::new();
        let record = DeliveredOrderRecord {
            order: world.spawn_empty().id(),
            courier: world.spawn_empty().id(),
            placement_at: 100,
            preparation_at: 220,
            ready_at: 520,
            acceptance_at: 400,
            in_store_at: 700,
            pick_up_at: 820,
            drop_off_at: 1_500,
            expected_drop_off_at: 2_500,
        };

        assert_eq!(record.time_to_accept(), 180);
        assert_eq!(record.ready_to_pick_up(), 300);
        assert_eq!(record.total_delivery_time(), 1_400);
        assert_eq!(record.lateness(), 0);
    }
}
