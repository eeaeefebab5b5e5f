//! Parquet export of terminal telemetry records, the sink the
//! persistence/metrics collaborator reads at shift end.

use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use crate::telemetry::SimTelemetry;

fn u64_field(name: &str) -> Field {
    Field::new(name, DataType::UInt64, false)
}

fn write_record_batch<P: AsRef<Path>>(
    path: P,
    schema: Schema,
    arrays: Vec<ArrayRef>,
) -> Result<(), Box<dyn Error>> {
    let schema = Arc::new(schema);
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

pub fn write_delivered_orders_parquet<P: AsRef<Path>>(
    path: P,
    telemetry: &SimTelemetry,
) -> Result<(), Box<dyn Error>> {
    let records = &telemetry.delivered_orders;
    let mut orders = Vec::with_capacity(records.len());
    let mut couriers = Vec::with_capacity(records.len());
    let mut placement_at = Vec::with_capacity(records.len());
    let mut preparation_at = Vec::with_capacity(records.len());
    let mut ready_at = Vec::with_capacity(records.len());
    let mut acceptance_at = Vec::with_capacity(records.len());
    let mut in_store_at = Vec::with_capacity(records.len());
    let mut pick_up_at = Vec::with_capacity(records.len());
    let mut drop_off_at = Vec::with_capacity(records.len());
    let mut expected_drop_off_at = Vec::with_capacity(records.len());

    for record in records {
        orders.push(record.order.to_bits());
        couriers.push(record.courier.to_bits());
        placement_at.push(record.placement_at);
        preparation_at.push(record.preparation_at);
        ready_at.push(record.ready_at);
        acceptance_at.push(record.acceptance_at);
        in_store_at.push(record.in_store_at);
        pick_up_at.push(record.pick_up_at);
        drop_off_at.push(record.drop_off_at);
        expected_drop_off_at.push(record.expected_drop_off_at);
    }

    let schema = Schema::new(vec![
        u64_field("order"),
        u64_field("courier"),
        u64_field("placement_at"),
        u64_field("preparation_at"),
        u64_field("ready_at"),
        u64_field("acceptance_at"),
        u64_field("in_store_at"),
        u64_field("pick_up_at"),
        u64_field("drop_off_at"),
        u64_field("expected_drop_off_at"),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(orders)),
        Arc::new(UInt64Array::from(couriers)),
        Arc::new(UInt64Array::from(placement_at)),
        Arc::new(UInt64Array::from(preparation_at)),
        Arc::new(UInt64Array::from(ready_at)),
        Arc::new(UInt64Array::from(acceptance_at)),
        Arc::new(UInt64Array::from(in_store_at)),
        Arc::new(UInt64Array::from(pick_up_at)),
        Arc::new(UInt64Array::from(drop_off_at)),
        Arc::new(UInt64Array::from(expected_drop_off_at)),
    ];

    write_record_batch(path, schema, arrays)
}

pub fn write_courier_shifts_parquet<P: AsRef<Path>>(
    path: P,
    telemetry: &SimTelemetry,
) -> Result<(), Box<dyn Error>> {
    let records = &telemetry.courier_shifts;
    let mut couriers = Vec::with_capacity(records.len());
    let mut on_duty_at = Vec::with_capacity(records.len());
    let mut logged_off_at = Vec::with_capacity(records.len());
    let mut fulfilled_orders = Vec::with_capacity(records.len());
    let mut utilization_secs = Vec::with_capacity(records.len());
    let mut earnings = Vec::with_capacity(records.len());
    let mut hourly_floor_applied = Vec::with_capacity(records.len());

    for record in records {
        couriers.push(record.courier.to_bits());
        on_duty_at.push(record.on_duty_at);
        logged_off_at.push(record.logged_off_at);
        fulfilled_orders.push(record.fulfilled_orders as u64);
        utilization_secs.push(record.utilization_secs);
        earnings.push(record.earnings);
        hourly_floor_applied.push(record.hourly_floor_applied);
    }

    let schema = Schema::new(vec![
        u64_field("courier"),
        u64_field("on_duty_at"),
        u64_field("logged_off_at"),
        u64_field("fulfilled_orders"),
        u64_field("utilization_secs"),
        Field::new("earnings", DataType::Float64, false),
        Field::new("hourly_floor_applied", DataType::Boolean, false),
    ]);

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(couriers)),
        Arc::new(UInt64Array::from(on_duty_at)),
        Arc::new(UInt64Array::from(logged_off_at)),
        Arc::new(UInt64Array::from(fulfilled_orders)),
        Arc::new(UInt64Array::from(utilization_secs)),
        Arc::new(Float64Array::from(earnings)),
        Arc::new(BooleanArray::from(hourly_floor_applied)),
    ];

    write_record_batch(path, schema, arrays)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::prelude::World;

    use crate::telemetry::{CourierShiftRecord, DeliveredOrderRecord};

    #[test]
    fn exports_round_trip_through_parquet_files() {
        let mut world = World::new();
        let mut telemetry = SimTelemetry::default();
        telemetry.delivered_orders.push(DeliveredOrderRecord {
            order: world.spawn_empty().id(),
            courier: world.spawn_empty().id(),
            placement_at: 10,
            preparation_at: 130,
            ready_at: 400,
            acceptance_at: 200,
            in_store_at: 500,
            pick_up_at: 620,
            drop_off_at: 1_000,
            expected_drop_off_at: 2_410,
        });
        telemetry.courier_shifts.push(CourierShiftRecord {
            courier: world.spawn_empty().id(),
            on_duty_at: 0,
            logged_off_at: 14_400,
            fulfilled_orders: 3,
            utilization_secs: 5_000,
            earnings: 32.0,
            hourly_floor_applied: true,
        });

        let dir = std::env::temp_dir().join("dispatch_core_export_test");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let orders_path = dir.join("delivered_orders.parquet");
        let shifts_path = dir.join("courier_shifts.parquet");

        write_delivered_orders_parquet(&orders_path, &telemetry).expect("orders export");
        write_courier_shifts_parquet(&shifts_path, &telemetry).expect("shifts export");

        assert!(orders_path.metadata().expect("orders file").len() > 0);
        assert!(shifts_path.metadata().expect("shifts file").len() > 0);
    }
}
