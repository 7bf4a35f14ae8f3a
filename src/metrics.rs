use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    opts, register_int_counter, register_int_gauge, Encoder, IntCounter, IntGauge, TextEncoder,
};

pub static CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "ledgerstream_connections_total",
        "Total number of observer connections accepted"
    ))
    .unwrap()
});

pub static ACTIVE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(opts!(
        "ledgerstream_active_connections",
        "Currently registered observer connections"
    ))
    .unwrap()
});

pub static TRANSACTIONS_ADMITTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "ledgerstream_transactions_admitted_total",
        "Transactions created by the admission endpoint (replays excluded)"
    ))
    .unwrap()
});

pub static WORK_ITEMS_ENQUEUED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "ledgerstream_work_items_enqueued_total",
        "Work items pushed onto the processing queue"
    ))
    .unwrap()
});

pub static EVENTS_DELIVERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "ledgerstream_events_delivered_total",
        "Stream messages delivered to observer connections"
    ))
    .unwrap()
});

pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
