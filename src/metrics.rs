//! Prometheus exposition, using the `metrics` facade instead of hand-rolled
//! globals.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the global Prometheus recorder and starts its HTTP listener on
/// `metrics_port`. Call once from each binary's `main`.
pub fn install(metrics_port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port))
        .install()?;
    Ok(())
}

pub fn record_consumed(topic: &str) {
    counter!("icon_blocks_messages_consumed_total", "topic" => topic.to_string()).increment(1);
}

pub fn record_upsert(table: &str) {
    counter!("icon_blocks_upserts_total", "table" => table.to_string()).increment(1);
}

pub fn record_reload_queue_depth(depth: u64) {
    gauge!("icon_blocks_reload_queue_depth").set(depth as f64);
}

pub fn record_max_block_number(topic: &str, number: u32) {
    gauge!("icon_blocks_max_block_number", "topic" => topic.to_string()).set(number as f64);
}
