//! Decoder for the compact per-process metrics micro-format.
//!
//! A metrics blob is a `;`-separated list of chunks; each chunk holds up to
//! six positional `:`-separated sub-fields in fixed order: timestamp,
//! usage_time, delta_cpu_time, cpu_usage, rx_data, tx_data. Uploaded
//! databases are messy, so the decoder is tolerant: a sub-field that is
//! missing, empty, or unparsable is treated as absent rather than failing
//! the chunk, and defaulting happens only after derivation so that a
//! present-but-zero usage_time is distinguishable from a missing one.

use serde::{Deserialize, Serialize};

const IDX_TIMESTAMP: usize = 0;
const IDX_USAGE_TIME: usize = 1;
const IDX_DELTA_CPU_TIME: usize = 2;
const IDX_CPU_USAGE: usize = 3;
const IDX_RX_DATA: usize = 4;
const IDX_TX_DATA: usize = 5;

/// One decoded, fully-defaulted measurement point. Everything except the
/// timestamp is guaranteed present in output; the timestamp is guaranteed
/// by construction (chunks without one are dropped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub uid: String,
    pub package_name: String,
    pub usage_time: i64,
    pub delta_cpu_time: i64,
    pub cpu_usage: f64,
    pub rx_data: i64,
    pub tx_data: i64,
}

fn int_field(parts: &[&str], idx: usize) -> Option<i64> {
    match parts.get(idx) {
        Some(s) if !s.is_empty() => s.parse().ok(),
        _ => None,
    }
}

fn float_field(parts: &[&str], idx: usize) -> Option<f64> {
    match parts.get(idx) {
        Some(s) if !s.is_empty() => s.parse().ok(),
        _ => None,
    }
}

/// Fill in cpu_usage when the raw sub-field was absent. Runs on the
/// present/absent view, before defaulting: usage_time == Some(0) must not
/// trigger the division.
pub fn derive_cpu_usage(
    cpu_usage: Option<f64>,
    usage_time: Option<i64>,
    delta_cpu_time: Option<i64>,
) -> f64 {
    if let Some(v) = cpu_usage {
        return v;
    }
    match (usage_time, delta_cpu_time) {
        (Some(usage), Some(delta)) if usage != 0 => delta as f64 / usage as f64,
        _ => 0.0,
    }
}

/// Decode one metrics blob into samples. Pure function: malformed chunks
/// degrade field-by-field, and a chunk with no usable timestamp is dropped
/// silently.
pub fn decode_blob(blob: &str, package_name: &str, uid: &str) -> Vec<Sample> {
    let mut out = Vec::new();
    for chunk in blob.split(';') {
        if chunk.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = chunk.split(':').collect();

        let timestamp = match int_field(&parts, IDX_TIMESTAMP) {
            Some(ts) => ts,
            None => continue,
        };
        let usage_time = int_field(&parts, IDX_USAGE_TIME);
        let delta_cpu_time = int_field(&parts, IDX_DELTA_CPU_TIME);
        let cpu_usage = float_field(&parts, IDX_CPU_USAGE);

        out.push(Sample {
            timestamp,
            uid: uid.to_string(),
            package_name: package_name.to_string(),
            usage_time: usage_time.unwrap_or(0),
            delta_cpu_time: delta_cpu_time.unwrap_or(0),
            cpu_usage: derive_cpu_usage(cpu_usage, usage_time, delta_cpu_time),
            rx_data: int_field(&parts, IDX_RX_DATA).unwrap_or(0),
            tx_data: int_field(&parts, IDX_TX_DATA).unwrap_or(0),
        });
    }
    out
}
