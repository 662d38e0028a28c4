//! Layered YAML configuration: load, deep-merge, canonicalize and hash.
//! Later files in the list override earlier ones.

pub mod secrets;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Tunables governing C1-C5 resource bounds (§5) plus the external service
/// addresses C5/C6/C11 call out to. Defaults match `oc_schemas::defaults`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_concurrent_tasks: usize,
    pub find_max_sel: usize,
    pub order_expiry_minutes: i64,
    pub queue_capacity: usize,
    pub sweep_interval_secs: u64,
    pub fallback_distance_km: f64,
    pub stream_reconnect_delay_secs: u64,
    pub stream_max_retries: u32,
    /// 0 = hold the stream open indefinitely (spec §4.9).
    pub grpc_request_timeout_secs: u64,
    pub persistence_facade_base_url: String,
    pub distance_oracle_base_url: String,
    pub processor_stream_base_url: String,
    pub message_bus_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_concurrent_tasks: oc_schemas::defaults::MAX_CONCURRENT_TASKS,
            find_max_sel: oc_schemas::defaults::FIND_MAX_SEL,
            order_expiry_minutes: oc_schemas::defaults::ORDER_EXPIRY_MINUTES,
            queue_capacity: oc_schemas::defaults::QUEUE_CAPACITY,
            sweep_interval_secs: oc_schemas::defaults::SWEEP_INTERVAL_SECS,
            fallback_distance_km: oc_schemas::defaults::FALLBACK_DISTANCE_KM,
            stream_reconnect_delay_secs: oc_schemas::defaults::STREAM_RECONNECT_DELAY_SECS,
            stream_max_retries: oc_schemas::defaults::STREAM_MAX_RETRIES,
            grpc_request_timeout_secs: oc_schemas::defaults::GRPC_REQUEST_TIMEOUT_SECS,
            persistence_facade_base_url: "http://localhost:9100".to_string(),
            distance_oracle_base_url: "http://localhost:9200".to_string(),
            processor_stream_base_url: "http://localhost:8081".to_string(),
            message_bus_base_url: "http://localhost:9300".to_string(),
        }
    }
}

/// Load and merge YAML files in order, canonicalize to JSON, hash, and parse
/// into `Settings`. Later files override earlier files via deep-merge.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let s = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(&s).with_context(|| format!("parse yaml: {p}"))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    let config_json: Value =
        serde_json::from_str(&canonical).context("canonical json parse failed")?;
    let settings: Settings =
        serde_json::from_value(config_json.clone()).context("config does not match Settings")?;

    Ok(LoadedConfig {
        settings,
        config_json,
        canonical_json: canonical,
        config_hash: hash,
    })
}

/// Falls back to all-default settings when no config paths are supplied —
/// both binaries run out of the box against the suggested defaults in §5.
pub fn load_or_default(paths: &[&str]) -> Result<LoadedConfig> {
    if paths.is_empty() {
        let settings = Settings::default();
        let config_json = serde_json::to_value(&settings).context("serialize defaults")?;
        let canonical = canonicalize_json(&config_json);
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash = hex::encode(hasher.finalize());
        return Ok(LoadedConfig {
            settings,
            config_json,
            canonical_json: canonical,
            config_hash: hash,
        });
    }
    load_layered_yaml(paths)
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_schema_constants() {
        let s = Settings::default();
        assert_eq!(s.max_concurrent_tasks, oc_schemas::defaults::MAX_CONCURRENT_TASKS);
        assert_eq!(s.order_expiry_minutes, oc_schemas::defaults::ORDER_EXPIRY_MINUTES);
    }

    #[test]
    fn canonical_json_is_key_sorted() {
        let v: Value = serde_json::from_str(r#"{"b":1,"a":2}"#).unwrap();
        assert_eq!(canonicalize_json(&v), r#"{"a":2,"b":1}"#);
    }
}
