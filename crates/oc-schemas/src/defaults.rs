//! Default resource bounds (§5), mirrored from
//! `shared/config/constants.py::DEFAULT_CONFIG` in the original source.

pub const MAX_CONCURRENT_TASKS: usize = 10;
pub const FIND_MAX_SEL: usize = 3;
pub const ORDER_EXPIRY_MINUTES: i64 = 30;
pub const QUEUE_CAPACITY: usize = 1024;
pub const SWEEP_INTERVAL_SECS: u64 = 30;
pub const FALLBACK_DISTANCE_KM: f64 = 5.0;
pub const STREAM_RECONNECT_DELAY_SECS: u64 = 2;
pub const STREAM_MAX_RETRIES: u32 = 3;
/// 0 means "held open indefinitely" (spec §4.9 timeout rule).
pub const GRPC_REQUEST_TIMEOUT_SECS: u64 = 0;
