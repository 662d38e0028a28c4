use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiateOrderResponse {
    pub order_id: String,
    /// `true` if this call opened a new stream; `false` if it short-circuited
    /// against an already-active one (spec §6, scenario S4).
    pub started_new_stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderStatusResponse {
    pub ok: bool,
}
