//! `oc-processor` library target: C4 (expiry sweeper), C7 (stream handler),
//! C8 (follow-up handler), and the HTTP ingress of spec §6. `main.rs` is
//! intentionally thin — it wires tracing, config, and the router, then
//! starts the server; all handler logic lives here so the scenario tests
//! in `tests/` can compose the router directly.

pub mod api_types;
pub mod followup_handler;
pub mod routes;
pub mod state;
pub mod stream_handler;
pub mod sweeper;
