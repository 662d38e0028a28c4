//! HTTP request/response types specific to the processor's own endpoints.
//! The shared wire DTOs (proposal submission, follow-up, edit-lock,
//! `ProcessFollowUp`) live in `oc_schemas` since both binaries reference
//! them; this module only carries what's local to this daemon.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub scheduler: SchedulerStatsResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatsResponse {
    pub queued: usize,
    pub available_permits: usize,
    pub completed: usize,
}

impl From<oc_scheduler::SchedulerStats> for SchedulerStatsResponse {
    fn from(s: oc_scheduler::SchedulerStats) -> Self {
        SchedulerStatsResponse {
            queued: s.queued,
            available_permits: s.available_permits,
            completed: s.completed,
        }
    }
}

/// Query params for `GET /stream/{order_id}` (spec §6 `ProcessOrderStream`).
#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub notification_type: Option<oc_schemas::NotificationType>,
}
