//! HTTP response bodies and the error codes shared with the realtime `error` event.

use serde::{Deserialize, Serialize};

use herotycoon_domain::{ActionOutcome, Guild, GuildFacility, Hero, TimeOfDay, WorldEvent};

/// Error classification codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // === Client Errors (4xx) ===
    /// Request was malformed or failed validation
    BadRequest,
    /// Requested resource not found
    NotFound,
    /// A business rule refused the operation (not enough energy, unknown action...)
    PreconditionFailed,
    /// State changed underneath the request; retry
    Conflict,

    // === Server Errors (5xx) ===
    InternalError,

    /// Unknown variant for forward compatibility
    #[serde(other)]
    Unknown,
}

/// JSON body of every non-2xx HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub hero: Hero,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild: Option<Guild>,
    pub outcome: ActionOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub action: String,
    pub reasoning: String,
    pub result: ActionResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAdvanceResponse {
    pub time_of_day: TimeOfDay,
    /// Events that ended during this tick
    pub expired_events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnEventResponse {
    /// `None` when the roll missed or the world is at its event cap
    pub event: Option<WorldEvent>,
    pub active_events: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecruitResponse {
    pub hero: Hero,
    /// The guild with the new roster
    pub guild: Guild,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityResponse {
    pub guild: Guild,
    pub facility: GuildFacility,
}
