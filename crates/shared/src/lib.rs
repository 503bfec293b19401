//! Hero Tycoon wire contracts shared by the engine and its clients.
//!
//! - WebSocket message types (`ClientMessage`, `ServerMessage`)
//! - HTTP request bodies and response envelopes
//! - Error codes used on both surfaces
//!
//! No business logic lives here. Request DTOs carry raw `uuid::Uuid`s and
//! strings; the engine parses them into domain types.

pub mod messages;
pub mod requests;
pub mod responses;

pub use messages::{guild_room, ClientMessage, MasterCommandKind, ServerMessage};
pub use requests::{
    CreateGuildRequest, CreateWorldRequest, HeroActionRequest, PurchaseFacilityRequest,
    RecruitHeroRequest,
};
pub use responses::{
    ActionResponse, DecisionResponse, ErrorBody, ErrorCode, FacilityResponse, HealthResponse,
    RecruitResponse, SpawnEventResponse, TimeAdvanceResponse,
};
