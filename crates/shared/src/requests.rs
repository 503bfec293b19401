//! HTTP request bodies.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorldRequest {
    pub player_id: Uuid,
    pub name: String,
    /// Free-form seed recorded on the world; generated when absent
    #[serde(default)]
    pub seed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGuildRequest {
    pub player_id: Uuid,
    pub world_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecruitHeroRequest {
    pub name: String,
    /// Class name, e.g. "Ranger" (case-insensitive)
    pub class: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseFacilityRequest {
    /// e.g. "training_room"
    pub facility_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroActionRequest {
    pub action: String,
    /// Must match the hero's guild when given
    #[serde(default)]
    pub guild_id: Option<Uuid>,
}
