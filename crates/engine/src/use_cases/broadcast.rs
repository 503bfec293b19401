//! Event broadcaster.
//!
//! Turns committed state into realtime notifications. Every message is scoped
//! to one guild room; nothing is published globally. Delivery never blocks the
//! caller: the realtime port only queues.

use std::sync::Arc;

use herotycoon_domain::{ActionOutcome, Guild, GuildId, Hero};
use herotycoon_shared::{guild_room, MasterCommandKind, ServerMessage};

use crate::infrastructure::ports::RealtimePort;

pub struct EventBroadcaster {
    realtime: Arc<dyn RealtimePort>,
}

impl EventBroadcaster {
    pub fn new(realtime: Arc<dyn RealtimePort>) -> Self {
        Self { realtime }
    }

    /// `hero:update` to the hero's guild room.
    pub async fn hero_updated(&self, hero: &Hero, outcome: &ActionOutcome) -> usize {
        let room = guild_room(hero.guild_id.to_uuid());
        let delivered = self
            .realtime
            .publish(
                &room,
                ServerMessage::HeroUpdate {
                    hero: hero.clone(),
                    outcome: outcome.clone(),
                },
            )
            .await;
        tracing::debug!(room = %room, hero_id = %hero.id, delivered, "Broadcast hero:update");
        delivered
    }

    pub async fn master_result(
        &self,
        guild_id: GuildId,
        command: MasterCommandKind,
        success: bool,
        message: impl Into<String>,
        guild: Option<Guild>,
    ) -> usize {
        let room = guild_room(guild_id.to_uuid());
        self.realtime
            .publish(
                &room,
                ServerMessage::MasterResult {
                    guild_id: guild_id.to_uuid(),
                    command,
                    success,
                    message: message.into(),
                    guild,
                },
            )
            .await
    }
}
