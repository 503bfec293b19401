//! HTTP routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use uuid::Uuid;

use herotycoon_domain::{
    Guild, GuildId, Hero, HeroId, LocationId, PlayerId, Resolution, World, WorldId,
};
use herotycoon_shared::{
    ActionResponse, CreateGuildRequest, CreateWorldRequest, DecisionResponse, FacilityResponse,
    HealthResponse, HeroActionRequest, PurchaseFacilityRequest, RecruitHeroRequest,
    RecruitResponse, SpawnEventResponse, TimeAdvanceResponse,
};

use super::error_mapping::ApiError;
use crate::app::App;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/worlds", post(create_world))
        .route("/api/worlds/{id}", get(get_world))
        .route("/api/worlds/{id}/time", post(advance_time))
        .route("/api/worlds/{id}/event", post(spawn_event))
        .route(
            "/api/worlds/{id}/locations/{location_id}/discover",
            post(discover_location),
        )
        .route("/api/guilds", post(create_guild))
        .route("/api/guilds/{id}", get(get_guild))
        .route(
            "/api/guilds/{id}/heroes",
            get(list_guild_heroes).post(recruit_hero),
        )
        .route("/api/guilds/{id}/facilities", post(purchase_facility))
        .route("/api/heroes/{id}", get(get_hero))
        .route("/api/heroes/{id}/action", post(perform_action))
        .route("/api/heroes/{id}/decision", post(decide_action))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Worlds
// =============================================================================

async fn create_world(
    State(app): State<Arc<App>>,
    Json(body): Json<CreateWorldRequest>,
) -> Result<Json<World>, ApiError> {
    let world = app
        .use_cases
        .worlds
        .create
        .execute(PlayerId::from_uuid(body.player_id), &body.name, body.seed)
        .await?;
    Ok(Json(world))
}

async fn get_world(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<World>, ApiError> {
    let world = app
        .use_cases
        .worlds
        .get_state
        .execute(WorldId::from_uuid(id))
        .await?;
    Ok(Json(world))
}

async fn advance_time(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TimeAdvanceResponse>, ApiError> {
    let advance = app
        .use_cases
        .worlds
        .advance_time
        .execute(WorldId::from_uuid(id))
        .await?;
    Ok(Json(TimeAdvanceResponse {
        time_of_day: advance.time_of_day,
        expired_events: advance.expired_events,
    }))
}

async fn spawn_event(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SpawnEventResponse>, ApiError> {
    let outcome = app
        .use_cases
        .worlds
        .spawn_event
        .execute(WorldId::from_uuid(id))
        .await?;
    Ok(Json(SpawnEventResponse {
        active_events: outcome.world.active_event_count(),
        event: outcome.event,
    }))
}

async fn discover_location(
    State(app): State<Arc<App>>,
    Path((id, location_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<World>, ApiError> {
    let (world, _newly) = app
        .use_cases
        .worlds
        .discover_location
        .execute(WorldId::from_uuid(id), LocationId::from_uuid(location_id))
        .await?;
    Ok(Json(world))
}

// =============================================================================
// Guilds
// =============================================================================

async fn create_guild(
    State(app): State<Arc<App>>,
    Json(body): Json<CreateGuildRequest>,
) -> Result<Json<Guild>, ApiError> {
    let guild = app
        .use_cases
        .guilds
        .create
        .execute(
            PlayerId::from_uuid(body.player_id),
            WorldId::from_uuid(body.world_id),
            &body.name,
        )
        .await?;
    Ok(Json(guild))
}

async fn get_guild(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Guild>, ApiError> {
    let guild = app
        .use_cases
        .guilds
        .get
        .execute(GuildId::from_uuid(id))
        .await?;
    Ok(Json(guild))
}

async fn list_guild_heroes(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Hero>>, ApiError> {
    let heroes = app
        .use_cases
        .guilds
        .list_heroes
        .execute(GuildId::from_uuid(id))
        .await?;
    Ok(Json(heroes))
}

async fn recruit_hero(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RecruitHeroRequest>,
) -> Result<Json<RecruitResponse>, ApiError> {
    let (hero, guild) = app
        .use_cases
        .guilds
        .recruit
        .execute(GuildId::from_uuid(id), &body.name, &body.class)
        .await?;
    Ok(Json(RecruitResponse { hero, guild }))
}

async fn purchase_facility(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(body): Json<PurchaseFacilityRequest>,
) -> Result<Json<FacilityResponse>, ApiError> {
    let (guild, facility) = app
        .use_cases
        .guilds
        .purchase_facility
        .execute(GuildId::from_uuid(id), &body.facility_type)
        .await?;
    Ok(Json(FacilityResponse { guild, facility }))
}

// =============================================================================
// Heroes
// =============================================================================

async fn get_hero(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Hero>, ApiError> {
    let hero = app
        .use_cases
        .heroes
        .get
        .execute(HeroId::from_uuid(id))
        .await?;
    Ok(Json(hero))
}

async fn perform_action(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(body): Json<HeroActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let resolution = app
        .use_cases
        .heroes
        .perform
        .execute(
            HeroId::from_uuid(id),
            &body.action,
            body.guild_id.map(GuildId::from_uuid),
        )
        .await?;
    Ok(Json(action_response(resolution)))
}

async fn decide_action(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let result = app
        .use_cases
        .heroes
        .decide
        .execute(HeroId::from_uuid(id))
        .await?;
    Ok(Json(DecisionResponse {
        action: result.decision.action.to_string(),
        reasoning: result.decision.reasoning,
        result: action_response(result.resolution),
    }))
}

fn action_response(resolution: Resolution) -> ActionResponse {
    ActionResponse {
        hero: resolution.hero,
        guild: resolution.guild,
        outcome: resolution.outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Ports;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::config::EngineConfig;
    use crate::infrastructure::oracle::FallbackOracle;
    use crate::infrastructure::persistence::InMemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use herotycoon_shared::{ErrorBody, ErrorCode};
    use serde::de::DeserializeOwned;
    use serde_json::json;
    use tower::ServiceExt;

    fn router() -> Router {
        let random = Arc::new(FixedRandom::new(0, 0.99));
        let ports = Ports::in_memory(
            Arc::new(InMemoryStore::new()),
            Arc::new(FallbackOracle::new(random.clone())),
            Arc::new(FixedClock(Utc::now())),
            random,
        );
        let app = Arc::new(App::new(ports, &EngineConfig::default()));
        routes().with_state(app)
    }

    async fn call<T: DeserializeOwned>(
        router: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, T) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => builder.body(Body::from(json.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// World, guild and one recruited hero.
    async fn seed(router: &Router) -> (World, Guild, Hero) {
        let player_id = Uuid::new_v4();
        let (status, world): (_, World) = call(
            router,
            "POST",
            "/api/worlds",
            Some(json!({"playerId": player_id, "name": "Eldmoor"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, guild): (_, Guild) = call(
            router,
            "POST",
            "/api/guilds",
            Some(json!({"playerId": player_id, "worldId": world.id, "name": "Silver Hand"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, recruited): (_, RecruitResponse) = call(
            router,
            "POST",
            &format!("/api/guilds/{}/heroes", guild.id),
            Some(json!({"name": "Kael", "class": "paladin"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        (world, recruited.guild, recruited.hero)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body): (_, HealthResponse) = call(&router(), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn hero_action_returns_the_committed_state() {
        let router = router();
        let (_, guild, hero) = seed(&router).await;

        let (status, body): (_, ActionResponse) = call(
            &router,
            "POST",
            &format!("/api/heroes/{}/action", hero.id),
            Some(json!({"action": "train", "guildId": guild.id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.hero.stats.energy, hero.stats.energy - 20);

        let (_, stored): (_, Hero) =
            call(&router, "GET", &format!("/api/heroes/{}", hero.id), None).await;
        assert_eq!(stored.stats.energy, body.hero.stats.energy);
    }

    #[tokio::test]
    async fn exhausted_hero_gets_a_displayable_reason() {
        let router = router();
        let (_, _, hero) = seed(&router).await;
        let uri = format!("/api/heroes/{}/action", hero.id);

        let mut last = None;
        for _ in 0..4 {
            let (status, body): (_, serde_json::Value) =
                call(&router, "POST", &uri, Some(json!({"action": "explore"}))).await;
            last = Some((status, body));
        }
        let (status, body) = last.unwrap();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorBody = serde_json::from_value(body).unwrap();
        assert_eq!(body.code, ErrorCode::PreconditionFailed);
        assert!(body.error.contains("energy"));
    }

    #[tokio::test]
    async fn unknown_action_and_blank_names_are_rejected() {
        let router = router();
        let (_, guild, hero) = seed(&router).await;

        let (status, body): (_, ErrorBody) = call(
            &router,
            "POST",
            &format!("/api/heroes/{}/action", hero.id),
            Some(json!({"action": "dance"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.code, ErrorCode::PreconditionFailed);

        let (status, body): (_, ErrorBody) = call(
            &router,
            "POST",
            &format!("/api/guilds/{}/heroes", guild.id),
            Some(json!({"name": "   ", "class": "ranger"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, ErrorCode::BadRequest);
    }

    #[tokio::test]
    async fn missing_entities_are_404() {
        let router = router();
        let (status, body): (_, ErrorBody) =
            call(&router, "GET", &format!("/api/heroes/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, ErrorCode::NotFound);

        let (status, _): (_, ErrorBody) = call(
            &router,
            "POST",
            &format!("/api/worlds/{}/time", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn world_ticks_and_guild_reads() {
        let router = router();
        let (world, guild, hero) = seed(&router).await;

        let (status, tick): (_, TimeAdvanceResponse) = call(
            &router,
            "POST",
            &format!("/api/worlds/{}/time", world.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tick.time_of_day, world.time_of_day.next());

        // unit roll of 0.99 never beats the spawn chance
        let (status, spawn): (_, SpawnEventResponse) = call(
            &router,
            "POST",
            &format!("/api/worlds/{}/event", world.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(spawn.event.is_none());
        assert_eq!(spawn.active_events, 0);

        let (_, roster): (_, Vec<Hero>) = call(
            &router,
            "GET",
            &format!("/api/guilds/{}/heroes", guild.id),
            None,
        )
        .await;
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].id, hero.id);

        let (status, bought): (_, FacilityResponse) = call(
            &router,
            "POST",
            &format!("/api/guilds/{}/facilities", guild.id),
            Some(json!({"facilityType": "tavern"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            bought.guild.resources.get("gold"),
            guild.resources.get("gold") - 150
        );
    }

    #[tokio::test]
    async fn decision_runs_a_resolution() {
        let router = router();
        let (_, _, hero) = seed(&router).await;

        let (status, body): (_, DecisionResponse) = call(
            &router,
            "POST",
            &format!("/api/heroes/{}/decision", hero.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.reasoning.is_empty());
        assert_eq!(body.result.outcome.action.to_string(), body.action);
    }
}
