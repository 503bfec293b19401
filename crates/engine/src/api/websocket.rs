//! WebSocket handling for guild clients.
//!
//! One task per connection reads client events and dispatches them to the use
//! cases. State changes reach other clients through the guild room; the
//! requester additionally gets a direct reply when it is not in that room.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use herotycoon_domain::{GuildId, HeroId, WorldId};
use herotycoon_shared::{guild_room, ClientMessage, ErrorCode, ServerMessage};

use super::connections::ConnectionManager;
use super::error_mapping::{messages, ApiError};
use crate::app::App;
use crate::use_cases::master::MasterCommand;

/// Buffer size for per-connection message channel.
const CONNECTION_CHANNEL_BUFFER: usize = 256;

/// State for WebSocket handlers.
pub struct WsState {
    pub app: Arc<App>,
    pub connections: Arc<ConnectionManager>,
}

impl WsState {
    pub fn new(app: Arc<App>) -> Self {
        let connections = app.connections.clone();
        Self { app, connections }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<WsState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let connection_id = Uuid::new_v4();
    let user_id = connection_id.to_string(); // Anonymous

    let (tx, mut rx) = mpsc::channel::<ServerMessage>(CONNECTION_CHANNEL_BUFFER);

    state
        .connections
        .register(connection_id, user_id, tx.clone())
        .await;

    tracing::info!(connection_id = %connection_id, "WebSocket connection established");

    // Forward queued messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(msg) => handle_message(msg, &state, connection_id).await,
                    Err(e) => {
                        tracing::warn!(connection_id = %connection_id, error = %e, "Failed to parse message");
                        Some(ServerMessage::error(
                            ErrorCode::BadRequest,
                            messages::INVALID_MESSAGE,
                        ))
                    }
                };
                if let Some(response) = response {
                    if tx.try_send(response).is_err() {
                        tracing::warn!(
                            connection_id = %connection_id,
                            "Failed to send response, channel full or closed"
                        );
                    }
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %connection_id, "WebSocket closed by client");
                break;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    state.connections.unregister(connection_id).await;
    send_task.abort();

    tracing::info!(connection_id = %connection_id, "WebSocket connection terminated");
}

/// Dispatch a parsed client message. The returned message, if any, goes to
/// this connection only.
async fn handle_message(
    msg: ClientMessage,
    state: &WsState,
    connection_id: Uuid,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Heartbeat => Some(ServerMessage::Pong),

        ClientMessage::JoinGuild { guild_id } => {
            if let Err(e) = state
                .app
                .use_cases
                .guilds
                .get
                .execute(GuildId::from_uuid(guild_id))
                .await
            {
                return Some(ApiError::from(e).into_server_message());
            }
            match state
                .connections
                .join_room(connection_id, &guild_room(guild_id))
                .await
            {
                Ok(()) => Some(ServerMessage::JoinedGuild { guild_id }),
                Err(e) => Some(ServerMessage::error(ErrorCode::InternalError, e.to_string())),
            }
        }

        ClientMessage::LeaveGuild { guild_id } => {
            state
                .connections
                .leave_room(connection_id, &guild_room(guild_id))
                .await;
            None
        }

        ClientMessage::HeroAction {
            hero_id,
            action,
            guild_id,
        } => {
            let result = state
                .app
                .use_cases
                .heroes
                .perform
                .execute(
                    HeroId::from_uuid(hero_id),
                    &action,
                    guild_id.map(GuildId::from_uuid),
                )
                .await;
            match result {
                Ok(resolution) => {
                    let room = guild_room(resolution.hero.guild_id.to_uuid());
                    if state.connections.is_in_room(connection_id, &room).await {
                        None
                    } else {
                        Some(ServerMessage::HeroUpdate {
                            hero: resolution.hero,
                            outcome: resolution.outcome,
                        })
                    }
                }
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, hero_id = %hero_id, error = %e, "hero:action failed");
                    Some(ApiError::from(e).into_server_message())
                }
            }
        }

        ClientMessage::WorldQuery { world_id } => {
            match state
                .app
                .use_cases
                .worlds
                .get_state
                .execute(WorldId::from_uuid(world_id))
                .await
            {
                Ok(world) => Some(ServerMessage::WorldState { world }),
                Err(e) => Some(ApiError::from(e).into_server_message()),
            }
        }

        ClientMessage::MasterCommand {
            guild_id,
            command,
            target,
            argument,
        } => {
            let result = state
                .app
                .use_cases
                .master
                .execute(MasterCommand {
                    guild_id: GuildId::from_uuid(guild_id),
                    kind: command,
                    target,
                    argument,
                })
                .await;
            match result {
                Ok(report) => {
                    if state
                        .connections
                        .is_in_room(connection_id, &guild_room(guild_id))
                        .await
                    {
                        None
                    } else {
                        Some(ServerMessage::MasterResult {
                            guild_id,
                            command: report.command,
                            success: report.success,
                            message: report.message,
                            guild: report.guild,
                        })
                    }
                }
                Err(e) => Some(ApiError::from(e).into_server_message()),
            }
        }

        ClientMessage::Unknown => {
            tracing::debug!(connection_id = %connection_id, "Unknown client event");
            Some(ServerMessage::error(
                ErrorCode::BadRequest,
                messages::UNKNOWN_EVENT,
            ))
        }
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
    use axum::routing::get;
    use chrono::Utc;
    use herotycoon_domain::{Guild, Hero, PlayerId};
    use herotycoon_shared::MasterCommandKind;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    const TIMEOUT: Duration = Duration::from_secs(2);

    struct Harness {
        addr: SocketAddr,
        guild: Guild,
        hero: Hero,
        world_id: WorldId,
    }

    async fn spawn_server() -> Harness {
        let random = Arc::new(FixedRandom::new(0, 0.99));
        let ports = Ports::in_memory(
            Arc::new(InMemoryStore::new()),
            Arc::new(FallbackOracle::new(random.clone())),
            Arc::new(FixedClock(Utc::now())),
            random,
        );
        let app = Arc::new(App::new(ports, &EngineConfig::default()));

        let player_id = PlayerId::new();
        let world = app
            .use_cases
            .worlds
            .create
            .execute(player_id, "Eldmoor", None)
            .await
            .unwrap();
        let guild = app
            .use_cases
            .guilds
            .create
            .execute(player_id, world.id, "Silver Hand")
            .await
            .unwrap();
        let (hero, guild) = app
            .use_cases
            .guilds
            .recruit
            .execute(guild.id, "Kael", "paladin")
            .await
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(WsState::new(app));
        let router = axum::Router::new().route("/ws", get(ws_handler).with_state(state));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Harness {
            addr,
            guild,
            hero,
            world_id: world.id,
        }
    }

    async fn ws_connect(addr: SocketAddr) -> Client {
        let (ws, _resp) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        ws
    }

    async fn ws_send(ws: &mut Client, msg: &ClientMessage) {
        let json = serde_json::to_string(msg).unwrap();
        ws.send(WsMessage::Text(json.into())).await.unwrap();
    }

    async fn ws_recv(ws: &mut Client) -> ServerMessage {
        tokio::time::timeout(TIMEOUT, async {
            loop {
                match ws.next().await {
                    Some(Ok(WsMessage::Text(text))) => {
                        return serde_json::from_str::<ServerMessage>(&text).unwrap()
                    }
                    Some(Ok(_)) => continue,
                    other => panic!("socket ended: {:?}", other),
                }
            }
        })
        .await
        .unwrap()
    }

    async fn join(ws: &mut Client, guild_id: Uuid) {
        ws_send(ws, &ClientMessage::JoinGuild { guild_id }).await;
        assert_eq!(ws_recv(ws).await, ServerMessage::JoinedGuild { guild_id });
    }

    #[tokio::test]
    async fn heartbeat_gets_pong() {
        let h = spawn_server().await;
        let mut ws = ws_connect(h.addr).await;
        ws_send(&mut ws, &ClientMessage::Heartbeat).await;
        assert_eq!(ws_recv(&mut ws).await, ServerMessage::Pong);
    }

    #[tokio::test]
    async fn protocol_pings_do_not_produce_json_pongs() {
        let h = spawn_server().await;
        let mut ws = ws_connect(h.addr).await;
        ws.send(WsMessage::Ping(vec![7, 7])).await.unwrap();
        ws_send(&mut ws, &ClientMessage::Heartbeat).await;

        let mut pongs = 0;
        let mut saw_frame_pong = false;
        let window = tokio::time::sleep(Duration::from_millis(300));
        tokio::pin!(window);
        loop {
            tokio::select! {
                _ = &mut window => break,
                frame = ws.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        assert_eq!(serde_json::from_str::<ServerMessage>(&text).unwrap(), ServerMessage::Pong);
                        pongs += 1;
                    }
                    Some(Ok(WsMessage::Pong(payload))) => {
                        assert_eq!(payload, vec![7, 7]);
                        saw_frame_pong = true;
                    }
                    Some(Ok(_)) => {}
                    other => panic!("socket ended: {:?}", other),
                },
            }
        }
        assert_eq!(pongs, 1);
        assert!(saw_frame_pong);
    }

    #[tokio::test]
    async fn hero_update_reaches_room_members_and_the_requester() {
        let h = spawn_server().await;
        let guild_id = h.guild.id.to_uuid();
        let mut member = ws_connect(h.addr).await;
        join(&mut member, guild_id).await;
        let mut outsider = ws_connect(h.addr).await;

        ws_send(
            &mut outsider,
            &ClientMessage::HeroAction {
                hero_id: h.hero.id.to_uuid(),
                action: "train".into(),
                guild_id: Some(guild_id),
            },
        )
        .await;

        for ws in [&mut member, &mut outsider] {
            match ws_recv(ws).await {
                ServerMessage::HeroUpdate { hero, outcome } => {
                    assert_eq!(hero.id, h.hero.id);
                    assert_eq!(outcome.action.as_str(), "train");
                }
                other => panic!("unexpected message: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn room_member_gets_exactly_one_update_for_its_own_action() {
        let h = spawn_server().await;
        let guild_id = h.guild.id.to_uuid();
        let mut member = ws_connect(h.addr).await;
        join(&mut member, guild_id).await;

        ws_send(
            &mut member,
            &ClientMessage::HeroAction {
                hero_id: h.hero.id.to_uuid(),
                action: "rest".into(),
                guild_id: None,
            },
        )
        .await;
        assert!(matches!(
            ws_recv(&mut member).await,
            ServerMessage::HeroUpdate { .. }
        ));

        ws_send(&mut member, &ClientMessage::Heartbeat).await;
        assert_eq!(ws_recv(&mut member).await, ServerMessage::Pong);
    }

    #[tokio::test]
    async fn failed_action_is_an_error_event() {
        let h = spawn_server().await;
        let mut ws = ws_connect(h.addr).await;
        ws_send(
            &mut ws,
            &ClientMessage::HeroAction {
                hero_id: h.hero.id.to_uuid(),
                action: "dance".into(),
                guild_id: None,
            },
        )
        .await;
        match ws_recv(&mut ws).await {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::PreconditionFailed),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn world_query_replies_with_the_snapshot() {
        let h = spawn_server().await;
        let mut ws = ws_connect(h.addr).await;
        ws_send(
            &mut ws,
            &ClientMessage::WorldQuery {
                world_id: h.world_id.to_uuid(),
            },
        )
        .await;
        match ws_recv(&mut ws).await {
            ServerMessage::WorldState { world } => assert_eq!(world.id, h.world_id),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn master_command_result_goes_to_the_room() {
        let h = spawn_server().await;
        let guild_id = h.guild.id.to_uuid();
        let mut member = ws_connect(h.addr).await;
        join(&mut member, guild_id).await;

        ws_send(
            &mut member,
            &ClientMessage::MasterCommand {
                guild_id,
                command: MasterCommandKind::BuildFacility,
                target: Some("tavern".into()),
                argument: None,
            },
        )
        .await;
        match ws_recv(&mut member).await {
            ServerMessage::MasterResult {
                success, guild, ..
            } => {
                assert!(success);
                assert_eq!(guild.unwrap().resources.get("gold"), 850);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn joining_an_unknown_guild_fails() {
        let h = spawn_server().await;
        let mut ws = ws_connect(h.addr).await;
        ws_send(
            &mut ws,
            &ClientMessage::JoinGuild {
                guild_id: Uuid::new_v4(),
            },
        )
        .await;
        match ws_recv(&mut ws).await {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::NotFound),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn garbage_and_unknown_events_are_rejected() {
        let h = spawn_server().await;
        let mut ws = ws_connect(h.addr).await;

        ws.send(WsMessage::Text("not json".into())).await.unwrap();
        assert!(matches!(
            ws_recv(&mut ws).await,
            ServerMessage::Error {
                code: ErrorCode::BadRequest,
                ..
            }
        ));

        ws.send(WsMessage::Text(r#"{"type":"quest:board"}"#.into()))
            .await
            .unwrap();
        assert!(matches!(
            ws_recv(&mut ws).await,
            ServerMessage::Error {
                code: ErrorCode::BadRequest,
                ..
            }
        ));
    }
}
