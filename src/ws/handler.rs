//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::SessionCommand;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ControllerId, PlayerId, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Display name for the session roster
    pub name: Option<String>,
}

/// WebSocket upgrade handler. Each connection becomes one controller with
/// one player record for the lifetime of the socket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let player_id: PlayerId = Uuid::new_v4();
    let controller_id: ControllerId = Uuid::new_v4();
    let display_name = query
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("Player_{}", &player_id.to_string()[..8]));

    info!(controller_id = %controller_id, player = %display_name, "WebSocket upgrade");
    ws.on_upgrade(move |socket| {
        handle_socket(socket, player_id, controller_id, display_name, state)
    })
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    player_id: PlayerId,
    controller_id: ControllerId,
    display_name: String,
    state: AppState,
) {
    info!(controller_id = %controller_id, "new WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Send welcome message
    let welcome = ServerMsg::Welcome {
        player_id,
        controller_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(controller_id = %controller_id, error = %e, "failed to send welcome");
        return;
    }

    // Subscribe to the session event stream before joining so no early
    // replication update is missed
    let events_rx = state.session.subscribe();
    let command_tx = state.session.command_tx.clone();

    run_connection(
        player_id,
        controller_id,
        display_name,
        ws_sink,
        ws_stream,
        command_tx.clone(),
        events_rx,
    )
    .await;

    // Cleanup on disconnect
    let _ = command_tx
        .send(SessionCommand::Leave { controller_id })
        .await;

    info!(controller_id = %controller_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_connection(
    player_id: PlayerId,
    controller_id: ControllerId,
    display_name: String,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    command_tx: mpsc::Sender<SessionCommand>,
    mut events_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Writer task: session events -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(msg) => {
                    if !should_forward(&msg, controller_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(controller_id = %controller_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        controller_id = %controller_id,
                        lagged_count = n,
                        "client lagged, skipping {} events", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(controller_id = %controller_id, "event channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> session command channel
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(controller_id = %controller_id, "rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => {
                        let command =
                            to_command(player_id, controller_id, &display_name, client_msg);
                        if command_tx.send(command).await.is_err() {
                            debug!(controller_id = %controller_id, "command channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(controller_id = %controller_id, error = %e, "failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(controller_id = %controller_id, "received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(controller_id = %controller_id, "client initiated close");
                break;
            }
            Err(e) => {
                error!(controller_id = %controller_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Map a wire message to a session command
fn to_command(
    player_id: PlayerId,
    controller_id: ControllerId,
    display_name: &str,
    msg: ClientMsg,
) -> SessionCommand {
    match msg {
        ClientMsg::Join => SessionCommand::Join {
            controller_id,
            player_id,
            display_name: display_name.to_string(),
        },
        ClientMsg::InputTick {
            seq,
            aim_yaw,
            aim_pitch,
            fire,
        } => SessionCommand::Input {
            controller_id,
            seq,
            aim_yaw,
            aim_pitch,
            fire,
        },
        ClientMsg::Ping { t } => SessionCommand::Ping { t },
        ClientMsg::Leave => SessionCommand::Leave { controller_id },
    }
}

/// Death notices are feedback for the locally-controlled peer only; every
/// other event fans out to all clients.
fn should_forward(msg: &ServerMsg, controller_id: ControllerId) -> bool {
    match msg {
        ServerMsg::DeathNotice {
            controller_id: target,
            ..
        } => *target == controller_id,
        _ => true,
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn death_notice_is_forwarded_to_its_owner_only() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let notice = ServerMsg::DeathNotice {
            controller_id: owner,
            message: "You have been killed.".to_string(),
        };

        assert!(should_forward(&notice, owner));
        assert!(!should_forward(&notice, other));

        let update = ServerMsg::HealthUpdate {
            character_id: Uuid::new_v4(),
            health: 50.0,
        };
        assert!(should_forward(&update, other));
    }

    #[test]
    fn client_messages_map_onto_session_commands() {
        let player_id = Uuid::new_v4();
        let controller_id = Uuid::new_v4();

        let command = to_command(
            player_id,
            controller_id,
            "alice",
            ClientMsg::InputTick {
                seq: 7,
                aim_yaw: 1.0,
                aim_pitch: -0.25,
                fire: true,
            },
        );
        assert!(matches!(
            command,
            SessionCommand::Input { seq: 7, fire: true, .. }
        ));

        let command = to_command(player_id, controller_id, "alice", ClientMsg::Join);
        assert!(
            matches!(command, SessionCommand::Join { display_name, .. } if display_name == "alice")
        );
    }
}
