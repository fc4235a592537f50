//! Per-room WebSocket fan-out (SPEC_FULL.md §4.6): one connection per player,
//! pushing the full room snapshot on every broadcast tick. Presence tracking
//! piggybacks on connect/disconnect rather than a separate heartbeat protocol.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rocket_ws::frame::{CloseCode, CloseFrame};
use rocket_ws::{Channel, Message, WebSocket};

use crate::room::RoomRegistry;

/// Build the `Channel` Rocket will drive for the connection's lifetime. Room
/// and player validation happens inside the channel closure (after the
/// upgrade handshake completes) rather than before it, since `rocket_ws`
/// hands back the channel synchronously from the route handler.
pub fn channel(ws: WebSocket, registry: Arc<RoomRegistry>, room_id: String, player_id: Option<String>) -> Channel<'static> {
    ws.channel(move |duplex| {
        Box::pin(async move {
            let (mut outbound, mut inbound) = duplex.split();

            let Ok(entry) = registry.subscribe(&room_id) else {
                let frame = CloseFrame { code: CloseCode::Policy, reason: "unknown room".into() };
                let _ = outbound.send(Message::Close(Some(frame))).await;
                return Ok(());
            };

            let initial = {
                let room = entry.state.lock().await;
                if let Some(player_id) = &player_id {
                    if room.player_by_id(player_id).is_none() {
                        drop(room);
                        let frame = CloseFrame { code: CloseCode::Policy, reason: "unknown player".into() };
                        let _ = outbound.send(Message::Close(Some(frame))).await;
                        return Ok(());
                    }
                }
                room.clone()
            };

            if let Some(player_id) = &player_id {
                registry.set_connected(&room_id, player_id, true).await;
            }

            let mut updates = entry.subscribe();

            if outbound.send(snapshot_message(&initial)).await.is_err() {
                if let Some(player_id) = &player_id {
                    registry.set_connected(&room_id, player_id, false).await;
                }
                return Ok(());
            }

            loop {
                tokio::select! {
                    biased;

                    _ = entry.closed.notified() => break,

                    update = updates.recv() => {
                        match update {
                            Ok(room) => {
                                if outbound.send(snapshot_message(&room)).await.is_err() {
                                    break;
                                }
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        }
                    }

                    incoming = inbound.next() => {
                        match incoming {
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => continue, // clients never drive state over the socket
                            Some(Err(_)) => break,
                        }
                    }
                }
            }

            if let Some(player_id) = &player_id {
                registry.set_connected(&room_id, player_id, false).await;
            }
            let _ = outbound.send(Message::Close(None)).await;
            Ok(())
        })
    })
}

fn snapshot_message(room: &crate::models::Room) -> Message {
    let frame = serde_json::json!({ "type": "room_state", "room": room });
    Message::Text(serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string()))
}
