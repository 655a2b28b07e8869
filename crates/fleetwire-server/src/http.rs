//! Axum wire surface for the streaming server: one WebSocket endpoint for
//! the event stream (§6) plus a health snapshot endpoint (SPEC_FULL.md §C).

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::hub::StreamingServer;
use crate::types::{ClientMessage, ServerMessage};

pub fn router(server: StreamingServer) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/stream", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .with_state(server)
}

pub async fn serve(addr: SocketAddr, server: StreamingServer) -> anyhow::Result<()> {
    let app = router(server);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "streaming server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz(State(server): State<StreamingServer>) -> Json<serde_json::Value> {
    let stats = server.stats();
    let bus_stats = server.bus_stats();
    let mut body = json!({
        "healthy": true,
        "connected_clients": server.connected_clients(),
        "streaming": {
            "events_streamed": stats.events_streamed,
            "bytes_sent": stats.bytes_sent,
            "connection_count": stats.connection_count,
            "clients_dropped": stats.clients_dropped,
        },
        "bus": {
            "events_published": bus_stats.events_published,
            "handler_errors": bus_stats.handler_errors,
        },
    });
    // Model Router / Agent Coordinator counters: this crate has no
    // dependency on those crates, so the runtime that wired them up
    // supplies a snapshot through `set_health_extra` instead.
    if let Some(extra) = server.health_extra() {
        if let Some(map) = body.as_object_mut() {
            if let Some(extra_map) = extra.as_object() {
                for (key, value) in extra_map {
                    map.insert(key.clone(), value.clone());
                }
            }
        }
    }
    Json(body)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(server): State<StreamingServer>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server))
}

async fn handle_socket(mut socket: WebSocket, server: StreamingServer) {
    let client_id = Uuid::new_v4().to_string();
    let mut rx = server.register(&client_id);
    let grace = Duration::from_millis(server.config().client_grace_ms);
    let mut subscribed = false;

    loop {
        tokio::select! {
            biased;

            incoming = tokio::time::timeout(grace_or_forever(subscribed, grace), socket.recv()) => {
                match incoming {
                    Ok(Some(Ok(WsMessage::Text(text)))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { filters }) => {
                                server.subscribe(&client_id, filters);
                                subscribed = true;
                            }
                            Ok(ClientMessage::Unsubscribe) => {
                                server.unsubscribe(&client_id);
                            }
                            Ok(ClientMessage::Ping) => {
                                let pong = ServerMessage::Pong { t: chrono::Utc::now().timestamp_millis() };
                                if send_frame(&mut socket, &pong).await.is_err() {
                                    break;
                                }
                            }
                            Err(_) => {
                                let _ = send_frame(&mut socket, &ServerMessage::Error { kind: "UnknownMessage" }).await;
                                break;
                            }
                        }
                    }
                    Ok(Some(Ok(WsMessage::Close(_)))) | Ok(None) => break,
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(err))) => {
                        warn!(client_id, error = %err, "streaming client transport error");
                        break;
                    }
                    Err(_) => {
                        // Grace-period elapsed without a subscribe message.
                        break;
                    }
                }
            }

            event = rx.recv() => {
                match event {
                    Some(event) => {
                        let frame = ServerMessage::Event { v: 1, event: &event };
                        if send_frame(&mut socket, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    server.mark_disconnecting(&client_id);
    server.remove(&client_id);
}

/// Before the first subscribe, bound the wait by the client grace period;
/// afterwards, wait indefinitely for the next control message.
fn grace_or_forever(subscribed: bool, grace: Duration) -> Duration {
    if subscribed {
        Duration::from_secs(3600)
    } else {
        grace
    }
}

async fn send_frame(socket: &mut WebSocket, message: &ServerMessage<'_>) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).unwrap_or_default();
    socket.send(WsMessage::Text(text.into())).await
}
