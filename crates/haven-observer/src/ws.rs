//! WebSocket event stream.
//!
//! Clients connect to `/ws`, then send subscribe messages choosing any
//! of the four event channels. Delivery is best-effort: a lagging
//! client silently loses the oldest events.
//!
//! Client -> server messages:
//!
//! ```json
//! {"type": "subscribe", "events": ["world_events", "quest_updates"]}
//! {"type": "unsubscribe", "events": ["world_events"]}
//! {"type": "ping"}
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use haven_events::EventChannel;
use serde::Deserialize;
use tracing::debug;

use crate::state::AppState;

/// Upgrade handler for `GET /ws`.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| client_loop(socket, state))
}

#[derive(Debug, Deserialize)]
struct ClientMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    events: Vec<String>,
}

async fn client_loop(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let mut events = state.events.subscribe();
    let mut subscriptions: HashSet<EventChannel> = HashSet::new();

    loop {
        tokio::select! {
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else { break };
                match message {
                    Message::Text(text) => {
                        let Ok(parsed) = serde_json::from_str::<ClientMessage>(text.as_str()) else {
                            continue;
                        };
                        match parsed.kind.as_str() {
                            "subscribe" => {
                                for raw in &parsed.events {
                                    if let Some(channel) = EventChannel::parse(raw) {
                                        subscriptions.insert(channel);
                                    }
                                }
                                let ack = serde_json::json!({
                                    "type": "subscribed",
                                    "events": subscriptions
                                        .iter()
                                        .map(|c| c.as_str())
                                        .collect::<Vec<_>>(),
                                });
                                if send_json(&mut sink, &ack).await.is_err() {
                                    break;
                                }
                            }
                            "unsubscribe" => {
                                for raw in &parsed.events {
                                    if let Some(channel) = EventChannel::parse(raw) {
                                        subscriptions.remove(&channel);
                                    }
                                }
                            }
                            "ping" => {
                                let pong = serde_json::json!({"type": "pong"});
                                if send_json(&mut sink, &pong).await.is_err() {
                                    break;
                                }
                            }
                            _ => {}
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if subscriptions.contains(&event.channel) => {
                        let body = serde_json::json!({
                            "type": "event",
                            "channel": event.channel.as_str(),
                            "kind": event.kind,
                            "payload": event.payload,
                            "timestamp": event.timestamp,
                        });
                        if send_json(&mut sink, &body).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    // Lagged: drop the lost events and keep streaming.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "ws subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    debug!("ws client disconnected");
}

async fn send_json(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    value: &serde_json::Value,
) -> Result<(), axum::Error> {
    sink.send(Message::Text(value.to_string().into())).await
}
