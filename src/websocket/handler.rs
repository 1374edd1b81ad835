//! WebSocket Handler
//!
//! One task per connection: forwards engine broadcast events to the channels
//! the client subscribed to, and answers subscribe/unsubscribe/ping messages.

use axum::extract::ws::{Message, WebSocket};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::engine::{BookSnapshot, Trade};
use crate::metrics;
use crate::websocket::channels::{covers, Channel};
use crate::AppState;

static ACTIVE_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Subscribed { channel: String },
    Unsubscribed { channel: String },
    Trade { data: Trade },
    Orderbook { data: BookSnapshot },
    Error { code: String, message: String },
    Pong,
}

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut subscriptions: HashSet<String> = HashSet::new();

    let mut trade_receiver = state.engine.subscribe_trades();
    let mut book_receiver = state.engine.subscribe_orderbook();

    let connections = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed) + 1;
    metrics::set_ws_connections(connections);
    tracing::debug!("websocket connected ({} active)", connections);

    loop {
        tokio::select! {
            // Handle incoming client messages
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &mut subscriptions, &state, &mut sender).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        // Connection reset without a closing handshake is normal
                        tracing::warn!("websocket disconnected: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            // Forward trade events
            trade = trade_receiver.recv() => {
                match trade {
                    Ok(trade) => {
                        if covers(&subscriptions, "trades", &trade.symbol) {
                            send(&mut sender, &ServerMessage::Trade { data: trade }).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("websocket client lagged {} trade events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            // Forward book snapshots
            snapshot = book_receiver.recv() => {
                match snapshot {
                    Ok(snapshot) => {
                        if covers(&subscriptions, "orderbook", &snapshot.symbol) {
                            send(&mut sender, &ServerMessage::Orderbook { data: snapshot }).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("websocket client lagged {} orderbook events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    let connections = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed) - 1;
    metrics::set_ws_connections(connections);
    tracing::debug!("websocket closed ({} active)", connections);
}

async fn handle_client_message(
    text: &str,
    subscriptions: &mut HashSet<String>,
    state: &Arc<AppState>,
    sender: &mut SplitSink<WebSocket, Message>,
) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            send(
                sender,
                &ServerMessage::Error {
                    code: "BAD_MESSAGE".to_string(),
                    message: e.to_string(),
                },
            )
            .await;
            return;
        }
    };

    match msg {
        ClientMessage::Subscribe { channel } => {
            let Some(parsed) = Channel::parse(&channel) else {
                send(
                    sender,
                    &ServerMessage::Error {
                        code: "INVALID_CHANNEL".to_string(),
                        message: format!("unknown channel: {channel}"),
                    },
                )
                .await;
                return;
            };
            if let Some(symbol) = parsed.symbol() {
                if !state.engine.is_valid_symbol(symbol) {
                    send(
                        sender,
                        &ServerMessage::Error {
                            code: "UNKNOWN_SYMBOL".to_string(),
                            message: format!("unknown trading pair: {symbol}"),
                        },
                    )
                    .await;
                    return;
                }
            }
            subscriptions.insert(channel.clone());
            send(sender, &ServerMessage::Subscribed { channel }).await;
        }
        ClientMessage::Unsubscribe { channel } => {
            subscriptions.remove(&channel);
            send(sender, &ServerMessage::Unsubscribed { channel }).await;
        }
        ClientMessage::Ping => {
            send(sender, &ServerMessage::Pong).await;
        }
    }
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(json) => {
            if sender.send(Message::Text(json)).await.is_ok() {
                metrics::record_ws_message_sent();
            }
        }
        Err(e) => tracing::error!("failed to serialize server message: {}", e),
    }
}
