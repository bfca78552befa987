use std::time::Duration;

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use market_data::register::Topic;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Keepalive ping period for streaming clients
const PING_INTERVAL: Duration = Duration::from_secs(5);

pub async fn trade_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_topic(socket, state, Topic::Trade))
}

pub async fn depth_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_topic(socket, state, Topic::Depth))
}

pub async fn candle_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_topic(socket, state, Topic::Candle))
}

pub async fn order_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_topic(socket, state, Topic::Order))
}

/// Acknowledgment sent before any snapshot.
pub(crate) fn subscribed_message(topic: Topic) -> String {
    let title = match topic {
        Topic::Trade => "Trade",
        Topic::Depth => "Depth",
        Topic::Candle => "Candle",
        Topic::Order => "Order",
    };
    json!({ "result": true, "message": format!("{title} subscribed") }).to_string()
}

async fn stream_topic(socket: WebSocket, state: AppState, topic: Topic) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut outbound) = mpsc::unbounded_channel::<String>();

    let id = match state.session.subscribe(topic, tx).await {
        Ok(id) => id,
        Err(e) => {
            warn!(%topic, error = %e, "Subscription refused");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };
    info!(%topic, subscriber = %id, "Stream opened");

    if sender
        .send(Message::Text(subscribed_message(topic).into()))
        .await
        .is_ok()
    {
        let mut ping = interval(PING_INTERVAL);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.tick().await;

        loop {
            tokio::select! {
                message = outbound.recv() => match message {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        debug!(%topic, subscriber = %id, message = %text.as_str(), "Client message ignored");
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    if let Err(e) = state.session.unsubscribe(topic, id).await {
        debug!(%topic, error = %e, "Unsubscribe after runtime stop");
    }
    info!(%topic, subscriber = %id, "Stream closed");
}
