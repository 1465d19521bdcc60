//! WebSocket streaming - one subscriber session per connection

use super::{ApiResult, AppState};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use ralph_foundation::{Channel, StreamMessage, Subscription};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub async fn metrics(ws: WebSocketUpgrade, State(state): State<AppState>) -> ApiResult<Response> {
    let subscription = state.engine.attach(Channel::Metrics)?;
    Ok(upgrade(ws, subscription, state.write_timeout))
}

pub async fn logs(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> ApiResult<Response> {
    let subscription = state.engine.attach(Channel::logs(project))?;
    Ok(upgrade(ws, subscription, state.write_timeout))
}

/// The session is attached before the upgrade so the client's first frame is
/// the backlog taken at request time. A failed upgrade drops (and detaches) it.
fn upgrade(ws: WebSocketUpgrade, subscription: Subscription, write_timeout: Duration) -> Response {
    ws.on_upgrade(move |socket| serve(socket, subscription, write_timeout))
}

async fn serve(socket: WebSocket, mut subscription: Subscription, write_timeout: Duration) {
    let conn = Uuid::new_v4();
    let channel = subscription.channel().to_string();
    info!("WebSocket {} attached to {} as {}", conn, channel, subscription.id());

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = subscription.next() => {
                let Some(frame) = frame else {
                    debug!("Session {} on {} closed", subscription.id(), channel);
                    break;
                };
                if !send(&mut sender, &frame, write_timeout).await {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) if text.trim() == "ping" => {
                    if !send(&mut sender, &StreamMessage::Pong, write_timeout).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    if let Err(e) = subscription.health() {
        warn!("WebSocket {}: {}", conn, e);
    }
    subscription.detach();
    let _ = sender.close().await;
    info!("WebSocket {} detached from {}", conn, channel);
}

/// `false` when the client is gone or too slow.
async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &StreamMessage,
    write_timeout: Duration,
) -> bool {
    let text = match frame.to_json() {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode frame: {}", e);
            return true;
        }
    };
    match tokio::time::timeout(write_timeout, sender.send(Message::Text(text))).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("WebSocket send failed: {}", e);
            false
        }
        Err(_) => {
            warn!("WebSocket write timed out after {:?}", write_timeout);
            false
        }
    }
}
