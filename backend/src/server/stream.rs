//! WebSocket deployment stream
//!
//! The client sends one JSON deployment request as its first text frame and
//! then receives every progress event as its own text frame. The connection is
//! closed after the terminal event.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::models::deployment::{DeploymentRequest, ProgressEvent, Step};
use crate::server::state::ServerState;

type WsSender = SplitSink<WebSocket, Message>;
type WsReceiver = SplitStream<WebSocket>;

/// `GET /deploy/ws`
pub async fn deploy_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    let request = match receive_request(&mut receiver).await {
        Some(Ok(request)) => request,
        Some(Err(message)) => {
            reject(&mut sender, message).await;
            return;
        }
        None => {
            debug!("Client left before sending a deployment request");
            return;
        }
    };

    if let Err(e) = request.validate() {
        reject(&mut sender, format!("Invalid request: {}", e)).await;
        return;
    }

    let starting = ProgressEvent::status(Step::Initializing, "Starting deployment...");
    if let Err(e) = send_event(&mut sender, &starting).await {
        debug!("Client left before the deployment started: {}", e);
        return;
    }

    let (tx, rx) = mpsc::channel::<ProgressEvent>(state.stream.event_buffer.max(1));
    let cancel = state.deployer.cancel_token();

    let deployer = state.deployer.clone();
    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = deployer.deploy(&request, &tx, &task_cancel).await {
            debug!("Streamed deployment ended with error: {}", e);
        }
    });

    match relay(&mut sender, &mut receiver, rx).await {
        RelayEnd::Finished => {
            let _ = sender.send(Message::Close(None)).await;
        }
        RelayEnd::ClientGone => {
            if state.stream.cancel_on_disconnect {
                info!("Client disconnected, cancelling deployment");
                cancel.cancel();
            } else {
                info!("Client disconnected, deployment continues unobserved");
            }
        }
        RelayEnd::Fault => {
            let _ = sender.send(Message::Close(None)).await;
        }
    }
}

enum RelayEnd {
    /// The terminal event was delivered
    Finished,
    ClientGone,
    Fault,
}

/// Forward events in order until the terminal one
async fn relay(
    sender: &mut WsSender,
    receiver: &mut WsReceiver,
    mut events: mpsc::Receiver<ProgressEvent>,
) -> RelayEnd {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    error!("Deployment ended without a terminal event");
                    return RelayEnd::Fault;
                };
                match send_event(sender, &event).await {
                    Ok(()) if event.is_terminal() => return RelayEnd::Finished,
                    Ok(()) => {}
                    Err(AppError::Json(e)) => {
                        error!("Failed to encode progress event: {}", e);
                        return RelayEnd::Fault;
                    }
                    Err(e) => {
                        debug!("Failed to send progress event: {}", e);
                        return RelayEnd::ClientGone;
                    }
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => return RelayEnd::ClientGone,
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    return RelayEnd::ClientGone;
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

/// First data frame, parsed. `None` when the client leaves first.
async fn receive_request(receiver: &mut WsReceiver) -> Option<Result<DeploymentRequest, String>> {
    while let Some(message) = receiver.next().await {
        let parsed = match message {
            Ok(Message::Text(text)) => serde_json::from_str::<DeploymentRequest>(text.as_str()),
            Ok(Message::Binary(bytes)) => serde_json::from_slice::<DeploymentRequest>(&bytes),
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                warn!("WebSocket error: {}", e);
                return None;
            }
        };
        return Some(parsed.map_err(|e| format!("Invalid request: {}", e)));
    }
    None
}

/// Single error event, then close
async fn reject(sender: &mut WsSender, message: String) {
    warn!("Rejected streamed deployment: {}", message);
    if let Err(e) = send_event(sender, &ProgressEvent::error(None, message)).await {
        debug!("Failed to send rejection: {}", e);
    }
    let _ = sender.send(Message::Close(None)).await;
}

async fn send_event(sender: &mut WsSender, event: &ProgressEvent) -> Result<(), AppError> {
    let text = serde_json::to_string(event)?;
    sender
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| AppError::Server(e.to_string()))
}
