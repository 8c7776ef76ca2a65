use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, warn};

use alerta_types::events::{GatewayCommand, GatewayEvent};
use alerta_types::models::Principal;

use crate::dispatcher::{Dispatcher, Subscription};

/// Heartbeat interval: server sends a Ping every 15 seconds.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Consecutive unanswered Pings (~30s) before the connection is dropped.
pub const MAX_MISSED_PONGS: u8 = 2;

/// How long a new socket has to send `Identify`.
pub const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing knobs for one gateway connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub heartbeat_interval: Duration,
    pub max_missed_pongs: u8,
    pub identify_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: HEARTBEAT_INTERVAL,
            max_missed_pongs: MAX_MISSED_PONGS,
            identify_timeout: IDENTIFY_TIMEOUT,
        }
    }
}

/// Resolves a session token presented in the `Identify` handshake.
pub trait TokenVerifier: Send + Sync {
    fn verify_token(&self, token: &str) -> Option<Principal>;
}

/// Handle a single WebSocket connection: Identify handshake, then relay every
/// lifecycle event until either side goes away.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    verifier: Arc<dyn TokenVerifier>,
    settings: ConnectionSettings,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with a session token
    let identified =
        wait_for_identify(&mut receiver, verifier.as_ref(), settings.identify_timeout).await;
    let principal = match identified {
        Some(principal) => principal,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    // Subscribe before Ready so nothing published after the client sees
    // Ready can be missed.
    let subscription = dispatcher.subscribe();
    info!(
        "{} ({}) connected to gateway, {} live subscribers",
        principal.subject_id,
        principal.role,
        dispatcher.subscriber_count()
    );

    // Step 2: Send Ready event
    let ready = GatewayEvent::Ready {
        user_id: principal.subject_id,
        role: principal.role,
    };
    if !send_event(&mut sender, &ready).await {
        return;
    }

    run_connection_loop(sender, receiver, subscription, settings).await;
    info!("{} disconnected from gateway", principal.subject_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut subscription: Subscription,
    settings: ConnectionSettings,
) {
    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Forward lifecycle events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(settings.heartbeat_interval);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let Some(event) = event else { break };
                    if !send_event(&mut sender, &GatewayEvent::from(event)).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= settings.max_missed_pongs {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The channel is server -> client only; inbound traffic is pongs and close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                Message::Text(text) => {
                    let preview: String = text.chars().take(200).collect();
                    warn!("Ignoring unexpected gateway command: {}", preview);
                }
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

/// Serialize and send one event. Returns false when the socket is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to serialize gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    verifier: &dyn TokenVerifier,
    identify_timeout: Duration,
) -> Option<Principal> {
    let timeout = tokio::time::timeout(identify_timeout, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(GatewayCommand::Identify { token }) => return verifier.verify_token(&token),
                    Err(e) => warn!("Bad command before Identify: {}", e),
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}
