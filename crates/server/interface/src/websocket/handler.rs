//! WebSocket Handler Implementation
//!
//! Owns the lifecycle of one client connection: handshake verification,
//! admission, the inbound dispatch table and final cleanup. Each inbound
//! message is handled to completion before the next is read from the same
//! connection, which is what preserves per-origin delivery order.

use crate::websocket::jwt::extract_token_from_header;
use crate::websocket::verifier::IdentityVerifier;
use atrio_server_domain::events::DomainEvent;
use atrio_server_domain::identity::{AuthError, Identity};
use atrio_server_domain::ports::{OrganizationPort, OrganizationProfile};
use atrio_server_domain::shared_kernel::{ConnectionId, OrgId, PlanTier};
use atrio_server_infrastructure::realtime::metrics::RealtimeMetrics;
use atrio_server_infrastructure::realtime::rate_limit::IngressRateLimiter;
use atrio_server_infrastructure::realtime::registry::ConnectionRegistry;
use atrio_server_infrastructure::realtime::router::{BroadcastError, BroadcastRouter};
use atrio_server_infrastructure::realtime::session::{SESSION_CHANNEL_CAPACITY, Session};
use atrio_shared::realtime::commands::ClientCommand;
use atrio_shared::realtime::messages::{ServerMessage, outbound};
use chrono::Utc;
use futures::SinkExt;
use futures::stream::StreamExt;
use hyper::HeaderMap;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Shared state handed to every connection handler.
#[derive(Clone)]
pub struct WebSocketState {
    registry: Arc<ConnectionRegistry>,
    router: Arc<BroadcastRouter>,
    rate_limiter: Arc<IngressRateLimiter>,
    verifier: Arc<IdentityVerifier>,
    organizations: Arc<dyn OrganizationPort>,
    metrics: Arc<RealtimeMetrics>,
}

impl WebSocketState {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        router: Arc<BroadcastRouter>,
        rate_limiter: Arc<IngressRateLimiter>,
        verifier: Arc<IdentityVerifier>,
        organizations: Arc<dyn OrganizationPort>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        Self {
            registry,
            router,
            rate_limiter,
            verifier,
            organizations,
            metrics,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

/// Handle one WebSocket connection end to end.
///
/// 1. Verify the bearer token against the claimed organization
/// 2. Fetch the organization profile for plan gating
/// 3. Admit the session and announce presence
/// 4. Read inbound events until close, one at a time
/// 5. Remove the connection exactly once and announce departure
#[tracing::instrument(skip(ws_stream, state, headers))]
pub async fn handle_websocket<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    state: WebSocketState,
    headers: HeaderMap,
    claimed_org: OrgId,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let started = Instant::now();
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(e) => {
            refuse(&mut ws_tx, e.code(), &e.to_string()).await;
            return;
        }
    };

    let identity = match state.verifier.verify(token.as_deref(), claimed_org).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(org_id = %claimed_org, error = %e, "Connection refused");
            refuse(&mut ws_tx, e.code(), &e.to_string()).await;
            return;
        }
    };

    let profile = match state.organizations.fetch_organization(&claimed_org).await {
        Ok(Some(profile)) => profile,
        Ok(None) => OrganizationProfile::with_tier_defaults(claimed_org, PlanTier::Free),
        Err(e) => {
            // The attempt fails; the client's next connect is the retry
            warn!(org_id = %claimed_org, error = %e, "Organization fetch failed during admission");
            refuse(&mut ws_tx, "persistence_unavailable", "try again later").await;
            return;
        }
    };

    // Admission
    let (session_tx, mut session_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
    let session = Arc::new(Session::new(
        ConnectionId::new(),
        session_tx,
        state.metrics.clone(),
    ));
    let connection_id = session.id();
    state.registry.admit(session.clone(), &identity);
    info!(
        connection_id = %connection_id,
        user_id = %identity.user_id,
        org_id = %identity.org_id,
        "WebSocket connection established"
    );

    announce_presence(&state, &identity, outbound::USER_ONLINE, Some(connection_id));

    let welcome = ServerMessage::Ack {
        id: format!("conn-{}", connection_id),
        status: "connected".to_string(),
    };
    if let Err(e) = session.send(&welcome) {
        error!(connection_id = %connection_id, error = %e, "Failed to send welcome message");
    }

    // One writer owns the sink; the session channel is the only way out
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = session_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound events, handled to completion in arrival order
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, connection_id, &identity, &profile, text.as_str())
                    .await;
            }
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Keepalive is handled at the protocol layer
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(_) => {}
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup; `remove` is idempotent and runs exactly once per handler
    state.registry.remove(connection_id);
    announce_presence(&state, &identity, outbound::USER_OFFLINE, None);
    writer_task.abort();

    let duration = started.elapsed();
    info!(connection_id = %connection_id, ?duration, "WebSocket connection closed");
}

/// Extract the bearer token from the Authorization header, if present.
fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(hyper::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("authorization header is not UTF-8".to_string()))?;
    let token =
        extract_token_from_header(raw).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    Ok(Some(token.to_string()))
}

/// Send one terminal error event on a connection that will never be
/// admitted, then let the transport close.
async fn refuse<T>(ws_tx: &mut T, code: &str, msg: &str)
where
    T: futures::Sink<Message> + Unpin,
{
    let message = ServerMessage::error(code, msg);
    if let Ok(raw) = serde_json::to_string(&message) {
        let _ = ws_tx.send(Message::Text(raw.into())).await;
    }
    let _ = ws_tx.send(Message::Close(None)).await;
}

fn announce_presence(
    state: &WebSocketState,
    identity: &Identity,
    event_name: &str,
    exclude: Option<ConnectionId>,
) {
    let payload = json!({ "user_id": identity.user_id.to_string() });
    if let Err(e) =
        state
            .router
            .broadcast_to_tenant(&identity.org_id, event_name, payload, exclude)
    {
        debug!(org_id = %identity.org_id, error = %e, "Presence broadcast degraded");
    }
}

/// The inbound dispatch table, evaluated synchronously per message.
async fn handle_client_message(
    state: &WebSocketState,
    connection_id: ConnectionId,
    identity: &Identity,
    profile: &OrganizationProfile,
    text: &str,
) {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            debug!(connection_id = %connection_id, error = %e, "Unparseable client message");
            reply(state, connection_id, &ServerMessage::error("invalid_message", "unrecognized event"));
            return;
        }
    };

    if matches!(command, ClientCommand::Ping) {
        reply(
            state,
            connection_id,
            &ServerMessage::Ack {
                id: "ping".to_string(),
                status: "pong".to_string(),
            },
        );
        return;
    }

    // Ingress ceiling: the event is dropped, the client stays connected
    if !state.rate_limiter.allow(connection_id) {
        state.metrics.record_rate_limit_denial();
        warn!(connection_id = %connection_id, event = command.name(), "Rate limit exceeded, dropping event");
        reply(
            state,
            connection_id,
            &ServerMessage::error("rate_limited", "event rate ceiling exceeded"),
        );
        return;
    }

    // Plan-tier gating by event category
    if let Some(category) = command.category() {
        if !profile.admits(category) {
            debug!(
                connection_id = %connection_id,
                event = command.name(),
                plan = %profile.plan,
                "Event category not admitted by plan"
            );
            reply(
                state,
                connection_id,
                &ServerMessage::error(outbound::UNAUTHORIZED, "event not available on this plan"),
            );
            return;
        }
    }

    let event = DomainEvent {
        org_id: identity.org_id,
        name: command.name().to_string(),
        payload: command.payload().cloned().unwrap_or(Value::Null),
        origin: Some(connection_id),
        occurred_at: Utc::now(),
    };

    match event.outbound_name() {
        Some(outbound_name) => {
            debug!(
                connection_id = %connection_id,
                event = %event.name,
                entity_id = command.payload_id().unwrap_or("-"),
                "Fanning out mutation event"
            );
            match state.router.broadcast_to_tenant(
                &event.org_id,
                outbound_name,
                event.payload,
                event.origin,
            ) {
                Ok(()) => {}
                Err(BroadcastError::AllSessionsClosed) => {
                    debug!(org_id = %event.org_id, "No live recipients for fan-out");
                }
                Err(BroadcastError::Partial(failed, total)) => {
                    warn!(org_id = %event.org_id, failed, total, "Partial fan-out");
                }
                Err(BroadcastError::Serialization(e)) => {
                    error!(error = %e, "Serialization error during fan-out");
                }
            }
        }
        None => {
            // notification:read and user:activity are ingested, not rebroadcast
            debug!(
                connection_id = %connection_id,
                event = %event.name,
                "Event ingested without fan-out"
            );
        }
    }
}

fn reply(state: &WebSocketState, connection_id: ConnectionId, message: &ServerMessage) {
    if let Some(session) = state.registry.session(connection_id) {
        if let Err(e) = session.send(message) {
            debug!(connection_id = %connection_id, error = %e, "Failed to reply to connection");
        }
    }
}
