//! End-to-end websocket flow over in-memory transports
//!
//! Drives the real handshake and handler against the in-memory persistence
//! adapters: admission, tenant-scoped fan-out, refusal semantics and
//! cleanup on disconnect.

use atrio_server_domain::identity::Role;
use atrio_server_domain::ports::{OrganizationProfile, UserRecord};
use atrio_server_domain::shared_kernel::{OrgId, PlanTier, UserId};
use atrio_server_infrastructure::persistence::{InMemoryDirectory, InMemoryOrganizations};
use atrio_server_infrastructure::realtime::metrics::RealtimeMetrics;
use atrio_server_infrastructure::realtime::rate_limit::IngressRateLimiter;
use atrio_server_infrastructure::realtime::registry::ConnectionRegistry;
use atrio_server_infrastructure::realtime::router::BroadcastRouter;
use atrio_server_interface::websocket::{
    IdentityVerifier, JwtClaims, JwtConfig, WebSocketState, handle_websocket,
};
use futures::{SinkExt, StreamExt};
use hyper::HeaderMap;
use hyper::header::AUTHORIZATION;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{DuplexStream, duplex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async, client_async};

const SECRET: &str = "flow-secret";

type ClientWs = WebSocketStream<DuplexStream>;

struct Harness {
    state: WebSocketState,
    directory: Arc<InMemoryDirectory>,
    organizations: Arc<InMemoryOrganizations>,
}

fn harness(events_per_minute: u32) -> Harness {
    let metrics = Arc::new(RealtimeMetrics::new());
    let rate_limiter = Arc::new(IngressRateLimiter::new(events_per_minute));
    let registry = Arc::new(ConnectionRegistry::new(rate_limiter.clone(), metrics.clone()));
    let router = Arc::new(BroadcastRouter::new(registry.clone(), metrics.clone()));
    let directory = Arc::new(InMemoryDirectory::new());
    let organizations = Arc::new(InMemoryOrganizations::new());
    let verifier = Arc::new(IdentityVerifier::new(
        JwtConfig::new(SECRET, None),
        directory.clone(),
    ));
    let state = WebSocketState::new(
        registry,
        router,
        rate_limiter,
        verifier,
        organizations.clone(),
        metrics,
    );
    Harness {
        state,
        directory,
        organizations,
    }
}

fn seed_user(harness: &Harness, org: OrgId) -> UserId {
    let user = UserId::new();
    harness.directory.insert(UserRecord {
        id: user,
        org_id: org,
        role: Role::Agent,
        active: true,
    });
    user
}

fn token_for(user: UserId, org: OrgId) -> String {
    let exp = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600;
    let claims = JwtClaims {
        subject: user.to_string(),
        org: org.to_string(),
        exp: Some(exp),
        iat: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn connect(harness: &Harness, token: Option<String>, org: OrgId) -> ClientWs {
    let (client_io, server_io) = duplex(64 * 1024);

    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
    }

    let state = harness.state.clone();
    tokio::spawn(async move {
        let ws = accept_async(server_io).await.expect("server handshake");
        handle_websocket(ws, state, headers, org).await;
    });

    let (ws, _response) = client_async("ws://atrio.test/ws", client_io)
        .await
        .expect("client handshake");
    ws
}

/// Next text frame within the deadline, or None.
async fn next_text(ws: &mut ClientWs) -> Option<String> {
    loop {
        let frame = tokio::time::timeout(Duration::from_millis(300), ws.next())
            .await
            .ok()??;
        match frame {
            Ok(Message::Text(text)) => return Some(text.to_string()),
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Scan frames until one contains `needle`, or the deadline passes.
async fn wait_for(ws: &mut ClientWs, needle: &str) -> Option<String> {
    for _ in 0..10 {
        match next_text(ws).await {
            Some(text) if text.contains(needle) => return Some(text),
            Some(_) => continue,
            None => return None,
        }
    }
    None
}

#[tokio::test]
async fn tenant_scoped_fan_out_end_to_end() {
    let hx = harness(60);
    let org_a = OrgId::new();
    let org_b = OrgId::new();
    hx.organizations
        .insert(OrganizationProfile::with_tier_defaults(org_a, PlanTier::Pro));
    hx.organizations
        .insert(OrganizationProfile::with_tier_defaults(org_b, PlanTier::Pro));

    let u1 = seed_user(&hx, org_a);
    let u2 = seed_user(&hx, org_a);
    let u3 = seed_user(&hx, org_b);

    let mut c1 = connect(&hx, Some(token_for(u1, org_a)), org_a).await;
    let mut c2 = connect(&hx, Some(token_for(u2, org_a)), org_a).await;
    let mut c3 = connect(&hx, Some(token_for(u3, org_b)), org_b).await;

    // Everyone gets admitted
    assert!(wait_for(&mut c1, "connected").await.is_some());
    assert!(wait_for(&mut c2, "connected").await.is_some());
    assert!(wait_for(&mut c3, "connected").await.is_some());

    c1.send(Message::Text(
        r#"{"e":"entity:update","p":{"id":"x"}}"#.into(),
    ))
    .await
    .unwrap();

    // Only org A peers (excluding the originator) see the projection
    let delivered = wait_for(&mut c2, "entity:updated").await.expect("peer receives");
    assert!(delivered.contains(r#""id":"x""#));
    assert!(
        wait_for(&mut c3, "entity:updated").await.is_none(),
        "tenant B must not receive tenant A fan-out"
    );
    assert!(
        wait_for(&mut c1, "entity:updated").await.is_none(),
        "originator must not receive its own event"
    );
}

#[tokio::test]
async fn refused_connection_gets_one_terminal_error() {
    let hx = harness(60);
    let org = OrgId::new();

    let mut ws = connect(&hx, Some("garbage-token".to_string()), org).await;

    let refusal = next_text(&mut ws).await.expect("terminal error event");
    assert!(refusal.contains("invalid_token"));
    // Nothing else arrives; the transport closes
    assert!(next_text(&mut ws).await.is_none());
    assert_eq!(hx.state.registry().count_in_tenant(&org), 0);
}

#[tokio::test]
async fn missing_token_is_refused() {
    let hx = harness(60);
    let org = OrgId::new();

    let mut ws = connect(&hx, None, org).await;
    let refusal = next_text(&mut ws).await.expect("terminal error event");
    assert!(refusal.contains("missing_token"));
}

#[tokio::test]
async fn disconnect_cleans_up_the_partition() {
    let hx = harness(60);
    let org = OrgId::new();
    hx.organizations
        .insert(OrganizationProfile::with_tier_defaults(org, PlanTier::Pro));
    let user = seed_user(&hx, org);

    let mut ws = connect(&hx, Some(token_for(user, org)), org).await;
    assert!(wait_for(&mut ws, "connected").await.is_some());
    assert_eq!(hx.state.registry().count_in_tenant(&org), 1);

    ws.close(None).await.unwrap();

    // The handler observes the close and removes the connection
    for _ in 0..50 {
        if hx.state.registry().count_in_tenant(&org) == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(hx.state.registry().count_in_tenant(&org), 0);
}

#[tokio::test]
async fn peers_see_presence_events() {
    let hx = harness(60);
    let org = OrgId::new();
    hx.organizations
        .insert(OrganizationProfile::with_tier_defaults(org, PlanTier::Pro));
    let u1 = seed_user(&hx, org);
    let u2 = seed_user(&hx, org);

    let mut c1 = connect(&hx, Some(token_for(u1, org)), org).await;
    assert!(wait_for(&mut c1, "connected").await.is_some());

    let mut c2 = connect(&hx, Some(token_for(u2, org)), org).await;
    assert!(wait_for(&mut c2, "connected").await.is_some());

    // c1 sees c2 come online
    let online = wait_for(&mut c1, "user:online").await.expect("presence event");
    assert!(online.contains(&u2.to_string()));

    c2.close(None).await.unwrap();
    let offline = wait_for(&mut c1, "user:offline").await.expect("departure event");
    assert!(offline.contains(&u2.to_string()));
}
