use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use learning_sync::config::SyncConfig;
use learning_sync::domain::StreakDoc;
use learning_sync::remote::{HttpRemoteStore, RemoteError, RemoteStore};
use learning_sync::sync::snapshot::SyncSnapshot;

const TOKEN: &str = "test-token";

#[derive(Clone, Default)]
struct MockState {
    stored: Arc<Mutex<Option<Value>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {TOKEN}").as_str())
}

async fn pull(State(state): State<MockState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "invalid token"})));
    }
    let data = state.stored.lock().unwrap().clone();
    let updated_at = data.as_ref().map(|_| "2026-05-01T08:00:00Z");
    (
        StatusCode::OK,
        Json(json!({"data": data, "updatedAt": updated_at})),
    )
}

async fn push(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "invalid token"})));
    }
    *state.stored.lock().unwrap() = Some(body);
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "updatedAt": "2026-05-01T08:00:00Z"})),
    )
}

async fn spawn_mock() -> (SocketAddr, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/api/sync/", get(pull).put(push))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

fn client(addr: SocketAddr) -> HttpRemoteStore {
    HttpRemoteStore::new(&SyncConfig {
        api_url: format!("http://{addr}/api/"),
        auth_token: None,
        debounce_ms: 2_000,
        timeout_secs: 5,
    })
}

#[tokio::test]
async fn it_pull_before_first_push_is_empty() {
    let (addr, _) = spawn_mock().await;
    assert_eq!(client(addr).pull(TOKEN).await.unwrap(), None);
}

#[tokio::test]
async fn it_push_then_pull_returns_the_snapshot() {
    let (addr, state) = spawn_mock().await;
    let remote = client(addr);
    let snapshot = SyncSnapshot {
        streak_data: Some(StreakDoc {
            current_streak: 3,
            longest_streak: 9,
            ..Default::default()
        }),
        ..Default::default()
    };

    remote.push(TOKEN, &snapshot).await.unwrap();
    let stored = state.stored.lock().unwrap().clone().unwrap();
    assert_eq!(stored["streakData"]["currentStreak"], 3);
    assert!(stored.get("progress").is_none());

    assert_eq!(remote.pull(TOKEN).await.unwrap(), Some(snapshot));
}

#[tokio::test]
async fn it_bad_token_maps_to_unauthorized() {
    let (addr, _) = spawn_mock().await;
    let remote = client(addr);
    assert_eq!(
        remote.pull("wrong").await.unwrap_err(),
        RemoteError::Unauthorized
    );
    assert_eq!(
        remote
            .push("wrong", &SyncSnapshot::default())
            .await
            .unwrap_err(),
        RemoteError::Unauthorized
    );
}

#[tokio::test]
async fn it_unknown_route_is_an_api_error() {
    let (addr, _) = spawn_mock().await;
    let remote = HttpRemoteStore::new(&SyncConfig {
        api_url: format!("http://{addr}/v2"),
        auth_token: None,
        debounce_ms: 2_000,
        timeout_secs: 5,
    });
    match remote.pull(TOKEN).await.unwrap_err() {
        RemoteError::Api { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn it_malformed_remote_data_is_a_decode_error() {
    let (addr, state) = spawn_mock().await;
    *state.stored.lock().unwrap() = Some(json!({"statistics": "garbage"}));
    assert!(matches!(
        client(addr).pull(TOKEN).await.unwrap_err(),
        RemoteError::Decode(_)
    ));
}
