//! End-to-end exercises of the `/api/*` surface over plain HTTP (TLS
//! termination itself is exercised by `mediabus-identity`'s own tests; this
//! suite is about routing, session binding and policy enforcement).

use std::net::SocketAddr;
use std::sync::Arc;

use mediabus_core::store::memory::InMemoryStore;
use mediabus_core::types::HostSettings;
use mediabus_core::Runtime;

/// Boots the router on an ephemeral loopback port and hands back a base URL
/// plus a clone of the `Runtime` handle, so a test can act as the operator
/// (approving a pairing code) while driving the wire API as a client.
async fn spawn_server(shared_folder: &std::path::Path) -> (String, Runtime) {
    let store = Arc::new(InMemoryStore::new([7u8; 32]));
    store.set_settings(HostSettings {
        shared_folder_path: Some(shared_folder.to_string_lossy().to_string()),
        show_hidden_files: false,
        allow_upload: true,
        allow_download: true,
        allow_delete: true,
    });

    let runtime = Runtime::new(store).await.unwrap();
    let state = mediabus_server::state::AppState::new(runtime.clone(), "mediabus.local".into(), 0);
    let app = mediabus_server::api::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
    });

    (format!("http://{addr}"), runtime)
}

fn client_with_cookies() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}

/// Drives the full pairing handshake (bootstrap -> operator approval ->
/// poll) and returns a client that now carries a live `mb_session` cookie.
async fn paired_client(base: &str, runtime: &Runtime) -> reqwest::Client {
    let client = client_with_cookies();
    let bootstrap: serde_json::Value =
        client.get(format!("{base}/api/bootstrap")).send().await.unwrap().json().await.unwrap();
    assert_eq!(bootstrap["paired"], false);
    let code = bootstrap["pairCode"].as_str().unwrap().to_string();
    let token = bootstrap["pairToken"].as_str().unwrap().to_string();

    runtime.approve_by_code(&code).await.expect("operator approves the pairing code");

    let status: serde_json::Value = client
        .get(format!("{base}/api/pair/status"))
        .query(&[("token", token.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "approved");

    client
}

#[tokio::test]
async fn unpaired_bootstrap_issues_fresh_challenge_each_call_until_approved() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _runtime) = spawn_server(dir.path()).await;
    let client = client_with_cookies();

    let first: serde_json::Value =
        client.get(format!("{base}/api/bootstrap")).send().await.unwrap().json().await.unwrap();
    let second: serde_json::Value =
        client.get(format!("{base}/api/bootstrap")).send().await.unwrap().json().await.unwrap();

    assert_eq!(first["paired"], false);
    assert_eq!(second["paired"], false);
    // same anon device polling again reuses its still-pending challenge
    assert_eq!(first["pairToken"], second["pairToken"]);
}

#[tokio::test]
async fn pair_status_is_one_shot_a_second_poll_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (base, runtime) = spawn_server(dir.path()).await;
    let client = client_with_cookies();

    let bootstrap: serde_json::Value =
        client.get(format!("{base}/api/bootstrap")).send().await.unwrap().json().await.unwrap();
    let token = bootstrap["pairToken"].as_str().unwrap().to_string();
    runtime.approve_by_code(bootstrap["pairCode"].as_str().unwrap()).await.unwrap();

    let first: serde_json::Value = client
        .get(format!("{base}/api/pair/status"))
        .query(&[("token", token.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["status"], "approved");

    // a fresh client without the minted session cookie polls the same,
    // now-consumed token again
    let other = client_with_cookies();
    let second: serde_json::Value = other
        .get(format!("{base}/api/pair/status"))
        .query(&[("token", token.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["status"], "not_found");
}

#[tokio::test]
async fn paired_client_can_list_upload_and_download_files() {
    let dir = tempfile::tempdir().unwrap();
    let (base, runtime) = spawn_server(dir.path()).await;
    let client = paired_client(&base, &runtime).await;

    let empty: serde_json::Value =
        client.get(format!("{base}/api/files/list")).send().await.unwrap().json().await.unwrap();
    assert_eq!(empty["items"].as_array().unwrap().len(), 0);

    let upload_resp = client
        .put(format!("{base}/api/files/upload"))
        .query(&[("name", "hello.txt")])
        .body("hello mediabus")
        .send()
        .await
        .unwrap();
    assert_eq!(upload_resp.status(), reqwest::StatusCode::OK);

    let listing: serde_json::Value =
        client.get(format!("{base}/api/files/list")).send().await.unwrap().json().await.unwrap();
    let items = listing["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "hello.txt");

    let downloaded = client
        .get(format!("{base}/api/files/download"))
        .query(&[("path", "hello.txt")])
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&downloaded[..], b"hello mediabus");
}

#[tokio::test]
async fn mkdir_then_rename_collision_is_a_conflict_not_a_silent_rename() {
    let dir = tempfile::tempdir().unwrap();
    let (base, runtime) = spawn_server(dir.path()).await;
    let client = paired_client(&base, &runtime).await;

    let first = client
        .post(format!("{base}/api/files/mkdir"))
        .query(&[("name", "photos")])
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);

    let collision = client
        .post(format!("{base}/api/files/mkdir"))
        .query(&[("name", "photos")])
        .send()
        .await
        .unwrap();
    assert_eq!(collision.status(), reqwest::StatusCode::CONFLICT);
}

#[tokio::test]
async fn session_cookie_forged_for_a_different_device_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (base, runtime) = spawn_server(dir.path()).await;
    let _paired = paired_client(&base, &runtime).await;

    // a client presenting an opaque, never-issued session cookie must be
    // treated as unauthenticated rather than trusting an embedded device id
    let forger = reqwest::Client::builder().cookie_store(false).build().unwrap();
    let resp = forger
        .get(format!("{base}/api/files/list"))
        .header("Cookie", "mb_session=not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_reports_configured_host() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _runtime) = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();
    let body: serde_json::Value = client.get(format!("{base}/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["host"], "mediabus.local");
}

#[tokio::test]
async fn files_list_without_session_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _runtime) = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();
    let resp = client.get(format!("{base}/api/files/list")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn qr_endpoint_returns_svg() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _runtime) = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{base}/api/qr"))
        .query(&[("value", "mediabus://pair?token=abc")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/svg+xml");
}

#[tokio::test]
async fn unknown_spa_route_falls_back_to_index() {
    let dir = tempfile::tempdir().unwrap();
    let (base, _runtime) = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();
    let resp = client.get(format!("{base}/some/client-route")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
}
