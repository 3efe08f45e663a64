//! Integration tests for pairing, session and transfer flows against an
//! in-memory store and a manually advanced clock.

use std::sync::Arc;

use mediabus_core::clock::TestClock;
use mediabus_core::store::memory::InMemoryStore;
use mediabus_core::types::Direction;
use mediabus_core::{ApproveError, AuthOutcome, CreateSessionOutcome, PairingStatusOutcome, Runtime};

async fn new_runtime() -> (Runtime, Arc<TestClock>) {
    let clock = Arc::new(TestClock::new(1_000));
    let store = Arc::new(InMemoryStore::new([5u8; 32]));
    let runtime = Runtime::with_clock(store, clock.clone()).await.unwrap();
    (runtime, clock)
}

#[tokio::test]
async fn fresh_pair_then_session_then_one_shot_approval() {
    let (runtime, _clock) = new_runtime().await;

    let challenge = runtime
        .ensure_pending_challenge("anon-1", "Mozilla/5.0 (iPhone)", "10.0.0.5")
        .await;

    let approved = runtime.approve_by_code(&challenge.code).await.unwrap();
    assert_eq!(approved.user_agent, "Mozilla/5.0 (iPhone)");

    match runtime.pairing_status(&challenge.token).await {
        PairingStatusOutcome::Approved { device_id } => assert_eq!(device_id, approved.device_id),
        other => panic!("expected Approved, got {other:?}"),
    }

    // Second poll of the same token must be NotFound: the first poll consumed it.
    assert_eq!(
        runtime.pairing_status(&challenge.token).await,
        PairingStatusOutcome::NotFound
    );
}

#[tokio::test]
async fn repeated_bootstrap_before_approval_reuses_challenge() {
    let (runtime, _clock) = new_runtime().await;
    let first = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    let second = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    assert_eq!(first.token, second.token);
    assert_eq!(first.code, second.code);
}

#[tokio::test]
async fn challenge_expires_and_is_replaced() {
    let (runtime, clock) = new_runtime().await;
    let first = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    clock.advance(120_001);
    let second = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    assert_ne!(first.token, second.token);
    assert_eq!(
        runtime.pairing_status(&first.token).await,
        PairingStatusOutcome::NotFound
    );
}

#[tokio::test]
async fn approve_by_code_rejects_expired_challenge() {
    let (runtime, clock) = new_runtime().await;
    let challenge = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    clock.advance(120_001);
    assert_eq!(runtime.approve_by_code(&challenge.code).await, Err(ApproveError::Expired));
}

#[tokio::test]
async fn session_cookie_is_bound_to_its_device() {
    let (runtime, _clock) = new_runtime().await;
    let challenge = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    let device = runtime.approve_by_code(&challenge.code).await.unwrap();

    let token = match runtime.create_session_for_paired_device(&device.device_id, "10.0.0.9").await {
        CreateSessionOutcome::Created(token) => token,
        other => panic!("expected Created, got {other:?}"),
    };

    match runtime.authenticate_session(Some(&token), "10.0.0.9", true).await {
        AuthOutcome::Valid(id) => assert_eq!(id, device.device_id),
        AuthOutcome::Invalid => panic!("expected a valid session"),
    }
}

#[tokio::test]
async fn sixth_distinct_device_is_blocked_until_one_is_revoked() {
    let (runtime, _clock) = new_runtime().await;
    let mut device_ids = Vec::new();
    for i in 0..5 {
        let anon = format!("anon-{i}");
        let challenge = runtime.ensure_pending_challenge(&anon, "ua", "ip").await;
        let device = runtime.approve_by_code(&challenge.code).await.unwrap();
        assert!(matches!(
            runtime.create_session_for_paired_device(&device.device_id, "ip").await,
            CreateSessionOutcome::Created(_)
        ));
        device_ids.push(device.device_id);
    }

    let challenge = runtime.ensure_pending_challenge("anon-6", "ua", "ip").await;
    let sixth = runtime.approve_by_code(&challenge.code).await.unwrap();
    assert_eq!(
        runtime.create_session_for_paired_device(&sixth.device_id, "ip").await,
        CreateSessionOutcome::MaxClients
    );

    assert!(runtime.revoke_device(&device_ids[0]).await);
    assert!(matches!(
        runtime.create_session_for_paired_device(&sixth.device_id, "ip").await,
        CreateSessionOutcome::Created(_)
    ));
}

#[tokio::test]
async fn revocation_cancels_in_flight_transfer_and_clears_notice_once() {
    let (runtime, _clock) = new_runtime().await;
    let challenge = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    let device = runtime.approve_by_code(&challenge.code).await.unwrap();
    let token = match runtime.create_session_for_paired_device(&device.device_id, "ip").await {
        CreateSessionOutcome::Created(token) => token,
        other => panic!("{other:?}"),
    };

    let ticket = runtime
        .begin_transfer(&device.device_id, Direction::Uploading, 100, None, 0, 0, 0)
        .await
        .unwrap();
    assert!(!ticket.cancelled().await);

    assert!(runtime.revoke_device(&device.device_id).await);
    assert!(ticket.cancelled().await);
    ticket.close().await;

    let device_id = runtime.decode_cookie_device_id(&token).unwrap();
    assert_eq!(device_id, device.device_id);
    assert_eq!(
        runtime.consume_revocation_notice(&device_id).await,
        Some("this device was revoked by the host".to_string())
    );
    // Second read clears nothing further (idempotent drain).
    assert_eq!(runtime.consume_revocation_notice(&device_id).await, None);

    assert!(matches!(
        runtime.authenticate_session(Some(&token), "ip", false).await,
        AuthOutcome::Invalid
    ));
}

#[tokio::test]
async fn per_device_transfers_are_fifo() {
    let (runtime, _clock) = new_runtime().await;
    let challenge = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    let device = runtime.approve_by_code(&challenge.code).await.unwrap();

    let t1 = runtime
        .begin_transfer(&device.device_id, Direction::Uploading, 10, None, 0, 0, 0)
        .await
        .unwrap();

    let runtime2 = runtime.clone();
    let device_id2 = device.device_id.clone();
    let second_started = Arc::new(tokio::sync::Notify::new());
    let second_started_waiter = second_started.clone();
    let handle = tokio::spawn(async move {
        let t2 = runtime2
            .begin_transfer(&device_id2, Direction::Uploading, 10, None, 0, 0, 0)
            .await
            .unwrap();
        second_started_waiter.notify_one();
        t2.close().await;
    });

    // Give the spawned task a chance to run; it must still be blocked on t1's
    // device lock because t1 has not been closed yet.
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    assert!(!handle.is_finished());

    t1.close().await;
    second_started.notified().await;
    handle.await.unwrap();
}

#[tokio::test]
async fn batch_totals_take_the_max_of_refined_client_values() {
    let (runtime, _clock) = new_runtime().await;
    let challenge = runtime.ensure_pending_challenge("anon-1", "ua", "ip").await;
    let device = runtime.approve_by_code(&challenge.code).await.unwrap();

    let t1 = runtime
        .begin_transfer(&device.device_id, Direction::Uploading, 10, Some("batch-1".into()), 2, 100, 0)
        .await
        .unwrap();
    t1.close().await;

    let t2 = runtime
        .begin_transfer(&device.device_id, Direction::Uploading, 10, Some("batch-1".into()), 2, 250, 0)
        .await
        .unwrap();
    let summary = runtime.transfer_summary().await;
    assert_eq!(summary.upload.total_bytes, 250);
    t2.close().await;

    // Both files of the 2-file batch are now complete; singleton clears.
    let summary = runtime.transfer_summary().await;
    assert_eq!(summary.upload.total_bytes, 0);
}
