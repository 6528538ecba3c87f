//! Session store and sweeper tests

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::oneshot;

use harbory::authn::session_store::{ManualClock, SessionStore};
use harbory::workers::session_sweeper;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn store_with_clock() -> (Arc<SessionStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = SessionStore::with_clock(
        SecretString::from("admin".to_string()),
        DAY,
        clock.clone(),
    );
    (Arc::new(store), clock)
}

#[tokio::test]
async fn test_concurrent_issue_and_validate() {
    let (store, _) = store_with_clock();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let token = store.issue_token().await.unwrap();
            assert!(store.validate_token(&token).await);
            token
        }));
    }

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.unwrap());
    }
    tokens.sort();
    tokens.dedup();
    assert_eq!(tokens.len(), 16);
    assert_eq!(store.session_count().await, 16);
}

#[tokio::test]
async fn test_password_change_races_with_validation() {
    let (store, _) = store_with_clock();
    let token = store.issue_token().await.unwrap();

    let validator = {
        let store = store.clone();
        let token = token.clone();
        tokio::spawn(async move {
            for _ in 0..100 {
                store.validate_token(&token).await;
            }
        })
    };
    assert!(store.change_password("admin", "next").await);
    validator.await.unwrap();

    assert!(!store.validate_token(&token).await);
    assert_eq!(store.session_count().await, 0);
}

#[tokio::test]
async fn test_sweeper_removes_expired_sessions() {
    let (store, clock) = store_with_clock();
    store.issue_token().await.unwrap();
    store.issue_token().await.unwrap();
    clock.advance(DAY);
    let fresh = store.issue_token().await.unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let sweeper = {
        let store = store.clone();
        tokio::spawn(async move {
            session_sweeper::run(
                &session_sweeper::Options {
                    interval: Duration::from_millis(1),
                },
                store.as_ref(),
                |_| tokio::task::yield_now(),
                Box::pin(async move {
                    let _ = shutdown_rx.await;
                }),
            )
            .await;
        })
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while store.session_count().await != 1 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(store.validate_token(&fresh).await);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), sweeper)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_sweeper_stops_on_shutdown() {
    let (store, _) = store_with_clock();

    tokio::time::timeout(
        Duration::from_secs(5),
        session_sweeper::run(
            &session_sweeper::Options::default(),
            store.as_ref(),
            tokio::time::sleep,
            Box::pin(async {}),
        ),
    )
    .await
    .unwrap();
}
