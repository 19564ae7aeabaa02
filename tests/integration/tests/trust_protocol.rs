//! Multi-device trust protocol scenarios over a shared in-memory store.

use chrono::Duration;
use satguard_integration_tests::Cluster;
use satguard_vault::store::DeviceRepository;
use satguard_vault::{AuthorizationStatus, RegistryEvent, VaultError};
use uuid::Uuid;

#[tokio::test]
async fn test_bootstrap_founder() {
    let cluster = Cluster::new();
    let a = cluster.device();

    assert_eq!(a.status(), AuthorizationStatus::Establishing);
    assert_eq!(a.refresh().await.unwrap(), AuthorizationStatus::None);
    assert_eq!(
        a.enroll().await.unwrap(),
        AuthorizationStatus::MissingSecretCreateStrategy
    );
    assert_eq!(
        a.mint_vault_secret().await.unwrap(),
        AuthorizationStatus::Authorized
    );
    assert!(matches!(
        a.mint_vault_secret().await,
        Err(VaultError::PreconditionFailed(_))
    ));
    assert_eq!(a.status(), AuthorizationStatus::Authorized);
}

#[tokio::test]
async fn test_join_recovers_identical_secret() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    let b = cluster.device();

    assert_eq!(
        b.enroll().await.unwrap(),
        AuthorizationStatus::MissingSecretRequestStrategy
    );
    assert_eq!(
        b.refresh().await.unwrap(),
        AuthorizationStatus::MissingSecretRequestStrategy
    );

    let pending = a.pending_devices().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].verifier, b.identity().verifier().await.unwrap());

    a.trust(b.device_id()).await.unwrap();
    assert_eq!(b.refresh().await.unwrap(), AuthorizationStatus::Authorized);

    let a_secret = a.registry().secret_cell().get().unwrap();
    let b_secret = b.registry().secret_cell().get().unwrap();
    assert_eq!(a_secret.expose_secret(), b_secret.expose_secret());
}

#[tokio::test]
async fn test_trusted_member_can_admit_others() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    let b = cluster.member(&a).await;
    let c = cluster.device();
    c.enroll().await.unwrap();

    b.trust(c.device_id()).await.unwrap();
    assert_eq!(c.refresh().await.unwrap(), AuthorizationStatus::Authorized);
    assert_eq!(a.refresh().await.unwrap(), AuthorizationStatus::Authorized);
    assert_eq!(a.devices().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_deny_removes_pending_device() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    let c = cluster.device();
    c.enroll().await.unwrap();

    let mut events = a.subscribe_events();
    a.deny(c.device_id()).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        RegistryEvent::Changed {
            status: AuthorizationStatus::Authorized,
            pending: vec![],
        }
    );

    assert!(a
        .devices()
        .await
        .unwrap()
        .iter()
        .all(|d| d.id != c.device_id()));
    assert_eq!(c.refresh().await.unwrap(), AuthorizationStatus::None);

    // denied device may enroll again and ask once more
    assert_eq!(
        c.enroll().await.unwrap(),
        AuthorizationStatus::MissingSecretRequestStrategy
    );
}

#[tokio::test]
async fn test_deny_refuses_trusted_device() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    let b = cluster.member(&a).await;

    assert!(matches!(
        a.deny(b.device_id()).await,
        Err(VaultError::PreconditionFailed(_))
    ));
    assert_eq!(b.refresh().await.unwrap(), AuthorizationStatus::Authorized);
}

#[tokio::test]
async fn test_pending_device_cannot_trust() {
    let cluster = Cluster::new();
    let _a = cluster.founder().await;
    let b = cluster.device();
    let c = cluster.device();
    b.enroll().await.unwrap();
    c.enroll().await.unwrap();

    assert!(matches!(
        b.trust(c.device_id()).await,
        Err(VaultError::Unauthorized)
    ));
    assert_eq!(b.status(), AuthorizationStatus::MissingSecretRequestStrategy);
}

#[tokio::test]
async fn test_reset_then_bootstrap_again() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    let b = cluster.member(&a).await;

    assert_eq!(a.reset().await.unwrap(), AuthorizationStatus::None);
    assert!(cluster.store.fetch_devices().await.unwrap().is_empty());
    assert!(!a.registry().secret_cell().is_held());

    // the other member notices its record is gone
    assert_eq!(b.refresh().await.unwrap(), AuthorizationStatus::None);
    assert!(!b.registry().secret_cell().is_held());

    a.enroll().await.unwrap();
    assert_eq!(
        a.mint_vault_secret().await.unwrap(),
        AuthorizationStatus::Authorized
    );
}

#[tokio::test]
async fn test_duplicate_records_converge() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    let b = cluster.device();
    b.enroll().await.unwrap();

    // sync delivers an older copy of b's row alongside the current one
    let current = cluster
        .store
        .fetch_devices()
        .await
        .unwrap()
        .into_iter()
        .find(|d| d.id == b.device_id())
        .unwrap();
    let mut older = current.clone();
    older.row_id = Uuid::new_v4();
    older.added_at = current.added_at - Duration::minutes(10);
    older.public_key = vec![9; 32];
    cluster.store.insert_device(older).await.unwrap();

    for _ in 0..3 {
        a.refresh().await.unwrap();
        let rows: Vec<_> = cluster
            .store
            .fetch_devices()
            .await
            .unwrap()
            .into_iter()
            .filter(|d| d.id == b.device_id())
            .collect();
        assert_eq!(rows, vec![current.clone()]);
    }

    a.trust(b.device_id()).await.unwrap();
    assert_eq!(b.refresh().await.unwrap(), AuthorizationStatus::Authorized);
}
