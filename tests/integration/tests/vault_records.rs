//! Encrypted vault records shared between devices.

use satguard_integration_tests::Cluster;
use satguard_vault::store::VaultRepository;
use satguard_vault::{AuthorizationStatus, Endpoint, Peer, VaultError};

fn office() -> Endpoint {
    let mut endpoint = Endpoint::new("office", vec![0x11; 32])
        .with_address("10.8.0.2/32")
        .with_address("fd00::2/128")
        .with_peer(Peer {
            public_key: vec![0x22; 32],
            pre_shared_key: Some(vec![0x33; 32]),
            endpoint: "vpn.example.com:51820".to_string(),
            routes: vec!["0.0.0.0/0".to_string()],
            persistent_keep_alive: Some(25),
        });
    endpoint.dns = Some(vec!["9.9.9.9".parse().unwrap()]);
    endpoint.listen_port = Some(51820);
    endpoint.enforce_routes = true;
    endpoint
}

#[tokio::test]
async fn test_member_reads_founder_records() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    a.store(&office()).await.unwrap();

    let b = cluster.member(&a).await;
    let endpoints: Vec<Endpoint> = b.fetch_all().await.unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].name, "office");
    assert_eq!(endpoints[0].peers, office().peers);
}

#[tokio::test]
async fn test_roundtrip_with_empty_optional_fields() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;

    let bare = Endpoint::new("bare", Vec::new());
    a.store(&bare).await.unwrap();
    assert_eq!(a.fetch::<Endpoint>(bare.id).await.unwrap(), bare);

    let full = office();
    a.store(&full).await.unwrap();
    assert_eq!(a.fetch::<Endpoint>(full.id).await.unwrap(), full);
}

#[tokio::test]
async fn test_tampered_ciphertext_hides_every_record() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    a.store(&office()).await.unwrap();
    a.store(&Endpoint::new("home", vec![1; 32])).await.unwrap();

    let clean = cluster.store.fetch_records().await.unwrap();
    let target = clean[0].clone();

    for idx in [0, target.ciphertext.len() / 2, target.ciphertext.len() - 1] {
        let mut tampered = target.clone();
        tampered.ciphertext[idx] ^= 0x01;
        cluster.store.upsert_record(tampered).await.unwrap();

        assert!(matches!(
            a.fetch_all::<Endpoint>().await,
            Err(VaultError::CryptographicOperationFailed(_))
        ));
    }

    cluster.store.upsert_record(target).await.unwrap();
    assert_eq!(a.fetch_all::<Endpoint>().await.unwrap().len(), 2);
    assert_eq!(a.status(), AuthorizationStatus::Authorized);
}

#[tokio::test]
async fn test_records_unavailable_before_trust() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    a.store(&office()).await.unwrap();

    let b = cluster.device();
    b.enroll().await.unwrap();
    assert!(matches!(
        b.fetch_all::<Endpoint>().await,
        Err(VaultError::Unavailable)
    ));
    assert!(matches!(
        b.store(&office()).await,
        Err(VaultError::Unavailable)
    ));
}

#[tokio::test]
async fn test_delete_and_reset_remove_records() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    let endpoint = office();
    a.store(&endpoint).await.unwrap();
    a.store(&Endpoint::new("home", vec![])).await.unwrap();

    a.set_active(endpoint.id, true).await.unwrap();
    a.delete(endpoint.id).await.unwrap();
    assert!(a.active_endpoints().await.unwrap().is_empty());
    assert!(matches!(
        a.delete(endpoint.id).await,
        Err(VaultError::NotFound(_))
    ));

    a.reset().await.unwrap();
    assert!(cluster.store.fetch_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_active_endpoints_are_per_device() {
    let cluster = Cluster::new();
    let a = cluster.founder().await;
    let b = cluster.member(&a).await;
    let endpoint = office();
    a.store(&endpoint).await.unwrap();

    b.set_active(endpoint.id, true).await.unwrap();
    assert_eq!(b.active_endpoints().await.unwrap(), vec![endpoint.id]);
    assert!(a.active_endpoints().await.unwrap().is_empty());
}
