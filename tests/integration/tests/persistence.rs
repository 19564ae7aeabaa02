//! File-backed vaults surviving a process restart.

use satguard_core::{paths, Config};
use satguard_integration_tests::init_tracing;
use satguard_vault::{keyvalue, AuthorizationStatus, Endpoint, Vault};
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = Some(dir.path().to_path_buf());
    config
}

#[tokio::test]
async fn test_secret_recovered_after_restart() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let endpoint = Endpoint::new("office", vec![7; 32]);

    let device_id = {
        let vault = Vault::open(&config).await.unwrap();
        vault.enroll().await.unwrap();
        vault.mint_vault_secret().await.unwrap();
        vault.store(&endpoint).await.unwrap();
        vault.device_id()
    };

    let vault = Vault::open(&config).await.unwrap();
    assert_eq!(vault.device_id(), device_id);
    assert_eq!(vault.status(), AuthorizationStatus::Establishing);
    assert!(matches!(
        vault.fetch_all::<Endpoint>().await,
        Err(satguard_vault::VaultError::Unavailable)
    ));

    assert_eq!(vault.refresh().await.unwrap(), AuthorizationStatus::Authorized);
    assert_eq!(vault.fetch_all::<Endpoint>().await.unwrap(), vec![endpoint]);
    assert_eq!(
        vault.metadata().get(&keyvalue::secret_creator()).await.unwrap(),
        Some(device_id)
    );
}

#[tokio::test]
async fn test_lost_key_file_fails_establishing() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    {
        let vault = Vault::open(&config).await.unwrap();
        vault.enroll().await.unwrap();
        vault.mint_vault_secret().await.unwrap();
    }
    std::fs::remove_file(paths::device_key_file(dir.path())).unwrap();

    let vault = Vault::open(&config).await.unwrap();
    assert!(vault.refresh().await.is_err());
    assert_eq!(vault.status(), AuthorizationStatus::EstablishingFailed);

    assert_eq!(vault.reset().await.unwrap(), AuthorizationStatus::None);
    vault.enroll().await.unwrap();
    assert_eq!(
        vault.mint_vault_secret().await.unwrap(),
        AuthorizationStatus::Authorized
    );
}

#[tokio::test]
async fn test_lost_key_before_mint_republishes_key() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let endpoint = Endpoint::new("office", vec![7; 32]);

    {
        let vault = Vault::open(&config).await.unwrap();
        vault.enroll().await.unwrap();
    }
    std::fs::remove_file(paths::device_key_file(dir.path())).unwrap();

    {
        let vault = Vault::open(&config).await.unwrap();
        assert_eq!(
            vault.refresh().await.unwrap(),
            AuthorizationStatus::MissingSecretCreateStrategy
        );
        assert!(matches!(
            vault.mint_vault_secret().await,
            Err(satguard_vault::VaultError::PreconditionFailed(_))
        ));

        vault.enroll().await.unwrap();
        assert_eq!(
            vault.mint_vault_secret().await.unwrap(),
            AuthorizationStatus::Authorized
        );
        vault.store(&endpoint).await.unwrap();
    }

    let vault = Vault::open(&config).await.unwrap();
    assert_eq!(vault.refresh().await.unwrap(), AuthorizationStatus::Authorized);
    assert_eq!(vault.fetch_all::<Endpoint>().await.unwrap(), vec![endpoint]);
}

#[tokio::test]
async fn test_reset_keeps_device_id() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let vault = Vault::open(&config).await.unwrap();
    let device_id = vault.device_id();
    vault.enroll().await.unwrap();
    vault.reset().await.unwrap();
    assert!(!paths::device_key_file(dir.path()).exists());

    let reopened = Vault::open(&config).await.unwrap();
    assert_eq!(reopened.device_id(), device_id);
}
