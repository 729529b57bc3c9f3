//! Store bootstrap, provisioning and serving against a real store directory.

use std::path::Path;

use anyhow::Result;
use latchkey::pki::{generate_ca, PkiError, Subject};
use latchkey::{
    BootstrapOptions, Certificate, CertifiedKey, Directory, DirectoryError, Dispatcher, Identity,
    IdentityRole, PemPair, PrivateKey, TrustMode, CONFIG_FILE, REGISTRY_FILE, ROOT_CERT_FILE,
    ROOT_KEY_FILE,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn options(mode: TrustMode) -> BootstrapOptions {
    BootstrapOptions {
        mode,
        server_name: "latchkey.test".to_string(),
        ..BootstrapOptions::default()
    }
}

#[tokio::test]
async fn test_create_refuses_existing_path() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let err = Directory::create(dir.path(), options(TrustMode::Authority))
        .await
        .unwrap_err();
    assert!(matches!(err, DirectoryError::AlreadyExists(_)));
    Ok(())
}

#[tokio::test]
async fn test_failed_create_leaves_nothing_behind() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store");

    let weak = BootstrapOptions {
        key_bits: 1024,
        ..options(TrustMode::Authority)
    };
    let err = Directory::create(&path, weak).await.unwrap_err();
    assert!(matches!(err, DirectoryError::Pki(PkiError::KeySize { bits: 1024, .. })));
    assert!(!path.exists());

    Directory::create(&path, options(TrustMode::Authority)).await?;
    assert!(path.join(CONFIG_FILE).exists());
    Ok(())
}

#[tokio::test]
async fn test_create_authority_store() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store");
    let directory = Directory::create(&path, options(TrustMode::Authority)).await?;

    for file in [CONFIG_FILE, REGISTRY_FILE, "ca.crt.pem", "ca.key.pem", "srv.crt.pem", "srv.key.pem"] {
        assert!(path.join(file).exists(), "missing {file}");
    }

    let server = directory.server_certificate();
    server.verify_issued_by(directory.trust_anchor())?;
    assert_ne!(server, directory.trust_anchor());
    assert_eq!(server.dns_names(), vec!["latchkey.test".to_string()]);
    assert_eq!(directory.config().server_name, "latchkey.test");
    Ok(())
}

#[tokio::test]
async fn test_create_self_signed_store() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store");
    let directory = Directory::create(&path, options(TrustMode::SelfSigned)).await?;

    assert!(!path.join("ca.crt.pem").exists());
    assert_eq!(directory.server_certificate(), directory.trust_anchor());

    let (_, pem) = directory
        .create_user("a@x.com", "A", IdentityRole::Person)
        .await?;
    pem.decode()?
        .certificate
        .verify_issued_by(directory.trust_anchor())?;
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_root_principal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store");
    let mut opts = options(TrustMode::Authority);
    opts.root = Some(("root@x.com".to_string(), "Root".to_string()));
    let directory = Directory::create(&path, opts).await?;

    let root = PemPair::read_files(&path.join(ROOT_CERT_FILE), &path.join(ROOT_KEY_FILE))?.decode()?;
    let identity = directory
        .find_user(root.public_key_der()?.as_bytes())
        .await?;
    assert_eq!(identity, Identity::root("root@x.com", "Root"));
    assert!(identity.is_root());
    Ok(())
}

#[tokio::test]
async fn test_create_user_registers_key() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let directory = Directory::create(dir.path().join("store"), options(TrustMode::Authority)).await?;

    let (identity, pem) = directory
        .create_user("a@x.com", "A", IdentityRole::Person)
        .await?;
    assert_eq!(identity, Identity::person("a@x.com", "A"));

    let key = pem.decode()?;
    key.certificate.verify_issued_by(directory.trust_anchor())?;
    assert_eq!(directory.find_user(key.public_key_der()?.as_bytes()).await?, identity);

    let err = directory.find_user(b"unregistered").await.unwrap_err();
    assert!(matches!(err, DirectoryError::Registry(e) if e.is_not_found()));
    Ok(())
}

#[tokio::test]
async fn test_create_user_to_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let directory = Directory::create(dir.path().join("store"), options(TrustMode::Authority)).await?;
    let cert_path = dir.path().join("a.crt.pem");
    let key_path = dir.path().join("a.key.pem");

    let identity = directory
        .create_user_to_files("a@x.com", "A", IdentityRole::Person, &cert_path, &key_path)
        .await?;

    let key = PemPair::read_files(&cert_path, &key_path)?.decode()?;
    assert_eq!(directory.find_user(key.public_key_der()?.as_bytes()).await?, identity);
    assert!(std::fs::read_to_string(&key_path)?.contains("BEGIN RSA PRIVATE KEY"));
    Ok(())
}

#[tokio::test]
async fn test_add_user_with_key_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let directory = Directory::create(dir.path().join("store"), options(TrustMode::Authority)).await?;

    let key = PrivateKey::generate(2048)?;
    let key_path = dir.path().join("existing.key.pem");
    std::fs::write(&key_path, key.to_pkcs8_pem()?)?;

    let identity = Identity::person("b@x.com", "B");
    directory.add_user_with_key_file(&identity, &key_path).await?;
    assert_eq!(directory.find_user(key.public_key_der()?.as_bytes()).await?, identity);

    let missing = directory
        .add_user_with_key_file(&identity, Path::new("/nonexistent/key.pem"))
        .await
        .unwrap_err();
    assert!(matches!(missing, DirectoryError::Io { .. }));
    Ok(())
}

#[tokio::test]
async fn test_list_users() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let directory = Directory::create(dir.path().join("store"), options(TrustMode::Authority)).await?;

    let key = PrivateKey::generate(2048)?;
    directory
        .add_user_with_key(&Identity::person("a@x.com", "A"), &key)
        .await?;
    directory
        .create_user("b@x.com", "B", IdentityRole::Root)
        .await?;

    let users = directory.list_users().await?;
    assert_eq!(users.len(), 2);
    let a = users.iter().find(|u| u.email == "a@x.com").unwrap();
    assert_eq!(a.pub_key, key.public_key_der()?.to_hex());

    let json = serde_json::to_value(a)?;
    assert_eq!(json["pub-key"], serde_json::Value::String(a.pub_key.clone()));
    assert_eq!(json["role"], "PERSON");

    let mut visited = 0;
    let count = directory
        .for_each_user(|_, _| {
            visited += 1;
            Ok(())
        })
        .await?;
    assert_eq!((count, visited), (2, 2));
    Ok(())
}

#[tokio::test]
async fn test_reopen_keeps_users() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store");

    let key = {
        let directory = Directory::create(&path, options(TrustMode::Authority)).await?;
        let (_, pem) = directory
            .create_user("a@x.com", "A", IdentityRole::Person)
            .await?;
        pem.decode()?
    };

    let directory = Directory::open(&path)?;
    let identity = directory.find_user(key.public_key_der()?.as_bytes()).await?;
    assert_eq!(identity.email, "a@x.com");
    Ok(())
}

#[tokio::test]
async fn test_open_rejects_foreign_authority() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store");
    drop(Directory::create(&path, options(TrustMode::Authority)).await?);

    let foreign = generate_ca(2048, Subject::default(), &[])?;
    std::fs::write(path.join("ca.crt.pem"), foreign.certificate.to_pem()?)?;

    let err = Directory::open(&path).unwrap_err();
    assert!(matches!(err, DirectoryError::Pki(PkiError::Verification(_))));
    Ok(())
}

async fn ping_as_new_user(directory: &Directory) -> Result<()> {
    let handle = directory
        .serve_at("127.0.0.1:0", Dispatcher::standard())
        .await?;

    let (_, pem) = directory
        .create_user("a@x.com", "A", IdentityRole::Person)
        .await?;
    let key: CertifiedKey = pem.decode()?;

    let mut client = directory.connect(handle.local_addr(), &key).await?;
    assert_eq!(client.ping(1).await?, 1);
    let me = client.who_am_i().await?;
    assert_eq!((me.email.as_str(), me.role), ("a@x.com", IdentityRole::Person));
    client.close().await?;

    handle.shutdown(None).await?;
    Ok(())
}

#[tokio::test]
async fn test_serve_authority_store() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let directory = Directory::create(dir.path().join("store"), options(TrustMode::Authority)).await?;
    ping_as_new_user(&directory).await
}

#[tokio::test]
async fn test_serve_self_signed_store() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let directory = Directory::create(dir.path().join("store"), options(TrustMode::SelfSigned)).await?;
    ping_as_new_user(&directory).await
}

#[tokio::test]
async fn test_trust_anchor_matches_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("store");
    let directory = Directory::create(&path, options(TrustMode::Authority)).await?;

    let on_disk = Certificate::from_pem(&std::fs::read(path.join("ca.crt.pem"))?)?;
    assert_eq!(&on_disk, directory.trust_anchor());
    Ok(())
}
