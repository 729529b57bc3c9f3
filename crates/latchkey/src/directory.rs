//! The Directory: a store of credentials and identities on disk.
//!
//! A store directory holds the configuration, the server certificate, the
//! authority (in authority mode) and the registry database. The Directory
//! provisions users into it and serves RPC from it.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use latchkey_pki::{
    generate_ca, generate_client_cert, generate_server_cert, Certificate, CertifiedKey, PemPair,
    PrivateKey, Signer, Subject, DEFAULT_KEY_BITS,
};
use latchkey_registry::{Identity, IdentityRole, Registry, RegistryExt, SqliteRegistry};
use latchkey_rpc::{tls, Client, Dispatcher, Server, ServerHandle};

use crate::config::{resolve, Config, TrustMode, CONFIG_FILE, REGISTRY_FILE};
use crate::error::{DirectoryError, Result};

/// File names of the root principal's credentials written by `create`.
pub const ROOT_CERT_FILE: &str = "root.crt.pem";
pub const ROOT_KEY_FILE: &str = "root.key.pem";

/// Options for [`Directory::create`].
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub mode: TrustMode,
    /// Host name the server certificate is issued for.
    pub server_name: String,
    pub key_bits: u32,
    /// `(email, name)` of a root principal to provision at bootstrap.
    pub root: Option<(String, String)>,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        let config = Config::default();
        Self {
            mode: config.trust.mode,
            server_name: config.server_name,
            key_bits: DEFAULT_KEY_BITS,
            root: None,
        }
    }
}

/// One row of the user listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListing {
    pub email: String,
    pub name: String,
    pub role: IdentityRole,
    /// Hex of the registered DER public key.
    #[serde(rename = "pub-key")]
    pub pub_key: String,
}

/// An opened store.
pub struct Directory<R: Registry + ?Sized = SqliteRegistry> {
    path: PathBuf,
    config: Config,
    registry: Arc<R>,
    server: CertifiedKey,
    anchor: Certificate,
}

impl Directory<SqliteRegistry> {
    /// Bootstrap a new store at `path` and open it.
    ///
    /// Fails if anything already exists at `path`. A bootstrap that fails
    /// partway removes `path` again, so the same call can be retried.
    pub async fn create(path: impl AsRef<Path>, options: BootstrapOptions) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Err(DirectoryError::AlreadyExists(path.to_path_buf()));
        }
        fs::create_dir_all(path).map_err(|e| DirectoryError::io(path, e))?;

        match Self::bootstrap(path, &options).await {
            Ok(directory) => Ok(directory),
            Err(e) => {
                if let Err(remove) = fs::remove_dir_all(path) {
                    tracing::warn!(path = %path.display(), error = %remove, "failed to remove partial store");
                }
                Err(e)
            }
        }
    }

    async fn bootstrap(path: &Path, options: &BootstrapOptions) -> Result<Self> {
        let mut config = Config::default();
        config.server_name = options.server_name.clone();
        config.key_bits = options.key_bits;
        config.trust.mode = options.mode;
        config.write_to_file(&path.join(CONFIG_FILE))?;

        let server = match options.mode {
            TrustMode::Authority => {
                let subject =
                    Subject::default().with_common_name(format!("{} authority", options.server_name));
                let ca = generate_ca(options.key_bits, subject, &[])?;
                ca.to_pem()?.write_files(
                    &resolve(path, &config.trust.certificate),
                    &resolve(path, &config.trust.private_key),
                )?;
                generate_server_cert(options.key_bits, &options.server_name, Signer::Issuer(&ca))?
            }
            TrustMode::SelfSigned => {
                generate_server_cert(options.key_bits, &options.server_name, Signer::SelfSigned)?
            }
        };
        server.to_pem()?.write_files(
            &resolve(path, &config.rpc.certificate),
            &resolve(path, &config.rpc.private_key),
        )?;

        tracing::info!(
            path = %path.display(),
            mode = ?options.mode,
            server_name = %options.server_name,
            "store created"
        );

        let directory = Self::open(path)?;
        if let Some((email, name)) = &options.root {
            directory
                .create_user_to_files(
                    email,
                    name,
                    IdentityRole::Root,
                    &path.join(ROOT_CERT_FILE),
                    &path.join(ROOT_KEY_FILE),
                )
                .await?;
        }
        Ok(directory)
    }

    /// Open an existing store with its SQLite registry.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let registry = SqliteRegistry::open(path.join(REGISTRY_FILE))?;
        Self::open_with_registry(path, Arc::new(registry))
    }
}

impl<R: Registry + ?Sized + 'static> Directory<R> {
    /// Open a store's credentials and configuration over an existing
    /// registry.
    ///
    /// In authority mode the server certificate must chain to the
    /// authority.
    pub fn open_with_registry(path: impl AsRef<Path>, registry: Arc<R>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config = Config::read_from_file(&path.join(CONFIG_FILE))?;

        let server = PemPair::read_files(
            &resolve(&path, &config.rpc.certificate),
            &resolve(&path, &config.rpc.private_key),
        )?
        .decode()?;

        let anchor = match config.trust.mode {
            TrustMode::Authority => {
                let anchor_path = resolve(&path, &config.trust.certificate);
                let pem = fs::read(&anchor_path).map_err(|e| DirectoryError::io(&anchor_path, e))?;
                let anchor = Certificate::from_pem(&pem)?;
                server.certificate.verify_issued_by(&anchor)?;
                anchor
            }
            TrustMode::SelfSigned => server.certificate.clone(),
        };

        tracing::debug!(path = %path.display(), mode = ?config.trust.mode, "store opened");
        Ok(Self {
            path,
            config,
            registry,
            server,
            anchor,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Certificate clients and the server trust.
    pub fn trust_anchor(&self) -> &Certificate {
        &self.anchor
    }

    pub fn server_certificate(&self) -> &Certificate {
        &self.server.certificate
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Provisioning
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a client certificate for a new user and register its key.
    ///
    /// The credentials are returned only once the key is registered.
    pub async fn create_user(
        &self,
        email: &str,
        name: &str,
        role: IdentityRole,
    ) -> Result<(Identity, PemPair)> {
        let (identity, key) = self.issue_user(email, name, role)?;
        let pem = key.to_pem()?;
        self.register(&identity, &key).await?;
        Ok((identity, pem))
    }

    /// Like [`create_user`](Self::create_user), writing the credentials to
    /// `cert_path` and `key_path`.
    ///
    /// The files are removed again if registration fails.
    pub async fn create_user_to_files(
        &self,
        email: &str,
        name: &str,
        role: IdentityRole,
        cert_path: &Path,
        key_path: &Path,
    ) -> Result<Identity> {
        let (identity, key) = self.issue_user(email, name, role)?;
        key.to_pem()?.write_files(cert_path, key_path)?;

        if let Err(e) = self.register(&identity, &key).await {
            for file in [cert_path, key_path] {
                if let Err(remove) = fs::remove_file(file) {
                    tracing::warn!(path = %file.display(), error = %remove, "failed to remove credentials");
                }
            }
            return Err(e);
        }
        Ok(identity)
    }

    /// Register an existing private key's public half.
    pub async fn add_user_with_key(&self, identity: &Identity, key: &PrivateKey) -> Result<()> {
        let public_key = key.public_key_der()?;
        self.registry.insert(public_key.as_bytes(), identity).await?;
        tracing::info!(email = %identity.email, role = %identity.role, key = %public_key, "user added");
        Ok(())
    }

    /// Register the public half of a PEM private key file.
    pub async fn add_user_with_key_file(&self, identity: &Identity, path: &Path) -> Result<()> {
        let pem = fs::read(path).map_err(|e| DirectoryError::io(path, e))?;
        let key = PrivateKey::from_pem(&pem)?;
        self.add_user_with_key(identity, &key).await
    }

    fn issue_user(
        &self,
        email: &str,
        name: &str,
        role: IdentityRole,
    ) -> Result<(Identity, CertifiedKey)> {
        let key = match self.config.trust.mode {
            TrustMode::Authority => {
                let authority = PemPair::read_files(
                    &resolve(&self.path, &self.config.trust.certificate),
                    &resolve(&self.path, &self.config.trust.private_key),
                )?
                .decode()?;
                generate_client_cert(self.config.key_bits, &authority)?
            }
            TrustMode::SelfSigned => generate_client_cert(self.config.key_bits, &self.server)?,
        };
        Ok((Identity::new(email, name, role), key))
    }

    async fn register(&self, identity: &Identity, key: &CertifiedKey) -> Result<()> {
        let public_key = key.public_key_der()?;
        self.registry.insert(public_key.as_bytes(), identity).await?;
        tracing::info!(
            email = %identity.email,
            role = %identity.role,
            key = %public_key,
            "user provisioned"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Identity registered under a DER public key.
    pub async fn find_user(&self, public_key: &[u8]) -> Result<Identity> {
        Ok(self.registry.lookup(public_key).await?)
    }

    /// Visit every registered user in key order. Returns the number visited.
    pub async fn for_each_user<F>(&self, visitor: F) -> Result<usize>
    where
        F: FnMut(&[u8], &Identity) -> Result<()> + Send,
    {
        self.registry.for_each(visitor).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserListing>> {
        let mut users = Vec::new();
        self.for_each_user(|key, identity| {
            users.push(UserListing {
                email: identity.email.clone(),
                name: identity.name.clone(),
                role: identity.role,
                pub_key: hex::encode(key),
            });
            Ok(())
        })
        .await?;
        Ok(users)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Serving
    // ─────────────────────────────────────────────────────────────────────────

    /// rustls server configuration presenting the server certificate and
    /// requiring clients that chain to the trust anchor.
    pub fn server_tls_config(&self) -> Result<Arc<rustls::ServerConfig>> {
        Ok(tls::server_config(&self.server, &self.anchor)?)
    }

    /// Serve on the configured address.
    pub async fn serve(&self, dispatcher: Dispatcher) -> Result<ServerHandle> {
        let addr = self.config.rpc.addr.clone();
        self.serve_at(addr.as_str(), dispatcher).await
    }

    /// Serve on `addr` instead of the configured address.
    pub async fn serve_at(&self, addr: &str, dispatcher: Dispatcher) -> Result<ServerHandle> {
        let server = Server::bind(
            addr,
            self.server_tls_config()?,
            Arc::clone(&self.registry),
            dispatcher,
            self.config.rpc_config(),
        )
        .await?;
        Ok(server.spawn()?)
    }

    /// Dial a server of this store as `identity`.
    pub async fn connect(&self, addr: SocketAddr, identity: &CertifiedKey) -> Result<Client> {
        let client =
            Client::dial(addr, &self.config.server_name, identity, &self.anchor).await?;
        Ok(client.with_max_payload_len(self.config.rpc.max_payload_len))
    }
}

impl<R: Registry + ?Sized> std::fmt::Debug for Directory<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("path", &self.path)
            .field("mode", &self.config.trust.mode)
            .field("server_name", &self.config.server_name)
            .finish()
    }
}
