//! Database connection capability.
//!
//! The core never owns connection plumbing directly: catalog reads and seed
//! lookups go through the [`SqlExecutor`] trait, and a table that exists on
//! one side only is handled by simply not supplying an executor for the
//! other side. [`PgHandle`] is the tokio-postgres implementation, holding a
//! single session so one transaction spans the whole comparison run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::ClientConfig;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Config as PgConfig, Row};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, error, info, warn};

use crate::config::DbConfig;
use crate::error::{PatchError, Result};

/// Connect timeout for new sessions.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Query-capable database handle consumed by the core.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a query and return all rows.
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>>;

    /// Begin a READ COMMITTED transaction for the comparison run.
    async fn begin(&self) -> Result<()>;

    /// Commit the run's transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll back the run's transaction.
    async fn rollback(&self) -> Result<()>;
}

/// Single-session PostgreSQL handle.
///
/// Unlike a pooled setup, both catalog reads and seed lookups for one run
/// must observe one consistent snapshot, so the handle wraps exactly one
/// client with an explicit BEGIN/COMMIT around the whole run.
pub struct PgHandle {
    client: tokio_postgres::Client,
    session_timeout_ms: Option<u64>,
    _connection: JoinHandle<()>,
}

impl PgHandle {
    /// Connect a new session from configuration.
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let ssl_mode = config.ssl_mode.to_lowercase();
        let (client, connection) = match ssl_mode.as_str() {
            "disable" => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let (client, connection) = pg_config
                    .connect(tokio_postgres::NoTls)
                    .await
                    .map_err(|e| PatchError::connection(e.to_string(), "connecting session"))?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                (client, handle)
            }
            _ => {
                let tls_config = build_tls_config(&ssl_mode)?;
                let tls_connector = MakeRustlsConnect::new(tls_config);
                let (client, connection) = pg_config
                    .connect(tls_connector)
                    .await
                    .map_err(|e| PatchError::connection(e.to_string(), "connecting TLS session"))?;
                let handle = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                (client, handle)
            }
        };

        // Test connection
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            client,
            session_timeout_ms: config.session_timeout_ms,
            _connection: connection,
        })
    }

    /// End the session. Dropping the client terminates the connection task.
    pub async fn close(self) {
        drop(self.client);
    }
}

#[async_trait]
impl SqlExecutor for PgHandle {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        Ok(self.client.query(sql, params).await?)
    }

    async fn begin(&self) -> Result<()> {
        let mut statements = vec![
            "BEGIN".to_string(),
            "SET TRANSACTION ISOLATION LEVEL READ COMMITTED".to_string(),
        ];
        if let Some(base) = self.session_timeout_ms {
            statements.push(format!("SET idle_in_transaction_session_timeout = {}", base));
            statements.push(format!("SET statement_timeout = {}", base / 2));
        }

        let batch = statements.join("; ");
        debug!("Beginning transaction: {}", batch);

        if let Err(e) = self.client.batch_execute(&batch).await {
            // A failed begin leaves session state undefined; clear it.
            let _ = self.client.batch_execute("ROLLBACK").await;
            return Err(PatchError::transaction("begin", e.to_string()));
        }
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        if let Err(e) = self.client.batch_execute("COMMIT").await {
            let _ = self.client.batch_execute("ROLLBACK").await;
            return Err(PatchError::transaction("commit", e.to_string()));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| PatchError::transaction("rollback", e.to_string()))
    }
}

/// Build TLS configuration based on ssl_mode.
fn build_tls_config(ssl_mode: &str) -> Result<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = match ssl_mode {
        "require" => {
            warn!(
                "ssl_mode=require: TLS enabled but server certificate is not verified. \
                 Consider using 'verify-full' for production."
            );
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        }
        "verify-ca" | "verify-full" => {
            info!("ssl_mode={}: certificate verification enabled", ssl_mode);
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        }
        other => {
            return Err(PatchError::Config(format!(
                "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
                other
            )));
        }
    };

    Ok(config)
}

/// Certificate verifier that accepts any certificate.
///
/// # Security Warning
///
/// This verifier bypasses all certificate validation, making the connection
/// vulnerable to man-in-the-middle attacks. It should ONLY be used in:
/// - Development/testing environments with self-signed certificates
/// - Trusted internal networks where MITM attacks are not a concern
/// - When the `ssl_mode=require` option is explicitly chosen by the user
///
/// For production environments with untrusted networks, use `ssl_mode=verify-full`
/// which validates the server certificate against trusted CAs.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
