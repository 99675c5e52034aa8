// Copyright (C) 2024-2026 Push Infra Contributors.
// This file is part of the apns-legacy-client library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ClientConfig as RustlsClientConfig;

use crate::error::ApnsError;

/// APNS sandbox gateway, used as the default in [`Config::default`].
pub const SANDBOX_GATEWAY: (&str, u16) = ("gateway.sandbox.push.apple.com", 2195);
/// APNS production gateway.
pub const PRODUCTION_GATEWAY: (&str, u16) = ("gateway.push.apple.com", 2195);

const DEFAULT_BUFFER_CAPACITY: usize = 50;
const DEFAULT_CONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// A client-authentication TLS identity that has already been validated and
/// turned into a [`rustls::ClientConfig`].
#[derive(Clone)]
pub struct ClientTlsIdentity(RustlsClientConfig);

impl ClientTlsIdentity {
    pub fn from_rustls_config(config: RustlsClientConfig) -> Self {
        Self(config)
    }
}

/// The three ways TLS client credentials can reach [`Config`].
#[derive(Clone)]
pub enum TlsCredentials {
    /// Raw PEM-encoded certificate and private key bytes.
    Pem { cert: Vec<u8>, key: Vec<u8> },
    /// Paths to PEM-encoded certificate and private key files.
    PemFiles { cert_path: PathBuf, key_path: PathBuf },
    /// A pre-built, already-validated TLS identity.
    Identity(ClientTlsIdentity),
}

impl TlsCredentials {
    pub(crate) fn client_config(&self) -> Result<RustlsClientConfig, ApnsError> {
        match self {
            Self::Pem { cert, key } => build_client_config(cert, key),
            Self::PemFiles { cert_path, key_path } => {
                let cert = read_credential_file(cert_path)?;
                let key = read_credential_file(key_path)?;
                build_client_config(&cert, &key)
            }
            Self::Identity(identity) => Ok(identity.0.clone()),
        }
    }
}

fn read_credential_file(path: &Path) -> Result<Vec<u8>, ApnsError> {
    std::fs::read(path).map_err(|source| ApnsError::ReadCredentials {
        path: path.display().to_string(),
        source,
    })
}

fn build_client_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<RustlsClientConfig, ApnsError> {
    let cert_chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut Cursor::new(cert_pem))
        .collect::<Result<_, _>>()
        .map_err(|_| ApnsError::NoCertificate)?;
    if cert_chain.is_empty() {
        return Err(ApnsError::NoCertificate);
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut Cursor::new(key_pem))
        .map_err(|_| ApnsError::NoPrivateKey)?
        .ok_or(ApnsError::NoPrivateKey)?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = RustlsClientConfig::builder()
        .with_root_certificates(root_store)
        .with_client_auth_cert(cert_chain, key)?;

    Ok(config)
}

/// Everything the send/recover loop needs to reach and authenticate to an
/// APNS gateway.
#[derive(Clone)]
pub struct Config {
    pub gateway: (String, u16),
    pub tls: TlsCredentials,
    pub buffer_capacity: usize,
    pub connect_backoff: Duration,
}

impl Config {
    pub fn new(gateway: (impl Into<String>, u16), tls: TlsCredentials) -> Self {
        Self {
            gateway: (gateway.0.into(), gateway.1),
            tls,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            connect_backoff: DEFAULT_CONNECT_BACKOFF,
        }
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_connect_backoff(mut self, backoff: Duration) -> Self {
        self.connect_backoff = backoff;
        self
    }

    /// Loads gateway, credential paths, and buffer capacity from the
    /// environment, for the bundled demo binary. Library callers are expected
    /// to build a [`Config`] explicitly instead.
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;

        let host = std::env::var("APNS_GATEWAY_HOST").unwrap_or_else(|_| SANDBOX_GATEWAY.0.to_string());
        let port: u16 = match std::env::var("APNS_GATEWAY_PORT") {
            Ok(value) => value.parse().context("APNS_GATEWAY_PORT must be a u16")?,
            Err(_) => SANDBOX_GATEWAY.1,
        };
        let cert_path = std::env::var("APNS_CERT_PATH").context("APNS_CERT_PATH is required")?;
        let key_path = std::env::var("APNS_KEY_PATH").context("APNS_KEY_PATH is required")?;

        let mut config = Self::new(
            (host, port),
            TlsCredentials::PemFiles { cert_path: cert_path.into(), key_path: key_path.into() },
        );

        if let Ok(capacity) = std::env::var("APNS_BUFFER_CAPACITY") {
            config.buffer_capacity = capacity.parse().context("APNS_BUFFER_CAPACITY must be a usize")?;
        }

        Ok(config)
    }
}
