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

//! The connection manager contract: an opaque, reliable, duplex byte
//! channel the send/recover loop neither reuses across reconnects nor shares
//! with anything but its own error reader.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config::Config;
use crate::error::TransportError;

/// A connection the send/recover loop can write to and split into halves so
/// the error reader can own the read side for the life of the session.
#[async_trait]
pub trait Connection: Sized + Send + 'static {
    type ReadHalf: AsyncReadExt + Unpin + Send + 'static;
    type WriteHalf: AsyncWriteExt + Unpin + Send + 'static;

    async fn connect(config: &Config) -> Result<Self, TransportError>;

    fn split(self) -> (Self::ReadHalf, Self::WriteHalf);
}

/// The concrete transport: TLS over TCP via `tokio-rustls`.
pub struct TlsConnection {
    stream: TlsStream<TcpStream>,
}

#[async_trait]
impl Connection for TlsConnection {
    type ReadHalf = ReadHalf<TlsStream<TcpStream>>;
    type WriteHalf = WriteHalf<TlsStream<TcpStream>>;

    async fn connect(config: &Config) -> Result<Self, TransportError> {
        let (host, port) = &config.gateway;

        let tcp = TcpStream::connect((host.as_str(), *port))
            .await
            .map_err(TransportError::Connect)?;
        tcp.set_nodelay(true).map_err(TransportError::Connect)?;

        let tls_config = config.tls.client_config().map_err(|err| {
            TransportError::Handshake(io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))
        })?;
        let connector = TlsConnector::from(Arc::new(tls_config));

        let server_name = rustls::pki_types::ServerName::try_from(host.clone())
            .map_err(|err| TransportError::Handshake(io::Error::new(io::ErrorKind::InvalidInput, err)))?;

        let stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(TransportError::Handshake)?;

        Ok(Self { stream })
    }

    fn split(self) -> (Self::ReadHalf, Self::WriteHalf) {
        tokio::io::split(self.stream)
    }
}
