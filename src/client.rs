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

//! The client façade: accepts submissions from callers and exposes a
//! stream of failure reports, hiding the send/recover loop behind a channel.

use std::path::Path;

use tokio::sync::{mpsc, oneshot};

use crate::config::{ClientTlsIdentity, Config, TlsCredentials};
use crate::connection::TlsConnection;
use crate::error::{ApnsError, EncodingError};
use crate::notification::{Notification, NotificationResult};
use crate::session;

/// How many failure reports may queue up before new ones are dropped. A
/// slow or absent consumer never blocks the send/recover loop.
const FAILURES_CAPACITY: usize = 64;

/// A long-lived handle to the send/recover loop. Cloning is not supported —
/// `send` takes `&self` and can be called from multiple tasks, but there is
/// exactly one loop and one pair of failure streams per `Client`.
pub struct Client {
    submissions: mpsc::Sender<Notification>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// A best-effort stream of notifications APNS rejected.
pub struct Failures(mpsc::Receiver<NotificationResult>);

impl Failures {
    pub async fn recv(&mut self) -> Option<NotificationResult> {
        self.0.recv().await
    }
}

/// A best-effort stream of submissions that could not be framed for the wire.
pub struct EncodingFailures(mpsc::Receiver<(Notification, EncodingError)>);

impl EncodingFailures {
    pub async fn recv(&mut self) -> Option<(Notification, EncodingError)> {
        self.0.recv().await
    }
}

impl Client {
    /// Builds a client and starts its send/recover loop, spawned onto the
    /// ambient tokio runtime. Credentials are taken from `config.tls`.
    pub fn new(config: Config) -> Result<(Self, Failures, EncodingFailures), ApnsError> {
        // Fail fast on unusable credentials rather than discovering it on
        // the first connect attempt deep inside the loop.
        config.tls.client_config()?;

        let (submission_tx, submission_rx) = mpsc::channel(1);
        let (failures_tx, failures_rx) = mpsc::channel(FAILURES_CAPACITY);
        let (encoding_failures_tx, encoding_failures_rx) = mpsc::channel(FAILURES_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let resubmit = submission_tx.clone();
        tokio::spawn(session::run::<TlsConnection>(
            config,
            resubmit,
            submission_rx,
            failures_tx,
            encoding_failures_tx,
            shutdown_rx,
        ));

        Ok((
            Self { submissions: submission_tx, shutdown: Some(shutdown_tx) },
            Failures(failures_rx),
            EncodingFailures(encoding_failures_rx),
        ))
    }

    /// Builds a client from certificate and key PEM files.
    pub fn with_pem_files(
        gateway: (impl Into<String>, u16),
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<(Self, Failures, EncodingFailures), ApnsError> {
        let config = Config::new(
            gateway,
            TlsCredentials::PemFiles {
                cert_path: cert_path.as_ref().to_path_buf(),
                key_path: key_path.as_ref().to_path_buf(),
            },
        );
        Self::new(config)
    }

    /// Builds a client from a pre-built, already-validated TLS identity.
    /// Infallible: the identity was validated when it was constructed.
    pub fn with_identity(
        gateway: (impl Into<String>, u16),
        identity: ClientTlsIdentity,
    ) -> (Self, Failures, EncodingFailures) {
        let config = Config::new(gateway, TlsCredentials::Identity(identity));
        Self::new(config).expect("a pre-built TlsIdentity is already valid")
    }

    /// Hands `notification` to the send/recover loop. Always succeeds from
    /// the caller's perspective; it suspends until the loop is ready to receive,
    /// which is where backpressure from a stalled connection shows up.
    pub async fn send(&self, notification: Notification) {
        // The loop holds its own clone of this sender for replay, so the
        // channel never closes out from under an in-flight `send`.
        let _ = self.submissions.send(notification).await;
    }

    /// Signals the send/recover loop to end at the next opportunity (between
    /// connection attempts, or while idle waiting on the inner loop's select)
    /// and consumes the client. Not part of the distilled protocol; see
    /// DESIGN.md for why a long-lived daemon needs this.
    pub fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
