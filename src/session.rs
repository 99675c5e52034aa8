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

//! The send/recover loop: the orchestrator that ties the replay
//! buffer, the error reader, and the connection together for the lifetime
//! of a [`crate::client::Client`].

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::buffer::{Handle, ReplayBuffer};
use crate::codec;
use crate::config::Config;
use crate::connection::Connection;
use crate::error::{EncodingError, TransportError};
use crate::error_reader;
use crate::notification::{Notification, NotificationResult};

/// Emitted by the error reader: either a structured protocol rejection or a
/// transport-level failure.
#[derive(Debug)]
pub enum SessionEvent {
    ProtocolError(crate::error::ProtocolError),
    TransportError(TransportError),
}

/// Runs the send/recover loop for the lifetime of the client, or until
/// `shutdown` fires. Generic over [`Connection`] so tests can swap in an
/// in-memory double.
pub async fn run<C: Connection>(
    config: Config,
    resubmit: mpsc::Sender<Notification>,
    mut submissions: mpsc::Receiver<Notification>,
    failures: mpsc::Sender<NotificationResult>,
    encoding_failures: mpsc::Sender<(Notification, EncodingError)>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut buffer = ReplayBuffer::new(config.buffer_capacity);
    let mut cursor: Option<Handle> = None;
    let mut id_counter: u32 = 1;

    'outer: loop {
        let connection = match connect_with_backoff::<C>(&config, &mut shutdown).await {
            Some(connection) => connection,
            None => break 'outer, // shutdown fired while reconnecting
        };

        let span = info_span!("apns_session");
        let _entered = span.enter();
        info!("connected to apns gateway");

        let (read_half, mut write_half) = connection.split();
        let (event_tx, mut event_rx) = mpsc::channel(1);
        let reader_task = tokio::spawn(error_reader::run(read_half, event_tx).in_current_span());

        // Replay the tail from the cursor by re-posting onto the shared
        // submission channel, concurrently with the inner loop below, so
        // replay never blocks newly arriving submissions.
        if let Some(start) = cursor {
            let pending: Vec<Notification> = buffer.iter_from(start).cloned().collect();
            debug!(count = pending.len(), "replaying notifications after reconnect");
            let resubmit = resubmit.clone();
            tokio::spawn(async move {
                for notification in pending {
                    if resubmit.send(notification).await.is_err() {
                        break;
                    }
                }
            });
        }

        drop(_entered);

        let should_reconnect = inner_loop(
            &mut write_half,
            &mut buffer,
            &mut cursor,
            &mut id_counter,
            &mut submissions,
            &mut event_rx,
            &failures,
            &encoding_failures,
            &mut shutdown,
        )
        .instrument(span.clone())
        .await;

        reader_task.abort();
        let _ = write_half.shutdown().await;

        if !should_reconnect {
            break 'outer;
        }
    }
}

/// Retries `connect` with a fixed backoff until it succeeds or `shutdown` fires.
async fn connect_with_backoff<C: Connection>(
    config: &Config,
    shutdown: &mut oneshot::Receiver<()>,
) -> Option<C> {
    loop {
        tokio::select! {
            result = C::connect(config) => {
                match result {
                    Ok(connection) => return Some(connection),
                    Err(err) => {
                        warn!(error = %err, "failed to connect to apns gateway, retrying");
                        tokio::select! {
                            _ = tokio::time::sleep(config.connect_backoff) => {}
                            _ = &mut *shutdown => return None,
                        }
                    }
                }
            }
            _ = &mut *shutdown => return None,
        }
    }
}

/// One connection's worth of the inner loop. Returns
/// whether the outer loop should reconnect (`true`) or the session should
/// end entirely (`false`, only on shutdown).
#[allow(clippy::too_many_arguments)]
async fn inner_loop<W: AsyncWriteExt + Unpin>(
    write_half: &mut W,
    buffer: &mut ReplayBuffer,
    cursor: &mut Option<Handle>,
    id_counter: &mut u32,
    submissions: &mut mpsc::Receiver<Notification>,
    events: &mut mpsc::Receiver<SessionEvent>,
    failures: &mpsc::Sender<NotificationResult>,
    encoding_failures: &mpsc::Sender<(Notification, EncodingError)>,
    shutdown: &mut oneshot::Receiver<()>,
) -> bool {
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(SessionEvent::ProtocolError(error)) => {
                        if let Some(handle) = buffer.find_by_id(error.id) {
                            if let Some(notification) = buffer.get(handle).cloned() {
                                let _ = failures.try_send(NotificationResult { notification, error });
                            }
                            *cursor = buffer.next(handle);
                            buffer.remove(handle);
                        } else {
                            warn!(id = error.id, "apns reported an identifier outside the replay window");
                            *cursor = None;
                        }
                        return true;
                    }
                    Some(SessionEvent::TransportError(error)) => {
                        warn!(was_eof = error.was_eof(), "lost connection to apns gateway");
                        // cursor already tracks the oldest unacknowledged entry, since
                        // it only ever advances on an explicit protocol-error ack; the
                        // whole remaining buffer replays from there.
                        return true;
                    }
                    None => {
                        // The error reader task died without sending (e.g. it was
                        // aborted elsewhere); treat like any other transport loss.
                        return true;
                    }
                }
            }
            submission = submissions.recv() => {
                match submission {
                    Some(mut notification) => {
                        if notification.id == 0 {
                            notification.id = *id_counter;
                            *id_counter = id_counter.wrapping_add(1);
                        } else if notification.id >= *id_counter {
                            *id_counter = notification.id.wrapping_add(1);
                        }

                        let handle = buffer.add(notification.clone());

                        // cursor only ever advances on a protocol-error ack (the
                        // entries before a rejected id are the only ones the gateway
                        // ever confirms). It is set here the first time there is
                        // anything unacknowledged, and repaired if the entry it
                        // pointed at aged out of the bounded window by eviction.
                        match *cursor {
                            None => *cursor = Some(handle),
                            Some(c) if buffer.get(c).is_none() => *cursor = buffer.front(),
                            _ => {}
                        }

                        let encoded = match codec::encode(&notification) {
                            Ok(encoded) => encoded,
                            Err(err) => {
                                if *cursor == Some(handle) {
                                    *cursor = None;
                                }
                                buffer.remove(handle);
                                let _ = encoding_failures.try_send((notification, err));
                                continue;
                            }
                        };

                        if let Err(io_err) = write_half.write_all(&encoded).await {
                            warn!(error = %io_err, "write to apns gateway failed");
                            // The entry (and everything before it still unacknowledged)
                            // stays in the buffer at `cursor` and will be replayed once
                            // reconnected.
                            return true;
                        }
                    }
                    None => {
                        // Every sender (the client and our own resubmit clone)
                        // has been dropped; nothing left to send, ever.
                        return false;
                    }
                }
            }
            _ = &mut *shutdown => {
                info!("shutdown requested, ending apns session");
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{Error as IoError, ErrorKind};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};

    use crate::codec;
    use crate::config::{Config, TlsCredentials};
    use crate::error::ErrorStatus;
    use crate::notification::Notification;

    use super::*;

    tokio::task_local! {
        static SCRIPTED: Arc<Mutex<VecDeque<DuplexStream>>>;
    }

    /// A [`Connection`] double backed by pre-scripted [`tokio::io::duplex`]
    /// pairs, one per reconnect, so a test can drive the server side of each
    /// connection attempt directly.
    struct ScriptedConnection(DuplexStream);

    #[async_trait]
    impl Connection for ScriptedConnection {
        type ReadHalf = ReadHalf<DuplexStream>;
        type WriteHalf = WriteHalf<DuplexStream>;

        async fn connect(_config: &Config) -> Result<Self, TransportError> {
            let next = SCRIPTED.with(|queue| queue.lock().unwrap().pop_front());
            match next {
                Some(stream) => Ok(Self(stream)),
                None => Err(TransportError::Connect(IoError::new(
                    ErrorKind::ConnectionRefused,
                    "no scripted connection queued",
                ))),
            }
        }

        fn split(self) -> (Self::ReadHalf, Self::WriteHalf) {
            tokio::io::split(self.0)
        }
    }

    fn test_config() -> Config {
        Config::new(("localhost", 0), TlsCredentials::Pem { cert: Vec::new(), key: Vec::new() })
            .with_buffer_capacity(4)
            .with_connect_backoff(Duration::from_millis(1))
    }

    fn notification(id: u32) -> Notification {
        Notification::new([9u8; 32], b"{}".to_vec()).with_id(id)
    }

    fn error_frame(id: u32, status: u8) -> [u8; codec::ERROR_FRAME_LEN] {
        let id_bytes = id.to_be_bytes();
        [codec::error_command_byte(), status, id_bytes[0], id_bytes[1], id_bytes[2], id_bytes[3]]
    }

    async fn read_enhanced_frame(server: &mut DuplexStream) -> (u32, Vec<u8>) {
        let mut header = [0u8; 1 + 4 + 4 + 2];
        server.read_exact(&mut header).await.unwrap();
        let id = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        let mut token = [0u8; 32];
        server.read_exact(&mut token).await.unwrap();
        let mut payload_len = [0u8; 2];
        server.read_exact(&mut payload_len).await.unwrap();
        let mut payload = vec![0u8; u16::from_be_bytes(payload_len) as usize];
        server.read_exact(&mut payload).await.unwrap();
        (id, payload)
    }

    async fn run_scripted<F, Fut>(servers: Vec<DuplexStream>, body: F)
    where
        F: FnOnce(
            mpsc::Sender<Notification>,
            mpsc::Receiver<NotificationResult>,
            mpsc::Receiver<(Notification, EncodingError)>,
            oneshot::Sender<()>,
        ) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        let queue = Arc::new(Mutex::new(VecDeque::from(servers)));
        let (submission_tx, submission_rx) = mpsc::channel(1);
        let (failures_tx, failures_rx) = mpsc::channel(8);
        let (encoding_tx, encoding_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let resubmit = submission_tx.clone();

        let driver = SCRIPTED.scope(
            queue,
            run::<ScriptedConnection>(test_config(), resubmit, submission_rx, failures_tx, encoding_tx, shutdown_rx),
        );

        tokio::select! {
            _ = driver => {}
            _ = body(submission_tx, failures_rx, encoding_rx, shutdown_tx) => {}
        }
    }

    #[tokio::test]
    async fn happy_path_delivers_without_replay() {
        let (client_side, mut server_side) = duplex(4096);
        run_scripted(vec![client_side], |submissions, _failures, _encoding, shutdown| async move {
            submissions.send(notification(0)).await.unwrap();
            let (id, _payload) = read_enhanced_frame(&mut server_side).await;
            assert_eq!(id, 1, "an unset identifier is assigned starting from 1");
            let _ = shutdown.send(());
        })
        .await;
    }

    #[tokio::test]
    async fn preset_identifier_is_honored_and_advances_counter() {
        let (client_side, mut server_side) = duplex(4096);
        run_scripted(vec![client_side], |submissions, _failures, _encoding, shutdown| async move {
            submissions.send(notification(100)).await.unwrap();
            let (first_id, _) = read_enhanced_frame(&mut server_side).await;
            assert_eq!(first_id, 100);

            submissions.send(notification(0)).await.unwrap();
            let (second_id, _) = read_enhanced_frame(&mut server_side).await;
            assert_eq!(second_id, 101, "auto-assignment resumes above a caller-preset id");

            let _ = shutdown.send(());
        })
        .await;
    }

    #[tokio::test]
    async fn rejection_reports_failure_and_replays_only_the_tail() {
        let (client_a, mut server_a) = duplex(4096);
        let (client_b, mut server_b) = duplex(4096);

        run_scripted(vec![client_a, client_b], |submissions, mut failures, _encoding, shutdown| async move {
            submissions.send(notification(1)).await.unwrap();
            submissions.send(notification(2)).await.unwrap();
            submissions.send(notification(3)).await.unwrap();

            read_enhanced_frame(&mut server_a).await;
            read_enhanced_frame(&mut server_a).await;
            read_enhanced_frame(&mut server_a).await;

            // Reject id 2 and close; id 1 is implicitly acknowledged by
            // preceding the rejected one, id 3 must replay.
            server_a.write_all(&error_frame(2, ErrorStatus::InvalidToken.into())).await.unwrap();
            drop(server_a);

            let result = failures.recv().await.unwrap();
            assert_eq!(result.notification.id, 2);
            assert_eq!(result.error.status, ErrorStatus::InvalidToken);

            let (replayed_id, _) = read_enhanced_frame(&mut server_b).await;
            assert_eq!(replayed_id, 3, "only the tail after the rejected id replays");

            let _ = shutdown.send(());
        })
        .await;
    }

    #[tokio::test]
    async fn transport_drop_replays_the_unacknowledged_entry() {
        let (client_a, mut server_a) = duplex(4096);
        let (client_b, mut server_b) = duplex(4096);

        // APNS never acknowledges a successful write; a notification that
        // was written and then lost to a bare disconnect (no protocol error
        // naming it) must be replayed on reconnect, even at the cost of a
        // possible duplicate delivery.
        run_scripted(vec![client_a, client_b], |submissions, _failures, _encoding, shutdown| async move {
            submissions.send(notification(1)).await.unwrap();
            read_enhanced_frame(&mut server_a).await;

            drop(server_a);

            let (id, _) = read_enhanced_frame(&mut server_b).await;
            assert_eq!(id, 1, "an unacknowledged entry is replayed after a bare transport loss");

            let _ = shutdown.send(());
        })
        .await;
    }

    #[tokio::test]
    async fn burst_beyond_capacity_evicts_oldest_without_losing_new_sends() {
        let (client_side, mut server_side) = duplex(8192);
        run_scripted(vec![client_side], |submissions, _failures, _encoding, shutdown| async move {
            for id in 1..=6u32 {
                submissions.send(notification(id)).await.unwrap();
            }
            let mut seen = Vec::new();
            for _ in 0..6 {
                let (id, _) = read_enhanced_frame(&mut server_side).await;
                seen.push(id);
            }
            assert_eq!(seen, vec![1, 2, 3, 4, 5, 6], "eviction bounds the buffer, not the wire order");
            let _ = shutdown.send(());
        })
        .await;
    }
}
