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

//! The error reader: a one-shot task bound to a single connection's
//! read half, reading exactly one 6-byte error frame before it terminates.

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::trace;

use crate::codec;
use crate::error::TransportError;
use crate::session::SessionEvent;

/// Reads exactly one error frame (or fails trying) from `reader`, then sends
/// the outcome on `events` and returns. Never reused across connections —
/// the send/recover loop spawns a fresh one on every successful `connect`.
pub async fn run<R: AsyncReadExt + Unpin>(mut reader: R, events: mpsc::Sender<SessionEvent>) {
    let mut frame = [0u8; codec::ERROR_FRAME_LEN];

    let outcome = match reader.read_exact(&mut frame).await {
        Ok(_) => SessionEvent::ProtocolError(codec::decode_error_frame(frame)),
        Err(err) => {
            let transport_err = if err.kind() == std::io::ErrorKind::UnexpectedEof {
                TransportError::ShortRead
            } else {
                TransportError::Io(err)
            };
            SessionEvent::TransportError(transport_err)
        }
    };

    trace!("error reader terminating after a single frame");
    // Best-effort: if the loop already moved on to a new connection and
    // dropped this event channel, there is nothing left to deliver to.
    let _ = events.send(outcome).await;
}
