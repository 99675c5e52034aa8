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

//! The APNS binary frame codec: `Notification -> bytes` and
//! `6 bytes -> ProtocolError`. Treated as an external contract by the
//! send/recover loop, but implemented concretely here so the crate is
//! runnable end to end without a caller-supplied codec.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};

use crate::error::{EncodingError, ErrorStatus, ProtocolError};
use crate::notification::Notification;

/// APNS caps the legacy binary payload at 2KB.
pub const MAX_PAYLOAD_BYTES: usize = 2048;

const COMMAND_ENHANCED: u8 = 1;
/// Length in bytes of an APNS error frame: command, status, identifier.
pub const ERROR_FRAME_LEN: usize = 6;
const ERROR_COMMAND: u8 = 8;

/// Frames `notification` as an APNS "enhanced" notification item, the only
/// variant from which a rejected identifier can later be recovered.
///
/// Layout: `command(1) | id(4 BE) | expiration(4 BE) | token_len(2 BE) |
/// token(32) | payload_len(2 BE) | payload`.
pub fn encode(notification: &Notification) -> Result<BytesMut, EncodingError> {
    if notification.payload.len() > MAX_PAYLOAD_BYTES {
        return Err(EncodingError::PayloadTooLarge(notification.payload.len(), MAX_PAYLOAD_BYTES));
    }

    let expiration = notification
        .expiration
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);

    let mut buf = BytesMut::with_capacity(1 + 4 + 4 + 2 + 32 + 2 + notification.payload.len());
    buf.put_u8(COMMAND_ENHANCED);
    buf.put_u32(notification.id);
    buf.put_u32(expiration);
    buf.put_u16(notification.device_token.len() as u16);
    buf.put_slice(&notification.device_token);
    buf.put_u16(notification.payload.len() as u16);
    buf.put_slice(&notification.payload);

    let _ = notification.priority.as_wire_byte(); // codec-visible metadata only; not part of this frame variant

    Ok(buf)
}

/// Parses a 6-byte APNS error frame. The caller (the error reader) is
/// responsible for reading exactly this many bytes first.
pub fn decode_error_frame(bytes: [u8; ERROR_FRAME_LEN]) -> ProtocolError {
    let status = ErrorStatus::from(bytes[1]);
    let id = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    ProtocolError { status, id }
}

/// Present for symmetry with [`decode_error_frame`] and used by tests
/// constructing synthetic error frames; real gateways always send `8`.
pub fn error_command_byte() -> u8 {
    ERROR_COMMAND
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(id: u32, payload: &[u8]) -> Notification {
        Notification::new([7u8; 32], payload.to_vec()).with_id(id)
    }

    #[test]
    fn encode_contains_identifier_verbatim() {
        let encoded = encode(&notification(42, b"{\"aps\":{}}")).unwrap();
        let id = u32::from_be_bytes([encoded[1], encoded[2], encoded[3], encoded[4]]);
        assert_eq!(id, 42);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let oversized = vec![0u8; MAX_PAYLOAD_BYTES + 1];
        let result = encode(&notification(1, &oversized));
        assert!(matches!(result, Err(EncodingError::PayloadTooLarge(_, _))));
    }

    #[test]
    fn encode_places_device_token_after_header() {
        let encoded = encode(&notification(1, b"{}")).unwrap();
        let token_len = u16::from_be_bytes([encoded[9], encoded[10]]);
        assert_eq!(token_len, 32);
        assert_eq!(&encoded[11..11 + 32], &[7u8; 32]);
    }

    #[test]
    fn decode_error_frame_reads_status_and_identifier() {
        let frame = [8, 8, 0x00, 0x00, 0x00, 0x2a];
        let error = decode_error_frame(frame);
        assert_eq!(error.status, ErrorStatus::InvalidToken);
        assert_eq!(error.id, 42);
    }

    #[test]
    fn decode_error_frame_preserves_unknown_status() {
        let frame = [8, 250, 0, 0, 0, 1];
        let error = decode_error_frame(frame);
        assert_eq!(error.status, ErrorStatus::Unknown(250));
    }
}
