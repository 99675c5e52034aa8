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

use std::io;

use thiserror::Error;

/// The status code carried by an APNS error frame.
///
/// APNS defines the 1..=10 range; `255` is the documented "shutdown" sentinel.
/// Any other byte is preserved as [`ErrorStatus::Unknown`] rather than discarded,
/// since a future gateway revision may start using it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorStatus {
    NoErrors,
    ProcessingError,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Shutdown,
    Unknown(u8),
}

impl From<u8> for ErrorStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::NoErrors,
            1 => Self::ProcessingError,
            2 => Self::MissingDeviceToken,
            3 => Self::MissingTopic,
            4 => Self::MissingPayload,
            5 => Self::InvalidTokenSize,
            6 => Self::InvalidTopicSize,
            7 => Self::InvalidPayloadSize,
            8 => Self::InvalidToken,
            10 => Self::Shutdown,
            other => Self::Unknown(other),
        }
    }
}

impl From<ErrorStatus> for u8 {
    fn from(status: ErrorStatus) -> Self {
        match status {
            ErrorStatus::NoErrors => 0,
            ErrorStatus::ProcessingError => 1,
            ErrorStatus::MissingDeviceToken => 2,
            ErrorStatus::MissingTopic => 3,
            ErrorStatus::MissingPayload => 4,
            ErrorStatus::InvalidTokenSize => 5,
            ErrorStatus::InvalidTopicSize => 6,
            ErrorStatus::InvalidPayloadSize => 7,
            ErrorStatus::InvalidToken => 8,
            ErrorStatus::Shutdown => 10,
            ErrorStatus::Unknown(code) => code,
        }
    }
}

/// A structured APNS error frame: the gateway identifying a previously-sent
/// notification as rejected, just before it closes the stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("apns rejected notification {id} ({status:?})")]
pub struct ProtocolError {
    pub status: ErrorStatus,
    pub id: u32,
}

/// Any failure of the underlying byte stream: a failed dial, a failed TLS
/// handshake, a short read, an EOF, or a write error.
///
/// [`TransportError::was_eof`] exists purely for logging; every variant is
/// fatal to the current session regardless of its value.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to apns gateway: {0}")]
    Connect(#[source] io::Error),

    #[error("tls handshake failed: {0}")]
    Handshake(#[source] io::Error),

    #[error("connection closed by peer before 6 error-frame bytes were read")]
    ShortRead,

    #[error("i/o error on apns connection: {0}")]
    Io(#[source] io::Error),
}

impl TransportError {
    /// Whether the underlying failure was an orderly EOF rather than some
    /// other I/O error. Logging detail only; see module docs.
    pub fn was_eof(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof)
            || matches!(self, Self::ShortRead)
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// A submission that could not be framed for the wire, e.g. an oversized payload.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("payload of {0} bytes exceeds the legacy apns limit of {1} bytes")]
    PayloadTooLarge(usize, usize),
}

/// Errors surfaced synchronously from [`crate::client::Client`] construction:
/// malformed credentials, bad PEM, or an unreachable filesystem path. Nothing
/// the send/recover loop encounters after the client is built ever takes this
/// shape — those failures arrive on the failures channel instead.
#[derive(Debug, Error)]
pub enum ApnsError {
    #[error("failed to read TLS credential file {path}: {source}")]
    ReadCredentials { path: String, #[source] source: io::Error },

    #[error("no valid certificate found in the supplied PEM data")]
    NoCertificate,

    #[error("no valid private key found in the supplied PEM data")]
    NoPrivateKey,

    #[error("invalid TLS configuration: {0}")]
    Tls(#[from] rustls::Error),
}
