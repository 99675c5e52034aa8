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

//! A client for Apple's legacy binary Push Notification Service.
//!
//! The gateway accepts framed notifications over a long-lived TLS
//! connection and reports rejections asynchronously, after which it closes
//! the stream; any notification sent after the rejected one is considered
//! lost unless the client resends it. This crate keeps a bounded window of
//! recently sent notifications so it can replay that tail itself.
//!
//! [`Client`] is the entry point. It never initializes logging; binaries
//! embedding this crate are expected to set up their own `tracing`
//! subscriber (see `demos/main.rs` for an example).

mod buffer;
mod client;
mod codec;
mod config;
mod connection;
mod error;
mod error_reader;
mod notification;
mod session;

pub use buffer::Handle;
pub use client::{Client, EncodingFailures, Failures};
pub use codec::MAX_PAYLOAD_BYTES;
pub use config::{ClientTlsIdentity, Config, TlsCredentials, PRODUCTION_GATEWAY, SANDBOX_GATEWAY};
pub use connection::{Connection, TlsConnection};
pub use error::{ApnsError, EncodingError, ErrorStatus, ProtocolError, TransportError};
pub use notification::{Notification, NotificationResult, Priority};
