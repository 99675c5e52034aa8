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

use std::time::SystemTime;

use crate::error::ProtocolError;

/// Delivery priority, as understood by the legacy binary protocol.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Priority {
    /// Send immediately (wakes a sleeping device for an alert/sound/badge).
    Immediate,
    /// Conserve battery; APNS may delay delivery.
    Conserve,
}

impl Priority {
    pub(crate) fn as_wire_byte(self) -> u8 {
        match self {
            Self::Immediate => 10,
            Self::Conserve => 5,
        }
    }
}

/// A single APNS notification.
///
/// `id` is the correlation handle the client uses to find this notification
/// again if APNS ever rejects it. Leave it `0` to have the core assign
/// one; callers that need to cross-reference their own request log may
/// preset it instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: u32,
    pub device_token: [u8; 32],
    pub payload: Vec<u8>,
    pub expiration: Option<SystemTime>,
    pub priority: Priority,
}

impl Notification {
    /// Creates a notification with an unassigned identifier (`0`), immediate
    /// priority, and no expiration — the common case for a one-shot alert.
    pub fn new(device_token: [u8; 32], payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: 0,
            device_token,
            payload: payload.into(),
            expiration: None,
            priority: Priority::Immediate,
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn with_expiration(mut self, expiration: SystemTime) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Delivered to a caller on [`crate::client::Client::failures`] when APNS
/// rejects a notification that was still within the replay window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationResult {
    pub notification: Notification,
    pub error: ProtocolError,
}
