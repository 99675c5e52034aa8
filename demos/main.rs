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

//! Sends a single notification to the configured gateway and prints any
//! failures reported for it, then exits on Ctrl-C.

use apns_legacy_client::{Client, Config, Notification};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let (client, mut failures, mut encoding_failures) = Client::new(config)?;

    let device_token = [0x11u8; 32];
    client
        .send(Notification::new(device_token, br#"{"aps":{"alert":"hello"}}"#.to_vec()))
        .await;

    tokio::select! {
        Some(result) = failures.recv() => {
            tracing::error!(?result, "apns rejected a notification");
        }
        Some((notification, err)) = encoding_failures.recv() => {
            tracing::error!(id = notification.id, %err, "failed to encode a notification");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    client.shutdown();
    Ok(())
}
