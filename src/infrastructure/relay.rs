//! Network Input Relay
//!
//! TCP input source: clients stream newline-delimited JSON and every
//! `input` message becomes the newest [`InputSnapshot`] on a watch channel.
//!
//! ```text
//! → {"type":"handshake"}
//! ← {"status":"ok","message":"Connected successfully"}
//! → {"type":"input","buttons":{"A":true},"sticks":{"LX":0.5},"triggers":{"R":1.0},"dpad":"UP"}
//! ```
//!
//! Sections are optional. Unknown button and axis names are ignored, an
//! unknown d-pad name is neutral. Lines longer than the configured limit
//! close the connection; malformed JSON is skipped.

use crate::domain::models::{Button, ButtonSet, DPad, InputSnapshot, Stick};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InputMessage {
    #[serde(default)]
    pub buttons: HashMap<String, bool>,
    #[serde(default)]
    pub sticks: HashMap<String, f32>,
    #[serde(default)]
    pub triggers: HashMap<String, f32>,
    #[serde(default)]
    pub dpad: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    Handshake,
    Input(InputMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandshakeReply {
    pub status: &'static str,
    pub message: &'static str,
}

const HANDSHAKE_OK: HandshakeReply = HandshakeReply {
    status: "ok",
    message: "Connected successfully",
};

impl InputMessage {
    pub fn to_snapshot(&self) -> InputSnapshot {
        let buttons: ButtonSet = self
            .buttons
            .iter()
            .filter(|(_, pressed)| **pressed)
            .filter_map(|(name, _)| name.parse::<Button>().ok())
            .collect();

        let axis = |name: &str| self.sticks.get(name).copied().unwrap_or(0.0);
        let trigger = |name: &str| self.triggers.get(name).copied().unwrap_or(0.0);

        InputSnapshot {
            buttons,
            left_stick: Stick::new(axis("LX"), axis("LY")),
            right_stick: Stick::new(axis("RX"), axis("RY")),
            left_trigger: trigger("L"),
            right_trigger: trigger("R"),
            dpad: self
                .dpad
                .as_deref()
                .and_then(|d| d.parse::<DPad>().ok())
                .unwrap_or(DPad::Neutral),
        }
    }
}

pub struct RelayServer {
    listener: TcpListener,
    max_line_bytes: usize,
}

impl RelayServer {
    pub async fn bind(address: &str, max_line_bytes: usize) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind input relay on {}", address))?;
        info!("Input relay listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            max_line_bytes,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients forever, publishing their snapshots to `snapshots`.
    pub async fn run(self, snapshots: watch::Sender<InputSnapshot>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    info!("Relay client connected: {}", peer);
                    let snapshots = snapshots.clone();
                    let max_line_bytes = self.max_line_bytes;
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, max_line_bytes, &snapshots).await {
                            warn!("Relay client {} error: {}", peer, e);
                        }
                        // Release everything the client was holding.
                        snapshots.send_replace(InputSnapshot::default());
                        info!("Relay client disconnected: {}", peer);
                    });
                }
                Err(e) => error!("Relay accept failed: {}", e),
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    max_line_bytes: usize,
    snapshots: &watch::Sender<InputSnapshot>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = Vec::new();

    loop {
        line.clear();
        let limit = max_line_bytes as u64 + 1;
        let n = (&mut reader).take(limit).read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(());
        }
        if line.last() != Some(&b'\n') && line.len() > max_line_bytes {
            anyhow::bail!("line exceeds {} bytes", max_line_bytes);
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match serde_json::from_str::<RelayMessage>(text) {
            Ok(RelayMessage::Handshake) => {
                let reply = serde_json::to_string(&HANDSHAKE_OK)? + "\n";
                write_half.write_all(reply.as_bytes()).await?;
                debug!("Relay handshake complete");
            }
            Ok(RelayMessage::Input(input)) => {
                let snapshot = input.to_snapshot();
                trace!(?snapshot, "Relay input");
                snapshots.send_replace(snapshot);
            }
            Err(e) => warn!("Invalid relay message {:?}: {}", text, e),
        }
    }
}
