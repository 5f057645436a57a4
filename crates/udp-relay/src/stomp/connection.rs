// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! STOMP broker connection.
//!
//! The forwarding engine is the only writer. Two helper tasks live as long
//! as the connection: one reads broker frames and watches the incoming
//! heart-beat deadline, the other writes outgoing heart-beats. Either marks
//! the connection dead, which fails the next send.

use super::frame::{self, Decoded, Frame, FrameDecoder};
use super::heartbeat::Heartbeat;
use super::{ProtocolError, StompError, CONNECT_TIMEOUT, MAX_FRAME_SIZE};
use crate::config::BrokerSettings;
use crate::forward::{BrokerConnection, Connector};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_CHUNK: usize = 4096;

/// Liveness flag shared with the helper tasks.
#[derive(Debug, Default)]
struct LinkState {
    dead: AtomicBool,
    reason: StdMutex<Option<String>>,
}

impl LinkState {
    fn mark_dead(&self, reason: impl Into<String>) {
        if !self.dead.swap(true, Ordering::AcqRel) {
            let reason = reason.into();
            debug!("STOMP connection marked dead: {}", reason);
            if let Ok(mut slot) = self.reason.lock() {
                *slot = Some(reason);
            }
        }
    }

    fn check(&self) -> Result<(), StompError> {
        if !self.dead.load(Ordering::Acquire) {
            return Ok(());
        }
        let reason = self
            .reason
            .lock()
            .ok()
            .and_then(|r| r.clone())
            .unwrap_or_else(|| "unknown".to_string());
        Err(StompError::Closed(reason))
    }
}

/// A live STOMP session.
#[derive(Debug)]
pub struct StompConnection {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    state: Arc<LinkState>,
    heartbeat: Heartbeat,
    server: Option<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl StompConnection {
    /// Connect and complete the `CONNECT`/`CONNECTED` handshake.
    pub async fn open(settings: &BrokerSettings) -> Result<Self, StompError> {
        let timeout_err = || StompError::Timeout(settings.uri.clone());

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&settings.uri))
            .await
            .map_err(|_| timeout_err())??;
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = stream.into_split();

        let host = settings
            .uri
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&settings.uri);
        let connect = Frame::new(frame::CONNECT)
            .header("accept-version", "1.0,1.1,1.2")
            .header("host", host)
            .header("login", settings.login.as_str())
            .header("passcode", settings.password.as_str())
            .header("heart-beat", Heartbeat::offer(&settings.heartbeat));
        writer.write_all(&connect.encode()).await?;
        writer.flush().await?;

        let mut decoder = FrameDecoder::new(MAX_FRAME_SIZE);
        let reply = tokio::time::timeout(CONNECT_TIMEOUT, read_frame(&mut reader, &mut decoder))
            .await
            .map_err(|_| timeout_err())??;

        match reply.command.as_str() {
            frame::CONNECTED => {}
            frame::ERROR => {
                let message = reply
                    .get("message")
                    .map(str::to_string)
                    .unwrap_or_else(|| String::from_utf8_lossy(&reply.body).into_owned());
                return Err(StompError::Rejected(message));
            }
            other => return Err(ProtocolError::UnexpectedFrame(other.to_string()).into()),
        }

        let heartbeat = Heartbeat::negotiate(&settings.heartbeat, reply.get("heart-beat"))?;
        let server = reply.get("server").map(str::to_string);

        let state = Arc::new(LinkState::default());
        let writer = Arc::new(Mutex::new(writer));
        let mut tasks = vec![tokio::spawn(read_loop(
            reader,
            decoder,
            heartbeat,
            state.clone(),
        ))];
        if !heartbeat.outgoing.is_zero() {
            tasks.push(tokio::spawn(heartbeat_loop(
                writer.clone(),
                heartbeat,
                state.clone(),
            )));
        }

        debug!(
            "connected to STOMP broker {} (server {:?}, heart-beat out {:?} in {:?})",
            settings.uri, server, heartbeat.outgoing, heartbeat.incoming
        );

        Ok(Self {
            writer,
            state,
            heartbeat,
            server,
            tasks,
        })
    }

    /// Negotiated heart-beat intervals.
    pub fn heartbeat(&self) -> Heartbeat {
        self.heartbeat
    }

    /// Broker `server` header, if any.
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Whether neither helper task has seen the link fail.
    pub fn is_alive(&self) -> bool {
        self.state.check().is_ok()
    }

    async fn write_frame(&self, frame: &Frame) -> Result<(), StompError> {
        let bytes = frame.encode();
        let mut writer = self.writer.lock().await;
        let result = async {
            writer.write_all(&bytes).await?;
            writer.flush().await
        }
        .await;
        if let Err(ref err) = result {
            self.state.mark_dead(format!("write failed: {}", err));
        }
        result.map_err(StompError::from)
    }
}

impl BrokerConnection for StompConnection {
    async fn send(
        &mut self,
        destination: &str,
        content_type: &str,
        body: &[u8],
    ) -> Result<(), StompError> {
        self.state.check()?;
        let frame = Frame::new(frame::SEND)
            .header("destination", destination)
            .header("content-type", content_type)
            .header("content-length", body.len().to_string())
            .body(body.to_vec());
        self.write_frame(&frame).await
    }

    async fn disconnect(self) {
        if self.state.check().is_ok() {
            if let Err(err) = self.write_frame(&Frame::new(frame::DISCONNECT)).await {
                debug!("DISCONNECT failed: {}", err);
            }
        }
        self.state.mark_dead("disconnected");
        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.shutdown().await {
            debug!("socket shutdown failed: {}", err);
        }
        // Helper tasks are aborted on drop
    }
}

impl Drop for StompConnection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Opens [`StompConnection`]s with fixed settings.
#[derive(Debug, Clone)]
pub struct StompConnector {
    settings: BrokerSettings,
}

impl StompConnector {
    pub fn new(settings: BrokerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }
}

impl Connector for StompConnector {
    type Connection = StompConnection;

    async fn connect(&self) -> Result<StompConnection, StompError> {
        StompConnection::open(&self.settings).await
    }
}

/// Read until one complete frame is decoded, skipping heart-beats.
async fn read_frame(
    reader: &mut OwnedReadHalf,
    decoder: &mut FrameDecoder,
) -> Result<Frame, StompError> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        while let Some(item) = decoder.next_item()? {
            if let Decoded::Frame(received) = item {
                return Ok(received);
            }
        }
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(StompError::Closed("broker closed the connection".into()));
        }
        decoder.push(&chunk[..n]);
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    mut decoder: FrameDecoder,
    heartbeat: Heartbeat,
    state: Arc<LinkState>,
) {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        loop {
            match decoder.next_item() {
                Ok(Some(Decoded::Heartbeat)) => {}
                Ok(Some(Decoded::Frame(received))) if received.command == frame::ERROR => {
                    let message = received.get("message").unwrap_or("no message").to_string();
                    warn!("STOMP broker error: {}", message);
                    state.mark_dead(format!("broker error: {}", message));
                    return;
                }
                Ok(Some(Decoded::Frame(received))) => {
                    debug!("ignoring STOMP {} frame", received.command);
                }
                Ok(None) => break,
                Err(err) => {
                    state.mark_dead(err.to_string());
                    return;
                }
            }
        }

        let read = reader.read(&mut chunk);
        let result = match heartbeat.incoming_deadline {
            Some(deadline) => match tokio::time::timeout(deadline, read).await {
                Ok(result) => result,
                Err(_) => {
                    state.mark_dead(format!("no heart-beat from broker within {:?}", deadline));
                    return;
                }
            },
            None => read.await,
        };

        match result {
            Ok(0) => {
                state.mark_dead("broker closed the connection");
                return;
            }
            Ok(n) => decoder.push(&chunk[..n]),
            Err(err) => {
                state.mark_dead(format!("read failed: {}", err));
                return;
            }
        }
    }
}

async fn heartbeat_loop(
    writer: Arc<Mutex<OwnedWriteHalf>>,
    heartbeat: Heartbeat,
    state: Arc<LinkState>,
) {
    let start = tokio::time::Instant::now() + heartbeat.outgoing;
    let mut ticker = tokio::time::interval_at(start, heartbeat.outgoing);
    loop {
        ticker.tick().await;
        if state.check().is_err() {
            return;
        }
        let mut writer = writer.lock().await;
        if let Err(err) = writer.write_all(b"\n").await {
            state.mark_dead(format!("heart-beat write failed: {}", err));
            return;
        }
    }
}
