//! Bridge Link Module
//!
//! Owns the local socket to the platform bridge: one writer thread draining
//! an outbox and one reader thread dispatching replies and events.
//!
//! The outbox keeps control commands in a FIFO but holds at most one pending
//! notification. A newer report replaces one the writer has not reached yet.
//! Control commands are encoded before they are queued, so every line in the
//! FIFO has exactly one waiting reply sender in `pending`.

use crate::domain::error::TransportError;
use crate::domain::transport::{CharacteristicId, TransportEvent};
use crate::infrastructure::bluetooth::protocol::{self, BridgeCommand, BridgeMessage};
use anyhow::{Context, Result};
use interprocess::local_socket::{
    traits::Stream as _, GenericNamespaced, Stream as LocalStream, ToNsName,
};
use interprocess::TryClone;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, trace, warn};

type Reply = oneshot::Sender<Result<(), TransportError>>;

#[derive(Default)]
struct OutboxState {
    control: VecDeque<String>,
    report: Option<(CharacteristicId, Vec<u8>)>,
    closed: bool,
}

enum Outgoing {
    Control(String),
    Report(CharacteristicId, Vec<u8>),
}

#[derive(Default)]
struct Outbox {
    state: Mutex<OutboxState>,
    ready: Condvar,
}

impl Outbox {
    fn lock(&self) -> MutexGuard<'_, OutboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Block until something is ready to write. `None` once closed.
    fn next(&self) -> Option<Outgoing> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(line) = state.control.pop_front() {
                return Some(Outgoing::Control(line));
            }
            if let Some((characteristic, value)) = state.report.take() {
                return Some(Outgoing::Report(characteristic, value));
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Shared between the link handle and its I/O threads.
struct Shared {
    outbox: Outbox,
    pending: Mutex<VecDeque<Reply>>,
    alive: AtomicBool,
    superseded_reports: AtomicU64,
}

impl Shared {
    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<Reply>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears `alive` before draining `pending`, so a request that sees the
    /// link alive under the `pending` lock is always drained or answered.
    fn shut_down(&self, reason: &str) {
        if self.alive.swap(false, Ordering::SeqCst) {
            warn!("Bridge link closed: {}", reason);
        }
        self.outbox.close();
        for reply in self.lock_pending().drain(..) {
            let _ = reply.send(Err(TransportError::Unavailable(reason.to_string())));
        }
    }
}

/// Connection to the platform bridge daemon.
pub struct BridgeLink {
    shared: Arc<Shared>,
    command_timeout: Duration,
}

impl BridgeLink {
    /// Connect to the bridge listening on `socket_name` and start the I/O
    /// threads. Transport events are forwarded to `events`.
    pub fn connect(
        socket_name: &str,
        command_timeout: Duration,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let name = socket_name.to_ns_name::<GenericNamespaced>()?;
        let stream = LocalStream::connect(name)
            .with_context(|| format!("Failed to connect to bluetooth bridge '{}'", socket_name))?;
        let reader = stream.try_clone()?;
        info!("Connected to bluetooth bridge '{}'", socket_name);

        let shared = Arc::new(Shared {
            outbox: Outbox::default(),
            pending: Mutex::new(VecDeque::new()),
            alive: AtomicBool::new(true),
            superseded_reports: AtomicU64::new(0),
        });

        let writer_shared = shared.clone();
        std::thread::Builder::new()
            .name("bridge-writer".to_string())
            .spawn(move || write_loop(stream, &writer_shared))?;

        let reader_shared = shared.clone();
        std::thread::Builder::new()
            .name("bridge-reader".to_string())
            .spawn(move || read_loop(reader, &reader_shared, &events))?;

        Ok(Self {
            shared,
            command_timeout,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    /// Reports replaced in the outbox before they were written.
    pub fn superseded_reports(&self) -> u64 {
        self.shared.superseded_reports.load(Ordering::Relaxed)
    }

    /// Send a control command and wait for its reply.
    pub async fn request(&self, command: BridgeCommand) -> Result<(), TransportError> {
        debug!(?command, "Bridge request");
        let line = protocol::encode_line(&command)
            .map_err(|e| TransportError::Rejected(format!("unencodable command: {}", e)))?;

        let (tx, rx) = oneshot::channel();
        {
            // Reply order follows command order: enqueue both under one lock.
            let mut pending = self.shared.lock_pending();
            if !self.is_alive() {
                return Err(TransportError::Unavailable(
                    "bridge link closed".to_string(),
                ));
            }
            pending.push_back(tx);
            self.shared.outbox.lock().control.push_back(line);
        }
        self.shared.outbox.ready.notify_one();

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Unavailable(
                "bridge link closed".to_string(),
            )),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Queue a notification, replacing any report not yet written.
    pub fn push_report(
        &self,
        characteristic: CharacteristicId,
        value: &[u8],
    ) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Unavailable(
                "bridge link closed".to_string(),
            ));
        }

        let replaced = self
            .shared
            .outbox
            .lock()
            .report
            .replace((characteristic, value.to_vec()))
            .is_some();
        if replaced {
            self.shared
                .superseded_reports
                .fetch_add(1, Ordering::Relaxed);
            trace!("Superseded unsent report");
        }
        self.shared.outbox.ready.notify_one();
        Ok(())
    }
}

impl Drop for BridgeLink {
    fn drop(&mut self) {
        self.shared.outbox.close();
    }
}

fn write_loop(mut stream: LocalStream, shared: &Shared) {
    while let Some(outgoing) = shared.outbox.next() {
        let line = match outgoing {
            Outgoing::Control(line) => line,
            Outgoing::Report(characteristic, value) => {
                // No reply is expected, so a lost report leaves `pending` intact.
                match protocol::encode_line(&BridgeCommand::Notify {
                    characteristic,
                    value,
                }) {
                    Ok(line) => line,
                    Err(e) => {
                        error!("Failed to encode report: {}", e);
                        continue;
                    }
                }
            }
        };
        if let Err(e) = stream
            .write_all(line.as_bytes())
            .and_then(|_| stream.flush())
        {
            shared.shut_down(&format!("write failed: {}", e));
            return;
        }
    }
    debug!("Bridge writer finished");
}

fn read_loop(stream: LocalStream, shared: &Shared, events: &mpsc::UnboundedSender<TransportEvent>) {
    let mut reader = BufReader::new(stream);
    let mut buffer = String::new();

    loop {
        buffer.clear();
        match reader.read_line(&mut buffer) {
            Ok(0) => {
                shared.shut_down("bridge closed the connection");
                return;
            }
            Ok(_) => match protocol::parse_message(&buffer) {
                Ok(BridgeMessage::Event { event }) => {
                    trace!(?event, "Bridge event");
                    let _ = events.send(event);
                }
                Ok(reply) => {
                    let result = reply.into_reply().unwrap_or(Ok(()));
                    match shared.lock_pending().pop_front() {
                        // A timed-out caller has gone away; its reply is dropped.
                        Some(tx) => {
                            let _ = tx.send(result);
                        }
                        None => warn!("Unsolicited bridge reply: {:?}", result),
                    }
                }
                Err(e) => warn!("Invalid bridge message {:?}: {}", buffer.trim_end(), e),
            },
            Err(e) => {
                shared.shut_down(&format!("read failed: {}", e));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_link() -> BridgeLink {
        BridgeLink {
            shared: Arc::new(Shared {
                outbox: Outbox::default(),
                pending: Mutex::new(VecDeque::new()),
                alive: AtomicBool::new(true),
                superseded_reports: AtomicU64::new(0),
            }),
            command_timeout: Duration::from_secs(30),
        }
    }

    #[tokio::test]
    async fn request_after_shutdown_is_unavailable_without_waiting() {
        let link = detached_link();
        link.shared.shut_down("test");

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            link.request(BridgeCommand::Disconnect),
        )
        .await
        .expect("request must not wait for the command timeout");
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
        assert!(link.shared.lock_pending().is_empty());
    }

    #[tokio::test]
    async fn shutdown_fails_queued_request() {
        let link = Arc::new(detached_link());
        let caller = link.clone();
        let request = tokio::spawn(async move { caller.request(BridgeCommand::StopAdvertising).await });

        while link.shared.lock_pending().is_empty() {
            tokio::task::yield_now().await;
        }
        link.shared.shut_down("bridge closed the connection");

        let result = request.await.unwrap();
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }

    #[tokio::test]
    async fn queued_lines_match_pending_replies() {
        let link = Arc::new(detached_link());
        let mut requests = Vec::new();
        for (n, command) in [
            BridgeCommand::SetPairable { enabled: true },
            BridgeCommand::SetDiscoverable { enabled: true },
        ]
        .into_iter()
        .enumerate()
        {
            let caller = link.clone();
            requests.push(tokio::spawn(async move { caller.request(command).await }));
            while link.shared.lock_pending().len() <= n {
                tokio::task::yield_now().await;
            }
        }

        assert_eq!(link.shared.lock_pending().len(), 2);
        link.push_report(CharacteristicId::InputReport, &[1; 20]).unwrap();
        link.push_report(CharacteristicId::InputReport, &[2; 20]).unwrap();
        assert_eq!(link.superseded_reports(), 1);

        let mut lines = Vec::new();
        for _ in 0..3 {
            lines.push(match link.shared.outbox.next() {
                Some(Outgoing::Control(line)) => line,
                Some(Outgoing::Report(_, value)) => format!("report {}", value[0]),
                None => panic!("outbox closed"),
            });
        }
        assert!(lines[0].contains("set_pairable"));
        assert!(lines[1].contains("set_discoverable"));
        assert_eq!(lines[2], "report 2");

        // Replies resolve callers in command order.
        let replies: Vec<_> = link.shared.lock_pending().drain(..).collect();
        for (reply, result) in replies.into_iter().zip([
            Ok(()),
            Err(TransportError::Rejected("not pairable".to_string())),
        ]) {
            let _ = reply.send(result);
        }
        let mut results = Vec::new();
        for request in requests {
            results.push(request.await.unwrap());
        }
        assert_eq!(
            results,
            vec![
                Ok(()),
                Err(TransportError::Rejected("not pairable".to_string()))
            ]
        );
    }
}
