//! Test doubles and common utilities for contract tests
//!
//! Helpers for temporary hosts directories, a minimal UDP DNS client and
//! event recorders.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use joyride_core::events::{Event, SystemPayload};
use joyride_core::EventPublisher;
use tempfile::TempDir;
use tokio::net::UdpSocket;

/// A temporary directory holding hosts files
pub struct HostsDir {
    dir: TempDir,
}

impl HostsDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a subdirectory that does not exist yet
    pub fn missing_subdir(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) {
        std::fs::write(self.dir.path().join(name), content).expect("write hosts file");
    }

    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.dir.path().join(name)).expect("remove hosts file");
    }
}

/// Build an A (or other) query for `name`
pub fn build_query(id: u16, name: &str, record_type: RecordType) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true);

    let mut query = Query::new();
    query.set_name(Name::from_str(name).expect("valid name"));
    query.set_query_type(record_type);
    message.add_query(query);
    message
}

/// Send `request` to `server` and wait up to two seconds for the reply
pub async fn exchange(server: SocketAddr, request: &Message) -> Option<Message> {
    let bytes = request.to_bytes().expect("encode query");
    exchange_raw(server, &bytes).await
}

/// Send raw bytes to `server` and wait up to two seconds for a reply
pub async fn exchange_raw(server: SocketAddr, bytes: &[u8]) -> Option<Message> {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind client");
    socket.send_to(bytes, server).await.expect("send query");

    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .ok()?
        .ok()?;
    Some(Message::from_bytes(&buf[..len]).expect("decode response"))
}

/// Resolve `name` over UDP and return the A addresses and TTLs
pub async fn resolve_a(server: SocketAddr, name: &str) -> Vec<(Ipv4Addr, u32)> {
    let response = exchange(server, &build_query(7, name, RecordType::A))
        .await
        .expect("responder replied");
    response
        .answers()
        .iter()
        .filter_map(|r| r.data().as_a().map(|a| (a.0, r.ttl())))
        .collect()
}

/// Publisher that stores every event it is handed
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type().to_string())
            .collect()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: &Event) -> usize {
        self.events.lock().unwrap().push(event.clone());
        1
    }
}

/// Counts how many events it receives
#[derive(Clone, Default)]
pub struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Handler closure sharing this counter
    pub fn handler(&self) -> impl Fn(&Event) -> anyhow::Result<()> + Send + Sync + use<> {
        let count = self.count.clone();
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

/// A valid system event of the given type
pub fn system_event(event_type: &str, source: &str) -> Event {
    Event::new(event_type, source, SystemPayload::new("test", "op", "ok")).expect("valid event")
}
