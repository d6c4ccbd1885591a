//! DNS UDP responder
//!
//! Answers A queries from the [`RecordStore`]. Each datagram is handled on
//! its own task; the receive loop only reads and dispatches.
//!
//! ## Answer rules
//!
//! - Only the first question is answered
//! - An A question for a known hostname gets one A answer with a 60s TTL
//! - Anything else gets an empty NOERROR response
//! - The response mirrors the request id and question section
//! - Unparseable datagrams are logged and dropped

use std::net::SocketAddr;
use std::sync::Arc;

use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinEncodable};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::lifecycle::{ServiceLifecycle, ServiceState};
use crate::config::DnsConfig;
use crate::error::{Error, Result};
use crate::store::{RecordStore, normalize_hostname};

/// TTL of every answer record
pub const ANSWER_TTL_SECS: u32 = 60;

/// Largest datagram we read
const MAX_DATAGRAM_SIZE: usize = 4096;

/// UDP DNS responder backed by a [`RecordStore`]
pub struct DnsResponder {
    config: DnsConfig,
    store: RecordStore,
    local_addr: Mutex<Option<SocketAddr>>,
    lifecycle: ServiceLifecycle,
}

impl DnsResponder {
    pub fn new(config: DnsConfig, store: RecordStore) -> Self {
        Self {
            config,
            store,
            local_addr: Mutex::new(None),
            lifecycle: ServiceLifecycle::new("dns_responder"),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.state()
    }

    /// Bound address while running
    ///
    /// Differs from the configured address when port 0 was requested.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Bind the socket and spawn the receive loop
    ///
    /// A bind failure is returned as [`Error::Bind`]. Calling `start` on a
    /// running responder logs a warning and does nothing.
    pub async fn start(&self) -> Result<()> {
        self.config.validate()?;

        let addr = self.config.listen_addr();
        let store = self.store.clone();
        let local_addr = &self.local_addr;

        self.lifecycle
            .start(|shutdown_rx| async move {
                let socket = UdpSocket::bind(addr)
                    .await
                    .map_err(|e| Error::bind(addr, e))?;
                let bound = socket.local_addr()?;
                *local_addr.lock() = Some(bound);

                info!(address = %bound, "DNS responder listening");
                Ok(tokio::spawn(serve(Arc::new(socket), store, shutdown_rx)))
            })
            .await?;
        Ok(())
    }

    /// Stop the receive loop and release the socket (idempotent)
    pub async fn stop(&self) {
        if self.lifecycle.stop().await {
            *self.local_addr.lock() = None;
            info!("DNS responder stopped");
        }
    }
}

async fn serve(socket: Arc<UdpSocket>, store: RecordStore, mut shutdown_rx: oneshot::Receiver<()>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("DNS responder received shutdown signal");
                break;
            }
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, peer)) => {
                    let datagram = buf[..len].to_vec();
                    let socket = socket.clone();
                    let store = store.clone();
                    in_flight.spawn(async move {
                        handle_datagram(&socket, &store, &datagram, peer).await;
                    });
                }
                Err(e) => warn!(error = %e, "Failed to receive datagram"),
            },
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
        }
    }

    while in_flight.join_next().await.is_some() {}
}

async fn handle_datagram(socket: &UdpSocket, store: &RecordStore, datagram: &[u8], peer: SocketAddr) {
    let request = match Message::from_bytes(datagram) {
        Ok(message) => message,
        Err(e) => {
            warn!(peer = %peer, error = %e, "Dropping malformed DNS datagram");
            return;
        }
    };

    let response = build_response(&request, store);
    let bytes = match response.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(peer = %peer, error = %e, "Failed to encode DNS response");
            return;
        }
    };

    if let Err(e) = socket.send_to(&bytes, peer).await {
        warn!(peer = %peer, error = %e, "Failed to send DNS response");
    }
}

/// Build the response to `request` from the current contents of `store`
pub fn build_response(request: &Message, store: &RecordStore) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_authoritative(true)
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_response_code(ResponseCode::NoError);

    for query in request.queries() {
        response.add_query(query.clone());
    }

    let Some(query) = request.queries().first() else {
        debug!(id = request.id(), "DNS request has no question");
        return response;
    };

    let hostname = normalize_hostname(&query.name().to_ascii());
    if query.query_type() != RecordType::A {
        debug!(hostname = %hostname, qtype = %query.query_type(), "Unsupported query type");
        return response;
    }

    match store.get(&hostname) {
        Some(address) => {
            debug!(hostname = %hostname, address = %address, "Resolved");
            response.add_answer(Record::from_rdata(
                query.name().clone(),
                ANSWER_TTL_SECS,
                RData::A(A(address)),
            ));
        }
        None => debug!(hostname = %hostname, "No record"),
    }

    response
}
