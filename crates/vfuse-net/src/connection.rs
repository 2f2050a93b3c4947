//! Lifecycle of the one connection a relay filesystem talks over.
//!
//! The connection is established lazily by the first call. The provider is
//! handed to a background task exactly once, so a caller that gives up while
//! the peer is still connecting does not lose it. Once connected, a single
//! read loop owns the read half and routes every response through the
//! [`CorrelationRegistry`]. The first read error or protocol desync ends
//! the connection for good: every waiter is woken with an error and later
//! calls fail fast. There is no reconnect.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};
use vfuse_proto::{Body, Call};

use crate::error::NetError;
use crate::provider::{BoxedStream, ConnectionProvider};
use crate::registry::CorrelationRegistry;
use crate::transport::{PacketReader, PacketWriter};

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Unconnected => "unconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Clone)]
enum Failure {
    /// The stream ended or was torn down after being established.
    Closed,
    /// The provider could not produce a stream.
    Connect(Arc<str>),
}

impl Failure {
    fn to_error(&self) -> NetError {
        match self {
            Failure::Closed => NetError::ConnectionClosed,
            Failure::Connect(msg) => NetError::ConnectionFailed(msg.to_string()),
        }
    }
}

enum Slot {
    Unconnected(Box<dyn ConnectionProvider>),
    Connecting,
    Connected(Arc<Link>),
    Failed(Failure),
}

impl Slot {
    fn state(&self) -> ConnectionState {
        match self {
            Slot::Unconnected(_) => ConnectionState::Unconnected,
            Slot::Connecting => ConnectionState::Connecting,
            Slot::Connected(_) => ConnectionState::Connected,
            Slot::Failed(_) => ConnectionState::Failed,
        }
    }
}

/// An established stream: the shared write half plus the read loop task.
struct Link {
    writer: PacketWriter<WriteHalf<BoxedStream>>,
    reader: JoinHandle<()>,
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

struct Shared {
    slot: Mutex<Slot>,
    /// Mirrors `slot`; only ever updated while `slot` is locked.
    state: watch::Sender<ConnectionState>,
    registry: Arc<CorrelationRegistry>,
}

impl Shared {
    /// Terminal transition. Closes the registry so waiters wake up.
    fn fail(&self, failure: Failure) {
        let old = {
            let mut slot = self.slot.lock();
            if matches!(*slot, Slot::Failed(_)) {
                return;
            }
            self.state.send_replace(ConnectionState::Failed);
            std::mem::replace(&mut *slot, Slot::Failed(failure))
        };
        let woken = self.registry.close();
        if woken > 0 {
            warn!(woken, "failed in-flight requests on connection loss");
        }
        drop(old);
    }
}

/// Handle to the relay connection. Clones share the same stream.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
    request_timeout: Option<Duration>,
}

impl Connection {
    pub fn new(provider: impl ConnectionProvider) -> Self {
        let (state, _) = watch::channel(ConnectionState::Unconnected);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::Unconnected(Box::new(provider))),
                state,
                registry: Arc::new(CorrelationRegistry::new()),
            }),
            request_timeout: None,
        }
    }

    /// Upper bound applied to every call, on top of any caller deadline.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.registry.pending_len()
    }

    /// Establish the connection if nobody has yet. Safe to call from many
    /// tasks at once; the provider runs at most once.
    pub async fn ensure_connected(&self) -> Result<(), NetError> {
        self.link().await.map(|_| ())
    }

    /// Send `req` and wait for its response.
    ///
    /// The effective deadline is the earlier of `deadline` and the
    /// configured request timeout.
    pub async fn call<R: Call>(
        &self,
        req: R,
        deadline: Option<Instant>,
    ) -> Result<R::Response, NetError> {
        let deadline = self.effective_deadline(deadline);
        let link = within(deadline, self.link()).await?;

        let registry = &self.shared.registry;
        let (id, mut slot) = registry.allocate()?;
        let body: Body = req.into();
        trace!(op = R::NAME, %id, "sending request");

        // Written from its own task so a caller dropped mid-write, or one
        // whose deadline passes mid-write, never leaves half a frame on the
        // stream. The task runs to completion either way.
        let write_link = Arc::clone(&link);
        let write = tokio::spawn(async move { write_link.writer.write_packet(id, &body).await });
        let written = within(deadline, async move {
            write
                .await
                .unwrap_or_else(|e| Err(NetError::ConnectionFailed(format!("writer task: {}", e))))
        })
        .await;
        match written {
            Ok(()) => {}
            Err(NetError::Timeout) => {
                // The frame may still go out; its reply must be absorbed.
                if registry.abandon(id) {
                    warn!(op = R::NAME, %id, "request timed out before it was written");
                    return Err(NetError::Timeout);
                }
            }
            Err(e) => {
                registry.forget(id);
                if e.is_fatal() {
                    error!(op = R::NAME, %id, error = %e, "write failed, tearing down connection");
                    self.shared.fail(Failure::Closed);
                }
                return Err(e);
            }
        }

        let delivered = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, &mut slot).await {
                Ok(res) => res,
                Err(_) => {
                    if registry.abandon(id) {
                        warn!(op = R::NAME, %id, "request timed out");
                        return Err(NetError::Timeout);
                    }
                    // The response won the race against the deadline.
                    match slot.try_recv() {
                        Ok(body) => Ok(body),
                        Err(_) => return Err(NetError::ConnectionClosed),
                    }
                }
            },
            None => slot.await,
        };
        let body = delivered.map_err(|_| NetError::ConnectionClosed)?;

        R::response_from(body).map_err(|other| {
            warn!(
                op = R::NAME,
                %id,
                expected = R::RESPONSE_NAME,
                got = other.name(),
                "unexpected response kind"
            );
            NetError::UnexpectedResponse {
                expected: R::RESPONSE_NAME,
                got: other.name(),
            }
        })
    }

    /// Tear the connection down. Waiters fail with
    /// [`NetError::ConnectionClosed`]; the peer sees end of stream.
    pub async fn shutdown(&self) {
        let link = match &*self.shared.slot.lock() {
            Slot::Connected(link) => Some(Arc::clone(link)),
            _ => None,
        };
        self.shared.fail(Failure::Closed);
        if let Some(link) = link {
            if let Err(e) = link.writer.shutdown().await {
                debug!(error = %e, "shutdown of write half failed");
            }
        }
    }

    /// Resolves once the connection has failed or been shut down.
    pub async fn closed(&self) {
        let mut changes = self.shared.state.subscribe();
        let _ = changes
            .wait_for(|state| *state == ConnectionState::Failed)
            .await;
    }

    fn effective_deadline(&self, deadline: Option<Instant>) -> Option<Instant> {
        let by_timeout = self.request_timeout.map(|t| Instant::now() + t);
        match (deadline, by_timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn link(&self) -> Result<Arc<Link>, NetError> {
        let mut changes = self.shared.state.subscribe();
        loop {
            {
                let mut slot = self.shared.slot.lock();
                match std::mem::replace(&mut *slot, Slot::Connecting) {
                    Slot::Connected(link) => {
                        *slot = Slot::Connected(Arc::clone(&link));
                        return Ok(link);
                    }
                    Slot::Failed(failure) => {
                        let err = failure.to_error();
                        *slot = Slot::Failed(failure);
                        return Err(err);
                    }
                    Slot::Connecting => {}
                    Slot::Unconnected(provider) => {
                        self.shared.state.send_replace(ConnectionState::Connecting);
                        debug!("establishing connection");
                        spawn_connect(Arc::downgrade(&self.shared), provider);
                    }
                }
            }
            if changes.changed().await.is_err() {
                return Err(NetError::ConnectionClosed);
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state())
            .field("pending", &self.pending_requests())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

async fn within<T, F>(deadline: Option<Instant>, fut: F) -> Result<T, NetError>
where
    F: Future<Output = Result<T, NetError>>,
{
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| NetError::Timeout)?,
        None => fut.await,
    }
}

fn spawn_connect(shared: Weak<Shared>, provider: Box<dyn ConnectionProvider>) {
    tokio::spawn(async move {
        let result = provider.connect().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        match result {
            Ok(stream) => {
                let (rd, wr) = tokio::io::split(stream);
                let registry = Arc::clone(&shared.registry);
                // Hold the slot while the read loop starts so its failure
                // transition cannot be overwritten by ours.
                let mut slot = shared.slot.lock();
                let reader = tokio::spawn(read_loop(
                    Arc::downgrade(&shared),
                    registry,
                    PacketReader::new(rd),
                ));
                *slot = Slot::Connected(Arc::new(Link {
                    writer: PacketWriter::new(wr),
                    reader,
                }));
                shared.state.send_replace(slot.state());
                drop(slot);
                info!("relay connection established");
            }
            Err(e) => {
                error!(error = %e, "failed to establish relay connection");
                shared.fail(Failure::Connect(e.to_string().into()));
            }
        }
    });
}

async fn read_loop(
    shared: Weak<Shared>,
    registry: Arc<CorrelationRegistry>,
    mut reader: PacketReader<ReadHalf<BoxedStream>>,
) {
    let reason = loop {
        let (id, body) = match reader.read_packet().await {
            Ok(packet) => packet,
            Err(e) => break e,
        };
        if let Err(e) = registry.dispatch(id, body) {
            break e;
        }
    };

    match &reason {
        NetError::ConnectionClosed => info!("peer closed the relay connection"),
        NetError::ProtocolDesync(id) => {
            error!(%id, "response for unknown request, tearing down connection")
        }
        e => error!(error = %e, "relay connection read failed"),
    }

    match shared.upgrade() {
        Some(shared) => shared.fail(Failure::Closed),
        None => {
            registry.close();
        }
    }
}
