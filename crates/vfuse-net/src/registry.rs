//! Correlation of responses to the requests waiting for them.
//!
//! One mutex guards the id counter, the pending map and the abandoned set,
//! so allocation and dispatch are linearizable. The lock is only held for a
//! counter bump or a map insert/remove; delivery happens after release.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};
use vfuse_proto::Body;
use vfuse_types::RequestId;

use crate::error::NetError;

/// What happened to a dispatched response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the waiting caller.
    Delivered,
    /// The caller had already gone away (its future was dropped).
    Dropped,
    /// The caller gave up after its deadline; the late response was absorbed.
    Absorbed,
}

/// Size of the abandoned set at which growth starts being logged, then
/// again at every doubling.
const ABANDONED_WARN_THRESHOLD: usize = 64;

struct Inner {
    next_id: RequestId,
    pending: HashMap<RequestId, oneshot::Sender<Body>>,
    /// Ids whose callers timed out. A response for one of these is consumed
    /// once and is not treated as a desync.
    abandoned: HashSet<RequestId>,
    closed: bool,
}

pub struct CorrelationRegistry {
    inner: Mutex<Inner>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: RequestId(0),
                pending: HashMap::new(),
                abandoned: HashSet::new(),
                closed: false,
            }),
        }
    }

    /// Reserve a fresh id and the slot its response will be delivered to.
    pub fn allocate(&self) -> Result<(RequestId, oneshot::Receiver<Body>), NetError> {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(NetError::ConnectionClosed);
        }
        let id = inner.next_id;
        inner.next_id = id.next();
        inner.pending.insert(id, tx);
        Ok((id, rx))
    }

    /// Route a response to its waiter.
    ///
    /// An id that was never allocated, or was already answered, yields
    /// [`NetError::ProtocolDesync`]; the caller must treat that as fatal.
    pub fn dispatch(&self, id: RequestId, body: Body) -> Result<Dispatch, NetError> {
        let slot = {
            let mut inner = self.inner.lock();
            match inner.pending.remove(&id) {
                Some(slot) => slot,
                None if inner.abandoned.remove(&id) => {
                    debug!(%id, kind = body.name(), "late response for abandoned request");
                    return Ok(Dispatch::Absorbed);
                }
                None => return Err(NetError::ProtocolDesync(id)),
            }
        };

        match slot.send(body) {
            Ok(()) => {
                trace!(%id, "response delivered");
                Ok(Dispatch::Delivered)
            }
            Err(body) => {
                debug!(%id, kind = body.name(), "waiter gone, response dropped");
                Ok(Dispatch::Dropped)
            }
        }
    }

    /// Give up on `id` after its deadline passed. A response that still
    /// arrives for it later is absorbed rather than flagged as a desync.
    ///
    /// Returns `false` if the entry was already gone, i.e. the response
    /// raced the deadline and is sitting in the caller's slot.
    pub fn abandon(&self, id: RequestId) -> bool {
        let mut inner = self.inner.lock();
        if inner.pending.remove(&id).is_none() {
            return false;
        }
        inner.abandoned.insert(id);
        let abandoned = inner.abandoned.len();
        if abandoned >= ABANDONED_WARN_THRESHOLD && abandoned.is_power_of_two() {
            warn!(abandoned, "requests abandoned without a reply keep piling up");
        }
        true
    }

    /// Drop the entry for a request that never made it onto the wire.
    pub fn forget(&self, id: RequestId) {
        self.inner.lock().pending.remove(&id);
    }

    /// Fail every waiter and refuse further allocations. Returns how many
    /// waiters were woken.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.abandoned.clear();
            inner.pending.drain().collect()
        };
        // Dropping each sender wakes its receiver with a closed error.
        drained.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Timed-out requests whose reply has not arrived yet.
    pub fn abandoned_len(&self) -> usize {
        self.inner.lock().abandoned.len()
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use vfuse_proto::{CloseRsp, OpenRsp};
    use vfuse_types::FileHandle;

    use super::*;

    fn open_rsp(handle: u64) -> Body {
        Body::from(OpenRsp {
            err: None,
            handle: FileHandle(handle),
        })
    }

    #[test]
    fn test_ids_start_at_zero_and_increase() {
        let reg = CorrelationRegistry::new();
        let (a, _ra) = reg.allocate().unwrap();
        let (b, _rb) = reg.allocate().unwrap();
        assert_eq!(a, RequestId(0));
        assert_eq!(b, RequestId(1));
        assert_eq!(reg.pending_len(), 2);
    }

    #[test]
    fn test_allocate_unique_across_threads() {
        let reg = Arc::new(CorrelationRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = reg.clone();
                std::thread::spawn(move || {
                    (0..500)
                        .map(|_| reg.allocate().unwrap().0)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(all.len(), 4000);
    }

    #[tokio::test]
    async fn test_dispatch_delivers_to_owner() {
        let reg = CorrelationRegistry::new();
        let (a, ra) = reg.allocate().unwrap();
        let (b, rb) = reg.allocate().unwrap();

        // Out of order on purpose.
        assert_eq!(reg.dispatch(b, open_rsp(2)).unwrap(), Dispatch::Delivered);
        assert_eq!(reg.dispatch(a, open_rsp(1)).unwrap(), Dispatch::Delivered);

        assert_eq!(ra.await.unwrap(), open_rsp(1));
        assert_eq!(rb.await.unwrap(), open_rsp(2));
        assert_eq!(reg.pending_len(), 0);
    }

    #[test]
    fn test_double_dispatch_is_desync() {
        let reg = CorrelationRegistry::new();
        let (id, _rx) = reg.allocate().unwrap();
        reg.dispatch(id, open_rsp(1)).unwrap();
        match reg.dispatch(id, open_rsp(1)) {
            Err(NetError::ProtocolDesync(got)) => assert_eq!(got, id),
            other => panic!("expected desync, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_id_is_desync() {
        let reg = CorrelationRegistry::new();
        assert!(matches!(
            reg.dispatch(RequestId(77), open_rsp(1)),
            Err(NetError::ProtocolDesync(RequestId(77)))
        ));
    }

    #[test]
    fn test_dropped_waiter_is_not_an_error() {
        let reg = CorrelationRegistry::new();
        let (id, rx) = reg.allocate().unwrap();
        drop(rx);
        assert_eq!(reg.dispatch(id, open_rsp(1)).unwrap(), Dispatch::Dropped);
    }

    #[test]
    fn test_abandoned_id_absorbed_once() {
        let reg = CorrelationRegistry::new();
        let (id, _rx) = reg.allocate().unwrap();
        assert!(reg.abandon(id));
        assert!(!reg.abandon(id));
        assert_eq!(reg.pending_len(), 0);

        let late = Body::from(CloseRsp::default());
        assert_eq!(reg.dispatch(id, late.clone()).unwrap(), Dispatch::Absorbed);
        assert!(matches!(
            reg.dispatch(id, late),
            Err(NetError::ProtocolDesync(_))
        ));
    }

    #[test]
    fn test_abandoned_set_tracks_unanswered_timeouts() {
        let reg = CorrelationRegistry::new();
        let ids: Vec<_> = (0..ABANDONED_WARN_THRESHOLD * 2)
            .map(|_| reg.allocate().unwrap())
            .map(|(id, _rx)| id)
            .collect();
        for id in &ids {
            assert!(reg.abandon(*id));
        }
        assert_eq!(reg.abandoned_len(), ids.len());
        assert_eq!(reg.pending_len(), 0);

        // Each late reply shrinks the set.
        reg.dispatch(ids[0], open_rsp(1)).unwrap();
        assert_eq!(reg.abandoned_len(), ids.len() - 1);

        reg.close();
        assert_eq!(reg.abandoned_len(), 0);
    }

    #[test]
    fn test_forget_does_not_absorb() {
        let reg = CorrelationRegistry::new();
        let (id, _rx) = reg.allocate().unwrap();
        reg.forget(id);
        assert!(reg.dispatch(id, open_rsp(1)).is_err());
    }

    #[tokio::test]
    async fn test_close_wakes_waiters_and_refuses_allocation() {
        let reg = CorrelationRegistry::new();
        let (_a, ra) = reg.allocate().unwrap();
        let (_b, rb) = reg.allocate().unwrap();

        assert_eq!(reg.close(), 2);
        assert!(reg.is_closed());
        assert!(ra.await.is_err());
        assert!(rb.await.is_err());
        assert!(matches!(reg.allocate(), Err(NetError::ConnectionClosed)));
    }
}
