//! Rendezvous / match engine (C5).

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use cardlink_core::{AbstractTcpStream, stream::FramedStream, types::ConnectStatus};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use cardlink_core::types::SimIdentifier;

/// Handed from a probe task to the matched provider task once a slot is
/// reserved. The provider decides synchronously and reports back via
/// `decision_tx`.
pub struct Handoff {
    pub identifier: SimIdentifier,
    pub decision_tx: oneshot::Sender<ProviderDecision>,
}

/// The provider's verdict on a reserved `ConnectRequest`.
/// `Accepted` carries the provider's own stream: once
/// accepted, the provider task no longer owns it, and the probe task
/// that receives this drives the relay.
pub enum ProviderDecision {
    Accepted(FramedStream<Box<dyn AbstractTcpStream>>),
    Rejected(ConnectStatus),
}

struct ProviderSlot {
    provider_id: Uuid,
    claimed: Arc<AtomicBool>,
    handoff_tx: mpsc::Sender<Handoff>,
}

/// Process-wide rendezvous table: `SimIdentifier -> FIFO queue of
/// waiting provider slots`. The only cross-connection shared state
///.
#[derive(Clone, Default)]
pub struct MatchEngine {
    slots: Arc<DashMap<SimIdentifier, VecDeque<ProviderSlot>>>,
}

/// RAII guard returned by [`MatchEngine::register`]. Dropping it removes
/// every slot this provider registered, so any exit path out of the
/// task holding it (return, error, panic unwind) cleans up without a
/// manual call. The caller is still responsible for noticing the
/// provider's socket went away and returning promptly.
pub struct Registration {
    engine: MatchEngine,
    ids: Vec<SimIdentifier>,
    provider_id: Uuid,
}

impl Drop for Registration {
    fn drop(&mut self) {
        for id in &self.ids {
            self.engine.deregister(id, self.provider_id);
        }
    }
}

impl MatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider as waiting under every SIM identifier it
    /// owns. Returns the `Registration` guard (drop to deregister), the
    /// channel the provider task should await `Handoff`s on, and the
    /// "already matched" flag used to short-circuit a second concurrent
    /// reservation once one SIM has already paired this provider.
    pub fn register(
        &self,
        ids: Vec<SimIdentifier>,
        provider_id: Uuid,
    ) -> (Registration, mpsc::Receiver<Handoff>) {
        let (tx, rx) = mpsc::channel(1);
        let claimed = Arc::new(AtomicBool::new(false));

        for id in &ids {
            self.slots.entry(id.clone()).or_default().push_back(ProviderSlot {
                provider_id,
                claimed: claimed.clone(),
                handoff_tx: tx.clone(),
            });
        }

        (
            Registration {
                engine: self.clone(),
                ids,
                provider_id,
            },
            rx,
        )
    }

    fn deregister(&self, id: &SimIdentifier, provider_id: Uuid) {
        if let Some(mut queue) = self.slots.get_mut(id) {
            queue.retain(|slot| slot.provider_id != provider_id);
        }
    }

    /// Reserves the earliest-registered, not-yet-claimed provider slot
    /// for `id` (FIFO tie-break). Returns `None` if no provider is
    /// currently waiting (`ConnectStatus::NotAvailable`).
    pub fn reserve(&self, id: &SimIdentifier) -> Option<mpsc::Sender<Handoff>> {
        let mut queue = self.slots.get_mut(id)?;
        while let Some(slot) = queue.pop_front() {
            if slot
                .claimed
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Some(slot.handoff_tx);
            }
            // Already paired via a different SIM it also registered under;
            // skip and try the next candidate.
        }
        None
    }
}
