use crate::error::TransportError;
use crate::protocol::OutboundMessage;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

pub const DEFAULT_OUTBOUND_QUEUE_CAP: usize = 256;

/// Host → UI half of the bridge. Cloned freely; every clone feeds the
/// same writer thread, so messages leave in the order they were queued.
#[derive(Clone)]
pub struct OutboundSender {
    tx: SyncSender<OutboundMessage>,
    capacity: usize,
    stalls: Arc<AtomicU64>,
}

pub fn outbound_channel(capacity: usize) -> (OutboundSender, Receiver<OutboundMessage>) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::sync_channel(capacity);
    let sender = OutboundSender {
        tx,
        capacity,
        stalls: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

impl OutboundSender {
    /// Queues one message. A full queue applies backpressure instead of
    /// dropping, because every correlated request is owed its response.
    pub fn send(&self, message: impl Into<OutboundMessage>) -> Result<(), TransportError> {
        match self.tx.try_send(message.into()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                let stalls = self.stalls.fetch_add(1, Ordering::Relaxed) + 1;
                if stalls == 1 || stalls.is_power_of_two() {
                    tracing::warn!(
                        cap = self.capacity,
                        stalls,
                        "outbound queue full; waiting for writer"
                    );
                }
                self.tx.send(message).map_err(|_| TransportError::Closed)
            }
            Err(TrySendError::Disconnected(_message)) => Err(TransportError::Closed),
        }
    }

    pub fn stall_count(&self) -> u64 {
        self.stalls.load(Ordering::Relaxed)
    }
}
