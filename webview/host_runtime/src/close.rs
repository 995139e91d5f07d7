use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};

/// View-model side of the one-shot "close this panel" notification.
#[derive(Clone)]
pub struct CloseRequest {
    requested: Arc<AtomicBool>,
    tx: SyncSender<()>,
}

/// Session side; owned by whoever tears the panel down.
pub struct CloseWatch {
    requested: Arc<AtomicBool>,
    rx: Receiver<()>,
}

pub fn close_channel() -> (CloseRequest, CloseWatch) {
    let requested = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::sync_channel(1);
    (
        CloseRequest {
            requested: Arc::clone(&requested),
            tx,
        },
        CloseWatch { requested, rx },
    )
}

impl CloseRequest {
    /// Returns true only for the call that actually fired the
    /// notification.
    pub fn request(&self) -> bool {
        if self
            .requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if self.tx.try_send(()).is_err() {
            tracing::debug!("close requested after the panel watcher went away");
        }
        true
    }
}

impl CloseWatch {
    pub fn is_requested(&self) -> bool {
        match self.rx.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                self.requested.load(Ordering::Acquire)
            }
        }
    }

    /// Blocks until a close is requested. Returns false if every
    /// `CloseRequest` was dropped without firing.
    pub fn wait(&self) -> bool {
        self.requested.load(Ordering::Acquire) || self.rx.recv().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn request_fires_once() {
        let (request, watch) = close_channel();
        assert!(!watch.is_requested());

        assert!(request.request());
        assert!(!request.request());
        assert!(!request.clone().request());
        assert!(watch.is_requested());
        assert!(watch.is_requested());
    }

    #[test]
    fn request_after_watch_dropped_is_silent() {
        let (request, watch) = close_channel();
        drop(watch);
        assert!(request.request());
    }

    #[test]
    fn wait_returns_when_requested_from_another_thread() {
        let (request, watch) = close_channel();
        let worker = thread::spawn(move || request.request());
        assert!(watch.wait());
        assert!(worker.join().expect("worker thread"));
    }

    #[test]
    fn wait_returns_false_when_all_requests_drop() {
        let (request, watch) = close_channel();
        drop(request);
        assert!(!watch.wait());
    }
}
