//! Marshalling UI intents onto the host's serialized execution context.
//!
//! The host thread owns the application and drains a FIFO of scheduled
//! calls. An [`ExternalRequest`] is a single parameter slot plus a small
//! state machine on top of that queue: raising it schedules at most one
//! execution, later raises only overwrite the parameters.

use crate::error::{HandlerError, HostContextClosed};
use crate::host::{HostApplication, Notice};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type HostCall<A> = Box<dyn FnOnce(&mut A) + Send>;

pub struct HostContext<A> {
    tx: Sender<HostCall<A>>,
}

impl<A> Clone for HostContext<A> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<A> HostContext<A> {
    /// Schedules `call` to run later on the host thread.
    pub fn invoke<F>(&self, call: F) -> Result<(), HostContextClosed>
    where
        F: FnOnce(&mut A) + Send + 'static,
    {
        self.tx.send(Box::new(call)).map_err(|_| HostContextClosed)
    }
}

pub struct HostLoop<A> {
    rx: Receiver<HostCall<A>>,
}

pub fn host_context<A>() -> (HostContext<A>, HostLoop<A>) {
    let (tx, rx) = mpsc::channel();
    (HostContext { tx }, HostLoop { rx })
}

impl<A> HostLoop<A> {
    /// Runs scheduled calls until every [`HostContext`] is gone and the
    /// queue is empty.
    pub fn run(self, app: &mut A) -> usize {
        let mut executed = 0;
        for call in self.rx {
            call(app);
            executed += 1;
        }
        executed
    }

    /// Runs whatever is queued right now, including calls scheduled by
    /// those calls, then returns.
    pub fn run_pending(&self, app: &mut A) -> usize {
        let mut executed = 0;
        while let Ok(call) = self.rx.try_recv() {
            call(app);
            executed += 1;
        }
        executed
    }
}

/// Work executed on the host thread for one kind of external request.
pub trait ExternalHandler<A>: Send + 'static {
    type Params: Clone + Send + 'static;

    fn name(&self) -> &'static str;

    fn execute(&mut self, app: &mut A, params: &Self::Params) -> Result<(), HandlerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Armed,
    Executing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseOutcome {
    /// The request was idle; an execution is now queued.
    Scheduled,
    /// An execution was already queued and will see the new parameters.
    Coalesced,
    /// The handler is running; one more execution follows it.
    FollowUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub request: &'static str,
    pub outcome: ExecutionOutcome,
}

struct Slot<P> {
    params: Option<P>,
    state: RequestState,
    rearmed: bool,
}

struct Inner<A, H: ExternalHandler<A>> {
    name: &'static str,
    host: HostContext<A>,
    slot: Mutex<Slot<H::Params>>,
    handler: Mutex<H>,
    listener: Mutex<Option<Sender<ExecutionReport>>>,
}

pub struct ExternalRequest<A, H: ExternalHandler<A>> {
    inner: Arc<Inner<A, H>>,
}

impl<A, H: ExternalHandler<A>> Clone for ExternalRequest<A, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, H> ExternalRequest<A, H>
where
    A: HostApplication,
    H: ExternalHandler<A>,
{
    pub fn new(host: HostContext<A>, handler: H) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: handler.name(),
                host,
                slot: Mutex::new(Slot {
                    params: None,
                    state: RequestState::Idle,
                    rearmed: false,
                }),
                handler: Mutex::new(handler),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Stores `params` and makes sure an execution will observe them.
    pub fn raise(&self, params: H::Params) -> Result<RaiseOutcome, HostContextClosed> {
        let mut slot = lock(&self.inner.slot);
        slot.params = Some(params);

        match slot.state {
            RequestState::Idle => {
                schedule(&self.inner)?;
                slot.state = RequestState::Armed;
                tracing::debug!(request = self.inner.name, "external request armed");
                Ok(RaiseOutcome::Scheduled)
            }
            RequestState::Armed => Ok(RaiseOutcome::Coalesced),
            RequestState::Executing => {
                slot.rearmed = true;
                Ok(RaiseOutcome::FollowUp)
            }
        }
    }

    pub fn state(&self) -> RequestState {
        lock(&self.inner.slot).state
    }

    /// Last parameters raised, if any.
    pub fn params(&self) -> Option<H::Params> {
        lock(&self.inner.slot).params.clone()
    }

    /// Replaces any earlier subscriber. Dropping the receiver is fine;
    /// executions never wait on it.
    pub fn subscribe(&self) -> Receiver<ExecutionReport> {
        let (tx, rx) = mpsc::channel();
        *lock(&self.inner.listener) = Some(tx);
        rx
    }
}

fn schedule<A, H>(inner: &Arc<Inner<A, H>>) -> Result<(), HostContextClosed>
where
    A: HostApplication,
    H: ExternalHandler<A>,
{
    let target = Arc::clone(inner);
    inner.host.invoke(move |app: &mut A| execute(&target, app))
}

fn execute<A, H>(inner: &Arc<Inner<A, H>>, app: &mut A)
where
    A: HostApplication,
    H: ExternalHandler<A>,
{
    let params = {
        let mut slot = lock(&inner.slot);
        if slot.state != RequestState::Armed {
            return;
        }
        match slot.params.clone() {
            Some(params) => {
                slot.state = RequestState::Executing;
                params
            }
            None => {
                slot.state = RequestState::Idle;
                return;
            }
        }
    };

    tracing::info!(request = inner.name, "executing external request");
    let result = {
        let mut handler = lock(&inner.handler);
        panic::catch_unwind(AssertUnwindSafe(|| handler.execute(app, &params)))
    };

    let outcome = match result {
        Ok(Ok(())) => ExecutionOutcome::Completed,
        Ok(Err(HandlerError::Cancelled)) => {
            tracing::info!(request = inner.name, "external request cancelled by user");
            ExecutionOutcome::Cancelled
        }
        Ok(Err(err)) => {
            let reason = err.to_string();
            tracing::error!(request = inner.name, error = %reason, "external request failed");
            app.notify(Notice::error(inner.name, reason.clone()));
            ExecutionOutcome::Failed(reason)
        }
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            tracing::error!(request = inner.name, error = %reason, "external request panicked");
            app.notify(Notice::error(inner.name, reason.clone()));
            ExecutionOutcome::Failed(reason)
        }
    };

    {
        let mut slot = lock(&inner.slot);
        if slot.rearmed {
            slot.rearmed = false;
            match schedule(inner) {
                Ok(()) => slot.state = RequestState::Armed,
                Err(HostContextClosed) => {
                    tracing::warn!(request = inner.name, "host closed; dropping follow-up");
                    slot.state = RequestState::Idle;
                }
            }
        } else {
            slot.state = RequestState::Idle;
        }
    }

    let report = ExecutionReport {
        request: inner.name,
        outcome,
    };
    let mut listener = lock(&inner.listener);
    let disconnected = match listener.as_ref() {
        Some(tx) => tx.send(report).is_err(),
        None => false,
    };
    if disconnected {
        *listener = None;
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
