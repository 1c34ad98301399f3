use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::errors::CallFailure;

type WaiterOutcome = Result<Value, CallFailure>;

#[derive(Debug)]
enum QuestionState {
    Pending {
        waiters: Vec<oneshot::Sender<WaiterOutcome>>,
    },
    Fulfilled(Value),
    Rejected(CallFailure),
}

#[derive(Debug, Default)]
struct TableState {
    questions: HashMap<u64, QuestionState>,
    // Wait-for edges (suspended question -> awaited question ids), kept
    // only while a resolution is suspended. A new await that would close a
    // loop through these edges is a reference cycle.
    waits_on: HashMap<u64, Vec<u64>>,
    closed: bool,
}

impl TableState {
    fn wait_path_exists(&self, start: u64, target: u64) -> bool {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(awaited) = self.waits_on.get(&current) {
                stack.extend(awaited.iter().copied());
            }
        }
        false
    }

    fn clear_wait_edges(&mut self, id: u64) {
        self.waits_on.remove(&id);
        for awaited in self.waits_on.values_mut() {
            awaited.retain(|candidate| *candidate != id);
        }
        self.waits_on.retain(|_, awaited| !awaited.is_empty());
    }
}

/// Per-connection registry of question ids and their completion state.
///
/// One table exists per sender role on a connection. Questions transition
/// `Pending -> Fulfilled` or `Pending -> Rejected` exactly once; waiters
/// suspended on a pending question are woken in FIFO order on the terminal
/// transition. Entries live until [`QuestionTable::close`].
#[derive(Debug, Clone, Default)]
pub struct QuestionTable {
    state: Arc<Mutex<TableState>>,
}

impl QuestionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> MutexGuard<'_, TableState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Creates a `Pending` entry for `id` if absent. Idempotent while the
    /// entry is pending; a no-op once the table is closed.
    pub fn register(&self, id: u64) {
        let mut state = self.lock_state();
        if state.closed {
            return;
        }
        state
            .questions
            .entry(id)
            .or_insert_with(|| QuestionState::Pending {
                waiters: Vec::new(),
            });
    }

    /// Transitions `id` to `Fulfilled(value)` and wakes all waiters, in
    /// FIFO order, with that value.
    pub fn resolve(&self, id: u64, value: Value) -> Result<(), CallFailure> {
        let waiters = self.take_pending_waiters(id, || QuestionState::Fulfilled(value.clone()))?;
        for waiter in waiters {
            let _ = waiter.send(Ok(value.clone()));
        }
        Ok(())
    }

    /// Transitions `id` to `Rejected(failure)` and wakes all waiters with
    /// the failure.
    pub fn reject(&self, id: u64, failure: CallFailure) -> Result<(), CallFailure> {
        let waiters = self.take_pending_waiters(id, || QuestionState::Rejected(failure.clone()))?;
        for waiter in waiters {
            let _ = waiter.send(Err(failure.clone()));
        }
        Ok(())
    }

    fn take_pending_waiters(
        &self,
        id: u64,
        terminal: impl FnOnce() -> QuestionState,
    ) -> Result<Vec<oneshot::Sender<WaiterOutcome>>, CallFailure> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(CallFailure::ConnectionClosed);
        }
        match state.questions.get(&id) {
            None => return Err(CallFailure::UnknownQuestion { id }),
            Some(QuestionState::Fulfilled(_)) | Some(QuestionState::Rejected(_)) => {
                return Err(CallFailure::ProtocolViolation { id });
            }
            Some(QuestionState::Pending { .. }) => {}
        }
        let next = terminal();
        let Some(QuestionState::Pending { waiters }) = state.questions.insert(id, next) else {
            return Err(CallFailure::UnknownQuestion { id });
        };
        state.clear_wait_edges(id);
        Ok(waiters)
    }

    /// Returns `id`'s value without suspending when it is already terminal,
    /// suspends until the terminal transition when it is pending, and fails
    /// immediately with `UnknownQuestion` when it was never registered.
    ///
    /// `for_question` names the inbound question whose resolution is doing
    /// the waiting; it feeds cycle detection and is `None` on the issuer
    /// side, where references only ever point at the peer.
    pub async fn await_question(
        &self,
        id: u64,
        for_question: Option<u64>,
    ) -> Result<Value, CallFailure> {
        let receiver = {
            let mut state = self.lock_state();
            if state.closed {
                return Err(CallFailure::ConnectionClosed);
            }
            match state.questions.get(&id) {
                None => return Err(CallFailure::UnknownQuestion { id }),
                Some(QuestionState::Fulfilled(value)) => return Ok(value.clone()),
                Some(QuestionState::Rejected(failure)) => return Err(failure.clone()),
                Some(QuestionState::Pending { .. }) => {}
            }
            if let Some(waiter_id) = for_question {
                if state.wait_path_exists(id, waiter_id) {
                    return Err(CallFailure::ReferenceCycle { id });
                }
                state.waits_on.entry(waiter_id).or_default().push(id);
            }
            let (sender, receiver) = oneshot::channel();
            if let Some(QuestionState::Pending { waiters }) = state.questions.get_mut(&id) {
                waiters.push(sender);
            }
            receiver
        };
        match receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(CallFailure::ConnectionClosed),
        }
    }

    /// Fails every pending waiter with `ConnectionClosed` and clears all
    /// entries. Idempotent; every table must be closed at connection
    /// teardown.
    pub fn close(&self) {
        let waiters = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.waits_on.clear();
            let mut pending = Vec::new();
            for (_, entry) in state.questions.drain() {
                if let QuestionState::Pending { waiters } = entry {
                    pending.extend(waiters);
                }
            }
            pending
        };
        for waiter in waiters {
            let _ = waiter.send(Err(CallFailure::ConnectionClosed));
        }
    }
}
