use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use piper_wire::{build_call_frame, encode_wire_frame, Param, QuestionRef};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{errors::CallFailure, question_table::QuestionTable};

/// The calling peer's surface over one connection.
///
/// Ids are allocated monotonically starting at 1; each call registers a
/// local question before its frame is sent, so a matching `return` or
/// `exception` arriving at any later point finds the entry.
#[derive(Debug, Clone)]
pub struct IssuerHandle {
    questions: QuestionTable,
    outbound_frames: mpsc::UnboundedSender<String>,
    next_question_id: Arc<AtomicU64>,
}

impl IssuerHandle {
    pub(crate) fn new(
        questions: QuestionTable,
        outbound_frames: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            questions,
            outbound_frames,
            next_question_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sends a call and returns a reference to its eventual result without
    /// waiting for any reply. The reference may be embedded in the
    /// parameters of a later call, which is what makes pipelining possible.
    pub fn call_pipelined(
        &self,
        method: &str,
        params: Vec<Param>,
    ) -> Result<QuestionRef, CallFailure> {
        let question_id = self.next_question_id.fetch_add(1, Ordering::Relaxed);
        self.questions.register(question_id);
        let frame = build_call_frame(question_id, method, params);
        if self.outbound_frames.send(encode_wire_frame(&frame)).is_err() {
            return Err(CallFailure::ConnectionClosed);
        }
        Ok(QuestionRef {
            result_of: question_id,
        })
    }

    /// Sends a call and awaits its matching `return` or `exception`.
    pub async fn call_immediate(
        &self,
        method: &str,
        params: Vec<Param>,
    ) -> Result<Value, CallFailure> {
        let reference = self.call_pipelined(method, params)?;
        self.await_reference(reference).await
    }

    /// Suspends until the referenced question settles; returns immediately
    /// when it already has.
    pub async fn await_reference(&self, reference: QuestionRef) -> Result<Value, CallFailure> {
        self.questions.await_question(reference.result_of, None).await
    }
}
