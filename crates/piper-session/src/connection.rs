use std::sync::Arc;

use anyhow::Result;
use piper_wire::{
    build_exception_frame, build_return_frame, encode_wire_frame, parse_wire_frame, Param,
    WireFrame, CONNECTION_ANSWER_ID,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    errors::CallFailure, issuer::IssuerHandle, method_dispatch::MethodDispatcher,
    param_resolver::resolve_params, question_table::QuestionTable, transport::FrameTransport,
};

/// Establishes both peer roles over one transport: an [`IssuerHandle`] for
/// outbound calls and a [`ConnectionDriver`] that must be run (usually on
/// its own task) to move frames in both directions.
pub fn establish_connection<T: FrameTransport>(
    transport: T,
    dispatcher: Arc<MethodDispatcher>,
) -> (IssuerHandle, ConnectionDriver<T>) {
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel();
    let shared = ConnectionShared {
        dispatcher,
        inbound_questions: QuestionTable::new(),
        outbound_questions: QuestionTable::new(),
        outbound_frames: outbound_sender,
    };
    let issuer = IssuerHandle::new(
        shared.outbound_questions.clone(),
        shared.outbound_frames.clone(),
    );
    let driver = ConnectionDriver {
        transport,
        outbound_receiver,
        shared,
    };
    (issuer, driver)
}

#[derive(Clone)]
struct ConnectionShared {
    dispatcher: Arc<MethodDispatcher>,
    inbound_questions: QuestionTable,
    outbound_questions: QuestionTable,
    outbound_frames: mpsc::UnboundedSender<String>,
}

/// One instance per established connection.
///
/// The driver reads inbound frames, registers each inbound call
/// synchronously (in wire-arrival order, so a later pipelined call can
/// always reference a previously seen id), then executes the call on its
/// own task so the read loop never blocks behind a slow handler. Inbound
/// `return` / `exception` frames are demultiplexed to the issuer's table.
pub struct ConnectionDriver<T: FrameTransport> {
    transport: T,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    shared: ConnectionShared,
}

impl<T: FrameTransport> ConnectionDriver<T> {
    /// Drives the connection until the transport ends, then closes both
    /// question tables so every pending waiter fails with
    /// connection-closed.
    pub async fn run(mut self) -> Result<()> {
        let result = loop {
            tokio::select! {
                maybe_frame = self.transport.next_frame() => match maybe_frame {
                    Ok(Some(raw)) => handle_inbound_frame(&self.shared, &raw),
                    Ok(None) => break Ok(()),
                    Err(error) => break Err(error),
                },
                maybe_raw = self.outbound_receiver.recv() => match maybe_raw {
                    Some(raw) => {
                        if let Err(error) = self.transport.send_frame(raw).await {
                            break Err(error);
                        }
                    }
                    None => break Ok(()),
                },
            }
        };
        self.shared.inbound_questions.close();
        self.shared.outbound_questions.close();
        result
    }
}

fn handle_inbound_frame(shared: &ConnectionShared, raw: &str) {
    match parse_wire_frame(raw) {
        Err(error) => {
            debug!("dropping undecodable frame: {error}");
            send_frame_text(
                shared,
                encode_wire_frame(&build_exception_frame(
                    CONNECTION_ANSWER_ID,
                    &error.to_string(),
                )),
            );
        }
        Ok(WireFrame::Call {
            question_id,
            method,
            params,
        }) => {
            // Registration happens before parameter resolution so a later
            // pipelined call can find this id while it is still executing.
            shared.inbound_questions.register(question_id);
            let shared = shared.clone();
            tokio::spawn(async move {
                run_inbound_call(shared, question_id, method, params).await;
            });
        }
        Ok(WireFrame::Return { answer_id, result }) => {
            if let Err(failure) = shared.outbound_questions.resolve(answer_id, result) {
                warn!("ignoring return for answer {answer_id}: {failure}");
            }
        }
        Ok(WireFrame::Exception { answer_id, error }) => {
            if answer_id == CONNECTION_ANSWER_ID {
                warn!("peer reported a connection-level failure: {error}");
                return;
            }
            if let Err(failure) = shared
                .outbound_questions
                .reject(answer_id, CallFailure::Remote(error))
            {
                warn!("ignoring exception for answer {answer_id}: {failure}");
            }
        }
    }
}

async fn run_inbound_call(
    shared: ConnectionShared,
    question_id: u64,
    method: String,
    params: Vec<Param>,
) {
    let outcome = execute_inbound_call(&shared, question_id, &method, params).await;
    let reply = match outcome {
        Ok(value) => match shared.inbound_questions.resolve(question_id, value.clone()) {
            Ok(()) => build_return_frame(question_id, value),
            Err(violation) => build_exception_frame(question_id, &violation.to_string()),
        },
        Err(failure) => {
            // Rejecting here is what lets dependent pipelined calls fail
            // fast instead of waiting on a question that will never settle.
            if let Err(violation) = shared
                .inbound_questions
                .reject(question_id, failure.clone())
            {
                debug!("question {question_id} already settled: {violation}");
            }
            build_exception_frame(question_id, &failure.to_string())
        }
    };
    send_frame_text(&shared, encode_wire_frame(&reply));
}

async fn execute_inbound_call(
    shared: &ConnectionShared,
    question_id: u64,
    method: &str,
    params: Vec<Param>,
) -> Result<serde_json::Value, CallFailure> {
    let args = resolve_params(&shared.inbound_questions, question_id, params).await?;
    shared.dispatcher.dispatch(method, args).await
}

fn send_frame_text(shared: &ConnectionShared, raw: String) {
    if shared.outbound_frames.send(raw).is_err() {
        debug!("connection ended before an outbound frame could be sent");
    }
}
