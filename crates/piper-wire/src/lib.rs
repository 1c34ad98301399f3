//! Wire frame model for the piper pipelined-call protocol.
//!
//! One JSON text per frame. Three frame kinds (`call`, `return`,
//! `exception`) correlate by sender-assigned positive ids; the reference
//! sentinel `{"resultOf": id}` is recognized only as a direct element of a
//! call's `params` list.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Reserved answer id for connection-level failures that are not
/// attributable to any question (for example an undecodable frame).
pub const CONNECTION_ANSWER_ID: u64 = 0;

const REFERENCE_SENTINEL_KEY: &str = "resultOf";

/// Error raised while decoding an inbound frame. The display text of
/// `InvalidJson` is the exact error string carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("Invalid JSON")]
    InvalidJson,
    #[error("question id must be a positive integer")]
    NonPositiveQuestionId,
}

/// A reference to another question's eventual result, embedded in a call's
/// parameters before that question completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionRef {
    pub result_of: u64,
}

/// One call parameter, decoded once at the protocol boundary.
///
/// Only the exact top-level shape `{"resultOf": id}` is a reference; an
/// object carrying `resultOf` alongside any other key, or a reference
/// nested inside a composite literal, stays a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Literal(Value),
    Reference(QuestionRef),
}

impl Param {
    pub fn literal(value: Value) -> Self {
        Param::Literal(value)
    }

    pub fn reference(result_of: u64) -> Self {
        Param::Reference(QuestionRef { result_of })
    }

    pub fn from_wire_value(value: Value) -> Self {
        if let Value::Object(map) = &value {
            if map.len() == 1 {
                if let Some(id) = map.get(REFERENCE_SENTINEL_KEY).and_then(Value::as_u64) {
                    return Param::Reference(QuestionRef { result_of: id });
                }
            }
        }
        Param::Literal(value)
    }

    pub fn to_wire_value(&self) -> Value {
        match self {
            Param::Literal(value) => value.clone(),
            Param::Reference(reference) => json!({ "resultOf": reference.result_of }),
        }
    }
}

/// A decoded protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Call {
        question_id: u64,
        method: String,
        params: Vec<Param>,
    },
    Return {
        answer_id: u64,
        result: Value,
    },
    Exception {
        answer_id: u64,
        error: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawWireFrame {
    Call {
        #[serde(rename = "questionId")]
        question_id: u64,
        method: String,
        params: Vec<Value>,
    },
    Return {
        #[serde(rename = "answerId")]
        answer_id: u64,
        result: Value,
    },
    Exception {
        #[serde(rename = "answerId")]
        answer_id: u64,
        error: String,
    },
}

pub fn parse_wire_frame(raw: &str) -> Result<WireFrame, WireError> {
    let frame = serde_json::from_str::<RawWireFrame>(raw).map_err(|_| WireError::InvalidJson)?;
    match frame {
        RawWireFrame::Call {
            question_id,
            method,
            params,
        } => {
            if question_id == 0 {
                return Err(WireError::NonPositiveQuestionId);
            }
            Ok(WireFrame::Call {
                question_id,
                method,
                params: params.into_iter().map(Param::from_wire_value).collect(),
            })
        }
        RawWireFrame::Return { answer_id, result } => {
            if answer_id == 0 {
                return Err(WireError::NonPositiveQuestionId);
            }
            Ok(WireFrame::Return { answer_id, result })
        }
        RawWireFrame::Exception { answer_id, error } => {
            Ok(WireFrame::Exception { answer_id, error })
        }
    }
}

pub fn encode_wire_frame(frame: &WireFrame) -> String {
    let value = match frame {
        WireFrame::Call {
            question_id,
            method,
            params,
        } => json!({
            "type": "call",
            "questionId": question_id,
            "method": method,
            "params": params.iter().map(Param::to_wire_value).collect::<Vec<_>>(),
        }),
        WireFrame::Return { answer_id, result } => json!({
            "type": "return",
            "answerId": answer_id,
            "result": result,
        }),
        WireFrame::Exception { answer_id, error } => json!({
            "type": "exception",
            "answerId": answer_id,
            "error": error,
        }),
    };
    value.to_string()
}

pub fn build_call_frame(question_id: u64, method: &str, params: Vec<Param>) -> WireFrame {
    WireFrame::Call {
        question_id,
        method: method.to_string(),
        params,
    }
}

pub fn build_return_frame(answer_id: u64, result: Value) -> WireFrame {
    WireFrame::Return { answer_id, result }
}

pub fn build_exception_frame(answer_id: u64, error: &str) -> WireFrame {
    WireFrame::Exception {
        answer_id,
        error: error.to_string(),
    }
}
