use serde::Serialize;

use simnet_types::primitives::{Amount, BlockHeight};
use simnet_types::principal::{Principal, ProgramId};
use simnet_types::value::Value;

use crate::cost::ExecutionCost;
use crate::error::{ErrorKind, VmError};

/// How a call may interact with state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallMode {
    /// Public or read-only functions; any mutation is rejected.
    ReadOnly,
    /// Public functions only; successful calls produce a state delta.
    Public,
    /// Any function, including private ones, with public permissions.
    Private,
}

/// A request to run one function of one deployed program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Program name, or its full `issuer.name` identifier.
    pub program: String,
    pub function: String,
    pub args: Vec<Value>,
    pub sender: Principal,
    pub mode: CallMode,
    /// Height reported by `block-height` during the call.
    pub block_height: BlockHeight,
}

/// An observable side effect of a committed call, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Print {
        program: ProgramId,
        value: Value,
    },
    StxTransfer {
        sender: Principal,
        recipient: Principal,
        amount: Amount,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallFailure {
    /// The function ran to completion and returned an `(err ...)` response.
    Rejected(Value),
    /// The call could not be completed.
    Error(VmError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success(Value),
    Failure(CallFailure),
}

/// Everything a caller learns from one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallResult {
    pub outcome: CallOutcome,
    /// Events of the call; always empty for failed calls.
    pub events: Vec<Event>,
    pub cost: ExecutionCost,
}

impl CallResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Success(_))
    }

    /// The returned value: the success value or the rejected `(err ...)`.
    pub fn value(&self) -> Option<&Value> {
        match &self.outcome {
            CallOutcome::Success(v) | CallOutcome::Failure(CallFailure::Rejected(v)) => Some(v),
            CallOutcome::Failure(CallFailure::Error(_)) => None,
        }
    }

    pub fn error(&self) -> Option<&VmError> {
        match &self.outcome {
            CallOutcome::Failure(CallFailure::Error(e)) => Some(e),
            _ => None,
        }
    }

    /// Kind of failure, if the call failed. Rejections are runtime aborts.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            CallOutcome::Success(_) => None,
            CallOutcome::Failure(CallFailure::Rejected(_)) => Some(ErrorKind::RuntimeAbort),
            CallOutcome::Failure(CallFailure::Error(e)) => Some(e.kind()),
        }
    }

    /// A failed call that never reached execution.
    pub fn from_error(error: VmError) -> Self {
        Self::failed(error, ExecutionCost::default())
    }

    pub(crate) fn failed(error: VmError, cost: ExecutionCost) -> Self {
        Self {
            outcome: CallOutcome::Failure(CallFailure::Error(error)),
            events: Vec::new(),
            cost,
        }
    }
}
