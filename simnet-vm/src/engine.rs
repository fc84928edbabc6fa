use tracing::debug;

use simnet_storage::transaction::Transaction;
use simnet_types::primitives::{Amount, BlockHeight};
use simnet_types::principal::Principal;
use simnet_types::value::Value;

use crate::ast::{FunctionDef, Visibility};
use crate::cost::ExecutionCost;
use crate::error::VmError;
use crate::interpreter::{check_args, Interpreter};
use crate::registry::Registry;
use crate::result::{CallFailure, CallMode, CallOutcome, CallRequest, CallResult, Event};

/// Whether `function` may be invoked directly in `mode`.
fn is_callable(function: &FunctionDef, mode: CallMode) -> bool {
    match mode {
        CallMode::ReadOnly => function.visibility != Visibility::Private,
        CallMode::Public => function.visibility == Visibility::Public,
        CallMode::Private => true,
    }
}

/// Runs single calls against a transaction.
///
/// On failure every write the call made is rolled back, so the caller can
/// keep using the transaction (for instance to bump a nonce) and turn it
/// into a delta afterwards.
pub struct Engine<'r> {
    registry: &'r Registry,
}

impl<'r> Engine<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn call(&self, tx: &mut Transaction, request: &CallRequest) -> CallResult {
        let program = match self.registry.resolve(&request.program) {
            Ok(p) => p,
            Err(e) => return CallResult::failed(e, ExecutionCost::default()),
        };
        let function = match program
            .function(&request.function)
            .filter(|f| is_callable(f, request.mode))
        {
            Some(f) => f,
            None => {
                return CallResult::failed(
                    VmError::UnknownFunction {
                        program: request.program.clone(),
                        function: request.function.clone(),
                    },
                    ExecutionCost::default(),
                )
            }
        };
        if let Err(e) = check_args(function, &request.args) {
            return CallResult::failed(e, ExecutionCost::default());
        }

        debug!(
            program = %program.id,
            function = %request.function,
            sender = %request.sender,
            mode = ?request.mode,
            "executing call"
        );

        let checkpoint = tx.checkpoint();
        let mut interpreter = Interpreter::new(self.registry, tx, request.block_height);
        let result = interpreter.call_function(
            &program,
            function,
            request.args.clone(),
            request.sender.clone(),
            request.mode == CallMode::ReadOnly,
        );
        let (events, cost) = interpreter.finish();

        let outcome = settle(result, events, cost);
        if !outcome.is_success() || request.mode == CallMode::ReadOnly {
            tx.rollback(checkpoint);
        }
        outcome
    }

    /// Native token transfer authorised by `sender`.
    pub fn transfer(
        &self,
        tx: &mut Transaction,
        amount: Amount,
        sender: &Principal,
        recipient: &Principal,
        block_height: BlockHeight,
    ) -> CallResult {
        debug!(%sender, %recipient, amount, "executing transfer");
        let checkpoint = tx.checkpoint();
        let mut interpreter = Interpreter::new(self.registry, tx, block_height);
        let result = interpreter.transfer_stx(amount, sender, recipient, sender);
        let (events, cost) = interpreter.finish();

        let outcome = settle(result, events, cost);
        if !outcome.is_success() {
            tx.rollback(checkpoint);
        }
        outcome
    }
}

fn settle(result: Result<Value, VmError>, events: Vec<Event>, cost: ExecutionCost) -> CallResult {
    match result {
        Ok(value) if value.is_err_response() => {
            debug!(%value, "call rejected");
            CallResult {
                outcome: CallOutcome::Failure(CallFailure::Rejected(value)),
                events: Vec::new(),
                cost,
            }
        }
        Ok(value) => CallResult {
            outcome: CallOutcome::Success(value),
            events,
            cost,
        },
        Err(e) => {
            debug!(error = %e, "call failed");
            CallResult::failed(e, cost)
        }
    }
}
