//! Tree-walking evaluator for compiled programs.
//!
//! All state access goes through the [`Transaction`] handed in by the
//! caller; nothing is committed here.

use simnet_storage::traits::{Namespace, StateReader};
use simnet_storage::transaction::Transaction;
use simnet_types::account::Account;
use simnet_types::primitives::{Amount, BlockHeight};
use simnet_types::principal::Principal;
use simnet_types::value::{ResponseData, Value};

use crate::ast::{Expr, FunctionDef, Keyword, Program, Visibility};
use crate::call_stack::CallStack;
use crate::cost::{
    CostTracker, ExecutionCost, COST_CONTRACT_CALL, COST_FUNCTION_CALL, COST_PER_EXPRESSION,
    COST_PRINT, COST_TRANSFER,
};
use crate::error::VmError;
use crate::natives::{self, NativeFunction};
use crate::registry::Registry;
use crate::result::Event;
use crate::state;

// ─── stx-transfer? error codes ──────────────────────────────────────────────

pub const ERR_INSUFFICIENT_BALANCE: u128 = 1;
pub const ERR_SAME_SENDER_RECIPIENT: u128 = 2;
pub const ERR_NON_POSITIVE_AMOUNT: u128 = 3;
pub const ERR_SENDER_NOT_TX_SENDER: u128 = 4;

/// Non-local exits from expression evaluation.
enum Interrupt {
    /// Early return from the current function with the given value
    /// (`asserts!`, `unwrap!`, `try!`).
    ShortReturn(Value),
    Error(VmError),
}

impl From<VmError> for Interrupt {
    fn from(err: VmError) -> Self {
        Interrupt::Error(err)
    }
}

type EvalResult = Result<Value, Interrupt>;

/// Evaluation context of one function application.
struct Env<'p> {
    program: &'p Program,
    sender: Principal,
    caller: Principal,
    read_only: bool,
    locals: Vec<(String, Value)>,
}

impl Env<'_> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn ensure_mutable(&self, what: &str) -> Result<(), VmError> {
        if self.read_only {
            return Err(VmError::IllegalMutation {
                reason: format!("{what} called from a read-only context"),
            });
        }
        Ok(())
    }

    fn namespace(&self) -> Namespace {
        Namespace::program(self.program.name())
    }
}

/// Check argument count and types of a call to `function`.
pub fn check_args(function: &FunctionDef, args: &[Value]) -> Result<(), VmError> {
    if args.len() != function.params.len() {
        return Err(VmError::Arity {
            function: function.name.clone(),
            expected: function.params.len(),
            got: args.len(),
        });
    }
    for ((name, ty), arg) in function.params.iter().zip(args) {
        if !ty.admits(arg) {
            return Err(VmError::type_error(format!(
                "argument '{name}' of {}: expected {ty}, got {arg}",
                function.name
            )));
        }
    }
    Ok(())
}

fn expect_bool(value: Value, what: &str) -> Result<bool, VmError> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(VmError::type_error(format!(
            "{what} expects bool, got {}",
            other.type_name()
        ))),
    }
}

/// Executes program code against a transaction.
pub struct Interpreter<'a> {
    registry: &'a Registry,
    tx: &'a mut Transaction,
    block_height: BlockHeight,
    call_stack: CallStack,
    cost: CostTracker,
    events: Vec<Event>,
}

impl<'a> Interpreter<'a> {
    pub fn new(registry: &'a Registry, tx: &'a mut Transaction, block_height: BlockHeight) -> Self {
        Self {
            registry,
            tx,
            block_height,
            call_stack: CallStack::new(),
            cost: CostTracker::new(),
            events: Vec::new(),
        }
    }

    /// Consume the interpreter, returning emitted events and consumed cost.
    pub fn finish(self) -> (Vec<Event>, ExecutionCost) {
        (self.events, self.cost.total())
    }

    /// Run `function` of `program` as the outermost call, with
    /// `contract-caller` equal to `sender`.
    pub fn call_function(
        &mut self,
        program: &Program,
        function: &FunctionDef,
        args: Vec<Value>,
        sender: Principal,
        read_only: bool,
    ) -> Result<Value, VmError> {
        self.call_stack.push(program.id.clone())?;
        let result = self.apply_function(program, function, args, sender.clone(), sender, read_only);
        self.call_stack.pop();
        result
    }

    /// Evaluate a deploy-time initializer (constant or data-var initial
    /// value) in a read-only context.
    pub fn eval_initializer(
        &mut self,
        program: &Program,
        expr: &Expr,
        sender: Principal,
    ) -> Result<Value, VmError> {
        self.call_stack.push(program.id.clone())?;
        let mut env = Env {
            program,
            sender: sender.clone(),
            caller: sender,
            read_only: true,
            locals: Vec::new(),
        };
        let result = match self.eval(expr, &mut env) {
            Ok(v) | Err(Interrupt::ShortReturn(v)) => Ok(v),
            Err(Interrupt::Error(e)) => Err(e),
        };
        self.call_stack.pop();
        result
    }

    fn apply_function(
        &mut self,
        program: &Program,
        function: &FunctionDef,
        args: Vec<Value>,
        sender: Principal,
        caller: Principal,
        read_only: bool,
    ) -> Result<Value, VmError> {
        check_args(function, &args)?;
        self.cost.charge_runtime(COST_FUNCTION_CALL);
        self.call_stack.enter_function()?;
        let result = self.run_body(program, function, args, sender, caller, read_only);
        self.call_stack.exit_function();
        result
    }

    fn run_body(
        &mut self,
        program: &Program,
        function: &FunctionDef,
        args: Vec<Value>,
        sender: Principal,
        caller: Principal,
        read_only: bool,
    ) -> Result<Value, VmError> {
        let mut env = Env {
            program,
            sender,
            caller,
            read_only: read_only || function.visibility == Visibility::ReadOnly,
            locals: function
                .params
                .iter()
                .map(|(name, _)| name.clone())
                .zip(args)
                .collect(),
        };
        let value = match self.eval_body(&function.body, &mut env) {
            Ok(v) | Err(Interrupt::ShortReturn(v)) => v,
            Err(Interrupt::Error(e)) => return Err(e),
        };
        if function.visibility == Visibility::Public && !matches!(value, Value::Response(_)) {
            return Err(VmError::type_error(format!(
                "public function '{}' must return a response, got {}",
                function.name,
                value.type_name()
            )));
        }
        Ok(value)
    }

    fn eval_body(&mut self, body: &[Expr], env: &mut Env<'_>) -> EvalResult {
        let mut last = None;
        for expr in body {
            last = Some(self.eval(expr, env)?);
        }
        last.ok_or_else(|| VmError::abort("empty body").into())
    }

    /// Evaluate `body` with `name` bound to `value`.
    fn eval_bound(&mut self, name: &str, value: Value, body: &Expr, env: &mut Env<'_>) -> EvalResult {
        env.locals.push((name.to_string(), value));
        let result = self.eval(body, env);
        env.locals.pop();
        result
    }

    fn eval_let(&mut self, bindings: &[(String, Expr)], body: &[Expr], env: &mut Env<'_>) -> EvalResult {
        for (name, expr) in bindings {
            let value = self.eval(expr, env)?;
            env.locals.push((name.clone(), value));
        }
        self.eval_body(body, env)
    }

    fn eval(&mut self, expr: &Expr, env: &mut Env<'_>) -> EvalResult {
        self.cost.charge_runtime(COST_PER_EXPRESSION);
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Local(name) => env
                .lookup(name)
                .cloned()
                .ok_or_else(|| VmError::abort(format!("unbound local '{name}'")).into()),
            Expr::Constant(name) => env
                .program
                .constants
                .get(name)
                .cloned()
                .ok_or_else(|| VmError::abort(format!("constant '{name}' is not initialized")).into()),
            Expr::Keyword(Keyword::TxSender) => Ok(Value::Principal(env.sender.clone())),
            Expr::Keyword(Keyword::ContractCaller) => Ok(Value::Principal(env.caller.clone())),
            Expr::Keyword(Keyword::BlockHeight) => Ok(Value::UInt(self.block_height as u128)),
            Expr::Native { func, args } => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.native(*func, values, env)?)
            }
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.eval(cond, env)?;
                if expect_bool(cond, "if")? {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Let { bindings, body } => {
                let mark = env.locals.len();
                let result = self.eval_let(bindings, body, env);
                env.locals.truncate(mark);
                result
            }
            Expr::Begin(body) => self.eval_body(body, env),
            Expr::MatchOptional {
                input,
                some_name,
                some_branch,
                none_branch,
            } => match self.eval(input, env)? {
                Value::Optional(Some(v)) => self.eval_bound(some_name, *v, some_branch, env),
                Value::Optional(None) => self.eval(none_branch, env),
                other => Err(VmError::type_error(format!(
                    "match expects optional, got {}",
                    other.type_name()
                ))
                .into()),
            },
            Expr::MatchResponse {
                input,
                ok_name,
                ok_branch,
                err_name,
                err_branch,
            } => match self.eval(input, env)? {
                Value::Response(ResponseData {
                    committed: true,
                    data,
                }) => self.eval_bound(ok_name, *data, ok_branch, env),
                Value::Response(ResponseData { data, .. }) => {
                    self.eval_bound(err_name, *data, err_branch, env)
                }
                other => Err(VmError::type_error(format!(
                    "match expects response, got {}",
                    other.type_name()
                ))
                .into()),
            },
            Expr::And(operands) => {
                for operand in operands {
                    let v = self.eval(operand, env)?;
                    if !expect_bool(v, "and")? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            Expr::Or(operands) => {
                for operand in operands {
                    let v = self.eval(operand, env)?;
                    if expect_bool(v, "or")? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            Expr::Asserts { cond, thrown } => {
                let v = self.eval(cond, env)?;
                if expect_bool(v, "asserts!")? {
                    Ok(Value::Bool(true))
                } else {
                    Err(Interrupt::ShortReturn(self.eval(thrown, env)?))
                }
            }
            Expr::Unwrap { input, thrown } => match self.eval(input, env)? {
                Value::Optional(Some(v)) => Ok(*v),
                Value::Response(ResponseData {
                    committed: true,
                    data,
                }) => Ok(*data),
                Value::Optional(None) | Value::Response(_) => {
                    Err(Interrupt::ShortReturn(self.eval(thrown, env)?))
                }
                other => Err(VmError::type_error(format!(
                    "unwrap! expects optional or response, got {}",
                    other.type_name()
                ))
                .into()),
            },
            Expr::UnwrapErr { input, thrown } => match self.eval(input, env)? {
                Value::Response(ResponseData {
                    committed: false,
                    data,
                }) => Ok(*data),
                Value::Response(_) => Err(Interrupt::ShortReturn(self.eval(thrown, env)?)),
                other => Err(VmError::type_error(format!(
                    "unwrap-err! expects response, got {}",
                    other.type_name()
                ))
                .into()),
            },
            Expr::Try(input) => match self.eval(input, env)? {
                Value::Optional(Some(v)) => Ok(*v),
                Value::Optional(None) => Err(Interrupt::ShortReturn(Value::none())),
                Value::Response(ResponseData {
                    committed: true,
                    data,
                }) => Ok(*data),
                err @ Value::Response(_) => Err(Interrupt::ShortReturn(err)),
                other => Err(VmError::type_error(format!(
                    "try! expects optional or response, got {}",
                    other.type_name()
                ))
                .into()),
            },
            Expr::AsContract(inner) => {
                let me = Principal::Contract(env.program.id.clone());
                let sender = std::mem::replace(&mut env.sender, me.clone());
                let caller = std::mem::replace(&mut env.caller, me);
                let result = self.eval(inner, env);
                env.sender = sender;
                env.caller = caller;
                result
            }
            Expr::VarGet(var) => Ok(self.var_get(env, var)?),
            Expr::VarSet { var, value } => {
                let value = self.eval(value, env)?;
                self.var_set(env, var, value)?;
                Ok(Value::Bool(true))
            }
            Expr::MapGet { map, key } => {
                let key = self.eval(key, env)?;
                Ok(self.map_get(env, map, &key)?)
            }
            Expr::MapSet { map, key, value } => {
                let key = self.eval(key, env)?;
                let value = self.eval(value, env)?;
                self.map_put(env, map, &key, &value, true)?;
                Ok(Value::Bool(true))
            }
            Expr::MapInsert { map, key, value } => {
                let key = self.eval(key, env)?;
                let value = self.eval(value, env)?;
                Ok(Value::Bool(self.map_put(env, map, &key, &value, false)?))
            }
            Expr::MapDelete { map, key } => {
                let key = self.eval(key, env)?;
                Ok(Value::Bool(self.map_delete(env, map, &key)?))
            }
            Expr::TupleCons(fields) => {
                let mut out = std::collections::BTreeMap::new();
                for (name, expr) in fields {
                    out.insert(name.clone(), self.eval(expr, env)?);
                }
                Ok(Value::Tuple(out))
            }
            Expr::TupleGet { field, tuple } => {
                let value = self.eval(tuple, env)?;
                Ok(tuple_get(field, value)?)
            }
            Expr::CallUser { function, args } => {
                let program = env.program;
                let def = program
                    .function(function)
                    .ok_or_else(|| VmError::UnknownFunction {
                        program: program.name().to_string(),
                        function: function.clone(),
                    })?;
                let values = args
                    .iter()
                    .map(|a| self.eval(a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.apply_function(
                    program,
                    def,
                    values,
                    env.sender.clone(),
                    env.caller.clone(),
                    env.read_only,
                )?)
            }
            Expr::ContractCall {
                program,
                function,
                args,
            } => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.contract_call(program, function, values, env)?)
            }
        }
    }

    fn native(&mut self, func: NativeFunction, mut args: Vec<Value>, env: &Env<'_>) -> Result<Value, VmError> {
        if !func.is_host() {
            return natives::apply(func, args);
        }
        match func {
            NativeFunction::Print => {
                self.cost.charge_runtime(COST_PRINT);
                let value = args.remove(0);
                self.events.push(Event::Print {
                    program: env.program.id.clone(),
                    value: value.clone(),
                });
                Ok(value)
            }
            NativeFunction::StxGetBalance => match args.remove(0) {
                Value::Principal(p) => Ok(Value::UInt(self.load_account(&p)?.balance)),
                other => Err(VmError::type_error(format!(
                    "stx-get-balance expects principal, got {}",
                    other.type_name()
                ))),
            },
            _ => {
                env.ensure_mutable("stx-transfer?")?;
                let recipient = args.remove(2);
                let sender = args.remove(1);
                let amount = args.remove(0);
                match (amount, sender, recipient) {
                    (Value::UInt(amount), Value::Principal(sender), Value::Principal(recipient)) => {
                        self.transfer_stx(amount, &sender, &recipient, &env.sender)
                    }
                    (a, s, r) => Err(VmError::type_error(format!(
                        "stx-transfer? expects (uint principal principal), got ({} {} {})",
                        a.type_name(),
                        s.type_name(),
                        r.type_name()
                    ))),
                }
            }
        }
    }

    fn contract_call(
        &mut self,
        target: &str,
        function: &str,
        args: Vec<Value>,
        env: &Env<'_>,
    ) -> Result<Value, VmError> {
        self.cost.charge_runtime(COST_CONTRACT_CALL);
        let callee = self.registry.resolve(target)?;
        let def = callee
            .function(function)
            .filter(|f| f.visibility != Visibility::Private)
            .ok_or_else(|| VmError::UnknownFunction {
                program: target.to_string(),
                function: function.to_string(),
            })?;
        let caller = Principal::Contract(env.program.id.clone());
        self.call_stack.push(callee.id.clone())?;

        let checkpoint = self.tx.checkpoint();
        let events_mark = self.events.len();
        let result = self.apply_function(
            &callee,
            def,
            args,
            env.sender.clone(),
            caller,
            env.read_only,
        );
        self.call_stack.pop();

        let value = result?;
        if value.is_err_response() {
            // The callee's writes and events are undone; the caller decides
            // whether to abort.
            self.tx.rollback(checkpoint);
            self.events.truncate(events_mark);
        }
        Ok(value)
    }

    // ─── State Access ───────────────────────────────────────────────────────

    fn var_get(&mut self, env: &Env<'_>, var: &str) -> Result<Value, VmError> {
        let bytes = self.tx.get(&env.namespace(), &state::data_var_key(var))?;
        self.cost.record_read(bytes.as_ref().map_or(0, Vec::len));
        let bytes =
            bytes.ok_or_else(|| VmError::abort(format!("data variable '{var}' is not initialized")))?;
        state::decode_value(&bytes)
    }

    fn var_set(&mut self, env: &Env<'_>, var: &str, value: Value) -> Result<(), VmError> {
        env.ensure_mutable("var-set")?;
        let def = env
            .program
            .data_vars
            .get(var)
            .ok_or_else(|| VmError::abort(format!("unknown data variable '{var}'")))?;
        if !def.ty.admits(&value) {
            return Err(VmError::type_error(format!(
                "var-set {var}: expected {}, got {value}",
                def.ty
            )));
        }
        let len = state::write_value(self.tx, &env.namespace(), &state::data_var_key(var), &value)?;
        self.cost.record_write(len);
        Ok(())
    }

    fn map_key(&self, env: &Env<'_>, map: &str, key: &Value) -> Result<Vec<u8>, VmError> {
        let def = env
            .program
            .maps
            .get(map)
            .ok_or_else(|| VmError::abort(format!("unknown map '{map}'")))?;
        if !def.key_ty.admits(key) {
            return Err(VmError::type_error(format!(
                "map {map}: key expected {}, got {key}",
                def.key_ty
            )));
        }
        Ok(state::map_entry_key(map, key))
    }

    fn map_get(&mut self, env: &Env<'_>, map: &str, key: &Value) -> Result<Value, VmError> {
        let storage_key = self.map_key(env, map, key)?;
        let bytes = self.tx.get(&env.namespace(), &storage_key)?;
        self.cost.record_read(bytes.as_ref().map_or(0, Vec::len));
        match bytes {
            Some(bytes) => Ok(Value::some(state::decode_value(&bytes)?)),
            None => Ok(Value::none()),
        }
    }

    /// Write a map entry. With `overwrite` false the write only happens if
    /// the key is absent; returns whether it happened.
    fn map_put(
        &mut self,
        env: &Env<'_>,
        map: &str,
        key: &Value,
        value: &Value,
        overwrite: bool,
    ) -> Result<bool, VmError> {
        env.ensure_mutable(if overwrite { "map-set" } else { "map-insert" })?;
        let storage_key = self.map_key(env, map, key)?;
        if let Some(def) = env.program.maps.get(map) {
            if !def.value_ty.admits(value) {
                return Err(VmError::type_error(format!(
                    "map {map}: value expected {}, got {value}",
                    def.value_ty
                )));
            }
        }
        let namespace = env.namespace();
        if !overwrite {
            let existing = self.tx.get(&namespace, &storage_key)?;
            self.cost.record_read(existing.as_ref().map_or(0, Vec::len));
            if existing.is_some() {
                return Ok(false);
            }
        }
        let len = state::write_value(self.tx, &namespace, &storage_key, value)?;
        self.cost.record_write(len);
        Ok(true)
    }

    fn map_delete(&mut self, env: &Env<'_>, map: &str, key: &Value) -> Result<bool, VmError> {
        env.ensure_mutable("map-delete")?;
        let storage_key = self.map_key(env, map, key)?;
        let namespace = env.namespace();
        let existing = self.tx.get(&namespace, &storage_key)?;
        self.cost.record_read(existing.as_ref().map_or(0, Vec::len));
        if existing.is_none() {
            return Ok(false);
        }
        self.tx.delete(&namespace, &storage_key)?;
        self.cost.record_write(0);
        Ok(true)
    }

    fn load_account(&mut self, principal: &Principal) -> Result<Account, VmError> {
        let bytes = self
            .tx
            .get(&Namespace::Accounts, &state::account_key(principal))?;
        self.cost.record_read(bytes.as_ref().map_or(0, Vec::len));
        match bytes {
            Some(bytes) => state::decode_account(&bytes),
            None => Ok(Account::new(principal.clone(), 0)),
        }
    }

    fn store_account(&mut self, account: &Account) -> Result<(), VmError> {
        let len = state::write_account(self.tx, account)?;
        self.cost.record_write(len);
        Ok(())
    }

    /// Move `amount` from `sender` to `recipient`.
    ///
    /// Returns `(ok true)` or `(err uN)` with the codes defined above.
    /// `tx_sender` is the principal authorising the transfer.
    pub fn transfer_stx(
        &mut self,
        amount: Amount,
        sender: &Principal,
        recipient: &Principal,
        tx_sender: &Principal,
    ) -> Result<Value, VmError> {
        self.cost.charge_runtime(COST_TRANSFER);
        if amount == 0 {
            return Ok(Value::error(Value::UInt(ERR_NON_POSITIVE_AMOUNT)));
        }
        if sender == recipient {
            return Ok(Value::error(Value::UInt(ERR_SAME_SENDER_RECIPIENT)));
        }
        if sender != tx_sender {
            return Ok(Value::error(Value::UInt(ERR_SENDER_NOT_TX_SENDER)));
        }
        let mut from = self.load_account(sender)?;
        if from.balance < amount {
            return Ok(Value::error(Value::UInt(ERR_INSUFFICIENT_BALANCE)));
        }
        let mut to = self.load_account(recipient)?;
        from.debit(amount)
            .map_err(|e| VmError::abort(e.to_string()))?;
        to.credit(amount).map_err(|e| VmError::abort(e.to_string()))?;
        self.store_account(&from)?;
        self.store_account(&to)?;
        self.events.push(Event::StxTransfer {
            sender: sender.clone(),
            recipient: recipient.clone(),
            amount,
        });
        Ok(Value::okay_true())
    }
}

fn tuple_get(field: &str, value: Value) -> Result<Value, VmError> {
    let missing = || VmError::type_error(format!("tuple has no field '{field}'"));
    match value {
        Value::Tuple(mut fields) => fields.remove(field).ok_or_else(missing),
        Value::Optional(None) => Ok(Value::none()),
        Value::Optional(Some(inner)) => match *inner {
            Value::Tuple(mut fields) => fields.remove(field).map(Value::some).ok_or_else(missing),
            other => Err(VmError::type_error(format!(
                "get expects a tuple, got optional {}",
                other.type_name()
            ))),
        },
        other => Err(VmError::type_error(format!(
            "get expects a tuple, got {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::deploy_into;
    use simnet_storage::state_store::StateStore;
    use simnet_types::primitives::Address;

    const PROGRAM: &str = r#"
        (define-map names uint (string-ascii 16))
        (define-read-only (first-some (a (optional uint)) (b (optional uint)))
          (match a x x (unwrap! b u0)))
        (define-read-only (checked (r (response uint uint)))
          (ok (+ (try! r) u1)))
        (define-read-only (scoped (n uint))
          (let ((a (* n u2)) (b (+ a u1))) (- b a)))
        (define-read-only (lazy (n uint))
          (or (is-eq n u0) (> (/ u10 n) u1)))
        (define-read-only (field (t {a: uint, b: bool})) (get b t))
        (define-public (name (id uint) (label (string-ascii 16)))
          (ok (map-insert names id label)))
        (define-public (forget (id uint)) (ok (map-delete names id)))
    "#;

    fn setup() -> (StateStore, Registry) {
        let store = StateStore::new();
        let mut registry = Registry::new();
        deploy_into(&mut registry, &store, "sampler", PROGRAM, Address::new([1u8; 20]), 0)
            .unwrap();
        (store, registry)
    }

    fn run(store: &StateStore, registry: &Registry, function: &str, args: Vec<Value>) -> Result<Value, VmError> {
        let program = registry.resolve("sampler").unwrap();
        let def = program.function(function).unwrap();
        let read_only = def.visibility == Visibility::ReadOnly;
        let mut tx = Transaction::new(store.snapshot().unwrap());
        let sender = Principal::Standard(Address::new([2u8; 20]));
        let mut interpreter = Interpreter::new(registry, &mut tx, 1);
        let result = interpreter.call_function(&program, def, args, sender, read_only);
        drop(interpreter);
        store.apply(tx.into_delta()).unwrap();
        result
    }

    #[test]
    fn test_short_returns() {
        let (store, registry) = setup();
        let some = |v| Value::some(Value::UInt(v));
        assert_eq!(
            run(&store, &registry, "first-some", vec![some(3), Value::none()]),
            Ok(Value::UInt(3))
        );
        assert_eq!(
            run(&store, &registry, "first-some", vec![Value::none(), some(4)]),
            Ok(Value::UInt(4))
        );
        assert_eq!(
            run(&store, &registry, "first-some", vec![Value::none(), Value::none()]),
            Ok(Value::UInt(0))
        );

        let ok = Value::okay(Value::UInt(1));
        assert_eq!(
            run(&store, &registry, "checked", vec![ok]),
            Ok(Value::okay(Value::UInt(2)))
        );
        let err = Value::error(Value::UInt(9));
        assert_eq!(run(&store, &registry, "checked", vec![err.clone()]), Ok(err));
    }

    #[test]
    fn test_let_is_sequential() {
        let (store, registry) = setup();
        assert_eq!(
            run(&store, &registry, "scoped", vec![Value::UInt(5)]),
            Ok(Value::UInt(1))
        );
    }

    #[test]
    fn test_or_short_circuits() {
        let (store, registry) = setup();
        // Division by zero is never evaluated.
        assert_eq!(
            run(&store, &registry, "lazy", vec![Value::UInt(0)]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            run(&store, &registry, "lazy", vec![Value::UInt(20)]),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn test_tuple_get() {
        let (store, registry) = setup();
        let t = Value::tuple([("a", Value::UInt(1)), ("b", Value::Bool(true))]);
        assert_eq!(run(&store, &registry, "field", vec![t]), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_map_insert_and_delete() {
        let (store, registry) = setup();
        let name = |s: &str| Value::StringAscii(s.to_string());
        assert_eq!(
            run(&store, &registry, "name", vec![Value::UInt(1), name("alice")]),
            Ok(Value::okay(Value::Bool(true)))
        );
        assert_eq!(
            run(&store, &registry, "name", vec![Value::UInt(1), name("bob")]),
            Ok(Value::okay(Value::Bool(false)))
        );
        assert_eq!(
            run(&store, &registry, "forget", vec![Value::UInt(1)]),
            Ok(Value::okay(Value::Bool(true)))
        );
        assert_eq!(
            run(&store, &registry, "forget", vec![Value::UInt(1)]),
            Ok(Value::okay(Value::Bool(false)))
        );
    }

    #[test]
    fn test_check_args() {
        let (_, registry) = setup();
        let program = registry.resolve("sampler").unwrap();
        let def = program.function("scoped").unwrap();
        assert!(matches!(check_args(def, &[]), Err(VmError::Arity { .. })));
        assert!(matches!(
            check_args(def, &[Value::Int(1)]),
            Err(VmError::Type { .. })
        ));
        assert!(check_args(def, &[Value::UInt(1)]).is_ok());
    }

    #[test]
    fn test_transfer_codes() {
        let (store, registry) = setup();
        let alice = Principal::Standard(Address::new([0xa1; 20]));
        let bob = Principal::Standard(Address::new([0xb0; 20]));
        let mut tx = Transaction::new(store.snapshot().unwrap());
        let mut interpreter = Interpreter::new(&registry, &mut tx, 1);
        assert_eq!(
            interpreter.transfer_stx(1, &alice, &bob, &alice),
            Ok(Value::error(Value::UInt(ERR_INSUFFICIENT_BALANCE)))
        );
        assert_eq!(
            interpreter.transfer_stx(1, &alice, &bob, &bob),
            Ok(Value::error(Value::UInt(ERR_SENDER_NOT_TX_SENDER)))
        );
        let (events, cost) = interpreter.finish();
        assert!(events.is_empty());
        assert_eq!(cost.runtime, 2 * COST_TRANSFER);
    }
}
