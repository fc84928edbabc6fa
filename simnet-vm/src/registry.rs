use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use simnet_crypto::hash::blake3_hash;
use simnet_storage::delta::StateDelta;
use simnet_storage::memory::Snapshot;
use simnet_storage::traits::Namespace;
use simnet_storage::transaction::Transaction;
use simnet_types::constants::MAX_PROGRAM_SOURCE_LEN;
use simnet_types::primitives::{Address, BlockHeight};
use simnet_types::principal::{validate_program_name, Principal, ProgramId};
use simnet_types::value::Value;

use crate::ast::{Expr, Initializer, Program, Visibility};
use crate::compiler::compile;
use crate::error::VmError;
use crate::interpreter::Interpreter;
use crate::parser::Span;
use crate::state;

/// A compiled program and the writes that create its initial state.
#[derive(Debug)]
pub struct Deployment {
    pub program: Program,
    pub delta: StateDelta,
}

/// Deployed programs, keyed by their unique name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    programs: BTreeMap<String, Arc<Program>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a program by name or by its full `0x<issuer>.<name>` id.
    pub fn resolve(&self, name: &str) -> Result<Arc<Program>, VmError> {
        let not_found = || VmError::NotFound {
            what: format!("program '{name}'"),
        };
        if name.contains('.') {
            let id = match name.parse::<Principal>() {
                Ok(Principal::Contract(id)) => id,
                _ => return Err(not_found()),
            };
            return self
                .programs
                .get(&id.name)
                .filter(|p| p.id == id)
                .cloned()
                .ok_or_else(not_found);
        }
        self.programs.get(name).cloned().ok_or_else(not_found)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.programs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Ids of all deployed programs, ordered by name.
    pub fn list(&self) -> Vec<ProgramId> {
        self.programs.values().map(|p| p.id.clone()).collect()
    }

    /// Compile `source` under `name` and compute its initial state on top of
    /// `base`.
    ///
    /// Nothing is visible until the caller commits the returned delta and
    /// then [`install`](Registry::install)s the program, so the program and
    /// its initial data-var values appear together or not at all.
    pub fn prepare(
        &self,
        base: Snapshot,
        name: &str,
        source: &str,
        owner: Address,
        height: BlockHeight,
    ) -> Result<Deployment, VmError> {
        if self.contains(name) {
            return Err(VmError::DuplicateName {
                name: name.to_string(),
            });
        }
        validate_program_name(name).map_err(|e| VmError::Compile {
            line: 0,
            column: 0,
            reason: e.to_string(),
        })?;
        if source.len() > MAX_PROGRAM_SOURCE_LEN {
            return Err(VmError::Compile {
                line: 0,
                column: 0,
                reason: format!(
                    "source is {} bytes, maximum is {MAX_PROGRAM_SOURCE_LEN}",
                    source.len()
                ),
            });
        }

        let id = ProgramId::new(owner, name);
        let compiled = compile(&id, source, self)?;
        let mut program = Program {
            id: id.clone(),
            source: source.to_string(),
            code_hash: blake3_hash(source.as_bytes()),
            deployed_at: height,
            functions: compiled.functions,
            data_vars: compiled.data_vars,
            maps: compiled.maps,
            constants: BTreeMap::new(),
        };

        let namespace = Namespace::program(name);
        let mut tx = Transaction::new(base);
        tx.create_namespace(namespace.clone())?;
        let sender = Principal::Standard(owner);

        for initializer in &compiled.initializers {
            match initializer {
                Initializer::Constant(def) => {
                    let value = self
                        .run_initializer(&program, &mut tx, &def.expr, &sender, height)
                        .map_err(|e| at_span(def.span, &def.name, e))?;
                    program.constants.insert(def.name.clone(), value);
                }
                Initializer::DataVar(var) => {
                    let def = program
                        .data_vars
                        .get(var)
                        .ok_or_else(|| VmError::abort(format!("unknown data variable '{var}'")))?;
                    let value = self
                        .run_initializer(&program, &mut tx, &def.initial, &sender, height)
                        .map_err(|e| at_span(def.span, var, e))?;
                    if !def.ty.admits(&value) {
                        return Err(at_span(
                            def.span,
                            var,
                            VmError::type_error(format!("expected {}, got {value}", def.ty)),
                        ));
                    }
                    state::write_value(&mut tx, &namespace, &state::data_var_key(var), &value)?;
                }
            }
        }

        Ok(Deployment {
            program,
            delta: tx.into_delta(),
        })
    }

    /// Make a prepared program resolvable. Its delta must already be
    /// committed.
    pub fn install(&mut self, program: Program) -> ProgramId {
        let id = program.id.clone();
        info!(
            program = %id,
            code_hash = %hex::encode(program.code_hash),
            height = program.deployed_at,
            "program deployed"
        );
        self.programs.insert(id.name.clone(), Arc::new(program));
        id
    }

    fn run_initializer(
        &self,
        program: &Program,
        tx: &mut Transaction,
        expr: &Expr,
        sender: &Principal,
        height: BlockHeight,
    ) -> Result<Value, VmError> {
        let mut interpreter = Interpreter::new(self, tx, height);
        interpreter.eval_initializer(program, expr, sender.clone())
    }

    /// Public description of a deployed program.
    pub fn interface(&self, name: &str) -> Result<ProgramInterface, VmError> {
        let program = self.resolve(name)?;
        Ok(ProgramInterface::from(program.as_ref()))
    }
}

fn at_span(span: Span, name: &str, err: VmError) -> VmError {
    VmError::Compile {
        line: span.line,
        column: span.column,
        reason: format!("initializer of '{name}' failed: {err}"),
    }
}

// ─── Interface ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgInterface {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInterface {
    pub name: String,
    pub access: Visibility,
    pub args: Vec<ArgInterface>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableInterface {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapInterface {
    pub name: String,
    pub key: String,
    pub value: String,
}

/// Functions, data variables and maps of a deployed program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramInterface {
    pub id: ProgramId,
    pub code_hash: String,
    pub deployed_at: BlockHeight,
    pub functions: Vec<FunctionInterface>,
    pub variables: Vec<VariableInterface>,
    pub maps: Vec<MapInterface>,
}

impl From<&Program> for ProgramInterface {
    fn from(program: &Program) -> Self {
        Self {
            id: program.id.clone(),
            code_hash: hex::encode(program.code_hash),
            deployed_at: program.deployed_at,
            functions: program
                .functions
                .values()
                .map(|f| FunctionInterface {
                    name: f.name.clone(),
                    access: f.visibility,
                    args: f
                        .params
                        .iter()
                        .map(|(name, ty)| ArgInterface {
                            name: name.clone(),
                            ty: ty.to_string(),
                        })
                        .collect(),
                })
                .collect(),
            variables: program
                .data_vars
                .values()
                .map(|v| VariableInterface {
                    name: v.name.clone(),
                    ty: v.ty.to_string(),
                })
                .collect(),
            maps: program
                .maps
                .values()
                .map(|m| MapInterface {
                    name: m.name.clone(),
                    key: m.key_ty.to_string(),
                    value: m.value_ty.to_string(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
use simnet_storage::state_store::StateStore;

/// Prepare, commit and install in one step.
#[cfg(test)]
pub(crate) fn deploy_into(
    registry: &mut Registry,
    store: &StateStore,
    name: &str,
    source: &str,
    owner: Address,
    height: BlockHeight,
) -> Result<ProgramId, VmError> {
    let Deployment { program, delta } = registry.prepare(store.snapshot()?, name, source, owner, height)?;
    store.apply(delta)?;
    Ok(registry.install(program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use simnet_storage::traits::StateReader;

    const COUNTER: &str = r#"
        (define-constant start u10)
        (define-data-var count uint (+ start u1))
        (define-read-only (get-count) (var-get count))
        (define-public (increment)
          (begin (var-set count (+ (var-get count) u1)) (ok (var-get count))))
    "#;

    fn owner() -> Address {
        Address::new([7u8; 20])
    }

    #[test]
    fn test_deploy_then_resolve() {
        let store = StateStore::new();
        let mut registry = Registry::new();
        let id = deploy_into(&mut registry, &store, "counter", COUNTER, owner(), 0).unwrap();

        let program = registry.resolve("counter").unwrap();
        assert_eq!(program.id, id);
        assert_eq!(program.code_hash, blake3_hash(COUNTER.as_bytes()));
        assert_eq!(program.constants.get("start"), Some(&Value::UInt(10)));
        assert!(program.function("increment").is_some());

        // Full id resolves to the same program.
        let by_id = registry.resolve(&id.to_string()).unwrap();
        assert_eq!(by_id.id, id);
        assert_eq!(registry.list(), vec![id]);

        let snap = store.snapshot().unwrap();
        let stored = state::read_value(&snap, &Namespace::program("counter"), &state::data_var_key("count"))
            .unwrap();
        assert_eq!(stored, Some(Value::UInt(11)));
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = Registry::new();
        assert_eq!(registry.resolve("ghost").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            registry.resolve("0xnot-an-address.ghost").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_duplicate_name_regardless_of_source() {
        let store = StateStore::new();
        let mut registry = Registry::new();
        deploy_into(&mut registry, &store, "counter", COUNTER, owner(), 0).unwrap();
        let err = deploy_into(&mut registry, &store, "counter", "(define-read-only (f) u1)", owner(), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
        let err = deploy_into(&mut registry, &store, "counter", COUNTER, owner(), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
    }

    #[test]
    fn test_failed_deploy_leaves_no_trace() {
        let store = StateStore::new();
        let mut registry = Registry::new();
        let before = store.snapshot().unwrap().state_root();

        let err = deploy_into(&mut registry, &store, "broken", "(define-public (f) (ok u1)", owner(), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);

        // Initializer failure: division by zero.
        let err = deploy_into(&mut registry, &store, "broken", "(define-data-var x uint (/ u1 u0))", owner(), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);

        assert!(!registry.contains("broken"));
        let snap = store.snapshot().unwrap();
        assert!(!snap.has_namespace(&Namespace::program("broken")));
        assert_eq!(snap.state_root(), before);
    }

    #[test]
    fn test_prepare_leaves_store_untouched() {
        let store = StateStore::new();
        let mut registry = Registry::new();
        let before = store.snapshot().unwrap().state_root();

        let deployment = registry
            .prepare(store.snapshot().unwrap(), "late", "(define-data-var x uint u7)", owner(), 0)
            .unwrap();
        assert!(!deployment.delta.is_empty());
        assert_eq!(store.snapshot().unwrap().state_root(), before);
        assert!(!registry.contains("late"));

        store.apply(deployment.delta).unwrap();
        registry.install(deployment.program);
        assert!(registry.contains("late"));
        assert!(store.snapshot().unwrap().has_namespace(&Namespace::program("late")));
    }

    #[test]
    fn test_invalid_name_is_compile_error() {
        let store = StateStore::new();
        let mut registry = Registry::new();
        let err = deploy_into(&mut registry, &store, "9lives", COUNTER, owner(), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);
    }

    #[test]
    fn test_data_var_initial_type_checked() {
        let store = StateStore::new();
        let mut registry = Registry::new();
        let err = deploy_into(&mut registry, &store, "bad", "(define-data-var x uint (+ 1 2))", owner(), 0)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compile);
    }

    #[test]
    fn test_interface() {
        let store = StateStore::new();
        let mut registry = Registry::new();
        deploy_into(&mut registry, &store, "counter", COUNTER, owner(), 3).unwrap();
        let iface = registry.interface("counter").unwrap();
        assert_eq!(iface.deployed_at, 3);
        let names: Vec<_> = iface.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["get-count", "increment"]);
        assert_eq!(iface.functions[0].access, Visibility::ReadOnly);
        assert_eq!(iface.variables[0].ty, "uint");

        let json = serde_json::to_value(&iface).unwrap();
        assert_eq!(json["functions"][1]["access"], "public");
    }
}
