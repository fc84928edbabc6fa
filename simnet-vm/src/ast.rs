//! Compiled form of a program: resolved expressions and definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use simnet_types::primitives::{BlockHeight, Hash};
use simnet_types::principal::ProgramId;
use simnet_types::signature::TypeSignature;
use simnet_types::value::Value;

use crate::natives::NativeFunction;
use crate::parser::Span;

/// Who may call a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    /// Callable by transactions and other programs; may mutate state.
    Public,
    /// Callable by transactions and other programs; never mutates state.
    ReadOnly,
    /// Callable only from inside the defining program.
    Private,
}

/// Context values readable from any expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    TxSender,
    ContractCaller,
    BlockHeight,
}

/// A resolved expression. Every name has been bound to its definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Function parameter or `let` binding.
    Local(String),
    Constant(String),
    Keyword(Keyword),
    Native {
        func: NativeFunction,
        args: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Let {
        bindings: Vec<(String, Expr)>,
        body: Vec<Expr>,
    },
    Begin(Vec<Expr>),
    MatchOptional {
        input: Box<Expr>,
        some_name: String,
        some_branch: Box<Expr>,
        none_branch: Box<Expr>,
    },
    MatchResponse {
        input: Box<Expr>,
        ok_name: String,
        ok_branch: Box<Expr>,
        err_name: String,
        err_branch: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Asserts {
        cond: Box<Expr>,
        thrown: Box<Expr>,
    },
    Unwrap {
        input: Box<Expr>,
        thrown: Box<Expr>,
    },
    UnwrapErr {
        input: Box<Expr>,
        thrown: Box<Expr>,
    },
    Try(Box<Expr>),
    AsContract(Box<Expr>),
    VarGet(String),
    VarSet {
        var: String,
        value: Box<Expr>,
    },
    MapGet {
        map: String,
        key: Box<Expr>,
    },
    MapSet {
        map: String,
        key: Box<Expr>,
        value: Box<Expr>,
    },
    MapInsert {
        map: String,
        key: Box<Expr>,
        value: Box<Expr>,
    },
    MapDelete {
        map: String,
        key: Box<Expr>,
    },
    TupleCons(Vec<(String, Expr)>),
    TupleGet {
        field: String,
        tuple: Box<Expr>,
    },
    CallUser {
        function: String,
        args: Vec<Expr>,
    },
    ContractCall {
        program: String,
        function: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub visibility: Visibility,
    pub params: Vec<(String, TypeSignature)>,
    pub body: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataVarDef {
    pub name: String,
    pub ty: TypeSignature,
    pub initial: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapDef {
    pub name: String,
    pub key_ty: TypeSignature,
    pub value_ty: TypeSignature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDef {
    pub name: String,
    pub expr: Expr,
    pub span: Span,
}

/// A top-level definition that is evaluated once at deploy time.
#[derive(Debug, Clone, PartialEq)]
pub enum Initializer {
    Constant(ConstantDef),
    DataVar(String),
}

/// Output of the compiler, before deploy-time evaluation.
#[derive(Debug, Clone, Default)]
pub struct CompiledProgram {
    pub functions: BTreeMap<String, FunctionDef>,
    pub data_vars: BTreeMap<String, DataVarDef>,
    pub maps: BTreeMap<String, MapDef>,
    /// Constants and data variables in source order.
    pub initializers: Vec<Initializer>,
}

/// A deployed program. Immutable once in the registry.
#[derive(Debug, Clone)]
pub struct Program {
    pub id: ProgramId,
    pub source: String,
    /// BLAKE3 of the source text.
    pub code_hash: Hash,
    pub deployed_at: BlockHeight,
    pub functions: BTreeMap<String, FunctionDef>,
    pub data_vars: BTreeMap<String, DataVarDef>,
    pub maps: BTreeMap<String, MapDef>,
    /// Constant values, evaluated at deploy time.
    pub constants: BTreeMap<String, Value>,
}

impl Program {
    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }
}
