//! Static analysis: turns parsed source into a [`CompiledProgram`].
//!
//! Every name is resolved here, special forms are checked for shape, type
//! signatures are parsed, and recursive function definitions and overly
//! long call chains are rejected, so evaluation always terminates.

use std::collections::{BTreeMap, BTreeSet};

use simnet_types::principal::{Principal, ProgramId};
use simnet_types::signature::TypeSignature;
use simnet_types::value::Value;

use crate::ast::{
    CompiledProgram, ConstantDef, DataVarDef, Expr, FunctionDef, Initializer, Keyword, MapDef,
    Visibility,
};
use crate::call_stack::MAX_FUNCTION_DEPTH;
use crate::error::VmError;
use crate::natives::NativeFunction;
use crate::parser::{parse, Span, SymbolicExpr, SymbolicExprKind};
use crate::registry::Registry;

/// Names with built-in meaning that no definition or binding may reuse.
const SPECIAL_FORMS: &[&str] = &[
    "define-constant",
    "define-data-var",
    "define-map",
    "define-public",
    "define-read-only",
    "define-private",
    "if",
    "let",
    "begin",
    "match",
    "and",
    "or",
    "asserts!",
    "unwrap!",
    "unwrap-err!",
    "try!",
    "as-contract",
    "var-get",
    "var-set",
    "map-get?",
    "map-set",
    "map-insert",
    "map-delete",
    "tuple",
    "get",
    "contract-call?",
    "tx-sender",
    "contract-caller",
    "block-height",
    "true",
    "false",
    "none",
];

fn is_reserved(name: &str) -> bool {
    SPECIAL_FORMS.contains(&name) || NativeFunction::lookup(name).is_some()
}

fn compile_error(span: Span, reason: impl Into<String>) -> VmError {
    VmError::Compile {
        line: span.line,
        column: span.column,
        reason: reason.into(),
    }
}

/// Compile `source` as the program `id`. Cross-program calls are resolved
/// against the programs already in `registry`.
pub fn compile(id: &ProgramId, source: &str, registry: &Registry) -> Result<CompiledProgram, VmError> {
    let exprs = parse(source).map_err(|e| compile_error(e.span, e.reason))?;
    let mut compiler = Compiler {
        id,
        registry,
        definitions: BTreeMap::new(),
        function_arity: BTreeMap::new(),
        data_var_types: BTreeMap::new(),
        maps: BTreeMap::new(),
        visible_constants: BTreeSet::new(),
        scope: Vec::new(),
        calls: BTreeSet::new(),
    };

    let forms = exprs
        .iter()
        .map(|expr| compiler.declare(expr))
        .collect::<Result<Vec<_>, _>>()?;

    let mut program = CompiledProgram::default();

    // Initializers see only the constants defined above them.
    for form in &forms {
        match form {
            TopLevel::Constant { name, expr, span } => {
                let compiled = compiler.expr(expr)?;
                compiler.visible_constants.insert(name.clone());
                program.initializers.push(Initializer::Constant(ConstantDef {
                    name: name.clone(),
                    expr: compiled,
                    span: *span,
                }));
            }
            TopLevel::DataVar {
                name,
                ty,
                initial,
                span,
            } => {
                let initial = compiler.expr(initial)?;
                program.data_vars.insert(
                    name.clone(),
                    DataVarDef {
                        name: name.clone(),
                        ty: ty.clone(),
                        initial,
                        span: *span,
                    },
                );
                program.initializers.push(Initializer::DataVar(name.clone()));
            }
            TopLevel::Map(def) => {
                program.maps.insert(def.name.clone(), def.clone());
            }
            TopLevel::Function { .. } => {}
        }
    }

    let mut call_graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for form in &forms {
        if let TopLevel::Function {
            name,
            visibility,
            params,
            body,
            span,
        } = form
        {
            compiler.scope = params.iter().map(|(p, _)| p.clone()).collect();
            compiler.calls.clear();
            let body = body
                .iter()
                .map(|e| compiler.expr(e))
                .collect::<Result<Vec<_>, _>>()?;
            call_graph.insert(name.clone(), std::mem::take(&mut compiler.calls));
            program.functions.insert(
                name.clone(),
                FunctionDef {
                    name: name.clone(),
                    visibility: *visibility,
                    params: params.clone(),
                    body,
                    span: *span,
                },
            );
        }
    }

    check_call_graph(&program, &call_graph)?;
    Ok(program)
}

/// Reject cycles in the intra-program call graph and call chains longer
/// than [`MAX_FUNCTION_DEPTH`].
///
/// Iterative depth-first walk: `Visiting` functions are exactly the ones on
/// the current path, so reaching one again closes a cycle.
fn check_call_graph(
    program: &CompiledProgram,
    graph: &BTreeMap<String, BTreeSet<String>>,
) -> Result<(), VmError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done(usize),
    }

    let span_of = |name: &str| {
        program
            .functions
            .get(name)
            .map(|f| f.span)
            .unwrap_or_default()
    };
    let cycle = |name: &str| {
        compile_error(
            span_of(name),
            format!("recursive call cycle through function '{name}'"),
        )
    };
    let callees = |name: &str| graph.get(name).into_iter().flatten();

    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();
    for root in graph.keys() {
        // (function, callees already pushed)
        let mut stack: Vec<(&str, bool)> = vec![(root.as_str(), false)];
        while let Some((name, expanded)) = stack.pop() {
            if expanded {
                let depth = 1 + callees(name)
                    .filter_map(|c| match marks.get(c.as_str()) {
                        Some(Mark::Done(d)) => Some(*d),
                        _ => None,
                    })
                    .max()
                    .unwrap_or(0);
                if depth > MAX_FUNCTION_DEPTH {
                    return Err(compile_error(
                        span_of(name),
                        format!(
                            "call chain from '{name}' is {depth} functions deep, \
                             maximum is {MAX_FUNCTION_DEPTH}"
                        ),
                    ));
                }
                marks.insert(name, Mark::Done(depth));
                continue;
            }
            match marks.get(name) {
                Some(Mark::Done(_)) => continue,
                Some(Mark::Visiting) => return Err(cycle(name)),
                None => {}
            }
            marks.insert(name, Mark::Visiting);
            stack.push((name, true));
            for callee in callees(name) {
                match marks.get(callee.as_str()) {
                    Some(Mark::Visiting) => return Err(cycle(callee)),
                    Some(Mark::Done(_)) => {}
                    None => stack.push((callee.as_str(), false)),
                }
            }
        }
    }
    Ok(())
}

// ─── Type Signatures ────────────────────────────────────────────────────────

fn length_bound(expr: &SymbolicExpr) -> Result<u32, VmError> {
    let n = match &expr.kind {
        SymbolicExprKind::Literal(Value::Int(n)) if *n >= 0 => *n as u128,
        SymbolicExprKind::Literal(Value::UInt(n)) => *n,
        _ => return Err(compile_error(expr.span, "expected a length bound")),
    };
    u32::try_from(n).map_err(|_| compile_error(expr.span, "length bound too large"))
}

/// Parse a type signature such as `uint`, `(buff 32)` or `{a: int}`.
pub fn parse_type(expr: &SymbolicExpr) -> Result<TypeSignature, VmError> {
    match &expr.kind {
        SymbolicExprKind::Atom(name) => match name.as_str() {
            "uint" => Ok(TypeSignature::UInt),
            "int" => Ok(TypeSignature::Int),
            "bool" => Ok(TypeSignature::Bool),
            "principal" => Ok(TypeSignature::Principal),
            other => Err(compile_error(expr.span, format!("unknown type '{other}'"))),
        },
        SymbolicExprKind::List(items) => {
            let head = items.first().and_then(|e| e.as_atom()).unwrap_or_default();
            match (head, &items[..]) {
                ("buff", [_, n]) => Ok(TypeSignature::Buffer(length_bound(n)?)),
                ("string-ascii", [_, n]) => Ok(TypeSignature::StringAscii(length_bound(n)?)),
                ("string-utf8", [_, n]) => Ok(TypeSignature::StringUtf8(length_bound(n)?)),
                ("optional", [_, t]) => Ok(TypeSignature::Optional(Box::new(parse_type(t)?))),
                ("response", [_, ok, err]) => Ok(TypeSignature::Response(
                    Box::new(parse_type(ok)?),
                    Box::new(parse_type(err)?),
                )),
                ("list", [_, n, t]) => Ok(TypeSignature::List(
                    Box::new(parse_type(t)?),
                    length_bound(n)?,
                )),
                _ => Err(compile_error(expr.span, "invalid type signature")),
            }
        }
        SymbolicExprKind::Tuple(fields) => {
            if fields.is_empty() {
                return Err(compile_error(expr.span, "tuple type needs at least one field"));
            }
            let mut map = BTreeMap::new();
            for (name, ty) in fields {
                if map.insert(name.clone(), parse_type(ty)?).is_some() {
                    return Err(compile_error(
                        ty.span,
                        format!("duplicate tuple field '{name}'"),
                    ));
                }
            }
            Ok(TypeSignature::Tuple(map))
        }
        _ => Err(compile_error(expr.span, "invalid type signature")),
    }
}

// ─── Compiler ───────────────────────────────────────────────────────────────

/// A declared top-level form, before its expressions are compiled.
enum TopLevel<'s> {
    Constant {
        name: String,
        expr: &'s SymbolicExpr,
        span: Span,
    },
    DataVar {
        name: String,
        ty: TypeSignature,
        initial: &'s SymbolicExpr,
        span: Span,
    },
    Map(MapDef),
    Function {
        name: String,
        visibility: Visibility,
        params: Vec<(String, TypeSignature)>,
        body: &'s [SymbolicExpr],
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefKind {
    Constant,
    DataVar,
    Map,
    Function,
}

struct Compiler<'a> {
    id: &'a ProgramId,
    registry: &'a Registry,
    definitions: BTreeMap<String, DefKind>,
    function_arity: BTreeMap<String, usize>,
    data_var_types: BTreeMap<String, TypeSignature>,
    maps: BTreeMap<String, MapDef>,
    visible_constants: BTreeSet<String>,
    /// Names bound by parameters and `let`, innermost last.
    scope: Vec<String>,
    /// User functions called by the function being compiled.
    calls: BTreeSet<String>,
}

fn expect_args<'s>(
    items: &'s [SymbolicExpr],
    span: Span,
    form: &str,
    count: usize,
) -> Result<&'s [SymbolicExpr], VmError> {
    let args = &items[1..];
    if args.len() != count {
        return Err(compile_error(
            span,
            format!("{form} expects {count} arguments, got {}", args.len()),
        ));
    }
    Ok(args)
}

fn expect_name(expr: &SymbolicExpr, what: &str) -> Result<String, VmError> {
    expr.as_atom()
        .map(str::to_string)
        .ok_or_else(|| compile_error(expr.span, format!("expected {what}")))
}

impl<'a> Compiler<'a> {
    /// Record a top-level definition and check its shape.
    fn declare<'s>(&mut self, expr: &'s SymbolicExpr) -> Result<TopLevel<'s>, VmError> {
        let span = expr.span;
        let items = expr
            .as_list()
            .ok_or_else(|| compile_error(span, "expected a top-level definition"))?;
        let head = items
            .first()
            .and_then(|e| e.as_atom())
            .ok_or_else(|| compile_error(span, "expected a top-level definition"))?;

        match head {
            "define-constant" => {
                let args = expect_args(items, span, head, 2)?;
                let name = expect_name(&args[0], "a constant name")?;
                self.define(&name, DefKind::Constant, args[0].span)?;
                Ok(TopLevel::Constant {
                    name,
                    expr: &args[1],
                    span,
                })
            }
            "define-data-var" => {
                let args = expect_args(items, span, head, 3)?;
                let name = expect_name(&args[0], "a variable name")?;
                self.define(&name, DefKind::DataVar, args[0].span)?;
                let ty = parse_type(&args[1])?;
                self.data_var_types.insert(name.clone(), ty.clone());
                Ok(TopLevel::DataVar {
                    name,
                    ty,
                    initial: &args[2],
                    span,
                })
            }
            "define-map" => {
                let args = expect_args(items, span, head, 3)?;
                let name = expect_name(&args[0], "a map name")?;
                self.define(&name, DefKind::Map, args[0].span)?;
                let def = MapDef {
                    name: name.clone(),
                    key_ty: parse_type(&args[1])?,
                    value_ty: parse_type(&args[2])?,
                };
                self.maps.insert(name, def.clone());
                Ok(TopLevel::Map(def))
            }
            "define-public" | "define-read-only" | "define-private" => {
                let visibility = match head {
                    "define-public" => Visibility::Public,
                    "define-read-only" => Visibility::ReadOnly,
                    _ => Visibility::Private,
                };
                if items.len() < 3 {
                    return Err(compile_error(
                        span,
                        format!("{head} expects a signature and a body"),
                    ));
                }
                let signature = items[1]
                    .as_list()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| compile_error(items[1].span, "expected (name (arg type) ...)"))?;
                let name = expect_name(&signature[0], "a function name")?;
                self.define(&name, DefKind::Function, signature[0].span)?;

                let mut params: Vec<(String, TypeSignature)> = Vec::new();
                for param in &signature[1..] {
                    let pair = param
                        .as_list()
                        .filter(|p| p.len() == 2)
                        .ok_or_else(|| compile_error(param.span, "expected (name type)"))?;
                    let param_name = expect_name(&pair[0], "a parameter name")?;
                    if is_reserved(&param_name) {
                        return Err(compile_error(
                            pair[0].span,
                            format!("'{param_name}' is reserved"),
                        ));
                    }
                    if params.iter().any(|(p, _)| *p == param_name) {
                        return Err(compile_error(
                            pair[0].span,
                            format!("duplicate parameter '{param_name}'"),
                        ));
                    }
                    params.push((param_name, parse_type(&pair[1])?));
                }
                self.function_arity.insert(name.clone(), params.len());
                Ok(TopLevel::Function {
                    name,
                    visibility,
                    params,
                    body: &items[2..],
                    span,
                })
            }
            other => Err(compile_error(
                span,
                format!("unknown top-level form '{other}'"),
            )),
        }
    }

    fn define(&mut self, name: &str, kind: DefKind, span: Span) -> Result<(), VmError> {
        if is_reserved(name) {
            return Err(compile_error(span, format!("'{name}' is reserved")));
        }
        if self.definitions.insert(name.to_string(), kind).is_some() {
            return Err(compile_error(span, format!("duplicate definition of '{name}'")));
        }
        Ok(())
    }

    /// Check that a `let` or `match` binding does not shadow anything.
    fn check_binding(&self, name: &str, span: Span) -> Result<(), VmError> {
        if is_reserved(name) {
            return Err(compile_error(span, format!("'{name}' is reserved")));
        }
        if self.definitions.contains_key(name) || self.scope.iter().any(|n| n == name) {
            return Err(compile_error(span, format!("'{name}' shadows an existing name")));
        }
        Ok(())
    }

    fn boxed(&mut self, expr: &SymbolicExpr) -> Result<Box<Expr>, VmError> {
        Ok(Box::new(self.expr(expr)?))
    }

    fn exprs(&mut self, exprs: &[SymbolicExpr]) -> Result<Vec<Expr>, VmError> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    /// Compile `body` with `name` bound.
    fn with_binding(
        &mut self,
        name: &SymbolicExpr,
        body: &SymbolicExpr,
    ) -> Result<(String, Box<Expr>), VmError> {
        let bound = expect_name(name, "a binding name")?;
        self.check_binding(&bound, name.span)?;
        self.scope.push(bound.clone());
        let compiled = self.boxed(body);
        self.scope.pop();
        Ok((bound, compiled?))
    }

    fn expr(&mut self, expr: &SymbolicExpr) -> Result<Expr, VmError> {
        match &expr.kind {
            SymbolicExprKind::Literal(v) => Ok(Expr::Literal(v.clone())),
            SymbolicExprKind::ContractRef(name) => {
                let id = self.program_ref(name, expr.span)?;
                Ok(Expr::Literal(Value::Principal(Principal::Contract(id))))
            }
            SymbolicExprKind::Atom(name) => self.atom(name, expr.span),
            SymbolicExprKind::Tuple(fields) => self.tuple(fields, expr.span),
            SymbolicExprKind::List(items) => self.list(items, expr.span),
        }
    }

    fn program_ref(&self, name: &str, span: Span) -> Result<ProgramId, VmError> {
        if name == self.id.name {
            return Ok(self.id.clone());
        }
        self.registry
            .resolve(name)
            .map(|p| p.id.clone())
            .map_err(|_| compile_error(span, format!("unresolved program '{name}'")))
    }

    fn atom(&self, name: &str, span: Span) -> Result<Expr, VmError> {
        if self.scope.iter().any(|n| n == name) {
            return Ok(Expr::Local(name.to_string()));
        }
        match name {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "none" => return Ok(Expr::Literal(Value::none())),
            "tx-sender" => return Ok(Expr::Keyword(Keyword::TxSender)),
            "contract-caller" => return Ok(Expr::Keyword(Keyword::ContractCaller)),
            "block-height" => return Ok(Expr::Keyword(Keyword::BlockHeight)),
            _ => {}
        }
        if self.visible_constants.contains(name) {
            return Ok(Expr::Constant(name.to_string()));
        }
        match self.definitions.get(name) {
            Some(DefKind::Constant) => Err(compile_error(
                span,
                format!("constant '{name}' used before its definition"),
            )),
            Some(_) => Err(compile_error(
                span,
                format!("'{name}' is not a value"),
            )),
            None => Err(compile_error(span, format!("unresolved name '{name}'"))),
        }
    }

    fn tuple(&mut self, fields: &[(String, SymbolicExpr)], span: Span) -> Result<Expr, VmError> {
        if fields.is_empty() {
            return Err(compile_error(span, "tuple needs at least one field"));
        }
        let mut seen = BTreeSet::new();
        let mut compiled = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            if !seen.insert(name.as_str()) {
                return Err(compile_error(value.span, format!("duplicate tuple field '{name}'")));
            }
            compiled.push((name.clone(), self.expr(value)?));
        }
        Ok(Expr::TupleCons(compiled))
    }

    fn var_name(&self, expr: &SymbolicExpr) -> Result<String, VmError> {
        let name = expect_name(expr, "a data variable name")?;
        if !self.data_var_types.contains_key(&name) {
            return Err(compile_error(expr.span, format!("unknown data variable '{name}'")));
        }
        Ok(name)
    }

    fn map_name(&self, expr: &SymbolicExpr) -> Result<String, VmError> {
        let name = expect_name(expr, "a map name")?;
        if !self.maps.contains_key(&name) {
            return Err(compile_error(expr.span, format!("unknown map '{name}'")));
        }
        Ok(name)
    }

    fn list(&mut self, items: &[SymbolicExpr], span: Span) -> Result<Expr, VmError> {
        let head = items
            .first()
            .ok_or_else(|| compile_error(span, "empty expression"))?
            .as_atom()
            .ok_or_else(|| compile_error(span, "expected a function name"))?;
        let args = &items[1..];

        let at_least = |n: usize| -> Result<(), VmError> {
            if args.len() < n {
                return Err(compile_error(
                    span,
                    format!("{head} expects at least {n} arguments, got {}", args.len()),
                ));
            }
            Ok(())
        };

        match head {
            "if" => {
                let a = expect_args(items, span, head, 3)?;
                Ok(Expr::If {
                    cond: self.boxed(&a[0])?,
                    then: self.boxed(&a[1])?,
                    otherwise: self.boxed(&a[2])?,
                })
            }
            "let" => {
                at_least(2)?;
                let bindings = args[0]
                    .as_list()
                    .ok_or_else(|| compile_error(args[0].span, "expected ((name expr) ...)"))?;
                let mark = self.scope.len();
                let result = self.let_form(bindings, &args[1..]);
                self.scope.truncate(mark);
                result
            }
            "begin" => {
                at_least(1)?;
                Ok(Expr::Begin(self.exprs(args)?))
            }
            "match" => match args.len() {
                4 => {
                    let input = self.boxed(&args[0])?;
                    let (some_name, some_branch) = self.with_binding(&args[1], &args[2])?;
                    Ok(Expr::MatchOptional {
                        input,
                        some_name,
                        some_branch,
                        none_branch: self.boxed(&args[3])?,
                    })
                }
                5 => {
                    let input = self.boxed(&args[0])?;
                    let (ok_name, ok_branch) = self.with_binding(&args[1], &args[2])?;
                    let (err_name, err_branch) = self.with_binding(&args[3], &args[4])?;
                    Ok(Expr::MatchResponse {
                        input,
                        ok_name,
                        ok_branch,
                        err_name,
                        err_branch,
                    })
                }
                n => Err(compile_error(
                    span,
                    format!("match expects 4 arguments (optional) or 5 (response), got {n}"),
                )),
            },
            "and" | "or" => {
                at_least(1)?;
                let operands = self.exprs(args)?;
                Ok(if head == "and" {
                    Expr::And(operands)
                } else {
                    Expr::Or(operands)
                })
            }
            "asserts!" => {
                let a = expect_args(items, span, head, 2)?;
                Ok(Expr::Asserts {
                    cond: self.boxed(&a[0])?,
                    thrown: self.boxed(&a[1])?,
                })
            }
            "unwrap!" => {
                let a = expect_args(items, span, head, 2)?;
                Ok(Expr::Unwrap {
                    input: self.boxed(&a[0])?,
                    thrown: self.boxed(&a[1])?,
                })
            }
            "unwrap-err!" => {
                let a = expect_args(items, span, head, 2)?;
                Ok(Expr::UnwrapErr {
                    input: self.boxed(&a[0])?,
                    thrown: self.boxed(&a[1])?,
                })
            }
            "try!" => {
                let a = expect_args(items, span, head, 1)?;
                Ok(Expr::Try(self.boxed(&a[0])?))
            }
            "as-contract" => {
                let a = expect_args(items, span, head, 1)?;
                Ok(Expr::AsContract(self.boxed(&a[0])?))
            }
            "var-get" => {
                let a = expect_args(items, span, head, 1)?;
                Ok(Expr::VarGet(self.var_name(&a[0])?))
            }
            "var-set" => {
                let a = expect_args(items, span, head, 2)?;
                Ok(Expr::VarSet {
                    var: self.var_name(&a[0])?,
                    value: self.boxed(&a[1])?,
                })
            }
            "map-get?" => {
                let a = expect_args(items, span, head, 2)?;
                Ok(Expr::MapGet {
                    map: self.map_name(&a[0])?,
                    key: self.boxed(&a[1])?,
                })
            }
            "map-delete" => {
                let a = expect_args(items, span, head, 2)?;
                Ok(Expr::MapDelete {
                    map: self.map_name(&a[0])?,
                    key: self.boxed(&a[1])?,
                })
            }
            "map-set" | "map-insert" => {
                let a = expect_args(items, span, head, 3)?;
                let map = self.map_name(&a[0])?;
                let key = self.boxed(&a[1])?;
                let value = self.boxed(&a[2])?;
                Ok(if head == "map-set" {
                    Expr::MapSet { map, key, value }
                } else {
                    Expr::MapInsert { map, key, value }
                })
            }
            "tuple" => {
                at_least(1)?;
                let mut fields = Vec::with_capacity(args.len());
                for pair in args {
                    let kv = pair
                        .as_list()
                        .filter(|kv| kv.len() == 2)
                        .ok_or_else(|| compile_error(pair.span, "expected (field value)"))?;
                    fields.push((expect_name(&kv[0], "a field name")?, kv[1].clone()));
                }
                self.tuple(&fields, span)
            }
            "get" => {
                let a = expect_args(items, span, head, 2)?;
                Ok(Expr::TupleGet {
                    field: expect_name(&a[0], "a field name")?,
                    tuple: self.boxed(&a[1])?,
                })
            }
            "contract-call?" => {
                at_least(2)?;
                self.contract_call(args, span)
            }
            _ => {
                if let Some(func) = NativeFunction::lookup(head) {
                    let (min, max) = func.arity();
                    if args.len() < min || args.len() > max {
                        let expected = if min == max {
                            format!("{min}")
                        } else {
                            format!("at least {min}")
                        };
                        return Err(compile_error(
                            span,
                            format!("{head} expects {expected} arguments, got {}", args.len()),
                        ));
                    }
                    return Ok(Expr::Native {
                        func,
                        args: self.exprs(args)?,
                    });
                }
                if let Some(&arity) = self.function_arity.get(head) {
                    if args.len() != arity {
                        return Err(compile_error(
                            span,
                            format!("{head} expects {arity} arguments, got {}", args.len()),
                        ));
                    }
                    self.calls.insert(head.to_string());
                    return Ok(Expr::CallUser {
                        function: head.to_string(),
                        args: self.exprs(args)?,
                    });
                }
                Err(compile_error(span, format!("unknown function '{head}'")))
            }
        }
    }

    fn let_form(
        &mut self,
        bindings: &[SymbolicExpr],
        body: &[SymbolicExpr],
    ) -> Result<Expr, VmError> {
        let mut compiled = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let pair = binding
                .as_list()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| compile_error(binding.span, "expected (name expr)"))?;
            let name = expect_name(&pair[0], "a binding name")?;
            self.check_binding(&name, pair[0].span)?;
            let value = self.expr(&pair[1])?;
            self.scope.push(name.clone());
            compiled.push((name, value));
        }
        Ok(Expr::Let {
            bindings: compiled,
            body: self.exprs(body)?,
        })
    }

    fn contract_call(&mut self, args: &[SymbolicExpr], span: Span) -> Result<Expr, VmError> {
        let target = &args[0];
        let (name, expected_id) = match &target.kind {
            SymbolicExprKind::ContractRef(name) => (name.clone(), None),
            SymbolicExprKind::Literal(Value::Principal(Principal::Contract(id))) => {
                (id.name.clone(), Some(id.clone()))
            }
            _ => {
                return Err(compile_error(
                    target.span,
                    "contract-call? target must be a program reference",
                ))
            }
        };
        if name == self.id.name {
            return Err(compile_error(target.span, "a program cannot call itself"));
        }
        let callee = self
            .registry
            .resolve(&name)
            .ok()
            .filter(|p| expected_id.as_ref().map_or(true, |id| *id == p.id))
            .ok_or_else(|| compile_error(target.span, format!("unresolved program '{name}'")))?;

        let function = expect_name(&args[1], "a function name")?;
        let def = callee
            .function(&function)
            .filter(|f| f.visibility != Visibility::Private)
            .ok_or_else(|| {
                compile_error(
                    args[1].span,
                    format!("program '{name}' has no public or read-only function '{function}'"),
                )
            })?;
        let call_args = &args[2..];
        if call_args.len() != def.params.len() {
            return Err(compile_error(
                span,
                format!(
                    "{name}::{function} expects {} arguments, got {}",
                    def.params.len(),
                    call_args.len()
                ),
            ));
        }
        Ok(Expr::ContractCall {
            program: name,
            function,
            args: self.exprs(call_args)?,
        })
    }
}
