//! Built-in functions whose arguments are all evaluated eagerly.

use std::cmp::Ordering;

use simnet_types::value::{ResponseData, Value};

use crate::error::VmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFunction {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Gt,
    Le,
    Ge,
    IsEq,
    Not,
    ConsOkay,
    ConsError,
    ConsSome,
    List,
    IsSome,
    IsNone,
    IsOk,
    IsErr,
    DefaultTo,
    UnwrapPanic,
    UnwrapErrPanic,
    Len,
    Append,
    Concat,
    ToInt,
    ToUint,
    Merge,
    Print,
    StxGetBalance,
    StxTransfer,
}

/// Upper bound on argument count for variadic natives.
const VARIADIC: usize = usize::MAX;

impl NativeFunction {
    pub fn lookup(name: &str) -> Option<Self> {
        use NativeFunction::*;
        let func = match name {
            "+" => Add,
            "-" => Sub,
            "*" => Mul,
            "/" => Div,
            "mod" => Mod,
            "pow" => Pow,
            "<" => Lt,
            ">" => Gt,
            "<=" => Le,
            ">=" => Ge,
            "is-eq" => IsEq,
            "not" => Not,
            "ok" => ConsOkay,
            "err" => ConsError,
            "some" => ConsSome,
            "list" => List,
            "is-some" => IsSome,
            "is-none" => IsNone,
            "is-ok" => IsOk,
            "is-err" => IsErr,
            "default-to" => DefaultTo,
            "unwrap-panic" => UnwrapPanic,
            "unwrap-err-panic" => UnwrapErrPanic,
            "len" => Len,
            "append" => Append,
            "concat" => Concat,
            "to-int" => ToInt,
            "to-uint" => ToUint,
            "merge" => Merge,
            "print" => Print,
            "stx-get-balance" => StxGetBalance,
            "stx-transfer?" => StxTransfer,
            _ => return None,
        };
        Some(func)
    }

    /// Minimum and maximum argument counts.
    pub fn arity(self) -> (usize, usize) {
        use NativeFunction::*;
        match self {
            Add | Mul | IsEq => (1, VARIADIC),
            Sub => (1, VARIADIC),
            Div => (2, VARIADIC),
            List => (0, VARIADIC),
            Mod | Pow | Lt | Gt | Le | Ge | DefaultTo | Append | Concat | Merge => (2, 2),
            StxTransfer => (3, 3),
            Not | ConsOkay | ConsError | ConsSome | IsSome | IsNone | IsOk | IsErr | UnwrapPanic
            | UnwrapErrPanic | Len | ToInt | ToUint | Print | StxGetBalance => (1, 1),
        }
    }

    /// Whether the function touches state or events and must be run by the
    /// interpreter rather than [`apply`].
    pub fn is_host(self) -> bool {
        matches!(
            self,
            NativeFunction::Print | NativeFunction::StxGetBalance | NativeFunction::StxTransfer
        )
    }
}

fn overflow() -> VmError {
    VmError::abort("arithmetic overflow")
}

fn expect_uint(v: &Value, what: &str) -> Result<u128, VmError> {
    match v {
        Value::UInt(n) => Ok(*n),
        other => Err(VmError::type_error(format!(
            "{what} expects uint, got {}",
            other.type_name()
        ))),
    }
}

/// Integer operands of an arithmetic native, all of the same kind.
enum Operands {
    UInt(Vec<u128>),
    Int(Vec<i128>),
}

fn numeric(args: &[Value], what: &str) -> Result<Operands, VmError> {
    match args.first() {
        Some(Value::UInt(_)) => args
            .iter()
            .map(|v| match v {
                Value::UInt(n) => Ok(*n),
                other => Err(VmError::type_error(format!(
                    "{what} expects uint operands, got {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<_, _>>()
            .map(Operands::UInt),
        Some(Value::Int(_)) => args
            .iter()
            .map(|v| match v {
                Value::Int(n) => Ok(*n),
                other => Err(VmError::type_error(format!(
                    "{what} expects int operands, got {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<_, _>>()
            .map(Operands::Int),
        Some(other) => Err(VmError::type_error(format!(
            "{what} expects int or uint, got {}",
            other.type_name()
        ))),
        None => Err(VmError::type_error(format!("{what} needs operands"))),
    }
}

fn fold_uint(
    values: Vec<u128>,
    op: impl Fn(u128, u128) -> Result<u128, VmError>,
) -> Result<Value, VmError> {
    let mut iter = values.into_iter();
    let first = iter.next().ok_or_else(overflow)?;
    iter.try_fold(first, op).map(Value::UInt)
}

fn fold_int(
    values: Vec<i128>,
    op: impl Fn(i128, i128) -> Result<i128, VmError>,
) -> Result<Value, VmError> {
    let mut iter = values.into_iter();
    let first = iter.next().ok_or_else(overflow)?;
    iter.try_fold(first, op).map(Value::Int)
}

fn arithmetic(func: NativeFunction, args: &[Value]) -> Result<Value, VmError> {
    use NativeFunction::*;
    let name = match func {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Mod => "mod",
        _ => "pow",
    };
    match numeric(args, name)? {
        Operands::UInt(values) => match func {
            Add => fold_uint(values, |a, b| a.checked_add(b).ok_or_else(overflow)),
            Sub if values.len() == 1 => Err(VmError::abort("arithmetic underflow")),
            Sub => fold_uint(values, |a, b| {
                a.checked_sub(b).ok_or_else(|| VmError::abort("arithmetic underflow"))
            }),
            Mul => fold_uint(values, |a, b| a.checked_mul(b).ok_or_else(overflow)),
            Div => fold_uint(values, |a, b| {
                a.checked_div(b).ok_or_else(|| VmError::abort("division by zero"))
            }),
            Mod => fold_uint(values, |a, b| {
                a.checked_rem(b).ok_or_else(|| VmError::abort("division by zero"))
            }),
            _ => fold_uint(values, |a, b| {
                let exp = u32::try_from(b).map_err(|_| overflow())?;
                a.checked_pow(exp).ok_or_else(overflow)
            }),
        },
        Operands::Int(values) => match func {
            Add => fold_int(values, |a, b| a.checked_add(b).ok_or_else(overflow)),
            Sub if values.len() == 1 => values[0].checked_neg().map(Value::Int).ok_or_else(overflow),
            Sub => fold_int(values, |a, b| a.checked_sub(b).ok_or_else(overflow)),
            Mul => fold_int(values, |a, b| a.checked_mul(b).ok_or_else(overflow)),
            Div => fold_int(values, |a, b| {
                if b == 0 {
                    return Err(VmError::abort("division by zero"));
                }
                a.checked_div(b).ok_or_else(overflow)
            }),
            Mod => fold_int(values, |a, b| {
                if b == 0 {
                    return Err(VmError::abort("division by zero"));
                }
                a.checked_rem(b).ok_or_else(overflow)
            }),
            _ => fold_int(values, |a, b| {
                let exp = u32::try_from(b)
                    .map_err(|_| VmError::abort("pow exponent must be non-negative"))?;
                a.checked_pow(exp).ok_or_else(overflow)
            }),
        },
    }
}

fn compare(func: NativeFunction, a: &Value, b: &Value) -> Result<Value, VmError> {
    let ordering = match (a, b) {
        (Value::UInt(x), Value::UInt(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Buffer(x), Value::Buffer(y)) => x.cmp(y),
        (Value::StringAscii(x), Value::StringAscii(y)) => x.cmp(y),
        (Value::StringUtf8(x), Value::StringUtf8(y)) => x.cmp(y),
        _ => {
            return Err(VmError::type_error(format!(
                "cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            )))
        }
    };
    let result = match func {
        NativeFunction::Lt => ordering == Ordering::Less,
        NativeFunction::Gt => ordering == Ordering::Greater,
        NativeFunction::Le => ordering != Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

/// Shallow shape check used by `is-eq`: two values are comparable when their
/// top-level types match.
fn same_type(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn concat(a: Value, b: Value) -> Result<Value, VmError> {
    match (a, b) {
        (Value::Buffer(mut x), Value::Buffer(y)) => {
            x.extend(y);
            Ok(Value::Buffer(x))
        }
        (Value::StringAscii(x), Value::StringAscii(y)) => Ok(Value::StringAscii(x + &y)),
        (Value::StringUtf8(x), Value::StringUtf8(y)) => Ok(Value::StringUtf8(x + &y)),
        (Value::List(mut x), Value::List(y)) => {
            x.extend(y);
            Ok(Value::List(x))
        }
        (a, b) => Err(VmError::type_error(format!(
            "cannot concat {} with {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

/// Evaluate a pure native over already-evaluated arguments.
///
/// Host natives (`print`, `stx-*`) are rejected here.
pub fn apply(func: NativeFunction, mut args: Vec<Value>) -> Result<Value, VmError> {
    use NativeFunction::*;
    let (min, max) = func.arity();
    if args.len() < min || args.len() > max {
        return Err(VmError::Arity {
            function: format!("{func:?}"),
            expected: min,
            got: args.len(),
        });
    }
    match func {
        Add | Sub | Mul | Div | Mod | Pow => arithmetic(func, &args),
        Lt | Gt | Le | Ge => compare(func, &args[0], &args[1]),
        IsEq => {
            let first = &args[0];
            if let Some(bad) = args.iter().find(|v| !same_type(first, v)) {
                return Err(VmError::type_error(format!(
                    "is-eq operands differ in type: {} vs {}",
                    first.type_name(),
                    bad.type_name()
                )));
            }
            Ok(Value::Bool(args.iter().all(|v| v == first)))
        }
        Not => match &args[0] {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(VmError::type_error(format!(
                "not expects bool, got {}",
                other.type_name()
            ))),
        },
        ConsOkay => Ok(Value::okay(args.remove(0))),
        ConsError => Ok(Value::error(args.remove(0))),
        ConsSome => Ok(Value::some(args.remove(0))),
        List => Ok(Value::List(args)),
        IsSome | IsNone => match &args[0] {
            Value::Optional(inner) => Ok(Value::Bool(inner.is_some() == (func == IsSome))),
            other => Err(VmError::type_error(format!(
                "expected optional, got {}",
                other.type_name()
            ))),
        },
        IsOk | IsErr => match &args[0] {
            Value::Response(r) => Ok(Value::Bool(r.committed == (func == IsOk))),
            other => Err(VmError::type_error(format!(
                "expected response, got {}",
                other.type_name()
            ))),
        },
        DefaultTo => {
            let input = args.remove(1);
            let default = args.remove(0);
            match input {
                Value::Optional(Some(v)) => Ok(*v),
                Value::Optional(None) => Ok(default),
                other => Err(VmError::type_error(format!(
                    "default-to expects optional, got {}",
                    other.type_name()
                ))),
            }
        }
        UnwrapPanic => match args.remove(0) {
            Value::Optional(Some(v)) => Ok(*v),
            Value::Response(ResponseData {
                committed: true,
                data,
            }) => Ok(*data),
            Value::Optional(None) => Err(VmError::abort("unwrap-panic on none")),
            Value::Response(r) => Err(VmError::abort(format!("unwrap-panic on (err {})", r.data))),
            other => Err(VmError::type_error(format!(
                "unwrap-panic expects optional or response, got {}",
                other.type_name()
            ))),
        },
        UnwrapErrPanic => match args.remove(0) {
            Value::Response(ResponseData {
                committed: false,
                data,
            }) => Ok(*data),
            Value::Response(r) => Err(VmError::abort(format!(
                "unwrap-err-panic on (ok {})",
                r.data
            ))),
            other => Err(VmError::type_error(format!(
                "unwrap-err-panic expects response, got {}",
                other.type_name()
            ))),
        },
        Len => match &args[0] {
            Value::Buffer(b) => Ok(Value::UInt(b.len() as u128)),
            Value::StringAscii(s) => Ok(Value::UInt(s.len() as u128)),
            Value::StringUtf8(s) => Ok(Value::UInt(s.chars().count() as u128)),
            Value::List(items) => Ok(Value::UInt(items.len() as u128)),
            other => Err(VmError::type_error(format!(
                "len expects a sequence, got {}",
                other.type_name()
            ))),
        },
        Append => {
            let item = args.remove(1);
            match args.remove(0) {
                Value::List(mut items) => {
                    items.push(item);
                    Ok(Value::List(items))
                }
                other => Err(VmError::type_error(format!(
                    "append expects a list, got {}",
                    other.type_name()
                ))),
            }
        }
        Concat => {
            let b = args.remove(1);
            let a = args.remove(0);
            concat(a, b)
        }
        ToInt => {
            let n = expect_uint(&args[0], "to-int")?;
            i128::try_from(n)
                .map(Value::Int)
                .map_err(|_| VmError::abort("to-int: value exceeds int range"))
        }
        ToUint => match &args[0] {
            Value::Int(n) => u128::try_from(*n)
                .map(Value::UInt)
                .map_err(|_| VmError::abort("to-uint: negative value")),
            other => Err(VmError::type_error(format!(
                "to-uint expects int, got {}",
                other.type_name()
            ))),
        },
        Merge => {
            let right = args.remove(1);
            match (args.remove(0), right) {
                (Value::Tuple(mut a), Value::Tuple(b)) => {
                    a.extend(b);
                    Ok(Value::Tuple(a))
                }
                (a, b) => Err(VmError::type_error(format!(
                    "merge expects two tuples, got {} and {}",
                    a.type_name(),
                    b.type_name()
                ))),
            }
        }
        Print | StxGetBalance | StxTransfer => Err(VmError::abort(format!(
            "{func:?} must be evaluated by the interpreter"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simnet_types::value::Value::{Bool, Int, UInt};

    fn call(name: &str, args: Vec<Value>) -> Result<Value, VmError> {
        apply(NativeFunction::lookup(name).unwrap(), args)
    }

    #[test]
    fn test_lookup() {
        assert_eq!(NativeFunction::lookup("+"), Some(NativeFunction::Add));
        assert_eq!(
            NativeFunction::lookup("stx-transfer?"),
            Some(NativeFunction::StxTransfer)
        );
        assert_eq!(NativeFunction::lookup("define-public"), None);
        assert!(NativeFunction::Print.is_host());
        assert!(!NativeFunction::Add.is_host());
    }

    #[test]
    fn test_uint_arithmetic() {
        assert_eq!(call("+", vec![UInt(1), UInt(2), UInt(3)]).unwrap(), UInt(6));
        assert_eq!(call("-", vec![UInt(5), UInt(3)]).unwrap(), UInt(2));
        assert_eq!(call("*", vec![UInt(4), UInt(5)]).unwrap(), UInt(20));
        assert_eq!(call("/", vec![UInt(7), UInt(2)]).unwrap(), UInt(3));
        assert_eq!(call("mod", vec![UInt(7), UInt(2)]).unwrap(), UInt(1));
        assert_eq!(call("pow", vec![UInt(2), UInt(10)]).unwrap(), UInt(1024));
    }

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(call("-", vec![Int(5)]).unwrap(), Int(-5));
        assert_eq!(call("-", vec![Int(2), Int(5)]).unwrap(), Int(-3));
        assert_eq!(call("/", vec![Int(-7), Int(2)]).unwrap(), Int(-3));
        assert!(call("pow", vec![Int(2), Int(-1)]).is_err());
    }

    #[test]
    fn test_arithmetic_failures() {
        use crate::error::ErrorKind;
        let err = call("-", vec![UInt(1), UInt(2)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeAbort);
        let err = call("+", vec![UInt(u128::MAX), UInt(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeAbort);
        let err = call("/", vec![UInt(1), UInt(0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RuntimeAbort);
        let err = call("+", vec![UInt(1), Int(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        let err = call("+", vec![Bool(true)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_comparison() {
        assert_eq!(call("<", vec![UInt(1), UInt(2)]).unwrap(), Bool(true));
        assert_eq!(call(">=", vec![Int(2), Int(2)]).unwrap(), Bool(true));
        assert_eq!(call(">", vec![Int(1), Int(2)]).unwrap(), Bool(false));
        assert!(call("<", vec![UInt(1), Int(2)]).is_err());
    }

    #[test]
    fn test_is_eq() {
        assert_eq!(call("is-eq", vec![UInt(1), UInt(1), UInt(1)]).unwrap(), Bool(true));
        assert_eq!(call("is-eq", vec![UInt(1), UInt(2)]).unwrap(), Bool(false));
        assert!(call("is-eq", vec![UInt(1), Int(1)]).is_err());
    }

    #[test]
    fn test_optional_and_response_helpers() {
        assert_eq!(
            call("default-to", vec![UInt(0), Value::none()]).unwrap(),
            UInt(0)
        );
        assert_eq!(
            call("default-to", vec![UInt(0), Value::some(UInt(9))]).unwrap(),
            UInt(9)
        );
        assert_eq!(call("is-some", vec![Value::none()]).unwrap(), Bool(false));
        assert_eq!(call("is-err", vec![Value::error(UInt(1))]).unwrap(), Bool(true));
        assert_eq!(
            call("unwrap-panic", vec![Value::okay(UInt(3))]).unwrap(),
            UInt(3)
        );
        assert!(call("unwrap-panic", vec![Value::none()]).is_err());
        assert_eq!(
            call("unwrap-err-panic", vec![Value::error(UInt(4))]).unwrap(),
            UInt(4)
        );
    }

    #[test]
    fn test_sequences() {
        assert_eq!(call("len", vec![Value::Buffer(vec![1, 2])]).unwrap(), UInt(2));
        assert_eq!(
            call("len", vec![Value::StringUtf8("hé".into())]).unwrap(),
            UInt(2)
        );
        assert_eq!(
            call("append", vec![Value::List(vec![UInt(1)]), UInt(2)]).unwrap(),
            Value::List(vec![UInt(1), UInt(2)])
        );
        assert_eq!(
            call(
                "concat",
                vec![Value::StringAscii("ab".into()), Value::StringAscii("cd".into())]
            )
            .unwrap(),
            Value::StringAscii("abcd".into())
        );
        assert!(call("concat", vec![Value::Buffer(vec![]), Value::List(vec![])]).is_err());
    }

    #[test]
    fn test_conversions_and_merge() {
        assert_eq!(call("to-int", vec![UInt(5)]).unwrap(), Int(5));
        assert!(call("to-int", vec![UInt(u128::MAX)]).is_err());
        assert_eq!(call("to-uint", vec![Int(5)]).unwrap(), UInt(5));
        assert!(call("to-uint", vec![Int(-1)]).is_err());

        let merged = call(
            "merge",
            vec![
                Value::tuple([("a", UInt(1)), ("b", UInt(2))]),
                Value::tuple([("b", UInt(3))]),
            ],
        )
        .unwrap();
        assert_eq!(merged, Value::tuple([("a", UInt(1)), ("b", UInt(3))]));
    }

    mod props {
        use super::*;
        use crate::error::ErrorKind;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_uint_add_is_checked(a in any::<u128>(), b in any::<u128>()) {
                match a.checked_add(b) {
                    Some(sum) => prop_assert_eq!(call("+", vec![UInt(a), UInt(b)]).unwrap(), UInt(sum)),
                    None => prop_assert_eq!(
                        call("+", vec![UInt(a), UInt(b)]).unwrap_err().kind(),
                        ErrorKind::RuntimeAbort
                    ),
                }
            }

            #[test]
            fn prop_int_sub_then_add(a in -1_000_000i128..1_000_000, b in -1_000_000i128..1_000_000) {
                let diff = call("-", vec![Int(a), Int(b)]).unwrap();
                prop_assert_eq!(call("+", vec![diff, Int(b)]).unwrap(), Int(a));
            }

            #[test]
            fn prop_compare_matches_ord(a in any::<u128>(), b in any::<u128>()) {
                prop_assert_eq!(call("<", vec![UInt(a), UInt(b)]).unwrap(), Bool(a < b));
                prop_assert_eq!(call(">=", vec![UInt(a), UInt(b)]).unwrap(), Bool(a >= b));
            }
        }
    }
}
