use std::collections::BTreeMap;
use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Declared type of a function parameter, data variable or map entry.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeSignature {
    UInt,
    Int,
    Bool,
    Principal,
    /// Buffer with a maximum length in bytes.
    Buffer(u32),
    /// ASCII string with a maximum length in bytes.
    StringAscii(u32),
    /// UTF-8 string with a maximum length in characters.
    StringUtf8(u32),
    Optional(Box<TypeSignature>),
    Response(Box<TypeSignature>, Box<TypeSignature>),
    /// List of elements with a maximum length.
    List(Box<TypeSignature>, u32),
    Tuple(BTreeMap<String, TypeSignature>),
}

impl TypeSignature {
    /// Whether `value` is a member of this type.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeSignature::UInt, Value::UInt(_))
            | (TypeSignature::Int, Value::Int(_))
            | (TypeSignature::Bool, Value::Bool(_))
            | (TypeSignature::Principal, Value::Principal(_)) => true,
            (TypeSignature::Buffer(max), Value::Buffer(bytes)) => bytes.len() <= *max as usize,
            (TypeSignature::StringAscii(max), Value::StringAscii(s)) => {
                s.is_ascii() && s.len() <= *max as usize
            }
            (TypeSignature::StringUtf8(max), Value::StringUtf8(s)) => {
                s.chars().count() <= *max as usize
            }
            (TypeSignature::Optional(_), Value::Optional(None)) => true,
            (TypeSignature::Optional(inner), Value::Optional(Some(v))) => inner.admits(v),
            (TypeSignature::Response(ok, err), Value::Response(r)) => {
                if r.committed {
                    ok.admits(&r.data)
                } else {
                    err.admits(&r.data)
                }
            }
            (TypeSignature::List(elem, max), Value::List(items)) => {
                items.len() <= *max as usize && items.iter().all(|v| elem.admits(v))
            }
            (TypeSignature::Tuple(fields), Value::Tuple(values)) => {
                fields.len() == values.len()
                    && fields.iter().all(|(name, ty)| {
                        values.get(name).map(|v| ty.admits(v)).unwrap_or(false)
                    })
            }
            _ => false,
        }
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::UInt => write!(f, "uint"),
            TypeSignature::Int => write!(f, "int"),
            TypeSignature::Bool => write!(f, "bool"),
            TypeSignature::Principal => write!(f, "principal"),
            TypeSignature::Buffer(n) => write!(f, "(buff {n})"),
            TypeSignature::StringAscii(n) => write!(f, "(string-ascii {n})"),
            TypeSignature::StringUtf8(n) => write!(f, "(string-utf8 {n})"),
            TypeSignature::Optional(t) => write!(f, "(optional {t})"),
            TypeSignature::Response(ok, err) => write!(f, "(response {ok} {err})"),
            TypeSignature::List(t, n) => write!(f, "(list {n} {t})"),
            TypeSignature::Tuple(fields) => {
                write!(f, "{{")?;
                for (i, (name, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {t}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
