use std::collections::BTreeMap;
use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::principal::Principal;

/// Payload of a `response` value: `(ok data)` when `committed`, `(err data)`
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ResponseData {
    pub committed: bool,
    pub data: Box<Value>,
}

/// The closed set of values that programs compute with and store.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Value {
    #[serde(rename = "uint")]
    UInt(u128),
    #[serde(rename = "int")]
    Int(i128),
    #[serde(rename = "bool")]
    Bool(bool),
    #[serde(rename = "principal")]
    Principal(Principal),
    #[serde(rename = "buff")]
    Buffer(Vec<u8>),
    #[serde(rename = "string-ascii")]
    StringAscii(String),
    #[serde(rename = "string-utf8")]
    StringUtf8(String),
    #[serde(rename = "optional")]
    Optional(Option<Box<Value>>),
    #[serde(rename = "response")]
    Response(ResponseData),
    #[serde(rename = "list")]
    List(Vec<Value>),
    #[serde(rename = "tuple")]
    Tuple(BTreeMap<String, Value>),
}

impl Value {
    /// `(ok v)`
    pub fn okay(v: Value) -> Self {
        Value::Response(ResponseData {
            committed: true,
            data: Box::new(v),
        })
    }

    /// `(err v)`
    pub fn error(v: Value) -> Self {
        Value::Response(ResponseData {
            committed: false,
            data: Box::new(v),
        })
    }

    /// `(ok true)`, the conventional success value of a public function.
    pub fn okay_true() -> Self {
        Value::okay(Value::Bool(true))
    }

    /// `(some v)`
    pub fn some(v: Value) -> Self {
        Value::Optional(Some(Box::new(v)))
    }

    /// `none`
    pub fn none() -> Self {
        Value::Optional(None)
    }

    /// Build a tuple from `(name, value)` pairs.
    pub fn tuple<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Tuple(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Short name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::UInt(_) => "uint",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Principal(_) => "principal",
            Value::Buffer(_) => "buff",
            Value::StringAscii(_) => "string-ascii",
            Value::StringUtf8(_) => "string-utf8",
            Value::Optional(_) => "optional",
            Value::Response(_) => "response",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
        }
    }

    /// True for `(ok ...)` responses.
    pub fn is_ok_response(&self) -> bool {
        matches!(self, Value::Response(r) if r.committed)
    }

    /// True for `(err ...)` responses.
    pub fn is_err_response(&self) -> bool {
        matches!(self, Value::Response(r) if !r.committed)
    }

    /// Canonical borsh encoding, used for state keys and values.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Encoding into a Vec cannot fail for this type.
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Decode a value previously produced by [`Value::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, std::io::Error> {
        borsh::from_slice(bytes)
    }
}

impl fmt::Display for Value {
    /// Renders values in source syntax, e.g. `(ok u1)` or `{a: 1, b: true}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt(n) => write!(f, "u{n}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Principal(p) => write!(f, "'{p}"),
            Value::Buffer(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Value::StringAscii(s) => write!(f, "{s:?}"),
            Value::StringUtf8(s) => write!(f, "u{s:?}"),
            Value::Optional(None) => write!(f, "none"),
            Value::Optional(Some(v)) => write!(f, "(some {v})"),
            Value::Response(r) if r.committed => write!(f, "(ok {})", r.data),
            Value::Response(r) => write!(f, "(err {})", r.data),
            Value::List(items) => {
                write!(f, "(list")?;
                for item in items {
                    write!(f, " {item}")?;
                }
                write!(f, ")")
            }
            Value::Tuple(fields) => {
                write!(f, "{{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Principal> for Value {
    fn from(p: Principal) -> Self {
        Value::Principal(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Address;

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::UInt(7).to_string(), "u7");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Buffer(vec![0xbe, 0xef]).to_string(), "0xbeef");
        assert_eq!(Value::StringAscii("hi".into()).to_string(), "\"hi\"");
        assert_eq!(Value::StringUtf8("hé".into()).to_string(), "u\"hé\"");
    }

    #[test]
    fn test_display_composites() {
        assert_eq!(Value::okay(Value::UInt(1)).to_string(), "(ok u1)");
        assert_eq!(Value::error(Value::UInt(2)).to_string(), "(err u2)");
        assert_eq!(Value::some(Value::Int(1)).to_string(), "(some 1)");
        assert_eq!(Value::none().to_string(), "none");
        assert_eq!(
            Value::List(vec![Value::UInt(1), Value::UInt(2)]).to_string(),
            "(list u1 u2)"
        );
        let t = Value::tuple([("b", Value::Bool(false)), ("a", Value::UInt(1))]);
        assert_eq!(t.to_string(), "{a: u1, b: false}");
    }

    #[test]
    fn test_display_principal() {
        let addr = Address::new([1u8; 20]);
        let v = Value::Principal(Principal::Standard(addr));
        assert_eq!(v.to_string(), format!("'{addr}"));
    }

    #[test]
    fn test_bytes_roundtrip_nested() {
        let v = Value::okay(Value::tuple([
            ("items", Value::List(vec![Value::some(Value::Int(-9))])),
            ("owner", Value::Principal(Principal::Standard(Address::new([2u8; 20])))),
        ]));
        let decoded = Value::from_bytes(&v.to_bytes()).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn test_encoding_distinguishes_types() {
        assert_ne!(Value::UInt(1).to_bytes(), Value::Int(1).to_bytes());
        assert_ne!(
            Value::StringAscii("a".into()).to_bytes(),
            Value::StringUtf8("a".into()).to_bytes()
        );
    }

    #[test]
    fn test_response_predicates() {
        assert!(Value::okay_true().is_ok_response());
        assert!(Value::error(Value::UInt(1)).is_err_response());
        assert!(!Value::UInt(1).is_ok_response());
    }

    #[test]
    fn test_json_rendering() {
        let json = serde_json::to_value(Value::okay(Value::UInt(5))).unwrap();
        assert_eq!(json["response"]["committed"], true);
        assert_eq!(json["response"]["data"]["uint"], 5);
    }
}
