use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::MAX_PROGRAM_NAME_LEN;
use crate::error::TypesError;
use crate::primitives::Address;

/// Validate a program name: starts with an ASCII letter, then letters,
/// digits, `-` or `_`; 1-40 characters.
pub fn validate_program_name(name: &str) -> Result<(), TypesError> {
    if name.is_empty() || name.len() > MAX_PROGRAM_NAME_LEN {
        return Err(TypesError::InvalidName(format!(
            "program name must be 1-{MAX_PROGRAM_NAME_LEN} characters, got {}",
            name.len()
        )));
    }
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        if !first.is_ascii_alphabetic() {
            return Err(TypesError::InvalidName(format!(
                "program name must start with a letter, found '{first}'"
            )));
        }
    }
    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' {
            return Err(TypesError::InvalidName(format!(
                "program name may only contain letters, digits, '-' or '_', found '{c}'"
            )));
        }
    }
    Ok(())
}

/// Identifier of a deployed program: the deployer's address plus the
/// program name, rendered as `0x<issuer>.<name>`.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct ProgramId {
    /// Address that deployed the program.
    pub issuer: Address,
    /// Unique program name.
    pub name: String,
}

impl ProgramId {
    pub fn new(issuer: Address, name: impl Into<String>) -> Self {
        Self {
            issuer,
            name: name.into(),
        }
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.issuer, self.name)
    }
}

impl fmt::Debug for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramId({self})")
    }
}

/// An entity that can hold a balance or send a call: either a standard
/// account address or a deployed program.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub enum Principal {
    Standard(Address),
    Contract(ProgramId),
}

impl Principal {
    /// The standard address, if this is a standard principal.
    pub fn address(&self) -> Option<&Address> {
        match self {
            Principal::Standard(addr) => Some(addr),
            Principal::Contract(_) => None,
        }
    }

    pub fn is_contract(&self) -> bool {
        matches!(self, Principal::Contract(_))
    }
}

impl From<Address> for Principal {
    fn from(addr: Address) -> Self {
        Principal::Standard(addr)
    }
}

impl From<ProgramId> for Principal {
    fn from(id: ProgramId) -> Self {
        Principal::Contract(id)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Standard(addr) => write!(f, "{addr}"),
            Principal::Contract(id) => write!(f, "{id}"),
        }
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({self})")
    }
}

impl FromStr for Principal {
    type Err = TypesError;

    /// Parse `0x<40 hex>` or `0x<40 hex>.<program-name>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            None => Ok(Principal::Standard(s.parse()?)),
            Some((issuer, name)) => {
                let issuer: Address = issuer
                    .parse()
                    .map_err(|e: TypesError| TypesError::InvalidPrincipal(e.to_string()))?;
                validate_program_name(name)?;
                Ok(Principal::Contract(ProgramId::new(issuer, name)))
            }
        }
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for ProgramId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProgramId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        match s.parse::<Principal>().map_err(serde::de::Error::custom)? {
            Principal::Contract(id) => Ok(id),
            Principal::Standard(_) => Err(serde::de::Error::custom(
                "expected a program identifier, got a standard principal",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_program_name_valid() {
        assert!(validate_program_name("counter").is_ok());
        assert!(validate_program_name("token-v2_final").is_ok());
        assert!(validate_program_name("A").is_ok());
    }

    #[test]
    fn test_validate_program_name_invalid() {
        assert!(validate_program_name("").is_err());
        assert!(validate_program_name("2fast").is_err());
        assert!(validate_program_name("has space").is_err());
        assert!(validate_program_name("dot.name").is_err());
        let long_name = "a".repeat(MAX_PROGRAM_NAME_LEN + 1);
        assert!(validate_program_name(&long_name).is_err());
    }

    #[test]
    fn test_principal_serde_as_string() {
        let id = ProgramId::new(Address::new([4u8; 20]), "vault".to_string());
        let principal = Principal::Contract(id.clone());
        let json = serde_json::to_string(&principal).unwrap();
        assert_eq!(json, format!("\"{principal}\""));
        assert_eq!(serde_json::from_str::<Principal>(&json).unwrap(), principal);
        assert_eq!(serde_json::from_str::<ProgramId>(&json).unwrap(), id);

        let standard = Principal::Standard(Address::new([5u8; 20]));
        let json = serde_json::to_string(&standard).unwrap();
        assert!(serde_json::from_str::<ProgramId>(&json).is_err());
    }

    #[test]
    fn test_principal_parse_standard() {
        let addr = Address::new([3u8; 20]);
        let p: Principal = addr.to_string().parse().unwrap();
        assert_eq!(p, Principal::Standard(addr));
    }

    #[test]
    fn test_principal_parse_contract() {
        let addr = Address::new([4u8; 20]);
        let s = format!("{addr}.counter");
        let p: Principal = s.parse().unwrap();
        assert_eq!(p, Principal::Contract(ProgramId::new(addr, "counter")));
        assert_eq!(p.to_string(), s);
        assert!(p.is_contract());
        assert!(p.address().is_none());
    }

    #[test]
    fn test_principal_parse_rejects_bad_contract_name() {
        let s = format!("{}.9lives", Address::new([4u8; 20]));
        assert!(s.parse::<Principal>().is_err());
    }
}
