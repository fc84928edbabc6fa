//! Hashing and deterministic key derivation for simnet accounts.

pub mod address;
pub mod error;
pub mod hash;
pub mod hd;
pub mod keys;
pub mod seed;
