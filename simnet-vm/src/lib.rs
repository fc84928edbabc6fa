//! Program registry and execution engine for the simnet local network simulator.
//!
//! Programs are written in a small s-expression language. Source is parsed
//! and statically checked at deploy time, then evaluated by a tree-walking
//! interpreter against a buffered view of the state store.

pub mod ast;
pub mod call_stack;
pub mod compiler;
pub mod cost;
pub mod engine;
pub mod error;
pub mod interpreter;
pub mod natives;
pub mod parser;
pub mod registry;
pub mod result;
pub mod state;
