//! Deterministic local network simulator.
//!
//! A [`Simnet`] session seeds named accounts at genesis, deploys programs
//! and answers read-only and public calls against simulated chain state.
//! Public calls are committed in blocks; read-only calls never change
//! state or height.

pub mod block;
pub mod clock;
pub mod config;
pub mod error;
pub mod genesis;
pub mod logging;
pub mod session;

pub use config::SimnetConfig;
pub use error::SimnetError;
pub use session::{Simnet, Tx};
