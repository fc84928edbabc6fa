use serde::{Deserialize, Serialize};

// ─── Cost Constants ─────────────────────────────────────────────────────────

/// Runtime units charged per evaluated expression.
pub const COST_PER_EXPRESSION: u64 = 1;

/// Runtime units charged per user-defined function application.
pub const COST_FUNCTION_CALL: u64 = 10;

/// Runtime units charged per cross-program call.
pub const COST_CONTRACT_CALL: u64 = 100;

/// Runtime units charged for a native token transfer.
pub const COST_TRANSFER: u64 = 500;

/// Runtime units charged per `print`.
pub const COST_PRINT: u64 = 50;

// ─── Execution Cost ─────────────────────────────────────────────────────────

/// Resources consumed by one call.
///
/// Costs are reported, never enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionCost {
    /// Abstract evaluation units.
    pub runtime: u64,
    /// Number of state reads.
    pub read_count: u64,
    /// Bytes read from state.
    pub read_length: u64,
    /// Number of state writes.
    pub write_count: u64,
    /// Bytes written to state.
    pub write_length: u64,
}

/// Accumulates [`ExecutionCost`] during evaluation.
#[derive(Debug, Clone, Default)]
pub struct CostTracker {
    cost: ExecutionCost,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge abstract runtime units.
    pub fn charge_runtime(&mut self, amount: u64) {
        self.cost.runtime = self.cost.runtime.saturating_add(amount);
    }

    /// Record a state read of `len` bytes (0 for a missing entry).
    pub fn record_read(&mut self, len: usize) {
        self.cost.read_count = self.cost.read_count.saturating_add(1);
        self.cost.read_length = self.cost.read_length.saturating_add(len as u64);
    }

    /// Record a state write of `len` bytes.
    pub fn record_write(&mut self, len: usize) {
        self.cost.write_count = self.cost.write_count.saturating_add(1);
        self.cost.write_length = self.cost.write_length.saturating_add(len as u64);
    }

    /// Cost consumed so far.
    pub fn total(&self) -> ExecutionCost {
        self.cost
    }
}
