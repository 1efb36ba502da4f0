//! Accounting of the gas limits declared by submitted transactions

use tracing::debug;

/// A running total of the gas limits declared by every submitted transaction.
///
/// The total counts declared limits, not gas actually consumed, and is
/// committed at submission time regardless of the transaction's outcome. It is
/// the pre-execution cost estimate of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GasAccumulator {
    /// The gas committed so far
    committed: u64,
    /// The number of transactions committed so far
    transactions: usize,
}

impl GasAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit the declared gas limit of a submitted transaction, returning the
    /// new total
    pub fn commit(&mut self, label: &str, gas_limit: u64) -> u64 {
        self.committed = self.committed.saturating_add(gas_limit);
        self.transactions += 1;
        debug!(
            label,
            gas_limit,
            committed = self.committed,
            "committed gas limit"
        );

        self.committed
    }

    /// The gas committed so far
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// The number of transactions committed so far
    pub fn transactions(&self) -> usize {
        self.transactions
    }
}
