//! Player lives and funds owned by the session.

use wave_director_core::{TransactionError, TransactionKind};

/// Lives remaining to the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayerLedger {
    lives: u32,
    max_lives: u32,
}

impl PlayerLedger {
    /// Creates a ledger starting at full lives.
    #[must_use]
    pub const fn new(max_lives: u32) -> Self {
        Self {
            lives: max_lives,
            max_lives,
        }
    }

    /// Lives remaining.
    #[must_use]
    pub const fn lives(&self) -> u32 {
        self.lives
    }

    /// Lives at the start of the session.
    #[must_use]
    pub const fn max_lives(&self) -> u32 {
        self.max_lives
    }

    /// Removes one life, returning the remaining count.
    pub fn lose_life(&mut self) -> u32 {
        self.lives = self.lives.saturating_sub(1);
        self.lives
    }

    /// Restores the ledger to full lives.
    pub fn restore(&mut self) {
        self.lives = self.max_lives;
    }
}

/// Record of an applied transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Category of the transaction.
    pub kind: TransactionKind,
    /// Signed amount applied.
    pub amount: i64,
    /// Balance after the transaction.
    pub balance: i64,
    /// Free-form description supplied by the caller.
    pub reason: String,
}

const HISTORY_LIMIT: usize = 256;

/// Player funds with a bounded transaction history.
#[derive(Clone, Debug)]
pub struct Treasury {
    funds: i64,
    starting_funds: i64,
    max_funds: i64,
    history: Vec<Transaction>,
}

impl Treasury {
    /// Creates a treasury holding the starting funds, capped at `max_funds`.
    #[must_use]
    pub fn new(starting_funds: i64, max_funds: i64) -> Self {
        let max_funds = max_funds.max(0);
        let starting_funds = starting_funds.clamp(0, max_funds);
        Self {
            funds: starting_funds,
            starting_funds,
            max_funds,
            history: Vec::new(),
        }
    }

    /// Current balance.
    #[must_use]
    pub const fn funds(&self) -> i64 {
        self.funds
    }

    /// Applied transactions, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Transaction] {
        &self.history
    }

    /// Applies a signed transaction.
    ///
    /// Withdrawals that would overdraw the balance fail without touching it;
    /// deposits saturate at the configured maximum.
    pub fn apply(
        &mut self,
        kind: TransactionKind,
        amount: i64,
        reason: &str,
    ) -> Result<i64, TransactionError> {
        if amount < 0 && self.funds + amount < 0 {
            return Err(TransactionError::InsufficientFunds {
                requested: -amount,
                available: self.funds,
            });
        }
        self.funds = self.funds.saturating_add(amount).clamp(0, self.max_funds);
        if self.history.len() == HISTORY_LIMIT {
            let _ = self.history.remove(0);
        }
        self.history.push(Transaction {
            kind,
            amount,
            balance: self.funds,
            reason: reason.to_owned(),
        });
        Ok(self.funds)
    }

    /// Restores the starting balance and clears history.
    pub fn restore(&mut self) {
        self.funds = self.starting_funds;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overdraw_fails_and_leaves_balance() {
        let mut treasury = Treasury::new(300, 99_999);
        let result = treasury.apply(TransactionKind::Purchase, -400, "tower");
        assert_eq!(
            result,
            Err(TransactionError::InsufficientFunds {
                requested: 400,
                available: 300
            })
        );
        assert_eq!(treasury.funds(), 300);
        assert!(treasury.history().is_empty());
    }

    #[test]
    fn deposits_saturate_at_cap() {
        let mut treasury = Treasury::new(99_990, 99_999);
        assert_eq!(
            treasury.apply(TransactionKind::RoundComplete, 100, "round"),
            Ok(99_999)
        );
    }

    #[test]
    fn lives_never_underflow() {
        let mut ledger = PlayerLedger::new(1);
        assert_eq!(ledger.lose_life(), 0);
        assert_eq!(ledger.lose_life(), 0);
        ledger.restore();
        assert_eq!(ledger.lives(), 1);
    }
}
