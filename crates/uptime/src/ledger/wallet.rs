//! Choice of the sending wallet.

use crate::error::LedgerError;

/// Picks the sending address out of the wallets known to the ledger node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WalletSelector {
    index: usize,
}

impl WalletSelector {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn select<'a>(&self, wallets: &'a [String]) -> Result<&'a str, LedgerError> {
        wallets
            .get(self.index)
            .map(String::as_str)
            .ok_or(LedgerError::Wallet { index: self.index, available: wallets.len() })
    }
}
