use std::time::Duration;

use crate::domain::{AccountId, Money};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("Ingestion failed with: {0}")]
    Ingestion(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store failed with: {0}")]
    Store(String),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Account {0} already exists")]
    AccountExists(AccountId),

    #[error("Insufficient balance for account {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: AccountId,
        required: Money,
        available: Money,
    },

    #[error("Free play cooldown active for account {account}: {}s remaining", .remaining.as_secs())]
    FreePlayCooldownActive {
        account: AccountId,
        remaining: Duration,
    },

    #[error("Account {account} cannot win real money in free play (attempted {winnings})")]
    FreePlayNoRealWinnings { account: AccountId, winnings: Money },

    #[error("Transaction on account {account} kept conflicting after {attempts} attempts")]
    TransactionConflict { account: AccountId, attempts: u32 },

    #[error("Invalid outcome: {0}")]
    InvalidOutcomeInput(String),
}

impl Error {
    /// Stable tag for callers that translate errors into user-facing messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::IO(_) => "io",
            Error::Ingestion(_) => "ingestion",
            Error::Config(_) => "config",
            Error::Store(_) => "store",
            Error::AccountNotFound(_) => "account_not_found",
            Error::AccountExists(_) => "account_exists",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::FreePlayCooldownActive { .. } => "free_play_cooldown_active",
            Error::FreePlayNoRealWinnings { .. } => "free_play_no_real_winnings",
            Error::TransactionConflict { .. } => "transaction_conflict",
            Error::InvalidOutcomeInput(_) => "invalid_outcome_input",
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidOutcomeInput(msg.into())
    }
}
