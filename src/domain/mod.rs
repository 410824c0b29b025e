pub mod account;
pub mod error;
pub mod money;
pub mod outcome;
pub mod time;
pub mod traits;

pub use account::{Account, AccountId, AccountState};
pub use error::Error;
pub use money::Money;
pub use outcome::{GameKind, Outcome, OutcomeRecord, OutcomeResult};
pub use time::Timestamp;
pub use traits::{
    Clock, CommitStatus, DeadLetterQueue, LedgerStore, OutcomeCursor, StoredOutcome, Version,
    Versioned,
};
