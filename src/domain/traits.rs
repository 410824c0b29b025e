use async_trait::async_trait;

use crate::domain::{Account, AccountId, Error, OutcomeRecord, Timestamp};

/// Optimistic-concurrency token. Bumped by the store on every committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub u64);

#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub version: Version,
    pub value: T,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    Committed,
    /// The account changed since it was read; nothing was written.
    Conflict,
}

/// Position of a stored outcome in newest-first order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutcomeCursor {
    pub timestamp: Timestamp,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub struct StoredOutcome {
    pub cursor: OutcomeCursor,
    pub record: OutcomeRecord,
}

/// Persistence backend for accounts and outcome history.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fails with `AccountExists` if the id is taken.
    async fn insert_account(&self, account: Account) -> Result<(), Error>;

    async fn load_account(&self, id: &AccountId) -> Result<Option<Versioned<Account>>, Error>;

    /// Writes `account` (and appends `record`) only if the stored version is still
    /// `expected`. The account write and the append land together or not at all.
    async fn compare_and_swap(
        &self,
        expected: Version,
        account: Account,
        record: Option<OutcomeRecord>,
    ) -> Result<CommitStatus, Error>;

    async fn account_ids(&self) -> Result<Vec<AccountId>, Error>;

    /// Up to `limit` outcomes of one account strictly older than `before`,
    /// newest first, none earlier than `not_before`.
    async fn outcomes_before(
        &self,
        id: &AccountId,
        before: Option<OutcomeCursor>,
        not_before: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<StoredOutcome>, Error>;

    /// Deletes every outcome with `timestamp <= cutoff`, returning how many went.
    async fn delete_outcomes_through(&self, cutoff: Timestamp) -> Result<usize, Error>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

pub trait DeadLetterQueue {
    fn report(&self, line: u64, error: &Error);
}
