use std::collections::{BTreeMap, HashMap, hash_map::Entry};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{
    Account, AccountId, CommitStatus, Error, LedgerStore, OutcomeCursor, OutcomeRecord,
    StoredOutcome, Timestamp, Version, Versioned,
};

#[derive(Default, Debug)]
struct Tables {
    accounts: HashMap<AccountId, Versioned<Account>>,
    /// Per-account history, oldest first.
    history: HashMap<AccountId, BTreeMap<OutcomeCursor, OutcomeRecord>>,
    /// Owner of every stored outcome in global time order, for eviction.
    expiry: BTreeMap<OutcomeCursor, AccountId>,
    next_sequence: u64,
}

/// Process-local `LedgerStore`. Every operation holds one lock, so a
/// compare-and-swap and its history append are observed together.
#[derive(Default, Debug)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome_count(&self) -> usize {
        // Read-only, so a panicked writer does not hide what was committed.
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .expiry
            .len()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, Error> {
        self.tables
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<(), Error> {
        let mut tables = self.lock()?;
        match tables.accounts.entry(account.id.clone()) {
            Entry::Vacant(e) => {
                e.insert(Versioned {
                    version: Version(0),
                    value: account,
                });
                Ok(())
            }
            Entry::Occupied(e) => Err(Error::AccountExists(e.key().clone())),
        }
    }

    async fn load_account(&self, id: &AccountId) -> Result<Option<Versioned<Account>>, Error> {
        Ok(self.lock()?.accounts.get(id).cloned())
    }

    async fn compare_and_swap(
        &self,
        expected: Version,
        account: Account,
        record: Option<OutcomeRecord>,
    ) -> Result<CommitStatus, Error> {
        let mut guard = self.lock()?;
        let tables = &mut *guard;
        let stored = tables
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| Error::AccountNotFound(account.id.clone()))?;

        if stored.version != expected {
            return Ok(CommitStatus::Conflict);
        }
        stored.version = Version(expected.0 + 1);
        stored.value = account;

        if let Some(record) = record {
            let cursor = OutcomeCursor {
                timestamp: record.timestamp,
                sequence: tables.next_sequence,
            };
            tables.next_sequence += 1;
            tables.expiry.insert(cursor, record.account_id.clone());
            tables
                .history
                .entry(record.account_id.clone())
                .or_default()
                .insert(cursor, record);
        }
        Ok(CommitStatus::Committed)
    }

    async fn account_ids(&self) -> Result<Vec<AccountId>, Error> {
        Ok(self.lock()?.accounts.keys().cloned().collect())
    }

    async fn outcomes_before(
        &self,
        id: &AccountId,
        before: Option<OutcomeCursor>,
        not_before: Option<Timestamp>,
        limit: usize,
    ) -> Result<Vec<StoredOutcome>, Error> {
        let tables = self.lock()?;
        let Some(history) = tables.history.get(id) else {
            return Ok(Vec::new());
        };
        let older = match before {
            Some(cursor) => history.range(..cursor),
            None => history.range(..),
        };
        let floor = not_before.unwrap_or(Timestamp::EPOCH);

        Ok(older
            .rev()
            .take_while(|(cursor, _)| cursor.timestamp >= floor)
            .take(limit)
            .map(|(cursor, record)| StoredOutcome {
                cursor: *cursor,
                record: record.clone(),
            })
            .collect())
    }

    async fn delete_outcomes_through(&self, cutoff: Timestamp) -> Result<usize, Error> {
        let mut guard = self.lock()?;
        let tables = &mut *guard;
        let expired = match cutoff.as_millis().checked_add(1) {
            Some(first_kept) => {
                let kept = tables.expiry.split_off(&OutcomeCursor {
                    timestamp: Timestamp(first_kept),
                    sequence: 0,
                });
                std::mem::replace(&mut tables.expiry, kept)
            }
            None => std::mem::take(&mut tables.expiry),
        };

        for (cursor, owner) in &expired {
            if let Entry::Occupied(mut history) = tables.history.entry(owner.clone()) {
                history.get_mut().remove(cursor);
                if history.get().is_empty() {
                    history.remove();
                }
            }
        }
        Ok(expired.len())
    }
}
