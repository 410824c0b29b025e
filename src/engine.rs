use std::{future::Future, io, sync::Arc};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::LedgerConfig,
    domain::{
        Account, AccountId, AccountState, Clock, CommitStatus, Error, LedgerStore, Money, Outcome,
        OutcomeRecord, OutcomeResult, Timestamp,
    },
    history::{HistoryPage, HistoryQuery, OutcomeStats, RecentOutcomes},
    retry::Backoff,
};

/// Result of a committed outcome.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub state: AccountState,
    pub record: OutcomeRecord,
}

/// Applies game outcomes to accounts with optimistic concurrency.
///
/// The engine holds no per-account state of its own; clones share the store,
/// clock and configuration and may be used from any number of tasks.
#[derive(Debug)]
pub struct LedgerEngine<S, C> {
    store: Arc<S>,
    clock: Arc<C>,
    config: Arc<LedgerConfig>,
}

impl<S, C> Clone for LedgerEngine<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, C> LedgerEngine<S, C>
where
    S: LedgerStore + 'static,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: Arc<C>, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub async fn create_account(&self, id: AccountId) -> Result<AccountState, Error> {
        let account = Account::open(id, self.config.starting_balance, self.clock.now());
        let state = AccountState::from(&account);
        self.timed(self.store.insert_account(account)).await?;
        info!(account = %state.account_id, balance = %state.balance, "account opened");
        Ok(state)
    }

    pub async fn apply_outcome(&self, id: &AccountId, outcome: Outcome) -> Result<Settlement, Error> {
        // Reject malformed input before touching the store.
        outcome.delta()?;

        let config = Arc::clone(&self.config);
        let (account, record) = self
            .transact(id, |account, now| {
                settle(account, &outcome, now, &config).map(Some)
            })
            .await?;

        let record = record.ok_or_else(|| Error::Store("settled outcome produced no record".into()))?;
        Ok(Settlement {
            state: AccountState::from(&account),
            record,
        })
    }

    /// Credits funds from outside the games, e.g. a completed purchase.
    pub async fn top_up(&self, id: &AccountId, amount: Money) -> Result<AccountState, Error> {
        if !amount.is_positive() {
            return Err(Error::invalid(format!("top-up must be positive, got {}", amount)));
        }

        let threshold = self.config.reinstatement_threshold;
        let (account, _) = self
            .transact(id, |account, now| {
                account.balance = account
                    .balance
                    .checked_add(amount)
                    .ok_or_else(|| Error::invalid("balance out of range"))?;
                account.refresh_free_play(now, threshold);
                Ok(None)
            })
            .await?;
        Ok(AccountState::from(&account))
    }

    pub async fn query_account_state(&self, id: &AccountId) -> Result<AccountState, Error> {
        let loaded = self.load(id).await?;
        Ok(AccountState::from(&loaded.value))
    }

    pub async fn account_ids(&self) -> Result<Vec<AccountId>, Error> {
        let mut ids = self.timed(self.store.account_ids()).await?;
        ids.sort();
        Ok(ids)
    }

    /// Lazily pages through an account's history, newest first. Each call to
    /// `RecentOutcomes::stream` starts over from the newest record.
    pub async fn list_recent_outcomes(
        &self,
        id: &AccountId,
        window_start: Option<Timestamp>,
    ) -> Result<RecentOutcomes<S>, Error> {
        self.load(id).await?;
        Ok(RecentOutcomes::new(
            Arc::clone(&self.store),
            id.clone(),
            window_start,
            self.config.store_timeout(),
        ))
    }

    pub async fn history(&self, id: &AccountId, query: HistoryQuery) -> Result<HistoryPage, Error> {
        let outcomes = self.list_recent_outcomes(id, self.window_start()).await?;
        HistoryPage::collect(outcomes.stream(), query).await
    }

    pub async fn stats(&self, id: &AccountId) -> Result<OutcomeStats, Error> {
        let state = self.query_account_state(id).await?;
        let outcomes = self.list_recent_outcomes(id, self.window_start()).await?;
        OutcomeStats::collect(outcomes.stream(), &state).await
    }

    /// Removes every outcome whose retention window has closed by `now`.
    pub async fn evict_expired_outcomes(&self, now: Timestamp) -> Result<usize, Error> {
        let Some(cutoff) = now.checked_sub(self.config.retention()) else {
            return Ok(0);
        };
        let removed = self.timed(self.store.delete_outcomes_through(cutoff)).await?;
        info!(removed, cutoff = %cutoff, "evicted expired outcomes");
        Ok(removed)
    }

    /// Moves every empty account that is not yet in free play into it. An
    /// account that cannot be updated is logged and left for the next sweep.
    pub async fn sweep_free_play(&self, now: Timestamp) -> Result<usize, Error> {
        let (mut entered, mut failed) = (0, 0);
        for id in self.account_ids().await? {
            match self.sweep_account(&id, now).await {
                Ok(true) => entered += 1,
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    warn!(account = %id, error = %e, "free play sweep skipped account");
                }
            }
        }
        info!(entered, failed, "free play sweep finished");
        Ok(entered)
    }

    async fn sweep_account(&self, id: &AccountId, now: Timestamp) -> Result<bool, Error> {
        let Some(loaded) = self.timed(self.store.load_account(id)).await? else {
            return Ok(false);
        };
        if loaded.value.free_play || loaded.value.balance.is_positive() {
            return Ok(false);
        }

        let mut changed = false;
        self.transact(id, |account, _| {
            changed = !account.free_play && !account.balance.is_positive();
            if changed {
                account.enter_free_play(now);
            }
            Ok(None)
        })
        .await?;
        Ok(changed)
    }

    // First instant whose records are still inside the retention window.
    fn window_start(&self) -> Option<Timestamp> {
        self.clock
            .now()
            .checked_sub(self.config.retention())
            .map(|cutoff| Timestamp(cutoff.as_millis().saturating_add(1)))
    }

    async fn load(&self, id: &AccountId) -> Result<crate::domain::Versioned<Account>, Error> {
        self.timed(self.store.load_account(id))
            .await?
            .ok_or_else(|| Error::AccountNotFound(id.clone()))
    }

    /// Read, mutate, compare-and-swap; retried with backoff while the account
    /// keeps changing underneath. A failing `mutate` aborts without writing.
    async fn transact<F>(
        &self,
        id: &AccountId,
        mut mutate: F,
    ) -> Result<(Account, Option<OutcomeRecord>), Error>
    where
        F: FnMut(&mut Account, Timestamp) -> Result<Option<OutcomeRecord>, Error>,
    {
        let attempts = self.config.max_commit_attempts;
        let mut backoff = Backoff::new(self.config.initial_backoff(), self.config.max_backoff());

        for attempt in 1..=attempts {
            let loaded = self.load(id).await?;
            let mut account = loaded.value;
            let record = mutate(&mut account, self.clock.now())?;

            let status = self
                .timed(
                    self.store
                        .compare_and_swap(loaded.version, account.clone(), record.clone()),
                )
                .await?;

            match status {
                CommitStatus::Committed => {
                    debug!(
                        account = %id,
                        balance = %account.balance,
                        free_play = account.free_play,
                        attempt,
                        "ledger commit"
                    );
                    return Ok((account, record));
                }
                CommitStatus::Conflict => {
                    warn!(account = %id, attempt, "concurrent update, retrying");
                    if attempt < attempts {
                        let delay = backoff.next_delay(&mut rand::thread_rng());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(Error::TransactionConflict {
            account: id.clone(),
            attempts,
        })
    }

    async fn timed<T>(&self, fut: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        let limit = self.config.store_timeout();
        tokio::time::timeout(limit, fut).await.map_err(|_| {
            Error::IO(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("ledger store did not answer within {:?}", limit),
            ))
        })?
    }
}

/// Applies one outcome to an in-memory copy of the account.
fn settle(
    account: &mut Account,
    outcome: &Outcome,
    now: Timestamp,
    config: &LedgerConfig,
) -> Result<OutcomeRecord, Error> {
    let delta = outcome.delta()?;
    let free_game = account.free_play;

    let applied = if free_game {
        if let Some(remaining) = account.free_play_wait(now, config.free_play_cooldown()) {
            return Err(Error::FreePlayCooldownActive {
                account: account.id.clone(),
                remaining,
            });
        }
        let winnings = outcome.net_winnings();
        if winnings.is_positive() {
            return Err(Error::FreePlayNoRealWinnings {
                account: account.id.clone(),
                winnings,
            });
        }
        Money::ZERO
    } else {
        let next = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| Error::invalid("balance out of range"))?;
        if next.is_negative() {
            return Err(Error::InsufficientBalance {
                account: account.id.clone(),
                required: outcome.bet,
                available: account.balance,
            });
        }
        delta
    };

    let overflow = || Error::invalid("ledger totals out of range");
    account.balance = account.balance.checked_add(applied).ok_or_else(overflow)?;
    account.games_played = account.games_played.saturating_add(1);
    match outcome.result {
        OutcomeResult::Win => {
            account.games_won = account.games_won.saturating_add(1);
            account.total_won = account.total_won.checked_add(applied).ok_or_else(overflow)?;
        }
        OutcomeResult::Loss => {
            account.total_lost = account
                .total_lost
                .checked_add(applied.abs())
                .ok_or_else(overflow)?;
        }
        OutcomeResult::Draw => {}
    }

    if free_game {
        account.free_games_played = account.free_games_played.saturating_add(1);
        account.last_free_game_time = Some(now);
    }
    account.refresh_free_play(now, config.reinstatement_threshold);

    Ok(OutcomeRecord {
        id: Uuid::new_v4(),
        account_id: account.id.clone(),
        game: outcome.game.clone(),
        result: outcome.result,
        amount: applied,
        free_play: free_game,
        details: outcome.details.clone(),
        timestamp: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GameKind;
    use std::time::Duration;

    fn funded(balance: i64) -> Account {
        Account::open("p1".into(), Money::from_major(balance), Timestamp::from_secs(0))
    }

    fn play(result: OutcomeResult, bet: i64, win: i64) -> Outcome {
        Outcome::new(GameKind::Slots, result, Money::from_major(bet), Money::from_major(win))
    }

    #[test]
    fn win_credits_and_counts() {
        let config = LedgerConfig::default();
        let mut account = funded(100);
        let record = settle(&mut account, &play(OutcomeResult::Win, 10, 30), Timestamp(1), &config)
            .unwrap();

        assert_eq!(account.balance, Money::from_major(130));
        assert_eq!(account.games_played, 1);
        assert_eq!(account.games_won, 1);
        assert_eq!(account.total_won, Money::from_major(30));
        assert_eq!(record.amount, Money::from_major(30));
        assert!(!record.free_play);
    }

    #[test]
    fn overdraw_leaves_account_untouched() {
        let config = LedgerConfig::default();
        let mut account = funded(40);
        let before = account.clone();

        let err = settle(&mut account, &play(OutcomeResult::Loss, 50, 0), Timestamp(1), &config)
            .unwrap_err();
        match err {
            Error::InsufficientBalance {
                required,
                available,
                ..
            } => {
                assert_eq!(required, Money::from_major(50));
                assert_eq!(available, Money::from_major(40));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(account, before);
    }

    #[test]
    fn losing_everything_enters_free_play() {
        let config = LedgerConfig::default();
        let mut account = funded(25);
        let at = Timestamp::from_secs(50);
        settle(&mut account, &play(OutcomeResult::Loss, 25, 0), at, &config).unwrap();

        assert_eq!(account.balance, Money::ZERO);
        assert!(account.free_play);
        assert_eq!(account.last_free_game_time, Some(at));
        assert_eq!(account.total_lost, Money::from_major(25));
    }

    #[test]
    fn free_games_respect_cooldown_and_never_pay_out() {
        let config = LedgerConfig::default();
        let mut account = funded(0);
        let opened = Timestamp::from_secs(0);

        let early = opened.saturating_add(Duration::from_secs(59 * 60));
        assert!(matches!(
            settle(&mut account, &play(OutcomeResult::Loss, 10, 0), early, &config),
            Err(Error::FreePlayCooldownActive { remaining, .. }) if remaining == Duration::from_secs(60)
        ));

        let later = opened.saturating_add(Duration::from_secs(3600));
        assert!(matches!(
            settle(&mut account, &play(OutcomeResult::Win, 10, 25), later, &config),
            Err(Error::FreePlayNoRealWinnings { winnings, .. }) if winnings == Money::from_major(15)
        ));

        let record =
            settle(&mut account, &play(OutcomeResult::Loss, 10, 0), later, &config).unwrap();
        assert_eq!(record.amount, Money::ZERO);
        assert!(record.free_play);
        assert_eq!(account.balance, Money::ZERO);
        assert_eq!(account.total_lost, Money::ZERO);
        assert_eq!(account.free_games_played, 1);
        assert_eq!(account.last_free_game_time, Some(later));
        assert!(account.free_play);
    }

    #[test]
    fn draw_changes_nothing_but_the_counter() {
        let config = LedgerConfig::default();
        let mut account = funded(10);
        settle(&mut account, &play(OutcomeResult::Draw, 10, 0), Timestamp(1), &config).unwrap();
        assert_eq!(account.balance, Money::from_major(10));
        assert_eq!(account.games_played, 1);
        assert_eq!(account.games_won, 0);
    }
}
