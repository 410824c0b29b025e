use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{Money, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl core::fmt::Display for AccountId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Durable per-player record. Mutated only by the ledger engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub balance: Money, // spendable funds, never negative once committed
    pub free_play: bool,
    pub games_played: u64,
    pub games_won: u64,
    pub total_won: Money,
    pub total_lost: Money,
    pub free_games_played: u64,
    pub last_free_game_time: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Account {
    pub fn open(id: AccountId, starting_balance: Money, now: Timestamp) -> Self {
        let mut account = Self {
            id,
            balance: starting_balance,
            free_play: false,
            games_played: 0,
            games_won: 0,
            total_won: Money::ZERO,
            total_lost: Money::ZERO,
            free_games_played: 0,
            last_free_game_time: None,
            created_at: now,
        };
        if !account.balance.is_positive() {
            account.enter_free_play(now);
        }
        account
    }

    /// Time left before another free game is allowed, `None` when play is open.
    pub fn free_play_wait(&self, now: Timestamp, cooldown: Duration) -> Option<Duration> {
        if !self.free_play {
            return None;
        }
        let last = self.last_free_game_time?;
        let elapsed = now.since(last);
        (elapsed < cooldown).then(|| cooldown - elapsed)
    }

    pub fn enter_free_play(&mut self, now: Timestamp) {
        self.free_play = true;
        self.free_games_played = 0;
        self.last_free_game_time = Some(now);
    }

    /// Enters free play on an empty balance, leaves it once funds reach `threshold`.
    /// Returns true when the mode changed.
    pub fn refresh_free_play(&mut self, now: Timestamp, threshold: Money) -> bool {
        if !self.free_play && !self.balance.is_positive() {
            self.enter_free_play(now);
            true
        } else if self.free_play && self.balance.is_positive() && self.balance >= threshold {
            self.free_play = false;
            true
        } else {
            false
        }
    }
}

/// Read-only view of an account returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub account_id: AccountId,
    pub balance: Money,
    pub free_play_mode: bool,
    pub games_played: u64,
    pub games_won: u64,
    pub total_won: Money,
    pub total_lost: Money,
    pub free_games_played: u64,
    pub last_free_game_time: Option<Timestamp>,
}

impl From<&Account> for AccountState {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id.clone(),
            balance: account.balance,
            free_play_mode: account.free_play,
            games_played: account.games_played,
            games_won: account.games_won,
            total_won: account.total_won,
            total_lost: account.total_lost,
            free_games_played: account.free_games_played,
            last_free_game_time: account.last_free_game_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn opening_with_empty_balance_starts_in_free_play() {
        let now = Timestamp::from_secs(10);
        let account = Account::open("a".into(), Money::ZERO, now);
        assert!(account.free_play);
        assert_eq!(account.last_free_game_time, Some(now));

        let funded = Account::open("b".into(), Money::from_major(1000), now);
        assert!(!funded.free_play);
        assert_eq!(funded.last_free_game_time, None);
    }

    #[test]
    fn cooldown_counts_down_from_last_free_game() {
        let start = Timestamp::from_secs(1_000);
        let mut account = Account::open("a".into(), Money::ZERO, start);

        let wait = account.free_play_wait(start.saturating_add(Duration::from_secs(600)), HOUR);
        assert_eq!(wait, Some(Duration::from_secs(3000)));
        assert_eq!(account.free_play_wait(start.saturating_add(HOUR), HOUR), None);

        account.free_play = false;
        assert_eq!(account.free_play_wait(start, HOUR), None);
    }

    #[test]
    fn free_play_exits_only_at_threshold() {
        let now = Timestamp::from_secs(1);
        let threshold = Money::from_major(100);
        let mut account = Account::open("a".into(), Money::ZERO, now);

        account.balance = Money::from_major(99);
        assert!(!account.refresh_free_play(now, threshold));
        assert!(account.free_play);

        account.balance = Money::from_major(100);
        assert!(account.refresh_free_play(now, threshold));
        assert!(!account.free_play);

        account.balance = Money::ZERO;
        assert!(account.refresh_free_play(now, threshold));
        assert!(account.free_play);
        assert_eq!(account.free_games_played, 0);
    }
}
