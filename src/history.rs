use std::{collections::BTreeMap, io, sync::Arc, time::Duration};

use futures::{
    Stream, StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::domain::{
    AccountId, AccountState, Error, GameKind, LedgerStore, Money, OutcomeCursor, OutcomeRecord,
    OutcomeResult, Timestamp,
};

const PAGE_SIZE: usize = 64;

/// Restartable, lazily fetched view of one account's outcome history.
#[derive(Debug)]
pub struct RecentOutcomes<S> {
    store: Arc<S>,
    account: AccountId,
    window_start: Option<Timestamp>,
    timeout: Duration,
}

impl<S> Clone for RecentOutcomes<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            account: self.account.clone(),
            window_start: self.window_start,
            timeout: self.timeout,
        }
    }
}

impl<S: LedgerStore + 'static> RecentOutcomes<S> {
    pub fn new(
        store: Arc<S>,
        account: AccountId,
        window_start: Option<Timestamp>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            account,
            window_start,
            timeout,
        }
    }

    /// Newest-first records. Pages are only fetched as the stream is polled.
    pub fn stream(&self) -> BoxStream<'static, Result<OutcomeRecord, Error>> {
        let store = Arc::clone(&self.store);
        let account = self.account.clone();
        let window_start = self.window_start;
        let timeout = self.timeout;

        // None once the last page has been handed out.
        let start: Option<Option<OutcomeCursor>> = Some(None);

        stream::try_unfold(start, move |state| {
            let store = Arc::clone(&store);
            let account = account.clone();
            async move {
                let Some(before) = state else {
                    return Ok::<_, Error>(None);
                };
                let fetch = store.outcomes_before(&account, before, window_start, PAGE_SIZE);
                let page = tokio::time::timeout(timeout, fetch).await.map_err(|_| {
                    Error::IO(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "history page fetch timed out",
                    ))
                })??;
                if page.is_empty() {
                    return Ok(None);
                }

                let next = if page.len() < PAGE_SIZE {
                    None
                } else {
                    page.last().map(|o| Some(o.cursor))
                };
                let records: Vec<OutcomeRecord> = page.into_iter().map(|o| o.record).collect();
                Ok(Some((records, next)))
            }
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, Error>)))
        .try_flatten()
        .boxed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: usize,
    pub offset: usize,
    pub game: Option<GameKind>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            game: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub records: Vec<OutcomeRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl HistoryPage {
    pub async fn collect<St>(outcomes: St, query: HistoryQuery) -> Result<Self, Error>
    where
        St: Stream<Item = Result<OutcomeRecord, Error>> + Unpin,
    {
        let HistoryQuery {
            limit,
            offset,
            game,
        } = query;

        let mut outcomes = outcomes;
        let mut records = Vec::new();
        let mut total = 0;
        while let Some(record) = outcomes.try_next().await? {
            if game.as_ref().is_some_and(|g| g != &record.game) {
                continue;
            }
            if total >= offset && records.len() < limit {
                records.push(record);
            }
            total += 1;
        }

        Ok(Self {
            records,
            total,
            limit,
            offset,
        })
    }
}

/// Wins per loss, or `Unbounded` when there are wins and no losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinLossRatio {
    Finite(Decimal),
    Unbounded,
}

impl Serialize for WinLossRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WinLossRatio::Finite(ratio) => serializer.serialize_str(&ratio.to_string()),
            WinLossRatio::Unbounded => serializer.serialize_str("unbounded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeStats {
    pub total_games: u64,
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    pub win_loss_ratio: WinLossRatio,
    pub favorite_game: Option<GameKind>,
    pub total_won: Money,
    pub total_lost: Money,
    pub is_playing_for_free: bool,
    pub free_games_played: u64,
}

impl OutcomeStats {
    pub async fn collect<St>(outcomes: St, state: &AccountState) -> Result<Self, Error>
    where
        St: Stream<Item = Result<OutcomeRecord, Error>> + Unpin,
    {
        let records: Vec<OutcomeRecord> = outcomes.try_collect().await?;
        Self::from_records(&records, state)
    }

    pub fn from_records(records: &[OutcomeRecord], state: &AccountState) -> Result<Self, Error> {
        let overflow = || Error::invalid("history totals out of range");
        let (mut wins, mut losses, mut draws) = (0u64, 0u64, 0u64);
        let mut total_won = Money::ZERO;
        let mut total_lost = Money::ZERO;
        let mut per_game: BTreeMap<&GameKind, u64> = BTreeMap::new();

        for record in records {
            *per_game.entry(&record.game).or_default() += 1;
            match record.result {
                OutcomeResult::Win => {
                    wins += 1;
                    total_won = total_won.checked_add(record.amount).ok_or_else(overflow)?;
                }
                OutcomeResult::Loss => {
                    losses += 1;
                    total_lost = total_lost
                        .checked_add(record.amount.abs())
                        .ok_or_else(overflow)?;
                }
                OutcomeResult::Draw => draws += 1,
            }
        }

        let win_loss_ratio = if losses > 0 {
            WinLossRatio::Finite((Decimal::from(wins) / Decimal::from(losses)).round_dp(2))
        } else if wins > 0 {
            WinLossRatio::Unbounded
        } else {
            WinLossRatio::Finite(Decimal::ZERO)
        };

        // Most played; ties go to the alphabetically first game.
        let favorite_game = per_game
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(game, _)| game.clone());

        Ok(Self {
            total_games: wins + losses + draws,
            wins,
            losses,
            draws,
            win_loss_ratio,
            favorite_game,
            total_won,
            total_lost,
            is_playing_for_free: state.free_play_mode,
            free_games_played: state.free_games_played,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Account, Timestamp};
    use uuid::Uuid;

    fn record(game: GameKind, result: OutcomeResult, amount: i64, at: u64) -> OutcomeRecord {
        OutcomeRecord {
            id: Uuid::new_v4(),
            account_id: "p1".into(),
            game,
            result,
            amount: Money::from_major(amount),
            free_play: false,
            details: serde_json::Value::Null,
            timestamp: Timestamp(at),
        }
    }

    fn state() -> AccountState {
        AccountState::from(&Account::open("p1".into(), Money::from_major(1), Timestamp(0)))
    }

    #[tokio::test]
    async fn page_filters_then_skips_and_counts() {
        let records = vec![
            record(GameKind::Dice, OutcomeResult::Win, 5, 50),
            record(GameKind::Slots, OutcomeResult::Loss, -1, 40),
            record(GameKind::Dice, OutcomeResult::Loss, -2, 30),
            record(GameKind::Dice, OutcomeResult::Draw, 0, 20),
        ];
        let query = HistoryQuery {
            limit: 1,
            offset: 1,
            game: Some(GameKind::Dice),
        };
        let page = HistoryPage::collect(stream::iter(records.into_iter().map(Ok)), query)
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].timestamp, Timestamp(30));
    }

    #[test]
    fn stats_summarise_results() {
        let records = vec![
            record(GameKind::Dice, OutcomeResult::Win, 30, 4),
            record(GameKind::Slots, OutcomeResult::Loss, -10, 3),
            record(GameKind::Dice, OutcomeResult::Win, 20, 2),
            record(GameKind::Slots, OutcomeResult::Loss, -5, 1),
            record(GameKind::Slots, OutcomeResult::Loss, -5, 0),
        ];
        let stats = OutcomeStats::from_records(&records, &state()).unwrap();

        assert_eq!(stats.total_games, 5);
        assert_eq!((stats.wins, stats.losses, stats.draws), (2, 3, 0));
        assert_eq!(stats.win_loss_ratio, WinLossRatio::Finite(Decimal::new(67, 2)));
        assert_eq!(stats.favorite_game, Some(GameKind::Slots));
        assert_eq!(stats.total_won, Money::from_major(50));
        assert_eq!(stats.total_lost, Money::from_major(20));
    }

    #[test]
    fn ratio_without_losses() {
        let only_wins = vec![record(GameKind::Dice, OutcomeResult::Win, 1, 0)];
        let stats = OutcomeStats::from_records(&only_wins, &state()).unwrap();
        assert_eq!(stats.win_loss_ratio, WinLossRatio::Unbounded);

        let empty = OutcomeStats::from_records(&[], &state()).unwrap();
        assert_eq!(empty.win_loss_ratio, WinLossRatio::Finite(Decimal::ZERO));
        assert_eq!(empty.favorite_game, None);
    }
}
