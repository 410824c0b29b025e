use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::{AccountId, Error, GameKind, Money, Outcome, OutcomeResult, Timestamp};

/// One ledger operation read from a replay file.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    Open { account: AccountId },
    Play { account: AccountId, outcome: Outcome },
    TopUp { account: AccountId, amount: Money },
    Evict,
    Sweep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCommand {
    pub line: u64,
    pub at: Timestamp,
    pub command: LedgerCommand,
}

/// A row that could not be turned into a command.
#[derive(Debug)]
pub struct RejectedRow {
    pub line: u64,
    pub error: Error,
}

pub trait CommandStream {
    type Commands: Stream<Item = Result<ScheduledCommand, RejectedRow>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::Commands;
}

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Self {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        Self { reader: Some(rdr) }
    }
}

/// Internal shape used only for CSV deserialization.
/// `amount` is the stake of a play or the credit of a top-up; `payout` is
/// what a winning play pays back.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "type")]
    kind: String,
    account: Option<String>,
    at: u64,
    game: Option<String>,
    result: Option<String>,
    // Kept as text: csv would otherwise infer a lossy f64.
    amount: Option<String>,
    payout: Option<String>,
}

fn money_column(raw: Option<&str>, column: &str) -> Result<Option<Money>, Error> {
    raw.map(|text| {
        Money::from_decimal_str(text)
            .ok_or_else(|| Error::Ingestion(format!("invalid {}: {:?}", column, text)))
    })
    .transpose()
}

impl CsvRow {
    fn account(&self) -> Result<AccountId, Error> {
        match self.account.as_deref() {
            Some(id) if !id.is_empty() => Ok(AccountId::new(id)),
            _ => Err(Error::Ingestion(format!("{} row needs an account", self.kind))),
        }
    }

    fn into_command(self) -> Result<LedgerCommand, Error> {
        let kind = self.kind.trim().to_ascii_lowercase();
        let command = match kind.as_str() {
            "open" => LedgerCommand::Open {
                account: self.account()?,
            },
            "play" => {
                let account = self.account()?;
                let game: GameKind = self.game.as_deref().unwrap_or_default().parse()?;
                let result: OutcomeResult = self
                    .result
                    .as_deref()
                    .ok_or_else(|| Error::Ingestion("play row needs a result".to_string()))?
                    .parse()?;
                let bet = money_column(self.amount.as_deref(), "amount")?.unwrap_or(Money::ZERO);
                let win = money_column(self.payout.as_deref(), "payout")?.unwrap_or(Money::ZERO);
                LedgerCommand::Play {
                    account,
                    outcome: Outcome::new(game, result, bet, win),
                }
            }
            "topup" => LedgerCommand::TopUp {
                account: self.account()?,
                amount: money_column(self.amount.as_deref(), "amount")?
                    .ok_or_else(|| Error::Ingestion("topup row needs an amount".to_string()))?,
            },
            "evict" => LedgerCommand::Evict,
            "sweep" => LedgerCommand::Sweep,
            other => {
                return Err(Error::Ingestion(format!("Invalid command type: {}", other)));
            }
        };
        Ok(command)
    }
}

impl<R: Read + Send + 'static> CommandStream for CsvReader<R> {
    type Commands = Pin<Box<dyn Stream<Item = Result<ScheduledCommand, RejectedRow>> + Send>>;

    fn stream(&mut self) -> Self::Commands {
        // Already consumed: nothing left to replay.
        let Some(reader) = self.reader.take() else {
            return Box::pin(stream::iter(Vec::<Result<ScheduledCommand, RejectedRow>>::new()));
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .enumerate()
            .map(|(idx, row_res)| -> Result<ScheduledCommand, RejectedRow> {
                // header is line 1
                let line = idx as u64 + 2;
                let reject = |error| RejectedRow { line, error };
                let row = row_res.map_err(|e| {
                    reject(Error::Ingestion(format!("CSV deserialization error: {}", e)))
                })?;
                let at = Timestamp::from_secs(row.at);
                let command = row.into_command().map_err(|e| match e {
                    Error::Ingestion(_) => reject(e),
                    other => reject(Error::Ingestion(other.to_string())),
                })?;
                Ok(ScheduledCommand { line, at, command })
            });

        Box::pin(stream::iter(iter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn parses_every_command_type() {
        let input = "type, account, at, game, result, amount, payout\n\
                     open, alice, 0,,,,\n\
                     play, alice, 5, dice, win, 10, 25.5\n\
                     topup, alice, 6,,, 150,\n\
                     evict,, 7,,,,\n\
                     sweep,, 8,,,,\n";
        let mut reader = CsvReader::new(input.as_bytes());
        let rows: Vec<_> = reader.stream().collect().await;
        let rows: Vec<ScheduledCommand> = rows.into_iter().map(Result::unwrap).collect();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].command, LedgerCommand::Open { account: "alice".into() });
        assert_eq!(rows[1].at, Timestamp::from_secs(5));
        assert_eq!(rows[1].line, 3);
        match &rows[1].command {
            LedgerCommand::Play { outcome, .. } => {
                assert_eq!(outcome.game, GameKind::Dice);
                assert_eq!(outcome.bet, Money::from_major(10));
                assert_eq!(outcome.win, Money(255_000));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(
            rows[2].command,
            LedgerCommand::TopUp {
                account: "alice".into(),
                amount: Money::from_major(150)
            }
        );
        assert_eq!(rows[3].command, LedgerCommand::Evict);
        assert_eq!(rows[4].command, LedgerCommand::Sweep);

        // consumed
        assert!(reader.stream().next().await.is_none());
    }

    #[tokio::test]
    async fn bad_rows_surface_as_ingestion_errors() {
        let input = "type, account, at, game, result, amount, payout\n\
                     bet, alice, 0,,,,\n\
                     play,, 1, dice, win, 1, 1\n\
                     play, bob, 2, dice, maybe, 1,\n";
        let rows: Vec<_> = CsvReader::new(input.as_bytes()).stream().collect().await;
        assert_eq!(rows.len(), 3);
        let lines: Vec<u64> = rows
            .iter()
            .map(|r| match r {
                Err(RejectedRow {
                    line,
                    error: Error::Ingestion(_),
                }) => *line,
                other => panic!("expected ingestion error, got {:?}", other),
            })
            .collect();
        assert_eq!(lines, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn amounts_are_read_exactly() {
        let input = "type, account, at, game, result, amount, payout\n\
                     topup, alice, 0,,, 900000000000000.0001,\n\
                     play, alice, 1, slots, win, 0.00015, 123456789012345.6789\n\
                     topup, alice, 2,,, 1e3,\n";
        let rows: Vec<_> = CsvReader::new(input.as_bytes()).stream().collect().await;

        match &rows[0] {
            Ok(ScheduledCommand {
                command: LedgerCommand::TopUp { amount, .. },
                ..
            }) => assert_eq!(*amount, Money(9_000_000_000_000_000_001)),
            other => panic!("unexpected row {:?}", other),
        }
        match &rows[1] {
            Ok(ScheduledCommand {
                command: LedgerCommand::Play { outcome, .. },
                ..
            }) => {
                // 0.00015 rounds half to even
                assert_eq!(outcome.bet, Money(2));
                assert_eq!(outcome.win, Money(1_234_567_890_123_456_789));
            }
            other => panic!("unexpected row {:?}", other),
        }
        assert!(matches!(&rows[2], Err(RejectedRow { line: 4, .. })));
    }
}
