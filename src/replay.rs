use std::{io::Write, sync::Arc};

use futures::StreamExt;
use tracing::debug;

use crate::{
    clock::ManualClock,
    domain::{DeadLetterQueue, Error, LedgerStore},
    engine::LedgerEngine,
    ingestion::{CommandStream, LedgerCommand, ScheduledCommand},
};

/// Feeds recorded commands through a ledger engine in file order, moving a
/// manual clock to each row's timestamp first.
#[derive(Debug)]
pub struct Replay<I, S, D>
where
    I: CommandStream,
    S: LedgerStore + 'static,
    D: DeadLetterQueue,
{
    ingestion: I,
    engine: LedgerEngine<S, ManualClock>,
    clock: Arc<ManualClock>,
    dlq: D,
}

impl<I, S, D> Replay<I, S, D>
where
    I: CommandStream,
    S: LedgerStore + 'static,
    D: DeadLetterQueue,
{
    pub fn new(
        ingestion: I,
        engine: LedgerEngine<S, ManualClock>,
        clock: Arc<ManualClock>,
        dlq: D,
    ) -> Self {
        Self {
            ingestion,
            engine,
            clock,
            dlq,
        }
    }

    pub fn dlq(&self) -> &D {
        &self.dlq
    }

    /// Returns the number of commands applied. Rejected rows go to the DLQ.
    pub async fn process(&mut self) -> Result<usize, Error> {
        let mut commands = self.ingestion.stream();
        let mut applied = 0;

        while let Some(cmd) = commands.next().await {
            match cmd {
                Ok(cmd) => {
                    let line = cmd.line;
                    match self.apply(cmd).await {
                        Ok(()) => applied += 1,
                        Err(e) => self.dlq.report(line, &e),
                    }
                }
                Err(rejected) => self.dlq.report(rejected.line, &rejected.error),
            }
        }

        Ok(applied)
    }

    async fn apply(&self, cmd: ScheduledCommand) -> Result<(), Error> {
        self.clock.set(cmd.at);
        debug!(line = cmd.line, at = %cmd.at, "replaying {:?}", cmd.command);

        match cmd.command {
            LedgerCommand::Open { account } => {
                self.engine.create_account(account).await?;
            }
            LedgerCommand::Play { account, outcome } => {
                self.engine.apply_outcome(&account, outcome).await?;
            }
            LedgerCommand::TopUp { account, amount } => {
                self.engine.top_up(&account, amount).await?;
            }
            LedgerCommand::Evict => {
                self.engine.evict_expired_outcomes(cmd.at).await?;
            }
            LedgerCommand::Sweep => {
                self.engine.sweep_free_play(cmd.at).await?;
            }
        }
        Ok(())
    }

    /// Writes every account's final state as CSV, ordered by account id.
    pub async fn flush<W: Write>(&self, out: W) -> Result<(), Error> {
        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record([
                "account",
                "balance",
                "free_play",
                "games_played",
                "games_won",
                "total_won",
                "total_lost",
            ])
            .map_err(csv_error)?;

        for id in self.engine.account_ids().await? {
            let state = self.engine.query_account_state(&id).await?;
            writer
                .write_record([
                    state.account_id.to_string(),
                    state.balance.to_string(),
                    state.free_play_mode.to_string(),
                    state.games_played.to_string(),
                    state.games_won.to_string(),
                    state.total_won.to_string(),
                    state.total_lost.to_string(),
                ])
                .map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> Error {
    Error::IO(std::io::Error::other(e))
}
