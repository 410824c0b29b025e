//! Request/response shapes for the HTTP layer that fronts the ledger.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    domain::{
        AccountId, Clock, Error, GameKind, LedgerStore, Money, Outcome, OutcomeRecord,
        OutcomeResult,
    },
    engine::LedgerEngine,
    history::{HistoryQuery, OutcomeStats},
};

/// Body of a "record game result" call. `amount` is signed: positive for a
/// win, negative for a loss, zero for a draw.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcomeRequest {
    pub game_kind: GameKind,
    pub result: OutcomeResult,
    pub amount: Money,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl TryFrom<RecordOutcomeRequest> for Outcome {
    type Error = Error;

    fn try_from(req: RecordOutcomeRequest) -> Result<Self, Self::Error> {
        let (bet, win) = match req.result {
            OutcomeResult::Win if !req.amount.is_negative() => (Money::ZERO, req.amount),
            OutcomeResult::Loss if !req.amount.is_positive() => (req.amount.abs(), Money::ZERO),
            OutcomeResult::Draw if req.amount == Money::ZERO => (Money::ZERO, Money::ZERO),
            result => {
                return Err(Error::invalid(format!(
                    "amount {} does not match result {}",
                    req.amount, result
                )));
            }
        };
        Ok(Outcome::new(req.game_kind, req.result, bet, win).with_details(req.details))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcomeResponse {
    pub success: bool,
    pub new_balance: Money,
    pub is_playing_for_free: bool,
    pub free_games_played: u64,
    pub game_result: OutcomeRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<OutcomeRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: OutcomeStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_balance: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_balance: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_free_game_in_secs: Option<u64>,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        let mut response = ErrorResponse {
            success: false,
            error: err.kind(),
            message: err.to_string(),
            required_balance: None,
            current_balance: None,
            next_free_game_in_secs: None,
        };
        match err {
            Error::InsufficientBalance {
                required,
                available,
                ..
            } => {
                response.required_balance = Some(*required);
                response.current_balance = Some(*available);
            }
            Error::FreePlayCooldownActive { remaining, .. } => {
                // Round up so "0 seconds" is never reported while still blocked.
                let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                response.next_free_game_in_secs = Some(secs);
            }
            _ => {}
        }
        response
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        ErrorResponse::from(&err)
    }
}

/// Translates caller requests into engine operations and engine errors into
/// structured responses.
#[derive(Debug)]
pub struct LedgerService<S, C> {
    engine: LedgerEngine<S, C>,
}

impl<S, C> LedgerService<S, C>
where
    S: LedgerStore + 'static,
    C: Clock,
{
    pub fn new(engine: LedgerEngine<S, C>) -> Self {
        Self { engine }
    }

    pub async fn record(
        &self,
        account: &AccountId,
        request: RecordOutcomeRequest,
    ) -> Result<RecordOutcomeResponse, ErrorResponse> {
        let result = match Outcome::try_from(request) {
            Ok(outcome) => self.engine.apply_outcome(account, outcome).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(settlement) => Ok(RecordOutcomeResponse {
                success: true,
                new_balance: settlement.state.balance,
                is_playing_for_free: settlement.state.free_play_mode,
                free_games_played: settlement.state.free_games_played,
                game_result: settlement.record,
            }),
            Err(err) => {
                warn!(account = %account, error = %err, "outcome rejected");
                Err(err.into())
            }
        }
    }

    pub async fn history(
        &self,
        account: &AccountId,
        query: HistoryQuery,
    ) -> Result<HistoryResponse, ErrorResponse> {
        let page = self.engine.history(account, query).await?;
        Ok(HistoryResponse {
            success: true,
            history: page.records,
            pagination: Pagination {
                total: page.total,
                limit: page.limit,
                offset: page.offset,
            },
        })
    }

    pub async fn stats(&self, account: &AccountId) -> Result<StatsResponse, ErrorResponse> {
        let stats = self.engine.stats(account).await?;
        Ok(StatsResponse {
            success: true,
            stats,
        })
    }
}
