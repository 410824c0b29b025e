use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AccountId, Error, Money, Timestamp};

/// Game that produced an outcome. Unknown names are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GameKind {
    CoinFlip,
    Dice,
    Slots,
    Blackjack,
    Poker,
    Roulette,
    Free,
    Other(String),
}

impl GameKind {
    pub fn as_str(&self) -> &str {
        match self {
            GameKind::CoinFlip => "coinflip",
            GameKind::Dice => "dice",
            GameKind::Slots => "slots",
            GameKind::Blackjack => "blackjack",
            GameKind::Poker => "poker",
            GameKind::Roulette => "roulette",
            GameKind::Free => "free",
            GameKind::Other(name) => name.as_str(),
        }
    }
}

impl FromStr for GameKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Ok(match name.as_str() {
            "" => return Err(Error::invalid("game kind must not be empty")),
            "coinflip" | "coin-flip" | "coin_flip" => GameKind::CoinFlip,
            "dice" => GameKind::Dice,
            "slots" => GameKind::Slots,
            "blackjack" => GameKind::Blackjack,
            "poker" => GameKind::Poker,
            "roulette" => GameKind::Roulette,
            "free" => GameKind::Free,
            _ => GameKind::Other(name),
        })
    }
}

impl TryFrom<String> for GameKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GameKind> for String {
    fn from(kind: GameKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl core::fmt::Display for GameKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeResult {
    Win,
    Loss,
    Draw,
}

impl FromStr for OutcomeResult {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "win" => Ok(OutcomeResult::Win),
            "loss" => Ok(OutcomeResult::Loss),
            "draw" => Ok(OutcomeResult::Draw),
            other => Err(Error::invalid(format!("unknown result tag: {}", other))),
        }
    }
}

impl core::fmt::Display for OutcomeResult {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            OutcomeResult::Win => "win",
            OutcomeResult::Loss => "loss",
            OutcomeResult::Draw => "draw",
        })
    }
}

/// A game result submitted for settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub game: GameKind,
    pub result: OutcomeResult,
    pub bet: Money,
    pub win: Money,
    pub details: serde_json::Value,
}

impl Outcome {
    pub fn new(game: GameKind, result: OutcomeResult, bet: Money, win: Money) -> Self {
        Self {
            game,
            result,
            bet,
            win,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Signed balance change for a funded account.
    pub fn delta(&self) -> Result<Money, Error> {
        if self.bet.is_negative() || self.win.is_negative() {
            return Err(Error::invalid(format!(
                "amounts must be non-negative (bet {}, win {})",
                self.bet, self.win
            )));
        }
        match self.result {
            OutcomeResult::Win => Ok(self.win),
            OutcomeResult::Loss if self.win.is_positive() => Err(Error::invalid(format!(
                "a loss cannot carry winnings ({})",
                self.win
            ))),
            OutcomeResult::Loss => self
                .bet
                .checked_neg()
                .ok_or_else(|| Error::invalid("bet amount out of range")),
            OutcomeResult::Draw if self.win.is_positive() => Err(Error::invalid(format!(
                "a draw cannot carry winnings ({})",
                self.win
            ))),
            OutcomeResult::Draw => Ok(Money::ZERO),
        }
    }

    /// Winnings beyond the stake.
    pub fn net_winnings(&self) -> Money {
        match self.result {
            OutcomeResult::Win => self.win.checked_sub(self.bet).unwrap_or(Money::ZERO),
            _ => Money::ZERO,
        }
    }
}

/// Immutable history entry written alongside each settled outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub id: Uuid,
    pub account_id: AccountId,
    pub game: GameKind,
    pub result: OutcomeResult,
    pub amount: Money, // signed change applied to the balance
    pub free_play: bool,
    pub details: serde_json::Value,
    pub timestamp: Timestamp,
}

impl core::fmt::Display for OutcomeRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{},account={},game={},amount={},at={}",
            self.result, self.account_id, self.game, self.amount, self.timestamp
        )
    }
}
