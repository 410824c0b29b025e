//! Balance ledger for casino-style mini games.
//!
//! [`LedgerEngine`] applies game outcomes to player accounts through an
//! optimistic read/compare-and-swap loop over a [`LedgerStore`], keeps a
//! free-play mode for players who have run out of funds, and records a
//! time-bounded outcome history that [`LedgerEngine::evict_expired_outcomes`]
//! trims.

pub mod clock;
pub mod config;
pub mod dlq;
pub mod domain;
pub mod engine;
pub mod history;
pub mod ingestion;
pub mod maintenance;
pub mod memory_store;
pub mod replay;
pub mod retry;
pub mod service;

pub use config::LedgerConfig;
pub use domain::{
    Account, AccountId, AccountState, Clock, Error, GameKind, LedgerStore, Money, Outcome,
    OutcomeRecord, OutcomeResult, Timestamp,
};
pub use engine::{LedgerEngine, Settlement};
pub use memory_store::MemoryStore;
