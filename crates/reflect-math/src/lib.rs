//! Share/balance accounting core for a rebasing, fee-on-transfer token.
//!
//! Holders own `Shares`; their user-facing `Balance` is `shares * total_supply / total_shares`
//! (floor). Every transfer skims a fee that is redistributed to the holders not involved in
//! the transfer, which moves the exchange rate. The entry points here compute the new share
//! counts so that, after integer truncation, the balance-level effects are exact:
//! - Deterministic and pure (no storage, no global state; every call returns new values)
//! - 512-bit intermediates with dimension-tagged wide types (`wide`)
//! - Floor division followed by a bounded rounding fixup (`fixup`)

use thiserror::Error;

pub mod config;
pub mod deliver;
pub mod engine;
pub mod fixup;
pub mod invariants;
pub mod trace;
pub mod transfer;
pub mod units;
pub mod wide;

pub use config::ReflectConfig;
pub use engine::{
    get_burn_shares, get_deliver_shares, get_transfer_all_shares, get_transfer_shares,
    BurnShares, DeliverShares, ReflectMath, TransferAllShares, TransferShares,
};
pub use trace::{BalanceTrace, NoTrace, Party, TraceEvent, TracingTrace};
pub use units::{Balance, BalanceXBasisPoints, BasisPoints, Shares, SharesXBasisPoints, BASIS};
pub use wide::Wide;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectError {
    // Arithmetic errors (caller precondition violations)
    #[error("Division by zero: {0}")]
    DivisionByZero(&'static str),

    #[error("Arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("Arithmetic underflow: {0}")]
    Underflow(&'static str),

    // Reserved entry points
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    // Input validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, ReflectError>;
