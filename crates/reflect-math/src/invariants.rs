//! Post-condition checks for the conversion entry points.
//!
//! `check_*` take the inputs of a call and the outcome it returned and report the first
//! invariant that does not hold. `CheckLevel::Conservation` only checks the share sum, which
//! holds for every successful call. `CheckLevel::Full` adds the balance-level checks, which hold
//! whenever one share is worth a small fraction of one balance unit (shares outnumbering supply
//! by a million or more); with coarser shares the exact targets may be unreachable.

use crate::engine::{
    get_deliver_shares, get_transfer_all_shares, get_transfer_shares, DeliverShares,
    TransferAllShares, TransferShares,
};
use crate::units::{Balance, BasisPoints, Shares};
use crate::wide;
use crate::{ReflectError, Result};

/// Stable identifiers for conversion invariants (used for testing and counterexamples).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvariantId {
    /// Party shares plus untouched shares did not add up to the returned total.
    SharesConserved,

    /// The sender's new balance is not its old balance minus the amount.
    SenderBalanceExact,

    /// The receiver's new balance fell outside the fee band.
    ReceiverWithinBand,

    /// The receiver ended with fewer shares, or a lower balance, than before.
    ReceiverNotBelowPrior,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvariantViolation {
    pub id: InvariantId,
    pub details: String,
}

impl InvariantViolation {
    pub fn new(id: InvariantId, details: impl Into<String>) -> Self {
        Self {
            id,
            details: details.into(),
        }
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.id, self.details)
    }
}

impl std::error::Error for InvariantViolation {}

impl From<InvariantViolation> for ReflectError {
    fn from(v: InvariantViolation) -> Self {
        ReflectError::InvalidInput(format!("conversion invariant violated: {v}"))
    }
}

pub type CheckResult = std::result::Result<(), InvariantViolation>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckLevel {
    Conservation,
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferInput {
    pub amount: Balance,
    pub fee_rate: BasisPoints,
    pub total_supply: Balance,
    pub total_shares: Shares,
    pub from_shares: Shares,
    pub to_shares: Shares,
}

impl TransferInput {
    pub fn apply(&self) -> Result<TransferShares> {
        get_transfer_shares(
            self.amount,
            self.fee_rate,
            self.total_supply,
            self.total_shares,
            self.from_shares,
            self.to_shares,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferAllInput {
    pub fee_rate: BasisPoints,
    pub total_supply: Balance,
    pub total_shares: Shares,
    pub from_shares: Shares,
    pub to_shares: Shares,
}

impl TransferAllInput {
    pub fn apply(&self) -> Result<TransferAllShares> {
        get_transfer_all_shares(
            self.fee_rate,
            self.total_supply,
            self.total_shares,
            self.from_shares,
            self.to_shares,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliverInput {
    pub amount: Balance,
    pub total_supply: Balance,
    pub total_shares: Shares,
    pub from_shares: Shares,
}

impl DeliverInput {
    pub fn apply(&self) -> Result<DeliverShares> {
        get_deliver_shares(
            self.amount,
            self.total_supply,
            self.total_shares,
            self.from_shares,
        )
    }
}

fn arith<T>(id: InvariantId, r: Result<T>) -> std::result::Result<T, InvariantViolation> {
    r.map_err(|e| InvariantViolation::new(id, e.to_string()))
}

fn uninvolved(total: Shares, from: Shares, to: Shares) -> Result<Shares> {
    total.checked_sub(from)?.checked_sub(to)
}

/// `[before + a - ceil(a*r/B), before + ceil(a*(B-r)/B)]`
pub fn receiver_band(
    before: Balance,
    amount: Balance,
    fee_rate: BasisPoints,
) -> Result<(Balance, Balance)> {
    let fee = amount.scale(fee_rate)?.unscale_ceil();
    let net = amount.scale(fee_rate.complement())?.unscale_ceil();
    let lo = before.checked_add(amount)?.checked_sub(fee)?;
    let hi = before.checked_add(net)?;
    Ok((lo, hi))
}

fn conserved(parts: &[Shares], total: Shares) -> CheckResult {
    let mut sum = Shares::ZERO;
    for part in parts {
        sum = arith(InvariantId::SharesConserved, sum.checked_add(*part))?;
    }
    if sum != total {
        return Err(InvariantViolation::new(
            InvariantId::SharesConserved,
            format!("parts sum to {sum}, total is {total}"),
        ));
    }
    Ok(())
}

fn sender_exact(
    supply: Balance,
    before_shares: Shares,
    before_total: Shares,
    amount: Balance,
    after_shares: Shares,
    after_total: Shares,
) -> CheckResult {
    let id = InvariantId::SenderBalanceExact;
    let before = arith(id, before_shares.to_balance(supply, before_total))?;
    let expected = arith(id, before.checked_sub(amount))?;
    let actual = arith(id, after_shares.to_balance(supply, after_total))?;
    if actual != expected {
        return Err(InvariantViolation::new(
            id,
            format!("sender balance {actual}, expected {expected}"),
        ));
    }
    Ok(())
}

fn within(id: InvariantId, value: Balance, lo: Balance, hi: Balance) -> CheckResult {
    if value < lo || value > hi {
        return Err(InvariantViolation::new(
            id,
            format!("receiver balance {value} outside [{lo}, {hi}]"),
        ));
    }
    Ok(())
}

pub fn check_transfer(
    input: &TransferInput,
    out: &TransferShares,
    level: CheckLevel,
) -> CheckResult {
    let u = arith(
        InvariantId::SharesConserved,
        uninvolved(input.total_shares, input.from_shares, input.to_shares),
    )?;
    conserved(&[out.from_shares, out.to_shares, u], out.total_shares)?;
    if level == CheckLevel::Conservation {
        return Ok(());
    }

    let supply = input.total_supply;
    sender_exact(
        supply,
        input.from_shares,
        input.total_shares,
        input.amount,
        out.from_shares,
        out.total_shares,
    )?;

    let id = InvariantId::ReceiverWithinBand;
    let before = arith(id, input.to_shares.to_balance(supply, input.total_shares))?;
    let after = arith(id, out.to_shares.to_balance(supply, out.total_shares))?;
    let (lo, hi) = if u.is_zero() {
        // no pool to take the fee
        let full = arith(id, before.checked_add(input.amount))?;
        (full, full)
    } else {
        arith(id, receiver_band(before, input.amount, input.fee_rate))?
    };
    within(id, after, lo, hi)
}

pub fn check_transfer_all(
    input: &TransferAllInput,
    out: &TransferAllShares,
    level: CheckLevel,
) -> CheckResult {
    let u = arith(
        InvariantId::SharesConserved,
        uninvolved(input.total_shares, input.from_shares, input.to_shares),
    )?;
    if u.is_zero() && !input.from_shares.is_zero() {
        conserved(&[out.to_shares], out.total_shares)?;
    } else {
        conserved(&[out.to_shares, u], out.total_shares)?;
    }
    if level == CheckLevel::Conservation {
        return Ok(());
    }

    let supply = input.total_supply;
    let id = InvariantId::ReceiverNotBelowPrior;
    let before = arith(id, input.to_shares.to_balance(supply, input.total_shares))?;
    let after = arith(id, out.to_shares.to_balance(supply, out.total_shares))?;
    if out.to_shares < input.to_shares || after < before {
        return Err(InvariantViolation::new(
            id,
            format!(
                "receiver went from {} shares ({before}) to {} shares ({after})",
                input.to_shares, out.to_shares
            ),
        ));
    }

    // A clamped receiver keeps its prior shares and is only held to the floor above.
    if input.from_shares.is_zero() || u.is_zero() || out.to_shares == input.to_shares {
        return Ok(());
    }
    let id = InvariantId::ReceiverWithinBand;
    let amount = arith(id, input.from_shares.to_balance(supply, input.total_shares))?;
    let (lo, _) = arith(id, receiver_band(before, amount, input.fee_rate))?;
    // cap: the sender's unfloored holdings net of fee
    let hi = arith(id, transfer_all_ceiling(input))?;
    within(id, after, lo, hi)
}

fn transfer_all_ceiling(input: &TransferAllInput) -> Result<Balance> {
    let received = input
        .to_shares
        .scale(BasisPoints::MAX)?
        .checked_add(input.from_shares.scale(input.fee_rate.complement())?)?;
    wide::mul(received, input.total_supply)
        .div(input.total_shares.scale(BasisPoints::MAX)?)
}

pub fn check_deliver(
    input: &DeliverInput,
    out: &DeliverShares,
    level: CheckLevel,
) -> CheckResult {
    let others = arith(
        InvariantId::SharesConserved,
        input.total_shares.checked_sub(input.from_shares),
    )?;
    conserved(&[out.from_shares, others], out.total_shares)?;
    if level == CheckLevel::Conservation || others.is_zero() {
        return Ok(());
    }
    sender_exact(
        input.total_supply,
        input.from_shares,
        input.total_shares,
        input.amount,
        out.from_shares,
        out.total_shares,
    )
}
