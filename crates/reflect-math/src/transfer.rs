//! Fee-on-transfer conversions.
//!
//! With `T` total supply, `S` total shares, `f`/`t` the sender/receiver shares,
//! `u = S - f - t`, amount `a`, fee `r` and `B = BASIS`, conserving balances gives
//!
//! ```text
//! D    = u*B*T + a*r*S
//! f'   = u*B*(f*T - a*S) / D
//! t'   = u*(t*B*T + a*(B - r)*S) / D
//! S'   = f' + t' + u
//! ```
//!
//! The sender loses exactly `a`; the receiver gains `a` less the fee, and the fee stays with
//! the `u` uninvolved shares as a higher exchange rate. The two floors are then corrected by
//! `fixup::run`: the sender to its exact balance, the receiver into
//! `invariants::receiver_band`.

use tracing::instrument;

use crate::engine::{ReflectMath, TransferAllShares, TransferShares};
use crate::fixup::{self, Leg};
use crate::invariants::receiver_band;
use crate::trace::{BalanceTrace, Party};
use crate::units::{Balance, BasisPoints, Shares};
use crate::wide;
use crate::{ReflectError, Result};

impl<H: BalanceTrace> ReflectMath<H> {
    /// Moves `amount` from the sender to the receiver, charging `fee_rate` to the receiver's
    /// side and sharing the fee among uninvolved holders.
    ///
    /// Errors: `DivisionByZero` when `total_shares` is zero, `Underflow` when the sender
    /// cannot afford `amount` or `from_shares + to_shares > total_shares`, `Overflow` when an
    /// intermediate leaves 512 bits.
    ///
    /// With a non-zero fee `total_shares` shrinks by the share value of the fee, which is how
    /// uninvolved holders gain it at an unchanged supply.
    ///
    /// When the two parties hold every share there is nobody to receive the fee; it is not
    /// charged and the receiver gains the full amount.
    #[instrument(level = "trace", skip(self))]
    pub fn get_transfer_shares(
        &self,
        amount: Balance,
        fee_rate: BasisPoints,
        total_supply: Balance,
        total_shares: Shares,
        from_shares: Shares,
        to_shares: Shares,
    ) -> Result<TransferShares> {
        if total_shares.is_zero() {
            return Err(ReflectError::DivisionByZero("transfer: total shares"));
        }
        if amount.is_zero() {
            return Ok(TransferShares {
                from_shares,
                to_shares,
                total_shares,
            });
        }

        let uninvolved = total_shares
            .checked_sub(from_shares)
            .and_then(|rest| rest.checked_sub(to_shares))
            .map_err(|_| ReflectError::Underflow("transfer: parties exceed total shares"))?;

        let from_value = wide::mul(from_shares, total_supply);
        let moved = wide::mul(amount, total_shares);
        if from_value < moved {
            return Err(ReflectError::Underflow("transfer: amount exceeds sender balance"));
        }
        let remaining = from_value.checked_sub(moved)?;
        let sender_target = from_shares
            .to_balance(total_supply, total_shares)?
            .checked_sub(amount)?;
        let receiver_before = to_shares.to_balance(total_supply, total_shares)?;

        let (from, to, mut total, (lo, hi)) = if uninvolved.is_zero() {
            let from: Shares = remaining.div(total_supply)?;
            let to = total_shares.checked_sub(from)?;
            let target = receiver_before.checked_add(amount)?;
            (from, to, total_shares, (target, target))
        } else {
            let pool = uninvolved.scale(BasisPoints::MAX)?;
            let fee = wide::mul(amount.scale(fee_rate)?, total_shares);
            let den = wide::mul(pool, total_supply).checked_add(fee)?;
            let received = wide::mul(to_shares.scale(BasisPoints::MAX)?, total_supply)
                .checked_add(wide::mul(amount.scale(fee_rate.complement())?, total_shares))?;

            let from = remaining.scale(pool)?.div_wide(den)?;
            let to = received.scale(uninvolved)?.div_wide(den)?;
            let total = from.checked_add(to)?.checked_add(uninvolved)?;
            let band = receiver_band(receiver_before, amount, fee_rate)?;
            (from, to, total, band)
        };

        let mut legs = [
            Leg::exact(Party::Sender, from, sender_target),
            Leg::banded(Party::Receiver, to, lo, hi),
        ];
        fixup::run(
            &mut legs,
            &mut total,
            total_supply,
            self.max_fixup_rounds(),
            &self.tracer(),
        )?;

        Ok(TransferShares {
            from_shares: legs[0].shares,
            to_shares: legs[1].shares,
            total_shares: total,
        })
    }

    /// Moves the sender's entire balance to the receiver. The sender ends with zero shares,
    /// so only the receiver's shares and the new total are returned.
    ///
    /// The correction never lets the receiver drop below `to_shares`.
    #[instrument(level = "trace", skip(self))]
    pub fn get_transfer_all_shares(
        &self,
        fee_rate: BasisPoints,
        total_supply: Balance,
        total_shares: Shares,
        from_shares: Shares,
        to_shares: Shares,
    ) -> Result<TransferAllShares> {
        if total_shares.is_zero() {
            return Err(ReflectError::DivisionByZero("transfer all: total shares"));
        }
        if from_shares.is_zero() {
            return Ok(TransferAllShares {
                to_shares,
                total_shares,
            });
        }

        let uninvolved = total_shares
            .checked_sub(from_shares)
            .and_then(|rest| rest.checked_sub(to_shares))
            .map_err(|_| ReflectError::Underflow("transfer all: parties exceed total shares"))?;
        if uninvolved.is_zero() {
            return Ok(TransferAllShares {
                to_shares: total_shares,
                total_shares,
            });
        }

        // t*B + f*(B - r) over u*B + f*r
        let received = to_shares
            .scale(BasisPoints::MAX)?
            .checked_add(from_shares.scale(fee_rate.complement())?)?;
        let den = uninvolved
            .scale(BasisPoints::MAX)?
            .checked_add(from_shares.scale(fee_rate)?)?;

        let to: Shares = wide::mul(received, uninvolved).div(den)?;
        let mut total = to.checked_add(uninvolved)?;
        let target: Balance =
            wide::mul(received, total_supply).div(total_shares.scale(BasisPoints::MAX)?)?;

        let mut legs = [Leg::floored(Party::Receiver, to, target, to_shares)];
        fixup::run(
            &mut legs,
            &mut total,
            total_supply,
            self.max_fixup_rounds(),
            &self.tracer(),
        )?;

        Ok(TransferAllShares {
            to_shares: legs[0].shares,
            total_shares: total,
        })
    }
}
