//! Delivery: the sender gives up `amount` to every other holder at once.
//!
//! Total supply is unchanged, so retiring the sender's shares raises everyone else's balance in
//! proportion. With `o = S - f` the other holders' shares:
//!
//! ```text
//! f' = (f*T - a*S) * o / (o*T + a*S)
//! S' = f' + o
//! ```

use tracing::instrument;

use crate::engine::{DeliverShares, ReflectMath};
use crate::fixup::{self, Leg};
use crate::trace::{BalanceTrace, Party};
use crate::units::{Balance, Shares};
use crate::wide;
use crate::{ReflectError, Result};

impl<H: BalanceTrace> ReflectMath<H> {
    /// Redistributes `amount` of the sender's balance to all other holders.
    ///
    /// A single correction step follows the division; its size is computed from the miss
    /// rather than stepped one share at a time.
    #[instrument(level = "trace", skip(self))]
    pub fn get_deliver_shares(
        &self,
        amount: Balance,
        total_supply: Balance,
        total_shares: Shares,
        from_shares: Shares,
    ) -> Result<DeliverShares> {
        if total_shares.is_zero() {
            return Err(ReflectError::DivisionByZero("deliver: total shares"));
        }
        let unchanged = DeliverShares {
            from_shares,
            total_shares,
        };
        if amount.is_zero() {
            return Ok(unchanged);
        }

        let others = total_shares
            .checked_sub(from_shares)
            .map_err(|_| ReflectError::Underflow("deliver: sender exceeds total shares"))?;
        let from_value = wide::mul(from_shares, total_supply);
        let delivered = wide::mul(amount, total_shares);
        if from_value < delivered {
            return Err(ReflectError::Underflow("deliver: amount exceeds sender balance"));
        }
        if others.is_zero() {
            return Ok(unchanged);
        }

        let den = wide::mul(others, total_supply).checked_add(delivered)?;
        let from: Shares = from_value
            .checked_sub(delivered)?
            .scale(others)?
            .div_wide(den)?;
        let mut total = from.checked_add(others)?;
        let target = from_shares
            .to_balance(total_supply, total_shares)?
            .checked_sub(amount)?;

        let mut legs = [Leg::exact(Party::Sender, from, target)];
        fixup::run(&mut legs, &mut total, total_supply, 1, &self.tracer())?;

        Ok(DeliverShares {
            from_shares: legs[0].shares,
            total_shares: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::get_deliver_shares;

    fn sh(v: u64) -> Shares {
        Shares::from(v)
    }

    fn bal(v: u64) -> Balance {
        Balance::from(v)
    }

    #[test]
    fn delivery_raises_every_other_balance() {
        let supply = bal(1_000_000);
        let out = get_deliver_shares(bal(10_000), supply, sh(1_000_000), sh(100_000)).unwrap();
        assert_eq!(
            out,
            DeliverShares {
                from_shares: sh(89_011),
                total_shares: sh(989_011),
            }
        );
        assert_eq!(out.from_shares.to_balance(supply, out.total_shares).unwrap(), bal(90_000));
        let others = out.total_shares.checked_sub(out.from_shares).unwrap();
        assert_eq!(others, sh(900_000));
        assert_eq!(others.to_balance(supply, out.total_shares).unwrap(), bal(909_999));
    }

    #[test]
    fn nothing_to_deliver_or_nobody_to_receive() {
        let out = get_deliver_shares(Balance::ZERO, bal(10), sh(100), sh(40)).unwrap();
        assert_eq!((out.from_shares, out.total_shares), (sh(40), sh(100)));

        let out = get_deliver_shares(bal(5), bal(10), sh(100), sh(100)).unwrap();
        assert_eq!((out.from_shares, out.total_shares), (sh(100), sh(100)));
    }

    #[test]
    fn delivery_errors() {
        assert!(matches!(
            get_deliver_shares(bal(1), bal(10), Shares::ZERO, Shares::ZERO),
            Err(ReflectError::DivisionByZero(_))
        ));
        // sender is worth 4
        assert!(matches!(
            get_deliver_shares(bal(5), bal(10), sh(100), sh(40)),
            Err(ReflectError::Underflow(_))
        ));
        assert!(matches!(
            get_deliver_shares(bal(1), bal(10), sh(100), sh(101)),
            Err(ReflectError::Underflow(_))
        ));
    }
}
