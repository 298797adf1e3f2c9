//! `ReflectMath`: the conversion engine and its free-function entry points.
//!
//! Every operation is a pure function of its arguments. The engine value only carries the
//! validated configuration and the diagnostic hook; transfer and delivery live in their own
//! modules as further `impl ReflectMath` blocks.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::ReflectConfig;
use crate::trace::{BalanceTrace, NoTrace, Tracer};
use crate::units::{Balance, BasisPoints, Shares};
use crate::{ReflectError, Result};

/// New share counts after a two-party transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferShares {
    pub from_shares: Shares,
    pub to_shares: Shares,
    pub total_shares: Shares,
}

/// New receiver shares and total after the sender moved its whole balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAllShares {
    pub to_shares: Shares,
    pub total_shares: Shares,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverShares {
    pub from_shares: Shares,
    pub total_shares: Shares,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnShares {
    pub from_shares: Shares,
    pub total_shares: Shares,
    pub total_supply: Balance,
}

/// Conversion engine.
///
/// `H` receives intermediate balances when `config.logging.trace_balances` is set.
#[derive(Clone, Debug, Default)]
pub struct ReflectMath<H = NoTrace> {
    config: ReflectConfig,
    trace: H,
}

impl ReflectMath<NoTrace> {
    pub fn new(config: ReflectConfig) -> Result<Self> {
        Self::with_trace(config, NoTrace)
    }
}

impl<H: BalanceTrace> ReflectMath<H> {
    pub fn with_trace(config: ReflectConfig, trace: H) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, trace })
    }

    pub fn config(&self) -> &ReflectConfig {
        &self.config
    }

    pub fn trace(&self) -> &H {
        &self.trace
    }

    pub(crate) fn tracer(&self) -> Tracer<'_, H> {
        Tracer::new(&self.trace, self.config.logging.trace_balances)
    }

    pub(crate) fn max_fixup_rounds(&self) -> u32 {
        self.config.fixup.max_rounds
    }

    /// Reserved: burning `amount` from a holder.
    ///
    /// Unlike transfer and delivery this must shrink `total_supply` by `amount` and the
    /// holder's shares so that every other holder's balance is unchanged. Always returns
    /// `NotImplemented`.
    #[instrument(level = "trace", skip(self))]
    pub fn get_burn_shares(
        &self,
        amount: Balance,
        total_supply: Balance,
        total_shares: Shares,
        from_shares: Shares,
    ) -> Result<BurnShares> {
        Err(ReflectError::NotImplemented("get_burn_shares"))
    }
}

/// [`ReflectMath::get_transfer_shares`] with the default configuration.
pub fn get_transfer_shares(
    amount: Balance,
    fee_rate: BasisPoints,
    total_supply: Balance,
    total_shares: Shares,
    from_shares: Shares,
    to_shares: Shares,
) -> Result<TransferShares> {
    ReflectMath::<NoTrace>::default().get_transfer_shares(
        amount,
        fee_rate,
        total_supply,
        total_shares,
        from_shares,
        to_shares,
    )
}

/// [`ReflectMath::get_transfer_all_shares`] with the default configuration.
pub fn get_transfer_all_shares(
    fee_rate: BasisPoints,
    total_supply: Balance,
    total_shares: Shares,
    from_shares: Shares,
    to_shares: Shares,
) -> Result<TransferAllShares> {
    ReflectMath::<NoTrace>::default().get_transfer_all_shares(
        fee_rate,
        total_supply,
        total_shares,
        from_shares,
        to_shares,
    )
}

/// [`ReflectMath::get_deliver_shares`] with the default configuration.
pub fn get_deliver_shares(
    amount: Balance,
    total_supply: Balance,
    total_shares: Shares,
    from_shares: Shares,
) -> Result<DeliverShares> {
    ReflectMath::<NoTrace>::default().get_deliver_shares(
        amount,
        total_supply,
        total_shares,
        from_shares,
    )
}

/// [`ReflectMath::get_burn_shares`] with the default configuration.
pub fn get_burn_shares(
    amount: Balance,
    total_supply: Balance,
    total_shares: Shares,
    from_shares: Shares,
) -> Result<BurnShares> {
    ReflectMath::<NoTrace>::default().get_burn_shares(
        amount,
        total_supply,
        total_shares,
        from_shares,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TracingTrace;

    #[test]
    fn burn_is_reserved() {
        let r = get_burn_shares(
            Balance::from(1u64),
            Balance::from(100u64),
            Shares::from(100u64),
            Shares::from(10u64),
        );
        assert_eq!(r, Err(ReflectError::NotImplemented("get_burn_shares")));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = ReflectConfig::default();
        config.fixup.max_rounds = 0;
        assert!(matches!(
            ReflectMath::new(config),
            Err(ReflectError::ConfigError(_))
        ));
    }

    #[test]
    fn tracer_follows_config() {
        let quiet: ReflectMath = ReflectMath::default();
        assert!(!quiet.tracer().enabled());

        let config = ReflectConfig::builder().trace_balances(true).build().unwrap();
        let loud = ReflectMath::with_trace(config, TracingTrace).unwrap();
        assert!(loud.tracer().enabled());
        assert_eq!(loud.max_fixup_rounds(), 3);
    }

    #[test]
    fn outcomes_serialize_as_plain_fields() {
        let out = DeliverShares {
            from_shares: Shares::from(7u64),
            total_shares: Shares::from(70u64),
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("from_shares"));
        let back: DeliverShares = serde_json::from_str(&json).unwrap();
        assert_eq!(back, out);
    }
}
