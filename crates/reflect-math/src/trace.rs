//! Diagnostic side-channel for the conversion engine.
//!
//! The engine reports its intermediate estimates and every rounding adjustment through a
//! `BalanceTrace`. `NoTrace` is the default and compiles to nothing; `TracingTrace` forwards to
//! `tracing` at debug level. Events are only produced when
//! `LoggingConfig::trace_balances` is enabled.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::units::{Balance, Shares};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Party {
    Sender,
    Receiver,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    /// Result of the division step, before any rounding adjustment.
    Estimate {
        party: Party,
        shares: Shares,
        balance: Balance,
        target_lo: Balance,
        target_hi: Balance,
    },
    /// One lock-step adjustment of a party's shares (and the total by the same amount).
    Nudge {
        party: Party,
        round: u32,
        before: Shares,
        after: Shares,
        balance: Balance,
    },
    /// A one-share lock-step move kept by the search that follows the rounds.
    Neighbour {
        party: Party,
        before: Shares,
        after: Shares,
        balance: Balance,
    },
    /// The party's shares were raised back to their floor; the loop stopped.
    Clamp { party: Party, shares: Shares },
    /// All rounds were used and at least one party is still off target.
    Exhausted { rounds: u32 },
}

pub trait BalanceTrace {
    fn record(&self, event: TraceEvent);
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTrace;

impl BalanceTrace for NoTrace {
    #[inline(always)]
    fn record(&self, _event: TraceEvent) {}
}

/// Forwards events to `tracing::debug!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingTrace;

impl BalanceTrace for TracingTrace {
    fn record(&self, event: TraceEvent) {
        match event {
            TraceEvent::Estimate {
                party,
                shares,
                balance,
                target_lo,
                target_hi,
            } => debug!(?party, %shares, %balance, %target_lo, %target_hi, "estimate"),
            TraceEvent::Nudge {
                party,
                round,
                before,
                after,
                balance,
            } => debug!(?party, round, %before, %after, %balance, "nudge"),
            TraceEvent::Neighbour {
                party,
                before,
                after,
                balance,
            } => debug!(?party, %before, %after, %balance, "neighbour"),
            TraceEvent::Clamp { party, shares } => debug!(?party, %shares, "clamp"),
            TraceEvent::Exhausted { rounds } => debug!(rounds, "fixup exhausted"),
        }
    }
}

impl<T: BalanceTrace + ?Sized> BalanceTrace for &T {
    fn record(&self, event: TraceEvent) {
        (**self).record(event)
    }
}

/// Gate between the engine and its hook.
pub(crate) struct Tracer<'a, H: ?Sized> {
    hook: &'a H,
    enabled: bool,
}

impl<'a, H: BalanceTrace + ?Sized> Tracer<'a, H> {
    pub(crate) fn new(hook: &'a H, enabled: bool) -> Self {
        Self { hook, enabled }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn record(&self, event: TraceEvent) {
        if self.enabled {
            self.hook.record(event);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Collects every event for inspection.
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) events: RefCell<Vec<TraceEvent>>,
    }

    impl BalanceTrace for Recorder {
        fn record(&self, event: TraceEvent) {
            self.events.borrow_mut().push(event);
        }
    }

    #[test]
    fn disabled_tracer_drops_events() {
        let rec = Recorder::default();
        let tracer = Tracer::new(&rec, false);
        tracer.record(TraceEvent::Exhausted { rounds: 3 });
        assert!(rec.events.borrow().is_empty());
    }

    #[test]
    fn enabled_tracer_forwards_events() {
        let rec = Recorder::default();
        let tracer = Tracer::new(&rec, true);
        tracer.record(TraceEvent::Clamp {
            party: Party::Receiver,
            shares: Shares::from(9u64),
        });
        assert_eq!(
            rec.events.borrow().as_slice(),
            &[TraceEvent::Clamp {
                party: Party::Receiver,
                shares: Shares::from(9u64),
            }]
        );
    }

    #[test]
    fn tracing_trace_accepts_all_events() {
        let t = TracingTrace;
        t.record(TraceEvent::Estimate {
            party: Party::Sender,
            shares: Shares::from(1u64),
            balance: Balance::from(1u64),
            target_lo: Balance::from(1u64),
            target_hi: Balance::from(1u64),
        });
        t.record(TraceEvent::Exhausted { rounds: 1 });
    }
}
