//! Rounding correction shared by every conversion.
//!
//! The division step of a conversion floors each party's new share count independently, so the
//! balances it implies can miss their exact targets by a few units. `settle` moves one party's
//! shares and the total by the same `k` until `floor(shares * supply / total)` lands in the
//! party's target range; `run` applies it to each leg in turn for a bounded number of rounds.
//! Moving both values together keeps `sum(parties) + uninvolved == total`.
//!
//! Changing the total shifts every other leg's balance, so within `run` each step is chosen,
//! where possible, from the sizes that also leave the other legs on target. A state the rounds
//! leave off target is finished by searching its one-share lock-step neighbours.

use alloy_primitives::U256;
use tracing::warn;

use crate::trace::{BalanceTrace, Party, TraceEvent, Tracer};
use crate::units::{Balance, Shares};
use crate::wide;
use crate::Result;

/// One party taking part in a rounding correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leg {
    pub party: Party,
    pub shares: Shares,
    pub lo: Balance,
    pub hi: Balance,
    /// Shares may never end below this value; crossing it clamps and stops the loop.
    pub floor: Option<Shares>,
}

impl Leg {
    pub fn exact(party: Party, shares: Shares, target: Balance) -> Self {
        Self {
            party,
            shares,
            lo: target,
            hi: target,
            floor: None,
        }
    }

    pub fn banded(party: Party, shares: Shares, lo: Balance, hi: Balance) -> Self {
        Self {
            lo,
            hi,
            ..Self::exact(party, shares, lo)
        }
    }

    pub fn floored(party: Party, shares: Shares, target: Balance, floor: Shares) -> Self {
        Self {
            floor: Some(floor),
            ..Self::exact(party, shares, target)
        }
    }

    fn balance(&self, supply: Balance, total: Shares) -> Result<Balance> {
        self.shares.to_balance(supply, total)
    }

    fn in_band(&self, supply: Balance, total: Shares) -> Result<bool> {
        let b = self.balance(supply, total)?;
        Ok(self.lo <= b && b <= self.hi)
    }

    fn below_floor(&self) -> bool {
        matches!(self.floor, Some(floor) if self.shares < floor)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixupReport {
    /// Rounds that adjusted at least one leg.
    pub rounds: u32,
    pub clamped: bool,
    /// The neighbour search, not the rounds, made the final move.
    pub neighbour: bool,
    pub converged: bool,
}

const ONE_SHARE: Shares = Shares::new(U256::from_limbs([1, 0, 0, 0]));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Grow,
    Shrink,
}

fn midpoint(kmin: Shares, kmax: Option<Shares>) -> Shares {
    match kmax {
        Some(kmax) if kmax >= kmin => {
            Shares::new(kmin.get() + (kmax.get() - kmin.get()) / U256::from(2u64))
        }
        _ => kmin,
    }
}

/// Moves `shares` and `total` by the same amount so that the implied balance lands in
/// `[lo, hi]`.
///
/// Returns `None` when the balance is already in range or the range cannot be reached by
/// moving whole shares (a holder can never be worth `supply` or more unless it holds
/// everything).
pub fn settle(
    shares: Shares,
    total: Shares,
    supply: Balance,
    lo: Balance,
    hi: Balance,
) -> Result<Option<(Shares, Shares)>> {
    settle_among(shares, total, supply, lo, hi, std::iter::empty())
}

/// `settle`, preferring a step that also keeps every leg in `others` inside its own range.
/// Falls back to the unconstrained step when no such step exists.
fn settle_among<'a>(
    shares: Shares,
    total: Shares,
    supply: Balance,
    lo: Balance,
    hi: Balance,
    others: impl Iterator<Item = &'a Leg>,
) -> Result<Option<(Shares, Shares)>> {
    let xt = wide::mul(shares, supply);
    let lo_s = wide::mul(lo, total);
    let h1 = hi.checked_add(Balance::ONE)?;
    let h1_s = wide::mul(h1, total);

    let (step, kmin, kmax) = if xt < lo_s {
        if supply <= lo {
            return Ok(None);
        }
        let kmin: Shares = lo_s.checked_sub(xt)?.div_ceil(supply.checked_sub(lo)?)?;
        let kmax = if supply > h1 {
            let k: Shares = h1_s.checked_sub(xt)?.div_ceil(supply.checked_sub(h1)?)?;
            Some(k.checked_sub(ONE_SHARE)?)
        } else {
            None
        };
        (Step::Grow, kmin, kmax)
    } else if xt >= h1_s {
        if supply <= h1 {
            return Ok(None);
        }
        let kmin: Shares = xt.checked_sub(h1_s)?.div(supply.checked_sub(h1)?)?;
        let kmax: Shares = xt.checked_sub(lo_s)?.div(supply.checked_sub(lo)?)?;
        (Step::Shrink, kmin.checked_add(ONE_SHARE)?, Some(kmax.min(shares)))
    } else {
        return Ok(None);
    };

    let k = match common_range(step, kmin, kmax, total, supply, others)? {
        Some((lo_k, hi_k)) => midpoint(lo_k, hi_k),
        None => midpoint(kmin, kmax),
    };
    match step {
        Step::Grow => Ok(Some((shares.checked_add(k)?, total.checked_add(k)?))),
        Step::Shrink => {
            let k = k.min(shares);
            if k.is_zero() {
                return Ok(None);
            }
            Ok(Some((shares.checked_sub(k)?, total.checked_sub(k)?)))
        }
    }
}

/// Narrows `[kmin, kmax]` to the steps that leave every leg in `others` on target.
fn common_range<'a>(
    step: Step,
    kmin: Shares,
    kmax: Option<Shares>,
    total: Shares,
    supply: Balance,
    others: impl Iterator<Item = &'a Leg>,
) -> Result<Option<(Shares, Option<Shares>)>> {
    let mut lo_k = kmin;
    let mut hi_k = kmax;
    let mut cap = |ub: Shares| hi_k = Some(hi_k.map_or(ub, |h| h.min(ub)));

    for leg in others {
        let yt = wide::mul(leg.shares, supply);
        let lo_s = wide::mul(leg.lo, total);
        let h1 = leg.hi.checked_add(Balance::ONE)?;
        let h1_s = wide::mul(h1, total);
        match step {
            // y*T >= lo*(S+k) and y*T < (hi+1)*(S+k)
            Step::Grow => {
                if !leg.lo.is_zero() {
                    if yt < lo_s {
                        return Ok(None);
                    }
                    cap(yt.checked_sub(lo_s)?.div(leg.lo)?);
                }
                if yt >= h1_s {
                    let k: Shares = yt.checked_sub(h1_s)?.div(h1)?;
                    lo_k = lo_k.max(k.checked_add(ONE_SHARE)?);
                }
            }
            // y*T >= lo*(S-k) and y*T < (hi+1)*(S-k)
            Step::Shrink => {
                if yt >= h1_s {
                    return Ok(None);
                }
                if yt < lo_s {
                    lo_k = lo_k.max(lo_s.checked_sub(yt)?.div_ceil(leg.lo)?);
                }
                let k: Shares = h1_s.checked_sub(yt)?.div_ceil(h1)?;
                cap(k.checked_sub(ONE_SHARE)?);
            }
        }
    }

    match hi_k {
        Some(h) if h < lo_k => Ok(None),
        _ => Ok(Some((lo_k, hi_k))),
    }
}

fn clamp<H: BalanceTrace + ?Sized>(
    leg: &mut Leg,
    total: &mut Shares,
    tracer: &Tracer<'_, H>,
) -> Result<()> {
    if let Some(floor) = leg.floor {
        *total = total.checked_add(floor.checked_sub(leg.shares)?)?;
        leg.shares = floor;
        tracer.record(TraceEvent::Clamp {
            party: leg.party,
            shares: floor,
        });
    }
    Ok(())
}

fn converged(legs: &[Leg], total: Shares, supply: Balance) -> Result<bool> {
    for leg in legs {
        if !leg.in_band(supply, total)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// One share moved on one leg, in lock-step with the total.
#[derive(Clone, Copy, Debug)]
struct Move {
    leg: usize,
    step: Step,
}

/// Single-leg moves first, then every pair of legs moved together.
fn neighbour_moves(legs: usize) -> impl Iterator<Item = (Move, Option<Move>)> {
    const STEPS: [Step; 2] = [Step::Shrink, Step::Grow];
    let singles = (0..legs).flat_map(|leg| STEPS.map(|step| (Move { leg, step }, None)));
    let pairs = (0..legs).flat_map(move |i| {
        (i + 1..legs).flat_map(move |j| {
            STEPS.into_iter().flat_map(move |a| {
                STEPS.map(move |b| (Move { leg: i, step: a }, Some(Move { leg: j, step: b })))
            })
        })
    });
    singles.chain(pairs)
}

fn nudged(shares: Shares, total: Shares, step: Step) -> Option<(Shares, Shares)> {
    match step {
        Step::Grow => Some((
            shares.checked_add(ONE_SHARE).ok()?,
            total.checked_add(ONE_SHARE).ok()?,
        )),
        Step::Shrink => Some((
            shares.checked_sub(ONE_SHARE).ok()?,
            total.checked_sub(ONE_SHARE).ok()?,
        )),
    }
}

/// Keeps the first neighbour of the current state that puts every leg on target without
/// crossing a floor. Returns whether one was found.
fn search_neighbours<H: BalanceTrace + ?Sized>(
    legs: &mut [Leg],
    total: &mut Shares,
    supply: Balance,
    tracer: &Tracer<'_, H>,
) -> Result<bool> {
    'moves: for (first, second) in neighbour_moves(legs.len()) {
        let mut trial = legs.to_vec();
        let mut trial_total = *total;
        for m in std::iter::once(first).chain(second) {
            let Some((shares, new_total)) = nudged(trial[m.leg].shares, trial_total, m.step)
            else {
                continue 'moves;
            };
            trial[m.leg].shares = shares;
            trial_total = new_total;
        }
        if trial_total.is_zero()
            || trial.iter().any(Leg::below_floor)
            || !converged(&trial, trial_total, supply)?
        {
            continue;
        }

        if tracer.enabled() {
            for (old, new) in legs.iter().zip(&trial).filter(|(o, n)| o.shares != n.shares) {
                tracer.record(TraceEvent::Neighbour {
                    party: new.party,
                    before: old.shares,
                    after: new.shares,
                    balance: new.balance(supply, trial_total)?,
                });
            }
        }
        legs.copy_from_slice(&trial);
        *total = trial_total;
        return Ok(true);
    }
    Ok(false)
}

/// Runs up to `max_rounds` correction rounds over `legs` (in order), updating each leg's
/// shares and `total` in place.
pub(crate) fn run<H: BalanceTrace + ?Sized>(
    legs: &mut [Leg],
    total: &mut Shares,
    supply: Balance,
    max_rounds: u32,
    tracer: &Tracer<'_, H>,
) -> Result<FixupReport> {
    let mut report = FixupReport::default();

    if tracer.enabled() {
        for leg in legs.iter() {
            tracer.record(TraceEvent::Estimate {
                party: leg.party,
                shares: leg.shares,
                balance: leg.balance(supply, *total)?,
                target_lo: leg.lo,
                target_hi: leg.hi,
            });
        }
    }

    if let Some(i) = legs.iter().position(Leg::below_floor) {
        clamp(&mut legs[i], total, tracer)?;
        report.clamped = true;
        report.converged = converged(legs, *total, supply)?;
        return Ok(report);
    }

    for round in 1..=max_rounds {
        let mut moved = false;
        for i in 0..legs.len() {
            let current = legs[i];
            let others = legs
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, other)| other);
            let Some((shares, new_total)) = settle_among(
                current.shares,
                *total,
                supply,
                current.lo,
                current.hi,
                others,
            )?
            else {
                continue;
            };
            let leg = &mut legs[i];
            let before = leg.shares;
            leg.shares = shares;
            *total = new_total;
            moved = true;
            if tracer.enabled() {
                tracer.record(TraceEvent::Nudge {
                    party: leg.party,
                    round,
                    before,
                    after: shares,
                    balance: leg.balance(supply, *total)?,
                });
            }
            if leg.below_floor() {
                clamp(leg, total, tracer)?;
                report.rounds = round;
                report.clamped = true;
                report.converged = converged(legs, *total, supply)?;
                return Ok(report);
            }
        }
        if !moved {
            break;
        }
        report.rounds = round;
    }

    report.converged = converged(legs, *total, supply)?;
    if !report.converged && search_neighbours(legs, total, supply, tracer)? {
        report.neighbour = true;
        report.converged = true;
    }
    if !report.converged {
        warn!(rounds = report.rounds, max_rounds, "rounding fixup ended off target");
        if report.rounds == max_rounds {
            tracer.record(TraceEvent::Exhausted { rounds: max_rounds });
        }
    }
    Ok(report)
}
