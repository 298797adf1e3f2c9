//! Wide-arithmetic kernel.
//!
//! A `Wide<S>` is an exact 512-bit intermediate whose type parameter records the shape of the
//! product that built it (which units were multiplied together). The legal products and
//! quotients are encoded as trait impls, so dividing mismatched shapes does not compile:
//!
//! | numerator                      | denominator                  | quotient  |
//! |--------------------------------|------------------------------|-----------|
//! | `BalanceXShares`               | `Shares`                     | `Balance` |
//! | `BalanceXShares`               | `Balance`                    | `Shares`  |
//! | `BalanceXShares2`              | `BalanceXShares`             | `Shares`  |
//! | `BalanceXBasisPointsXShares2`  | `BalanceXBasisPointsXShares` | `Shares`  |
//! | `BalanceXBasisPointsXShares`   | `SharesXBasisPoints`         | `Balance` |
//! | `Shares2XBasisPoints`          | `SharesXBasisPoints`         | `Shares`  |
//!
//! Native x native products never fail. Wide x native products, sums and differences are
//! checked (`Overflow` / `Underflow`); quotients fail with `DivisionByZero` or, when the result
//! does not fit native width, `Overflow`.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use alloy_primitives::{U256, U512};

use crate::units::{Balance, BalanceXBasisPoints, Native, Shares, SharesXBasisPoints};
use crate::{ReflectError, Result};

/// Marker for the unit shape of a wide value.
pub trait Shape {
    const NAME: &'static str;
}

macro_rules! shape {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub enum $name {}

        impl Shape for $name {
            const NAME: &'static str = stringify!($name);
        }
    };
}

shape!(
    /// `balance * shares`
    BalanceXShares
);
shape!(
    /// `balance * shares^2`
    BalanceXShares2
);
shape!(
    /// `balance * bps * shares`
    BalanceXBasisPointsXShares
);
shape!(
    /// `balance * bps * shares^2`
    BalanceXBasisPointsXShares2
);
shape!(
    /// `shares^2 * bps`
    Shares2XBasisPoints
);

/// Native x native products that yield a wide value of shape `Output`.
pub trait WideMul<Rhs: Native>: Native {
    type Output: Shape;
}

/// Wide x native products (checked).
pub trait Scale<Rhs: Native>: Shape {
    type Output: Shape;
}

/// Quotients whose units cancel down to a native quantity.
pub trait Over<Den> {
    type Quotient: Native;
}

impl WideMul<Balance> for Shares {
    type Output = BalanceXShares;
}
impl WideMul<Shares> for Balance {
    type Output = BalanceXShares;
}
impl WideMul<Balance> for SharesXBasisPoints {
    type Output = BalanceXBasisPointsXShares;
}
impl WideMul<Shares> for BalanceXBasisPoints {
    type Output = BalanceXBasisPointsXShares;
}
impl WideMul<Shares> for SharesXBasisPoints {
    type Output = Shares2XBasisPoints;
}

impl Scale<SharesXBasisPoints> for BalanceXShares {
    type Output = BalanceXBasisPointsXShares2;
}
impl Scale<Shares> for BalanceXBasisPointsXShares {
    type Output = BalanceXBasisPointsXShares2;
}
impl Scale<Shares> for BalanceXShares {
    type Output = BalanceXShares2;
}

impl Over<Shares> for BalanceXShares {
    type Quotient = Balance;
}
impl Over<Balance> for BalanceXShares {
    type Quotient = Shares;
}
impl Over<BalanceXShares> for BalanceXShares2 {
    type Quotient = Shares;
}
impl Over<BalanceXBasisPointsXShares> for BalanceXBasisPointsXShares2 {
    type Quotient = Shares;
}
impl Over<SharesXBasisPoints> for BalanceXBasisPointsXShares {
    type Quotient = Balance;
}
impl Over<SharesXBasisPoints> for Shares2XBasisPoints {
    type Quotient = Shares;
}

/// Exact 512-bit intermediate of shape `S`.
pub struct Wide<S> {
    word: U512,
    shape: PhantomData<S>,
}

fn widen(v: U256) -> U512 {
    let l = v.as_limbs();
    U512::from_limbs([l[0], l[1], l[2], l[3], 0, 0, 0, 0])
}

fn narrow(v: U512) -> Option<U256> {
    let l = v.as_limbs();
    if l[4..].iter().any(|&limb| limb != 0) {
        return None;
    }
    Some(U256::from_limbs([l[0], l[1], l[2], l[3]]))
}

fn quotient<Q: Native>(num: U512, den: U512) -> Result<Q> {
    let q = num
        .checked_div(den)
        .ok_or(ReflectError::DivisionByZero("wide div"))?;
    narrow(q)
        .map(Q::from_word)
        .ok_or(ReflectError::Overflow("wide div quotient exceeds 256 bits"))
}

/// Exact product of two native-width values.
pub fn mul<A, B>(a: A, b: B) -> Wide<A::Output>
where
    A: WideMul<B>,
    B: Native,
{
    // < 2^256 * 2^256, so the 512-bit product cannot wrap.
    Wide::from_word(widen(a.word()).wrapping_mul(widen(b.word())))
}

impl<S: Shape> Wide<S> {
    pub const ZERO: Wide<S> = Wide {
        word: U512::ZERO,
        shape: PhantomData,
    };

    fn from_word(word: U512) -> Self {
        Wide {
            word,
            shape: PhantomData,
        }
    }

    pub fn word(&self) -> U512 {
        self.word
    }

    pub fn is_zero(&self) -> bool {
        self.word.is_zero()
    }

    pub fn checked_add(self, rhs: Wide<S>) -> Result<Wide<S>> {
        self.word
            .checked_add(rhs.word)
            .map(Wide::from_word)
            .ok_or(ReflectError::Overflow("wide add"))
    }

    /// Adds a native-width count of this shape's smallest unit.
    pub fn add_word(self, units: U256) -> Result<Wide<S>> {
        self.word
            .checked_add(widen(units))
            .map(Wide::from_word)
            .ok_or(ReflectError::Overflow("wide add"))
    }

    pub fn checked_sub(self, rhs: Wide<S>) -> Result<Wide<S>> {
        self.word
            .checked_sub(rhs.word)
            .map(Wide::from_word)
            .ok_or(ReflectError::Underflow("wide sub"))
    }

    pub fn scale<N>(self, factor: N) -> Result<Wide<<S as Scale<N>>::Output>>
    where
        S: Scale<N>,
        N: Native,
    {
        self.word
            .checked_mul(widen(factor.word()))
            .map(Wide::from_word)
            .ok_or(ReflectError::Overflow("wide scale"))
    }

    /// Floor division by a native quantity.
    pub fn div<N>(self, den: N) -> Result<<S as Over<N>>::Quotient>
    where
        S: Over<N>,
        N: Native,
    {
        quotient(self.word, widen(den.word()))
    }

    /// Ceiling division by a native quantity.
    pub fn div_ceil<N>(self, den: N) -> Result<<S as Over<N>>::Quotient>
    where
        S: Over<N>,
        N: Native,
    {
        let d = den.word();
        if d.is_zero() {
            return Err(ReflectError::DivisionByZero("wide div"));
        }
        self.add_word(d.wrapping_sub(U256::from(1u64)))?.div(den)
    }

    /// Floor division by another wide value.
    pub fn div_wide<E: Shape>(self, den: Wide<E>) -> Result<<S as Over<E>>::Quotient>
    where
        S: Over<E>,
    {
        quotient(self.word, den.word)
    }
}

impl<S> Clone for Wide<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Wide<S> {}

impl<S> PartialEq for Wide<S> {
    fn eq(&self, other: &Self) -> bool {
        self.word == other.word
    }
}

impl<S> Eq for Wide<S> {}

impl<S> PartialOrd for Wide<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for Wide<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.word.cmp(&other.word)
    }
}

impl<S: Shape> fmt::Debug for Wide<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(S::NAME).field(&self.word).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::BasisPoints;
    use proptest::prelude::*;

    fn sh(v: u128) -> Shares {
        Shares::from(v)
    }

    fn bal(v: u128) -> Balance {
        Balance::from(v)
    }

    #[test]
    fn max_product_is_exact() {
        let p = mul(Shares::new(U256::MAX), Balance::new(U256::MAX));
        // (2^256 - 1)^2 = 2^512 - 2^257 + 1
        let expected = U512::MAX - (U512::from(1u64) << 257usize) + U512::from(2u64);
        assert_eq!(p.word(), expected);
        assert_eq!(p.div(Shares::new(U256::MAX)).unwrap(), Balance::new(U256::MAX));
    }

    #[test]
    fn add_overflow_and_sub_underflow() {
        let big = mul(Shares::new(U256::MAX), Balance::new(U256::MAX));
        assert!(matches!(big.checked_add(big), Err(ReflectError::Overflow(_))));
        let small = mul(sh(2), bal(3));
        assert!(matches!(
            small.checked_sub(big),
            Err(ReflectError::Underflow(_))
        ));
        assert_eq!(big.checked_sub(big).unwrap(), Wide::ZERO);
    }

    #[test]
    fn division_by_zero_is_reported() {
        let p = mul(sh(10), bal(10));
        assert!(matches!(p.div(Shares::ZERO), Err(ReflectError::DivisionByZero(_))));
        assert!(matches!(
            p.div_ceil(Balance::ZERO),
            Err(ReflectError::DivisionByZero(_))
        ));
        let z: Wide<BalanceXShares> = Wide::ZERO;
        let num = p.scale(sh(1)).unwrap();
        assert!(matches!(num.div_wide(z), Err(ReflectError::DivisionByZero(_))));
    }

    #[test]
    fn oversized_quotient_is_overflow() {
        let p = mul(Shares::new(U256::MAX), Balance::new(U256::MAX));
        assert!(matches!(p.div(Shares::from(1u64)), Err(ReflectError::Overflow(_))));
    }

    #[test]
    fn scale_tracks_shape_and_checks_overflow() {
        let p = mul(sh(7), bal(11));
        let bps = sh(3).scale(BasisPoints::MAX).unwrap();
        let q: Wide<BalanceXBasisPointsXShares2> = p.scale(bps).unwrap();
        assert_eq!(q.word(), U512::from(7u64 * 11 * 3 * 10_000));

        let big = mul(Shares::new(U256::MAX), Balance::new(U256::MAX));
        assert!(matches!(big.scale(sh(2)), Err(ReflectError::Overflow(_))));
    }

    #[test]
    fn ceil_division_rounds_up_only_on_remainder() {
        assert_eq!(mul(sh(10), bal(3)).div_ceil(Balance::from(7u64)).unwrap(), sh(5));
        assert_eq!(mul(sh(7), bal(3)).div_ceil(Balance::from(7u64)).unwrap(), sh(3));
    }

    #[test]
    fn same_shape_values_compare() {
        let a = mul(sh(3), bal(5));
        let b = mul(bal(4), sh(4));
        assert!(a < b);
        assert_eq!(a.max(b), b);
    }

    #[test]
    fn debug_names_the_shape() {
        let s = format!("{:?}", mul(sh(1), bal(2)));
        assert!(s.starts_with("BalanceXShares("));
    }

    proptest! {
        #[test]
        fn mul_div_matches_u128_reference(a in any::<u64>(), b in any::<u64>(), d in 1u64..) {
            let p = mul(Shares::from(a), Balance::from(b));
            let got: Shares = p.div(Balance::from(d)).unwrap();
            let want = (a as u128) * (b as u128) / (d as u128);
            prop_assert_eq!(got, Shares::from(want));
        }

        #[test]
        fn nested_quotient_cancels_units(x in 1u64.., y in 1u64.., z in 1u64..) {
            // (x*y*z) / (x*y) == z
            let den = mul(Shares::from(x), Balance::from(y));
            let num = den.scale(Shares::from(z)).unwrap();
            prop_assert_eq!(num.div_wide(den).unwrap(), Shares::from(z));
        }
    }
}
