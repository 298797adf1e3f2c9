use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::wide;
use crate::{ReflectError, Result};

/// 100% in basis points.
pub const BASIS: u16 = 10_000;

/// A native-width (256-bit) quantity with a fixed unit.
///
/// Implemented by every value the wide kernel accepts as an operand; the unit is carried by
/// the implementing type, the raw word carries the magnitude.
pub trait Native: Copy {
    fn word(self) -> U256;
    fn from_word(word: U256) -> Self;
}

macro_rules! native_quantity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(U256);

        impl $name {
            pub const ZERO: $name = $name(U256::ZERO);

            pub const fn new(v: U256) -> $name {
                $name(v)
            }

            pub const fn get(self) -> U256 {
                self.0
            }

            pub fn is_zero(self) -> bool {
                self.0.is_zero()
            }

            pub fn checked_add(self, rhs: $name) -> Result<$name> {
                self.0
                    .checked_add(rhs.0)
                    .map($name)
                    .ok_or(ReflectError::Overflow(concat!(stringify!($name), " add")))
            }

            pub fn checked_sub(self, rhs: $name) -> Result<$name> {
                self.0
                    .checked_sub(rhs.0)
                    .map($name)
                    .ok_or(ReflectError::Underflow(concat!(stringify!($name), " sub")))
            }
        }

        impl Native for $name {
            fn word(self) -> U256 {
                self.0
            }

            fn from_word(word: U256) -> Self {
                $name(word)
            }
        }

        impl From<U256> for $name {
            fn from(v: U256) -> Self {
                $name(v)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(U256::from(v))
            }
        }

        impl From<u128> for $name {
            fn from(v: u128) -> Self {
                $name(U256::from(v))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

native_quantity!(
    /// User-facing token amount.
    Balance
);

native_quantity!(
    /// Internal ledger unit. `balance = shares * total_supply / total_shares` (floor).
    Shares
);

native_quantity!(
    /// `shares * bps`, kept at native width.
    SharesXBasisPoints
);

native_quantity!(
    /// `balance * bps`, kept at native width.
    BalanceXBasisPoints
);

/// Basis points in `[0, BASIS]` (correct-by-construction).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct BasisPoints(u16);

impl BasisPoints {
    pub const ZERO: BasisPoints = BasisPoints(0);
    pub const MAX: BasisPoints = BasisPoints(BASIS);

    /// Constructs a bounded fee rate.
    ///
    /// Preconditions:
    /// - `v <= BASIS` (else returns an error; fail-closed).
    pub fn new(v: u16) -> Result<BasisPoints> {
        if v <= BASIS {
            Ok(BasisPoints(v))
        } else {
            Err(ReflectError::InvalidInput(format!(
                "basis points out of range: {v} > {BASIS}"
            )))
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn word(self) -> U256 {
        U256::from(self.0)
    }

    /// `BASIS - self`, the share of an amount that survives the fee.
    pub fn complement(self) -> BasisPoints {
        BasisPoints(BASIS - self.0)
    }
}

impl TryFrom<u16> for BasisPoints {
    type Error = ReflectError;
    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        BasisPoints::new(value)
    }
}

impl From<BasisPoints> for u16 {
    fn from(value: BasisPoints) -> Self {
        value.0
    }
}

fn scale_word(v: U256, rate: BasisPoints, what: &'static str) -> Result<U256> {
    v.checked_mul(rate.word()).ok_or(ReflectError::Overflow(what))
}

impl Balance {
    pub const ONE: Balance = Balance(U256::from_limbs([1, 0, 0, 0]));

    pub fn scale(self, rate: BasisPoints) -> Result<BalanceXBasisPoints> {
        scale_word(self.0, rate, "Balance scale").map(BalanceXBasisPoints)
    }

    /// `floor(self * total_shares / total_supply)`.
    pub fn to_shares(self, total_supply: Balance, total_shares: Shares) -> Result<Shares> {
        wide::mul(self, total_shares).div(total_supply)
    }
}

impl Shares {
    pub fn scale(self, rate: BasisPoints) -> Result<SharesXBasisPoints> {
        scale_word(self.0, rate, "Shares scale").map(SharesXBasisPoints)
    }

    /// `floor(self * total_supply / total_shares)`.
    pub fn to_balance(self, total_supply: Balance, total_shares: Shares) -> Result<Balance> {
        wide::mul(self, total_supply).div(total_shares)
    }
}

impl BalanceXBasisPoints {
    /// Divides the basis-point factor back out, rounding down.
    pub fn unscale_floor(self) -> Balance {
        Balance(self.0 / BasisPoints::MAX.word())
    }

    /// Divides the basis-point factor back out, rounding up.
    pub fn unscale_ceil(self) -> Balance {
        let basis = BasisPoints::MAX.word();
        let q = self.0 / basis;
        if (self.0 % basis).is_zero() {
            Balance(q)
        } else {
            Balance(q + U256::from(1u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_points_bounds() {
        assert_eq!(BasisPoints::new(0).unwrap(), BasisPoints::ZERO);
        assert_eq!(BasisPoints::new(BASIS).unwrap(), BasisPoints::MAX);
        assert!(matches!(
            BasisPoints::new(BASIS + 1),
            Err(ReflectError::InvalidInput(_))
        ));
        assert_eq!(BasisPoints::new(30).unwrap().complement().get(), 9_970);
    }

    #[test]
    fn basis_points_serde_rejects_out_of_range() {
        let ok: BasisPoints = serde_json::from_str("250").unwrap();
        assert_eq!(ok.get(), 250);
        assert!(serde_json::from_str::<BasisPoints>("10001").is_err());
    }

    #[test]
    fn checked_arithmetic_reports_direction() {
        let a = Shares::from(5u64);
        let b = Shares::from(7u64);
        assert_eq!(a.checked_add(b).unwrap(), Shares::from(12u64));
        assert!(matches!(a.checked_sub(b), Err(ReflectError::Underflow(_))));
        assert!(matches!(
            Shares::new(U256::MAX).checked_add(a),
            Err(ReflectError::Overflow(_))
        ));
    }

    #[test]
    fn to_balance_floors() {
        let supply = Balance::from(1_000u64);
        let total = Shares::from(3_000u64);
        assert_eq!(
            Shares::from(1_000u64).to_balance(supply, total).unwrap(),
            Balance::from(333u64)
        );
        assert_eq!(
            Balance::from(333u64).to_shares(supply, total).unwrap(),
            Shares::from(999u64)
        );
    }

    #[test]
    fn to_balance_with_no_shares_is_division_by_zero() {
        let r = Shares::ZERO.to_balance(Balance::from(1u64), Shares::ZERO);
        assert!(matches!(r, Err(ReflectError::DivisionByZero(_))));
    }

    #[test]
    fn to_balance_survives_products_wider_than_native() {
        let big = Shares::new(U256::MAX);
        let supply = Balance::new(U256::MAX);
        assert_eq!(big.to_balance(supply, big).unwrap(), supply);
    }

    #[test]
    fn unscale_rounds_both_ways() {
        let fee = Balance::from(10_001u64).scale(BasisPoints::new(30).unwrap()).unwrap();
        assert_eq!(fee.unscale_floor(), Balance::from(30u64));
        assert_eq!(fee.unscale_ceil(), Balance::from(31u64));
        let exact = Balance::from(10_000u64).scale(BasisPoints::new(30).unwrap()).unwrap();
        assert_eq!(exact.unscale_ceil(), Balance::from(30u64));
    }

    #[test]
    fn scale_overflow_is_reported() {
        let r = Shares::new(U256::MAX).scale(BasisPoints::MAX);
        assert!(matches!(r, Err(ReflectError::Overflow(_))));
    }
}
