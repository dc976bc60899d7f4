use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A CPM price point: price per one thousand impressions.
///
/// Backed by a decimal so bucket stepping and micro-unit conversion stay
/// exact; floats would drift across hundreds of price points.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cpm(Decimal);

impl Cpm {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The canonical two-decimal rendering used for targeting value names
    /// and line item naming ("1.10", not "1.1").
    pub fn name(&self) -> String {
        format!("{:.2}", self.0)
    }

    /// The platform's micro-currency representation (price × 1,000,000).
    ///
    /// `None` if the price is too large to represent, which configuration
    /// validation rules out for any sane CPM.
    pub fn micros(&self) -> Option<i64> {
        (self.0 * Decimal::from(1_000_000i64)).trunc().to_i64()
    }
}

impl fmt::Display for Cpm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Cpm {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s).map(Self)
    }
}

impl std::ops::Add for Cpm {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}
