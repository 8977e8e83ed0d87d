use std::fmt;
use std::iter::Sum;
use std::str::FromStr;
use thiserror::Error;

/// Fixed-point decimal with 4 decimal places, stored as a scaled integer.
///
/// All ledger arithmetic happens on the scaled integer, so sums do not depend
/// on the order of their terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

/// Errors produced when parsing a decimal string into an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid digit in amount '{0}'")]
    InvalidDigit(String),
    #[error("amount '{0}' has more than 4 decimal places")]
    TooPrecise(String),
    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

impl Amount {
    const SCALE: i64 = 10_000;
    const FRACTION_DIGITS: usize = 4;
    /// Minimal units per cent.
    const CENT_UNITS: i64 = Self::SCALE / 100;

    pub const ZERO: Amount = Amount(0);

    /// One currency minor unit.
    pub const CENT: Amount = Amount(Self::CENT_UNITS);

    /// Balances and settlement amounts below one cent are treated as zero.
    pub const TOLERANCE: Amount = Self::CENT;

    pub const fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    pub const fn from_whole(value: i64) -> Self {
        Amount(value * Self::SCALE)
    }

    /// The raw scaled integer (1 = 0.0001).
    pub const fn scaled(self) -> i64 {
        self.0
    }

    pub fn abs(self) -> Self {
        Amount(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// True when the magnitude is below [`Amount::TOLERANCE`].
    pub fn is_negligible(self) -> bool {
        self.0.abs() < Self::TOLERANCE.0
    }

    /// Round half away from zero to a whole number of cents.
    pub fn round_to_cents(self) -> Self {
        let rem = self.0 % Self::CENT_UNITS;
        let base = self.0 - rem;
        if rem.abs() * 2 >= Self::CENT_UNITS {
            Amount(base + Self::CENT_UNITS * rem.signum())
        } else {
            Amount(base)
        }
    }

    /// Largest whole number of cents not above `self`.
    pub fn floor_to_cents(self) -> Self {
        Amount(self.0.div_euclid(Self::CENT_UNITS) * Self::CENT_UNITS)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Sum of `values`, or `None` if it does not fit.
    pub fn checked_sum<'a>(values: impl IntoIterator<Item = &'a Amount>) -> Option<Self> {
        values
            .into_iter()
            .try_fold(Amount::ZERO, |acc, value| acc.checked_add(*value))
    }

    /// `self * num / den`, rounded half away from zero.
    ///
    /// A zero denominator yields zero rather than failing.
    pub fn mul_ratio(self, num: Amount, den: Amount) -> Self {
        if den.0 == 0 {
            return Amount::ZERO;
        }
        let n = self.0 as i128 * num.0 as i128;
        let d = den.0 as i128;
        let (q, r) = (n / d, n % d);
        let q = if r.abs() * 2 >= d.abs() {
            q + n.signum() * d.signum()
        } else {
            q
        };
        Amount(q as i64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:04}")
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(ParseAmountError::Empty);
        }
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !is_digits(whole) || !is_digits(frac) {
            return Err(ParseAmountError::InvalidDigit(s.to_string()));
        }
        if frac.len() > Self::FRACTION_DIGITS {
            return Err(ParseAmountError::TooPrecise(s.to_string()));
        }

        let overflow = || ParseAmountError::Overflow(s.to_string());
        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            // at most 4 digits, cannot overflow
            frac.parse::<i64>().map_err(|_| overflow())?
                * 10_i64.pow((Self::FRACTION_DIGITS - frac.len()) as u32)
        };

        let value = whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(overflow)?;
        Ok(Amount(if negative { -value } else { value }))
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
