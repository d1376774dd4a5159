use ethers::{
    types::U256,
    utils::format_units,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    cmp::Ordering,
    fmt,
};
use thiserror::Error;

/// Number of fractional digits an on-chain integer amount is scaled by.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimals(u8);

impl Decimals {
    /// Native currency of the network (MINTME).
    pub const NATIVE: Decimals = Decimals(18);
    /// Reward token used by the slot machine and the swap pool (RANGER).
    pub const REWARD_TOKEN: Decimals = Decimals(12);

    pub const fn new(decimals: u8) -> Self {
        Self(decimals)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Decimals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("amount is not a decimal number: {0}")]
    NotNumeric(String),
    #[error("amount {input} has more than {decimals} fractional digits")]
    TooPrecise { input: String, decimals: u8 },
    #[error("amount {0} does not fit in 256 bits")]
    Overflow(String),
    #[error("amount scaled to {found} decimals where {expected} were expected")]
    DecimalsMismatch { expected: u8, found: u8 },
}

/// An on-chain integer amount that always travels with its decimal count.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct FixedPointAmount {
    raw: U256,
    decimals: Decimals,
}

impl FixedPointAmount {
    pub fn new(raw: U256, decimals: Decimals) -> Self {
        Self { raw, decimals }
    }

    pub fn zero(decimals: Decimals) -> Self {
        Self::new(U256::zero(), decimals)
    }

    /// `units` whole tokens, e.g. `from_whole(10, NATIVE)` is 10 * 10^18.
    pub fn from_whole(units: u64, decimals: Decimals) -> Self {
        let raw = U256::from(units) * U256::exp10(decimals.get() as usize);
        Self::new(raw, decimals)
    }

    /// Parses a human-entered decimal string such as `"10"` or `"0.25"`.
    ///
    /// Signs, exponents, separators and more fractional digits than the asset
    /// carries are rejected before any conversion happens.
    pub fn parse(input: &str, decimals: Decimals) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }
        if trimmed.starts_with('-') {
            return Err(AmountError::Negative(trimmed.to_string()));
        }
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && frac.is_empty()) || !digits_only(whole) || !digits_only(frac)
        {
            return Err(AmountError::NotNumeric(trimmed.to_string()));
        }
        if frac.len() > decimals.get() as usize {
            return Err(AmountError::TooPrecise {
                input: trimmed.to_string(),
                decimals: decimals.get(),
            });
        }
        // The digits may fit in 256 bits while the scaled value does not.
        let overflow = || AmountError::Overflow(trimmed.to_string());
        let padded = format!("{frac:0<width$}", width = decimals.get() as usize);
        let whole = if whole.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(whole).map_err(|_| overflow())?
        };
        let frac = if padded.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(&padded).map_err(|_| overflow())?
        };
        let raw = U256::from(10u8)
            .checked_pow(U256::from(decimals.get()))
            .and_then(|scale| whole.checked_mul(scale))
            .and_then(|scaled| scaled.checked_add(frac))
            .ok_or_else(overflow)?;
        Ok(Self::new(raw, decimals))
    }

    pub fn raw(&self) -> U256 {
        self.raw
    }

    pub fn decimals(&self) -> Decimals {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    pub fn ensure_decimals(self, expected: Decimals) -> Result<Self, AmountError> {
        if self.decimals != expected {
            return Err(AmountError::DecimalsMismatch {
                expected: expected.get(),
                found: self.decimals.get(),
            });
        }
        Ok(self)
    }

    /// Orders two amounts of the same asset; amounts of different scale never compare.
    pub fn checked_cmp(&self, other: &FixedPointAmount) -> Result<Ordering, AmountError> {
        other.ensure_decimals(self.decimals)?;
        Ok(self.raw.cmp(&other.raw))
    }

    /// Shortest exact decimal rendering: `15`, `0.25`.
    pub fn to_decimal_string(&self) -> String {
        let full = self.full_string();
        if full.contains('.') {
            full.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            full
        }
    }

    /// Rendering truncated to `digits` fractional digits, for compact displays.
    pub fn to_fixed_string(&self, digits: usize) -> String {
        let full = self.full_string();
        let (whole, frac) = full.split_once('.').unwrap_or((full.as_str(), ""));
        if digits == 0 {
            return whole.to_string();
        }
        let mut frac: String = frac.chars().take(digits).collect();
        while frac.len() < digits {
            frac.push('0');
        }
        format!("{whole}.{frac}")
    }

    fn full_string(&self) -> String {
        format_units(self.raw, self.decimals.get() as u32)
            .unwrap_or_else(|_| self.raw.to_string())
    }
}

impl fmt::Display for FixedPointAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse__scales_whole_amount_by_decimals() {
        // when
        let native = FixedPointAmount::parse("10", Decimals::NATIVE).unwrap();
        let token = FixedPointAmount::parse("10", Decimals::REWARD_TOKEN).unwrap();

        // then
        assert_eq!(native.raw(), U256::from(10u64) * U256::exp10(18));
        assert_eq!(token.raw(), U256::from(10u64) * U256::exp10(12));
    }

    #[test]
    fn parse__accepts_fraction_without_leading_digit() {
        let amount = FixedPointAmount::parse(".5", Decimals::REWARD_TOKEN).unwrap();
        assert_eq!(amount.raw(), U256::from(500_000_000_000u64));
    }

    #[test]
    fn parse__rejects_negative_and_non_numeric_input() {
        assert_eq!(
            FixedPointAmount::parse("-1", Decimals::NATIVE),
            Err(AmountError::Negative("-1".to_string()))
        );
        for input in ["abc", "1.2.3", "1e18", "+5", ".", "1,000", "0x10"] {
            assert!(
                matches!(
                    FixedPointAmount::parse(input, Decimals::NATIVE),
                    Err(AmountError::NotNumeric(_))
                ),
                "{input} should be rejected"
            );
        }
        assert_eq!(
            FixedPointAmount::parse("   ", Decimals::NATIVE),
            Err(AmountError::Empty)
        );
    }

    #[test]
    fn parse__rejects_more_fraction_digits_than_asset_carries() {
        let result = FixedPointAmount::parse("0.0000000000001", Decimals::REWARD_TOKEN);
        assert!(matches!(result, Err(AmountError::TooPrecise { decimals: 12, .. })));
    }

    #[test]
    fn parse__rejects_amount_that_overflows_when_scaled() {
        // given
        let fits_unscaled = format!("1{}", "0".repeat(70));
        let too_long = "9".repeat(80);

        // when
        let scaled = FixedPointAmount::parse(&fits_unscaled, Decimals::NATIVE);
        let unscaled = FixedPointAmount::parse(&too_long, Decimals::NATIVE);

        // then
        assert_eq!(scaled, Err(AmountError::Overflow(fits_unscaled)));
        assert_eq!(unscaled, Err(AmountError::Overflow(too_long)));
    }

    #[test]
    fn parse__keeps_leading_zeros_of_the_fraction() {
        let amount = FixedPointAmount::parse("0.05", Decimals::REWARD_TOKEN).unwrap();
        assert_eq!(amount.raw(), U256::from(50_000_000_000u64));
    }

    #[test]
    fn checked_cmp__refuses_to_compare_different_scales() {
        // given
        let native = FixedPointAmount::from_whole(1, Decimals::NATIVE);
        let token = FixedPointAmount::from_whole(1, Decimals::REWARD_TOKEN);

        // when
        let result = native.checked_cmp(&token);

        // then
        assert_eq!(
            result,
            Err(AmountError::DecimalsMismatch {
                expected: 18,
                found: 12
            })
        );
    }

    #[test]
    fn to_decimal_string__trims_trailing_zeros() {
        let prize = FixedPointAmount::new(U256::from(15u64) * U256::exp10(18), Decimals::NATIVE);
        assert_eq!(prize.to_decimal_string(), "15");
        let quarter = FixedPointAmount::parse("0.25", Decimals::REWARD_TOKEN).unwrap();
        assert_eq!(quarter.to_string(), "0.25");
    }

    #[test]
    fn to_fixed_string__truncates_to_requested_digits() {
        let amount = FixedPointAmount::parse("1.23456", Decimals::NATIVE).unwrap();
        assert_eq!(amount.to_fixed_string(3), "1.234");
        let whole = FixedPointAmount::from_whole(7, Decimals::REWARD_TOKEN);
        assert_eq!(whole.to_fixed_string(3), "7.000");
    }

    fn decimals_strategy() -> impl Strategy<Value = Decimals> {
        prop_oneof![Just(Decimals::NATIVE), Just(Decimals::REWARD_TOKEN)]
    }

    proptest! {
        #[test]
        fn parse__round_trips_through_decimal_string(
            decimals in decimals_strategy(),
            whole in 0u64..1_000_000_000,
            frac in proptest::collection::vec(0u8..10, 0..12),
        ) {
            let frac: String = frac.iter().map(|d| char::from(b'0' + d)).collect();
            let input = if frac.is_empty() {
                whole.to_string()
            } else {
                format!("{whole}.{frac}")
            };

            let parsed = FixedPointAmount::parse(&input, decimals).unwrap();
            let reparsed = FixedPointAmount::parse(&parsed.to_decimal_string(), decimals).unwrap();

            prop_assert_eq!(parsed, reparsed);
            prop_assert_eq!(parsed.decimals(), decimals);
        }
    }
}
