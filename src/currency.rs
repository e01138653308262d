//! Currency display for listing prices.
//!
//! Amounts are always carried as `i64` minor units (cents). Conversion goes
//! through a table of rates relative to a single base currency: prices given
//! in another currency are converted to the base before they are stored, and
//! stored prices are converted again when a display currency is requested.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurrencyError {
    #[error("Unknown currency {0}")]
    UnknownCurrency(String),

    #[error("No exchange rate for {0}")]
    MissingRate(Currency),

    #[error("Invalid exchange rate entry {0:?}")]
    InvalidRate(String),

    #[error("Amount is empty")]
    EmptyAmount,

    #[error("Amount must not be negative")]
    NegativeAmount,

    #[error("Invalid amount {0:?}")]
    InvalidAmount(String),

    #[error("Amount is more precise than {0} allows")]
    TooPrecise(Currency),

    #[error("Amount out of range")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Cad,
        Currency::Aud,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Cad => "CA$",
            Currency::Aud => "A$",
        }
    }

    /// Number of decimal places in one major unit.
    pub fn exponent(&self) -> u32 {
        2
    }

    fn minor_per_major(&self) -> i64 {
        10_i64.pow(self.exponent())
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| CurrencyError::UnknownCurrency(code.to_string()))
    }
}

/// Units of each currency per one unit of `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRates {
    base: Currency,
    rates: HashMap<Currency, f64>,
}

impl ExchangeRates {
    pub fn new(base: Currency) -> Self {
        let mut rates = HashMap::new();
        rates.insert(base, 1.0);
        Self { base, rates }
    }

    /// Built-in USD-relative table, rebased onto `base`.
    pub fn default_for(base: Currency) -> Self {
        let usd = [
            (Currency::Usd, 1.0),
            (Currency::Eur, 0.92),
            (Currency::Gbp, 0.79),
            (Currency::Cad, 1.36),
            (Currency::Aud, 1.52),
        ];
        let base_per_usd = usd
            .iter()
            .find(|(c, _)| *c == base)
            .map(|(_, r)| *r)
            .unwrap_or(1.0);

        let mut table = Self::new(base);
        for (currency, rate) in usd {
            if currency != base {
                table.rates.insert(currency, rate / base_per_usd);
            }
        }
        table
    }

    /// Parse `EUR=0.92,GBP=0.79` on top of the built-in table.
    pub fn parse(base: Currency, spec: &str) -> Result<Self, CurrencyError> {
        let mut table = Self::default_for(base);
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (code, rate) = entry
                .split_once('=')
                .ok_or_else(|| CurrencyError::InvalidRate(entry.to_string()))?;
            let currency = code.parse::<Currency>()?;
            let rate = rate
                .trim()
                .parse::<f64>()
                .map_err(|_| CurrencyError::InvalidRate(entry.to_string()))?;
            table.set_rate(currency, rate)?;
        }
        Ok(table)
    }

    pub fn base(&self) -> Currency {
        self.base
    }

    pub fn set_rate(&mut self, currency: Currency, rate: f64) -> Result<(), CurrencyError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CurrencyError::InvalidRate(format!("{currency}={rate}")));
        }
        if currency == self.base && rate != 1.0 {
            return Err(CurrencyError::InvalidRate(format!(
                "{currency}={rate} (base rate is fixed at 1)"
            )));
        }
        self.rates.insert(currency, rate);
        Ok(())
    }

    pub fn rate(&self, currency: Currency) -> Result<f64, CurrencyError> {
        self.rates
            .get(&currency)
            .copied()
            .ok_or(CurrencyError::MissingRate(currency))
    }

    /// Convert minor units, rounding half away from zero.
    pub fn convert(&self, amount: i64, from: Currency, to: Currency) -> Result<i64, CurrencyError> {
        if from == to {
            return Ok(amount);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;

        let scale = to.minor_per_major() as f64 / from.minor_per_major() as f64;
        let converted = (amount as f64 / from_rate * to_rate * scale).round();
        if !converted.is_finite() || converted.abs() >= i64::MAX as f64 {
            return Err(CurrencyError::Overflow);
        }
        Ok(converted as i64)
    }

    /// Convert and format in one step.
    pub fn display(
        &self,
        amount: i64,
        from: Currency,
        to: Currency,
    ) -> Result<PriceDisplay, CurrencyError> {
        let converted = self.convert(amount, from, to)?;
        Ok(PriceDisplay::new(converted, to))
    }
}

impl Default for ExchangeRates {
    fn default() -> Self {
        Self::default_for(Currency::Usd)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceDisplay {
    pub amount: i64,
    pub currency: Currency,
    pub formatted: String,
    pub compact: String,
}

impl PriceDisplay {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self {
            amount,
            currency,
            formatted: format_amount(amount, currency),
            compact: format_compact(amount, currency),
        }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `$1,250,000.00`, `-€5.00`.
pub fn format_amount(amount: i64, currency: Currency) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let per_major = currency.minor_per_major() as u64;
    let major = abs / per_major;
    let minor = abs % per_major;
    format!(
        "{sign}{}{}.{:0width$}",
        currency.symbol(),
        group_thousands(major),
        minor,
        width = currency.exponent() as usize
    )
}

const COMPACT_UNITS: [(u64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];

/// Short form used on cards: `$1.3M`, `€950K`, `$999`.
pub fn format_compact(amount: i64, currency: Currency) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let per_major = currency.minor_per_major() as u64;
    let major = (amount.unsigned_abs() + per_major / 2) / per_major;

    let Some(mut idx) = COMPACT_UNITS.iter().position(|(div, _)| major >= *div) else {
        return format!("{sign}{}{}", currency.symbol(), major);
    };

    let tenths_in = |idx: usize| {
        let div = COMPACT_UNITS[idx].0 as u128;
        ((major as u128 * 10 + div / 2) / div) as u64
    };
    let mut tenths = tenths_in(idx);
    // 999_999 rounds to 1000.0K; promote it to 1M.
    if tenths >= 10_000 && idx > 0 {
        idx -= 1;
        tenths = tenths_in(idx);
    }

    let number = if tenths % 10 == 0 {
        (tenths / 10).to_string()
    } else {
        format!("{}.{}", tenths / 10, tenths % 10)
    };
    format!("{sign}{}{number}{}", currency.symbol(), COMPACT_UNITS[idx].1)
}

/// Parse user input such as `$1,250,000`, `1.25M` or `950k` into minor units.
pub fn parse_amount(input: &str, currency: Currency) -> Result<i64, CurrencyError> {
    let mut text = input.trim();
    if text.is_empty() {
        return Err(CurrencyError::EmptyAmount);
    }

    if let Some(rest) = text.strip_prefix('-') {
        if !rest.trim().is_empty() {
            return Err(CurrencyError::NegativeAmount);
        }
        return Err(CurrencyError::InvalidAmount(input.to_string()));
    }

    let code = currency.code();
    let split_back = text.len().saturating_sub(code.len());
    if text.get(..code.len()).is_some_and(|p| p.eq_ignore_ascii_case(code)) {
        text = text[code.len()..].trim_start();
    } else if text.get(split_back..).is_some_and(|s| s.eq_ignore_ascii_case(code)) {
        text = text[..split_back].trim_end();
    }
    text = text.strip_prefix(currency.symbol()).unwrap_or(text).trim();
    if text.starts_with('-') {
        return Err(CurrencyError::NegativeAmount);
    }

    let (number, multiplier): (&str, u64) = match text.chars().last() {
        Some('k' | 'K') => (&text[..text.len() - 1], 1_000),
        Some('m' | 'M') => (&text[..text.len() - 1], 1_000_000),
        Some('b' | 'B') => (&text[..text.len() - 1], 1_000_000_000),
        _ => (text, 1),
    };
    let number: String = number.trim().chars().filter(|c| *c != ',').collect();

    let (whole, fraction) = match number.split_once('.') {
        Some((w, f)) => (w, f),
        None => (number.as_str(), ""),
    };
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !all_digits(whole) || !all_digits(fraction) {
        return Err(CurrencyError::InvalidAmount(input.to_string()));
    }

    let overflow = || CurrencyError::Overflow;
    let scale = currency.minor_per_major() as u128 * multiplier as u128;
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let mut minor = whole_value.checked_mul(scale).ok_or_else(overflow)?;

    if !fraction.is_empty() {
        if fraction.len() > 30 {
            return Err(CurrencyError::TooPrecise(currency));
        }
        let frac_value: u128 = fraction.parse().map_err(|_| overflow())?;
        let denominator = 10_u128.pow(fraction.len() as u32);
        let scaled = frac_value.checked_mul(scale).ok_or_else(overflow)?;
        if scaled % denominator != 0 {
            return Err(CurrencyError::TooPrecise(currency));
        }
        minor = minor.checked_add(scaled / denominator).ok_or_else(overflow)?;
    }

    i64::try_from(minor).map_err(|_| overflow())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_codes_parse_case_insensitively() {
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!(" GBP ".parse::<Currency>().unwrap(), Currency::Gbp);
        assert_eq!(
            "XYZ".parse::<Currency>(),
            Err(CurrencyError::UnknownCurrency("XYZ".into()))
        );
    }

    #[test]
    fn formats_full_amounts_with_grouping() {
        assert_eq!(format_amount(125_000_000, Currency::Usd), "$1,250,000.00");
        assert_eq!(format_amount(-500, Currency::Eur), "-€5.00");
        assert_eq!(format_amount(7, Currency::Gbp), "£0.07");
        assert_eq!(format_amount(99_999, Currency::Cad), "CA$999.99");
    }

    #[test]
    fn formats_compact_amounts() {
        assert_eq!(format_compact(125_000_000, Currency::Usd), "$1.3M");
        assert_eq!(format_compact(95_000_000, Currency::Eur), "€950K");
        assert_eq!(format_compact(99_900, Currency::Usd), "$999");
        assert_eq!(format_compact(99_999_900, Currency::Usd), "$1M");
        assert_eq!(format_compact(250_000_000_000, Currency::Aud), "A$2.5B");
        assert_eq!(format_compact(-200_000, Currency::Usd), "-$2K");
    }

    #[test]
    fn parses_user_input() {
        assert_eq!(parse_amount("$1,250,000", Currency::Usd), Ok(125_000_000));
        assert_eq!(parse_amount("1.25M", Currency::Usd), Ok(125_000_000));
        assert_eq!(parse_amount("950k", Currency::Eur), Ok(95_000_000));
        assert_eq!(parse_amount("USD 12.5", Currency::Usd), Ok(1_250));
        assert_eq!(parse_amount("12.50 usd", Currency::Usd), Ok(1_250));
        assert_eq!(parse_amount(".5", Currency::Usd), Ok(50));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_amount("  ", Currency::Usd), Err(CurrencyError::EmptyAmount));
        assert_eq!(parse_amount("-5", Currency::Usd), Err(CurrencyError::NegativeAmount));
        assert_eq!(
            parse_amount("1.234", Currency::Usd),
            Err(CurrencyError::TooPrecise(Currency::Usd))
        );
        assert!(matches!(
            parse_amount("12abc", Currency::Usd),
            Err(CurrencyError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_amount(".", Currency::Usd),
            Err(CurrencyError::InvalidAmount(_))
        ));
        assert_eq!(
            parse_amount("99999999999999999999", Currency::Usd),
            Err(CurrencyError::Overflow)
        );
    }

    #[test]
    fn converts_through_the_base_currency() {
        let rates = ExchangeRates::default();
        assert_eq!(rates.convert(10_000, Currency::Usd, Currency::Eur), Ok(9_200));
        assert_eq!(rates.convert(9_200, Currency::Eur, Currency::Usd), Ok(10_000));
        assert_eq!(rates.convert(123, Currency::Gbp, Currency::Gbp), Ok(123));
    }

    #[test]
    fn rebased_table_keeps_cross_rates() {
        let rates = ExchangeRates::default_for(Currency::Eur);
        assert_eq!(rates.base(), Currency::Eur);
        assert_eq!(rates.rate(Currency::Eur), Ok(1.0));
        assert_eq!(rates.convert(9_200, Currency::Eur, Currency::Usd), Ok(10_000));
    }

    #[test]
    fn parses_rate_overrides() {
        let rates = ExchangeRates::parse(Currency::Usd, "EUR=0.5, GBP=0.25").unwrap();
        assert_eq!(rates.convert(1_000, Currency::Usd, Currency::Eur), Ok(500));
        assert_eq!(rates.convert(1_000, Currency::Usd, Currency::Gbp), Ok(250));
        assert!(matches!(
            ExchangeRates::parse(Currency::Usd, "EUR"),
            Err(CurrencyError::InvalidRate(_))
        ));
        assert!(matches!(
            ExchangeRates::parse(Currency::Usd, "EUR=-1"),
            Err(CurrencyError::InvalidRate(_))
        ));
    }

    #[test]
    fn missing_rate_is_reported() {
        let rates = ExchangeRates::new(Currency::Usd);
        assert_eq!(
            rates.convert(100, Currency::Usd, Currency::Aud),
            Err(CurrencyError::MissingRate(Currency::Aud))
        );
    }

    #[test]
    fn display_carries_both_forms() {
        let rates = ExchangeRates::default();
        let display = rates.display(125_000_000, Currency::Usd, Currency::Usd).unwrap();
        assert_eq!(display.formatted, "$1,250,000.00");
        assert_eq!(display.compact, "$1.3M");
    }
}
