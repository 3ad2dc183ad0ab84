//! Decimal money aggregates.
//!
//! - [`Total`] is a sum in a single currency.
//! - [`TotalInfo`] is a per-expense total with its optional conversion into
//!   the base currency of an [`ExchangeRates`] row.
//! - [`GrandTotal`] buckets totals by currency.
//! - [`ReportTotal`] is what report nodes carry: a [`GrandTotal`] of
//!   original amounts plus the converted sum.
//!
//! Sums are exact (`rust_decimal`, 28 significant digits); nothing is
//! rounded until formatting.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::{EngineError, ExchangeRates, ResultEngine};

/// A decimal sum tagged with its currency.
///
/// ```rust
/// use engine::Total;
/// use rust_decimal::Decimal;
///
/// let a = Total::new(Decimal::new(1050, 2), "EUR");
/// let b = Total::new(Decimal::new(250, 2), "EUR");
/// assert_eq!(a.checked_add(&b).unwrap().sum, Decimal::new(1300, 2));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Total {
    pub sum: Decimal,
    pub currency: String,
}

impl Total {
    pub fn new(sum: Decimal, currency: impl Into<String>) -> Self {
        Self {
            sum,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.sum.is_zero()
    }

    /// Adds two totals of the same currency.
    ///
    /// A zero operand is a no-op whatever its currency, so the other side's
    /// currency is kept.
    pub fn checked_add(&self, other: &Total) -> ResultEngine<Total> {
        if other.is_zero() {
            return Ok(self.clone());
        }
        if self.is_zero() {
            return Ok(other.clone());
        }
        if self.currency != other.currency {
            return Err(EngineError::InvalidInput(format!(
                "cannot add {} to {}",
                other.currency, self.currency
            )));
        }
        let sum = self
            .sum
            .checked_add(other.sum)
            .ok_or_else(|| EngineError::InvalidInput("amount overflow".to_string()))?;
        Ok(Total::new(sum, self.currency.clone()))
    }
}

/// Conversion side of a total: the converted sum, the rate row it came
/// from, and whether incompatible bases were met along the way.
#[derive(Clone, Debug, Default, PartialEq)]
struct Conversion {
    converted: Option<Total>,
    rate: Option<ExchangeRates>,
    conflicting: bool,
}

impl Conversion {
    fn combine(&self, other: &Conversion) -> ResultEngine<Conversion> {
        if self.conflicting || other.conflicting {
            return Ok(Self::conflict());
        }
        match (&self.rate, &other.rate) {
            (None, None) => Ok(Conversion::default()),
            (Some(a), Some(b)) if a.base_currency != b.base_currency => Ok(Self::conflict()),
            (a, b) => {
                let converted = match (&self.converted, &other.converted) {
                    (Some(x), Some(y)) => Some(x.checked_add(y)?),
                    (Some(x), None) => Some(x.clone()),
                    (None, Some(y)) => Some(y.clone()),
                    (None, None) => None,
                };
                Ok(Conversion {
                    converted,
                    rate: a.clone().or_else(|| b.clone()),
                    conflicting: false,
                })
            }
        }
    }

    fn conflict() -> Self {
        Conversion {
            converted: None,
            rate: None,
            conflicting: true,
        }
    }
}

/// A total in the original currency plus its optional converted value.
#[derive(Clone, Debug, PartialEq)]
pub struct TotalInfo {
    pub original: Total,
    conversion: Conversion,
}

impl TotalInfo {
    /// Total without conversion.
    pub fn unconverted(original: Total) -> Self {
        Self {
            original,
            conversion: Conversion::default(),
        }
    }

    /// Builds the total of one expense, converting it with `rates` when the
    /// row knows the currency.
    pub fn with_rates(original: Total, rates: Option<&ExchangeRates>) -> Self {
        let Some(rates) = rates else {
            return Self::unconverted(original);
        };
        match rates.convert(&original) {
            Some(converted) => Self {
                original,
                conversion: Conversion {
                    converted: Some(converted),
                    rate: Some(rates.clone()),
                    conflicting: false,
                },
            },
            None => Self::unconverted(original),
        }
    }

    pub fn converted(&self) -> Option<&Total> {
        self.conversion.converted.as_ref()
    }

    pub fn rate(&self) -> Option<&ExchangeRates> {
        self.conversion.rate.as_ref()
    }

    /// Combines two totals.
    ///
    /// Originals must share a currency (or one must be zero). Rates with
    /// different bases null the conversion; otherwise present conversions
    /// are summed and the left rate is preferred.
    pub fn checked_add(&self, other: &TotalInfo) -> ResultEngine<TotalInfo> {
        Ok(TotalInfo {
            original: self.original.checked_add(&other.original)?,
            conversion: self.conversion.combine(&other.conversion)?,
        })
    }
}

/// Totals bucketed by currency.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrandTotal(BTreeMap<String, Total>);

impl GrandTotal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, total: &Total) -> ResultEngine<()> {
        let entry = self
            .0
            .entry(total.currency.clone())
            .or_insert_with(|| Total::zero(total.currency.clone()));
        *entry = entry.checked_add(total)?;
        Ok(())
    }

    pub fn merge(&mut self, other: &GrandTotal) -> ResultEngine<()> {
        for total in other.0.values() {
            self.add(total)?;
        }
        Ok(())
    }

    pub fn get(&self, currency: &str) -> Option<&Total> {
        self.0.get(currency)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Total> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Aggregate carried by report nodes.
///
/// Originals of different currencies cannot be added into one [`Total`], so
/// they are bucketed; the converted side follows the [`TotalInfo`] rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReportTotal {
    pub original: GrandTotal,
    conversion: Conversion,
}

impl ReportTotal {
    pub fn converted(&self) -> Option<&Total> {
        self.conversion.converted.as_ref()
    }

    pub fn rate(&self) -> Option<&ExchangeRates> {
        self.conversion.rate.as_ref()
    }

    pub fn add_info(&mut self, info: &TotalInfo) -> ResultEngine<()> {
        self.original.add(&info.original)?;
        self.conversion = self.conversion.combine(&info.conversion)?;
        Ok(())
    }

    pub fn merge(&mut self, other: &ReportTotal) -> ResultEngine<()> {
        self.original.merge(&other.original)?;
        self.conversion = self.conversion.combine(&other.conversion)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn rates(base: &str, pairs: &[(&str, &str)]) -> ExchangeRates {
        let rates: BTreeMap<String, Decimal> = pairs
            .iter()
            .map(|(c, r)| (c.to_string(), dec(r)))
            .collect();
        ExchangeRates::new(NaiveDate::from_ymd_opt(2021, 7, 10).unwrap(), base, rates).unwrap()
    }

    #[test]
    fn total_add_requires_same_currency() {
        let eur = Total::new(dec("1"), "EUR");
        let usd = Total::new(dec("1"), "USD");
        assert!(eur.checked_add(&usd).is_err());
        assert_eq!(eur.checked_add(&eur).unwrap(), Total::new(dec("2"), "EUR"));
    }

    #[test]
    fn adding_zero_keeps_currency() {
        let eur = Total::new(dec("3.5"), "EUR");
        assert_eq!(eur.checked_add(&Total::zero("USD")).unwrap(), eur);
        assert_eq!(Total::zero("USD").checked_add(&eur).unwrap(), eur);
    }

    #[test]
    fn sums_stay_exact() {
        let mut total = Total::zero("EUR");
        for _ in 0..10 {
            total = total.checked_add(&Total::new(dec("0.1"), "EUR")).unwrap();
        }
        assert_eq!(total.sum, dec("1.0"));
    }

    #[test]
    fn expense_total_is_converted_into_base() {
        let r = rates("USD", &[("EUR", "2.0")]);
        let info = TotalInfo::with_rates(Total::new(dec("50"), "EUR"), Some(&r));
        assert_eq!(info.converted(), Some(&Total::new(dec("25"), "USD")));
        assert_eq!(info.rate().map(|r| r.base_currency.as_str()), Some("USD"));
    }

    #[test]
    fn base_currency_expense_converts_to_itself() {
        let r = rates("USD", &[("EUR", "2.0")]);
        let info = TotalInfo::with_rates(Total::new(dec("7"), "USD"), Some(&r));
        assert_eq!(info.converted(), Some(&Total::new(dec("7"), "USD")));
    }

    #[test]
    fn unknown_currency_is_not_converted() {
        let r = rates("USD", &[("EUR", "2.0")]);
        let info = TotalInfo::with_rates(Total::new(dec("7"), "GBP"), Some(&r));
        assert!(info.converted().is_none());
        assert!(info.rate().is_none());
    }

    #[test]
    fn combine_with_different_bases_drops_conversion() {
        let usd = rates("USD", &[("EUR", "2.0")]);
        let chf = rates("CHF", &[("EUR", "1.1")]);
        let a = TotalInfo::with_rates(Total::new(dec("10"), "EUR"), Some(&usd));
        let b = TotalInfo::with_rates(Total::new(dec("11"), "EUR"), Some(&chf));
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.original, Total::new(dec("21"), "EUR"));
        assert!(sum.converted().is_none());
        assert!(sum.rate().is_none());

        // Stays unconverted even when a compatible total is added later.
        let c = TotalInfo::with_rates(Total::new(dec("2"), "EUR"), Some(&usd));
        assert!(sum.checked_add(&c).unwrap().converted().is_none());
    }

    #[test]
    fn combine_sums_present_conversions() {
        let usd = rates("USD", &[("EUR", "2.0")]);
        let a = TotalInfo::with_rates(Total::new(dec("10"), "EUR"), Some(&usd));
        let b = TotalInfo::unconverted(Total::new(dec("4"), "EUR"));
        let sum = a.checked_add(&b).unwrap();
        assert_eq!(sum.original, Total::new(dec("14"), "EUR"));
        assert_eq!(sum.converted(), Some(&Total::new(dec("5"), "USD")));

        let none = TotalInfo::unconverted(Total::new(dec("1"), "EUR"))
            .checked_add(&TotalInfo::unconverted(Total::new(dec("1"), "EUR")))
            .unwrap();
        assert!(none.converted().is_none());
    }

    #[test]
    fn combine_is_associative_for_compatible_rates() {
        let usd = rates("USD", &[("EUR", "2.0"), ("GBP", "0.8")]);
        let a = TotalInfo::with_rates(Total::new(dec("10"), "EUR"), Some(&usd));
        let b = TotalInfo::with_rates(Total::new(dec("3"), "EUR"), Some(&usd));
        let c = TotalInfo::unconverted(Total::new(dec("7.25"), "EUR"));

        let left = a.checked_add(&b).unwrap().checked_add(&c).unwrap();
        let right = a.checked_add(&b.checked_add(&c).unwrap()).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn grand_total_buckets_by_currency() {
        let mut grand = GrandTotal::new();
        grand.add(&Total::new(dec("1"), "EUR")).unwrap();
        grand.add(&Total::new(dec("2"), "USD")).unwrap();
        grand.add(&Total::new(dec("3"), "EUR")).unwrap();
        assert_eq!(grand.len(), 2);
        assert_eq!(grand.get("EUR"), Some(&Total::new(dec("4"), "EUR")));
        assert_eq!(grand.get("USD"), Some(&Total::new(dec("2"), "USD")));
    }

    #[test]
    fn report_total_mixes_currencies_with_one_base() {
        let usd = rates("USD", &[("EUR", "2.0")]);
        let mut total = ReportTotal::default();
        total
            .add_info(&TotalInfo::with_rates(Total::new(dec("10"), "EUR"), Some(&usd)))
            .unwrap();
        total
            .add_info(&TotalInfo::with_rates(Total::new(dec("3"), "USD"), Some(&usd)))
            .unwrap();
        assert_eq!(total.original.len(), 2);
        assert_eq!(total.converted(), Some(&Total::new(dec("8"), "USD")));
    }
}
