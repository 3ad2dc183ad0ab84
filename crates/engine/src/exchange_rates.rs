//! Daily exchange-rate tables.
//!
//! A row holds, for one calendar day, how many units of each target
//! currency one unit of `base_currency` buys ("1 base = rate target").
//! The base itself is implicit (rate 1) and never stored.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{EngineError, ResultEngine, Total, util::normalize_currency};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeRates {
    pub date: NaiveDate,
    pub base_currency: String,
    pub rates: BTreeMap<String, Decimal>,
}

impl ExchangeRates {
    /// Validates and normalizes a rate table.
    ///
    /// Currency codes are upper-cased; an entry for the base currency is
    /// dropped since it is implicit.
    pub fn new(
        date: NaiveDate,
        base_currency: &str,
        rates: BTreeMap<String, Decimal>,
    ) -> ResultEngine<Self> {
        let base_currency = normalize_currency(base_currency)?;
        let mut normalized = BTreeMap::new();
        for (currency, rate) in rates {
            let currency = normalize_currency(&currency)?;
            if currency == base_currency {
                continue;
            }
            if rate <= Decimal::ZERO {
                return Err(EngineError::InvalidInput(format!(
                    "rate for {currency} must be > 0"
                )));
            }
            normalized.insert(currency, rate);
        }
        if normalized.is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "exchange rates for {date} are empty"
            )));
        }

        Ok(Self {
            date,
            base_currency,
            rates: normalized,
        })
    }

    /// Rate of `currency` against the base; the base itself is 1.
    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        if currency == self.base_currency {
            return Some(Decimal::ONE);
        }
        self.rates.get(currency).copied()
    }

    /// Converts `total` into the base currency.
    pub fn convert(&self, total: &Total) -> Option<Total> {
        if total.currency == self.base_currency {
            return Some(total.clone());
        }
        let rate = self.rates.get(&total.currency)?;
        let sum = total.sum.checked_div(*rate)?;
        Some(Total::new(sum, self.base_currency.clone()))
    }

    /// Re-expresses the table against `target`.
    ///
    /// With `r = rates[target]`, every other rate becomes `rate / r` and the
    /// old base becomes `1 / r`.
    pub fn change_base_currency(&self, target: &str) -> ResultEngine<ExchangeRates> {
        let target = normalize_currency(target)?;
        if target == self.base_currency {
            return Ok(self.clone());
        }
        let pivot = self.rates.get(&target).copied().ok_or_else(|| {
            EngineError::InvalidInput(format!(
                "no {target} rate on {} to re-base from {}",
                self.date, self.base_currency
            ))
        })?;

        let overflow = || EngineError::InvalidInput("rate overflow".to_string());
        let mut rates = BTreeMap::new();
        for (currency, rate) in &self.rates {
            if *currency == target {
                continue;
            }
            rates.insert(currency.clone(), rate.checked_div(pivot).ok_or_else(overflow)?);
        }
        rates.insert(
            self.base_currency.clone(),
            Decimal::ONE.checked_div(pivot).ok_or_else(overflow)?,
        );

        Ok(ExchangeRates {
            date: self.date,
            base_currency: target,
            rates,
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "exchange_rates")]
pub struct Model {
    /// `YYYY-MM-DD`
    #[sea_orm(primary_key, auto_increment = false)]
    pub date: String,
    pub base_currency: String,
    /// JSON object `{ "EUR": "0.84", ... }`.
    pub rates: String,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&ExchangeRates> for ActiveModel {
    type Error = EngineError;

    fn try_from(rates: &ExchangeRates) -> Result<Self, Self::Error> {
        let encoded: BTreeMap<&String, String> = rates
            .rates
            .iter()
            .map(|(currency, rate)| (currency, rate.normalize().to_string()))
            .collect();
        let encoded = serde_json::to_string(&encoded)
            .map_err(|err| EngineError::Unknown(format!("encode rates: {err}")))?;
        Ok(Self {
            date: ActiveValue::Set(rates.date.format(DATE_FORMAT).to_string()),
            base_currency: ActiveValue::Set(rates.base_currency.clone()),
            rates: ActiveValue::Set(encoded),
            updated_at: ActiveValue::Set(Utc::now()),
        })
    }
}

impl TryFrom<Model> for ExchangeRates {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(&model.date, DATE_FORMAT)
            .map_err(|_| EngineError::Unknown(format!("invalid stored date {}", model.date)))?;
        let rates: BTreeMap<String, Decimal> = serde_json::from_str(&model.rates)
            .map_err(|err| EngineError::Unknown(format!("invalid stored rates: {err}")))?;
        ExchangeRates::new(date, &model.base_currency, rates)
    }
}
