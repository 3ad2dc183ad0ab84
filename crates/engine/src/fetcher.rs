//! Remote exchange-rate provider.
//!
//! The engine only needs "give me the table for this day"; [`RateFetcher`] is
//! that seam. [`HttpRateFetcher`] talks to an openexchangerates-style HTTP
//! API whose URL is a template with `{date}` and `{apikey}` placeholders.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{ExchangeRates, exchange_rates::DATE_FORMAT};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("exchange rate provider rejected the api key")]
    Unauthorized,
    #[error("{status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    Decode(String),
}

#[async_trait::async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<ExchangeRates, FetchError>;
}

#[derive(Clone, Debug)]
pub struct HttpRateFetcher {
    client: Client,
    url_template: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RatesBody {
    base: String,
    rates: BTreeMap<String, Decimal>,
}

impl HttpRateFetcher {
    pub fn new(client: Client, url_template: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url_template: url_template.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self, date: NaiveDate) -> String {
        self.url_template
            .replace("{date}", &date.format(DATE_FORMAT).to_string())
            .replace("{apikey}", &self.api_key)
    }
}

#[async_trait::async_trait]
impl RateFetcher for HttpRateFetcher {
    async fn fetch(&self, date: NaiveDate) -> Result<ExchangeRates, FetchError> {
        let resp = self.client.get(self.url(date)).send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status { status, body });
        }
        parse_rates(date, &body)
    }
}

fn parse_rates(date: NaiveDate, body: &str) -> Result<ExchangeRates, FetchError> {
    let parsed: RatesBody =
        serde_json::from_str(body).map_err(|err| FetchError::Decode(err.to_string()))?;
    ExchangeRates::new(date, &parsed.base, parsed.rates)
        .map_err(|err| FetchError::Decode(err.to_string()))
}
