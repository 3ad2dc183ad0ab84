use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{QueryFilter, QueryOrder, prelude::*, sea_query::OnConflict};

use crate::{
    EngineError, ExchangeRates, FetchError, ResultEngine,
    exchange_rates::{self, DATE_FORMAT},
};

use super::Engine;

/// Days of `[from, to]` not after `today` and absent from `stored`.
fn missing_days(
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
    stored: &BTreeMap<NaiveDate, ExchangeRates>,
) -> Vec<NaiveDate> {
    from.iter_days()
        .take_while(|day| *day <= to && *day <= today)
        .filter(|day| !stored.contains_key(day))
        .collect()
}

impl Engine {
    /// Rate tables covering `[from, to]`, ascending by date.
    ///
    /// Stored days are served from the database. Days up to today without
    /// a row are fetched from the remote provider (one request per day) and
    /// upserted. If any fetch fails the stored rows are returned alone,
    /// except for a rejected api key which is an error. Without a provider
    /// only stored rows are returned.
    pub async fn exchange_rates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Vec<ExchangeRates>> {
        if from > to {
            return Err(EngineError::InvalidInput(format!(
                "from ({from}) must not be after to ({to})"
            )));
        }

        let mut stored = self.stored_exchange_rates(from, to).await?;
        let missing = missing_days(from, to, Utc::now().date_naive(), &stored);
        tracing::debug!(%from, %to, stored = stored.len(), missing = missing.len(), "exchange rates lookup");

        let Some(fetcher) = &self.fetcher else {
            return Ok(stored.into_values().collect());
        };
        if missing.is_empty() {
            return Ok(stored.into_values().collect());
        }

        let mut fetched = Vec::with_capacity(missing.len());
        for day in missing {
            match fetcher.fetch(day).await {
                Ok(rates) => fetched.push(rates),
                Err(FetchError::Unauthorized) => {
                    return Err(EngineError::Fetch(FetchError::Unauthorized.to_string()));
                }
                Err(err) => {
                    tracing::warn!(%day, "exchange rate fetch failed, using stored rates: {err}");
                    return Ok(stored.into_values().collect());
                }
            }
        }

        for rates in fetched {
            self.upsert_exchange_rates(&rates).await?;
            stored.insert(rates.date, rates);
        }
        Ok(stored.into_values().collect())
    }

    async fn stored_exchange_rates(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<BTreeMap<NaiveDate, ExchangeRates>> {
        let models = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::Date.gte(from.format(DATE_FORMAT).to_string()))
            .filter(exchange_rates::Column::Date.lte(to.format(DATE_FORMAT).to_string()))
            .order_by_asc(exchange_rates::Column::Date)
            .all(&self.database)
            .await?;
        models
            .into_iter()
            .map(|model| ExchangeRates::try_from(model).map(|rates| (rates.date, rates)))
            .collect()
    }

    /// Insert or replace the table of `rates.date`. Last writer wins.
    pub async fn upsert_exchange_rates(&self, rates: &ExchangeRates) -> ResultEngine<()> {
        let model = exchange_rates::ActiveModel::try_from(rates)?;
        exchange_rates::Entity::insert(model)
            .on_conflict(
                OnConflict::column(exchange_rates::Column::Date)
                    .update_columns([
                        exchange_rates::Column::BaseCurrency,
                        exchange_rates::Column::Rates,
                        exchange_rates::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.database)
            .await?;
        tracing::info!(date = %rates.date, base = %rates.base_currency, "exchange rates stored");
        Ok(())
    }
}
