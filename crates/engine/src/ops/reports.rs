use chrono::NaiveDate;

use crate::{
    EngineError, Interval, RatesByDate, Report, ResultEngine, aggregate,
    util::normalize_currency,
};

use super::Engine;

/// Parameters of a report query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRequest {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub interval: Interval,
    /// Base currency for conversions. `None` keeps the provider's base.
    pub currency: Option<String>,
}

impl Engine {
    /// Aggregated report of the expenses of `user_id`.
    pub async fn report(&self, user_id: &str, request: &ReportRequest) -> ResultEngine<Report> {
        if request.from > request.to {
            return Err(EngineError::InvalidInput(format!(
                "from ({}) must not be after to ({})",
                request.from, request.to
            )));
        }
        let currency = request
            .currency
            .as_deref()
            .map(normalize_currency)
            .transpose()?;

        let rows = self
            .expenses_with_categories(user_id, request.from, request.to)
            .await?;
        let mut rates = RatesByDate::new();
        for table in self.exchange_rates(request.from, request.to).await? {
            let table = match currency.as_deref() {
                Some(currency) => match table.change_base_currency(currency) {
                    Ok(rebased) => rebased,
                    Err(err) => {
                        tracing::warn!(date = %table.date, currency, "cannot rebase exchange rates: {err}");
                        continue;
                    }
                },
                None => table,
            };
            rates.insert(table.date, table);
        }

        tracing::debug!(
            user_id,
            rows = rows.len(),
            rate_days = rates.len(),
            interval = %request.interval,
            "building report"
        );
        aggregate(request.from, request.to, request.interval, rows, &rates)
    }
}
