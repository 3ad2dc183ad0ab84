use api_types::exchange_rates::{RatesQuery, RatesView};
use axum::{Json, extract::State};

use crate::{ApiQuery, ServerError, server::ServerState};

pub(crate) fn map_rates(rates: &engine::ExchangeRates) -> RatesView {
    RatesView {
        date: rates.date,
        base_currency: rates.base_currency.clone(),
        rates: rates.rates.clone(),
    }
}

pub async fn list(
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<RatesQuery>,
) -> Result<Json<Vec<RatesView>>, ServerError> {
    let rates = state.engine.exchange_rates(query.from, query.to).await?;
    Ok(Json(rates.iter().map(map_rates).collect()))
}
