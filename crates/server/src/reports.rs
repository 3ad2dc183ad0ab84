//! Report endpoint and the mapping of the aggregation tree.

use api_types::report::{
    CategoryExpensesView, DateExpensesView, ExpenseEntryView, ReportQuery, ReportTotalView,
    ReportView, TotalInfoView, TotalView,
};
use axum::{Extension, Json, extract::State};
use engine::{Interval, ReportRequest};

use crate::{
    ApiQuery, ServerError, categories::map_category, exchange_rates::map_rates,
    expenses::map_expense, server::AuthUser, server::ServerState,
};

fn map_total(total: &engine::Total) -> TotalView {
    TotalView {
        sum: total.sum,
        currency: total.currency.clone(),
    }
}

fn map_total_info(total: &engine::TotalInfo) -> TotalInfoView {
    TotalInfoView {
        original: map_total(&total.original),
        converted: total.converted().map(map_total),
        rate: total.rate().map(map_rates),
    }
}

fn map_report_total(total: &engine::ReportTotal) -> ReportTotalView {
    ReportTotalView {
        original: total.original.iter().map(map_total).collect(),
        converted: total.converted().map(map_total),
        rate: total.rate().map(map_rates),
    }
}

fn map_node(node: engine::CategoryExpenses) -> CategoryExpensesView {
    CategoryExpensesView {
        total: map_report_total(&node.total),
        category: map_category(node.category),
        expenses: node
            .expenses
            .into_iter()
            .map(|entry| ExpenseEntryView {
                total: map_total_info(&entry.total),
                expense: map_expense(entry.expense),
            })
            .collect(),
        sub_categories: node.sub_categories.into_iter().map(map_node).collect(),
    }
}

fn map_report(report: engine::Report) -> ReportView {
    ReportView {
        from: report.from,
        to: report.to,
        interval: report.interval.to_string(),
        total: map_report_total(&report.total),
        dates: report
            .dates
            .into_iter()
            .map(|date| DateExpensesView {
                date: date.date,
                total: map_report_total(&date.total),
                sub_categories: date.sub_categories.into_iter().map(map_node).collect(),
            })
            .collect(),
    }
}

pub async fn get(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<Json<ReportView>, ServerError> {
    let interval = query
        .interval
        .as_deref()
        .map(str::parse::<Interval>)
        .transpose()?
        .unwrap_or_default();
    let request = ReportRequest {
        from: query.from,
        to: query.to,
        interval,
        currency: query.currency,
    };
    let report = state.engine.report(&user.id, &request).await?;
    Ok(Json(map_report(report)))
}
