//! Expenses API endpoints.

use api_types::expense::{ExpenseCreated, ExpenseListQuery, ExpenseNew, ExpenseView};
use axum::{Extension, Json, extract::State, http::StatusCode};
use engine::NewExpense;

use crate::{ApiJson, ApiQuery, ServerError, server::AuthUser, server::ServerState};

pub(crate) fn map_expense(expense: engine::Expense) -> ExpenseView {
    ExpenseView {
        id: expense.id,
        category_id: expense.category_id,
        price: expense.price,
        currency: expense.currency,
        quantity: expense.quantity,
        comment: expense.comment,
        trip: expense.trip,
        date: expense.date,
        created_at: expense.created_at,
        created_by: expense.created_by,
    }
}

pub async fn create(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<ExpenseNew>,
) -> Result<(StatusCode, Json<ExpenseCreated>), ServerError> {
    let expense = state
        .engine
        .create_expense(
            NewExpense {
                category_id: payload.category_id,
                price: payload.price,
                currency: payload.currency,
                quantity: payload.quantity,
                comment: payload.comment,
                trip: payload.trip,
                date: payload.date,
            },
            &user.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ExpenseCreated { id: expense.id })))
}

pub async fn list(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<ExpenseListQuery>,
) -> Result<Json<Vec<ExpenseView>>, ServerError> {
    let expenses = state
        .engine
        .list_expenses(&user.id, query.from, query.to)
        .await?
        .into_iter()
        .map(map_expense)
        .collect();
    Ok(Json(expenses))
}
