use std::collections::{BTreeSet, HashMap};

use chrono::{Days, NaiveDate};
use sea_orm::{ActiveModelTrait, QueryFilter, QueryOrder, prelude::*};

use crate::{
    Category, EngineError, Expense, ExpenseWithCategories, FieldError, NewExpense, ResultEngine,
    categories, expenses,
};

use super::Engine;

/// `[from 00:00, to + 1 day 00:00)` in UTC.
fn day_bounds(from: NaiveDate, to: NaiveDate) -> ResultEngine<(DateTimeUtc, DateTimeUtc)> {
    if from > to {
        return Err(EngineError::InvalidInput(format!(
            "from ({from}) must not be after to ({to})"
        )));
    }
    let end = to
        .checked_add_days(Days::new(1))
        .ok_or_else(|| EngineError::InvalidInput(format!("date out of range: {to}")))?;
    Ok((
        from.and_time(chrono::NaiveTime::MIN).and_utc(),
        end.and_time(chrono::NaiveTime::MIN).and_utc(),
    ))
}

impl Engine {
    /// Records an expense for `user_id`. The category must exist.
    pub async fn create_expense(&self, input: NewExpense, user_id: &str) -> ResultEngine<Expense> {
        let expense = Expense::new(input, user_id)?;

        let category = categories::Entity::find_by_id(expense.category_id.as_str())
            .one(&self.database)
            .await?;
        if category.is_none() {
            return Err(EngineError::InvalidFields(vec![FieldError::new(
                "category_id",
                format!("category {} not found", expense.category_id),
            )]));
        }

        expenses::ActiveModel::from(&expense)
            .insert(&self.database)
            .await?;
        tracing::info!(expense_id = %expense.id, category_id = %expense.category_id, "expense created");
        Ok(expense)
    }

    /// Expenses of `user_id` dated within `[from, to]`, newest first.
    pub async fn list_expenses(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Vec<Expense>> {
        let (start, end) = day_bounds(from, to)?;
        expenses::Entity::find()
            .filter(expenses::Column::CreatedBy.eq(user_id))
            .filter(expenses::Column::Date.gte(start))
            .filter(expenses::Column::Date.lt(end))
            .order_by_desc(expenses::Column::Date)
            .order_by_desc(expenses::Column::CreatedAt)
            .order_by_asc(expenses::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Expense::try_from)
            .collect()
    }

    /// Expenses in range joined with their category and ancestor chain.
    ///
    /// Two passes over the categories: the distinct expense categories
    /// first, then every ancestor named by their paths. Missing categories
    /// are left out; the aggregation drops the affected rows.
    pub async fn expenses_with_categories(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Vec<ExpenseWithCategories>> {
        let expenses = self.list_expenses(user_id, from, to).await?;
        if expenses.is_empty() {
            return Ok(Vec::new());
        }

        let category_ids: Vec<String> = expenses
            .iter()
            .map(|e| e.category_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut by_id: HashMap<String, Category> = self
            .categories_by_ids(&category_ids)
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let ancestor_ids: Vec<String> = by_id
            .values()
            .flat_map(|c| c.ancestor_ids())
            .filter(|id| !by_id.contains_key(*id))
            .map(ToString::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        for ancestor in self.categories_by_ids(&ancestor_ids).await? {
            by_id.insert(ancestor.id.clone(), ancestor);
        }
        tracing::debug!(
            expenses = expenses.len(),
            categories = by_id.len(),
            "joined expenses with categories"
        );

        let mut rows = Vec::with_capacity(expenses.len());
        for expense in expenses {
            let Some(category) = by_id.get(&expense.category_id).cloned() else {
                continue;
            };
            let ancestors = category
                .ancestor_ids()
                .into_iter()
                .filter_map(|id| by_id.get(id).cloned())
                .collect();
            rows.push(ExpenseWithCategories {
                expense,
                category,
                ancestors,
            });
        }
        Ok(rows)
    }
}
