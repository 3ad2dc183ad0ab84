//! Expense primitives.
//!
//! An `Expense` is one spending record attached to a leaf category. Its
//! amount is `price × quantity` in `currency`.

use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{
    Category, EngineError, FieldError, ResultEngine, Total,
    util::{new_id, normalize_currency, normalize_optional_text},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expense {
    pub id: String,
    pub category_id: String,
    pub price: Decimal,
    pub currency: String,
    pub quantity: Decimal,
    pub comment: Option<String>,
    pub trip: Option<String>,
    /// Midnight UTC of the spending day.
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl Expense {
    /// Validates `input` and builds a new expense owned by `user_id`.
    ///
    /// Every invalid field is reported, not just the first one.
    pub fn new(input: NewExpense, user_id: &str) -> ResultEngine<Self> {
        let mut errors = Vec::new();

        let category_id = input.category_id.trim().to_string();
        if category_id.is_empty() {
            errors.push(FieldError::new("category_id", "must not be empty"));
        }
        if input.price <= Decimal::ZERO {
            errors.push(FieldError::new("price", "must be > 0"));
        }
        if input.quantity <= Decimal::ZERO {
            errors.push(FieldError::new("quantity", "must be > 0"));
        }
        let currency = match normalize_currency(&input.currency) {
            Ok(currency) => Some(currency),
            Err(EngineError::InvalidInput(message)) => {
                errors.push(FieldError::new("currency", message));
                None
            }
            Err(err) => return Err(err),
        };
        if input.price.checked_mul(input.quantity).is_none() {
            errors.push(FieldError::new("price", "price × quantity overflows"));
        }

        let Some(currency) = currency.filter(|_| errors.is_empty()) else {
            return Err(EngineError::InvalidFields(errors));
        };

        Ok(Self {
            id: new_id(),
            category_id,
            price: input.price,
            currency,
            quantity: input.quantity,
            comment: normalize_optional_text(input.comment.as_deref()),
            trip: normalize_optional_text(input.trip.as_deref()),
            date: start_of_day(input.date),
            created_at: Utc::now(),
            created_by: user_id.to_string(),
            updated_at: None,
            updated_by: None,
        })
    }

    /// `price × quantity` in the expense currency.
    pub fn amount(&self) -> Total {
        Total::new(self.price * self.quantity, self.currency.clone())
    }
}

/// Expense input as received from the caller (not yet validated).
#[derive(Clone, Debug)]
pub struct NewExpense {
    pub category_id: String,
    pub price: Decimal,
    pub currency: String,
    pub quantity: Decimal,
    pub comment: Option<String>,
    pub trip: Option<String>,
    pub date: DateTime<Utc>,
}

/// An expense joined with its category and that category's ancestors
/// (root first), as the report engine consumes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpenseWithCategories {
    pub expense: Expense,
    pub category: Category,
    pub ancestors: Vec<Category>,
}

pub(crate) fn start_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    date.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub category_id: String,
    /// Canonical decimal string.
    pub price: String,
    pub currency: String,
    /// Canonical decimal string.
    pub quantity: String,
    pub comment: Option<String>,
    pub trip: Option<String>,
    pub date: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub created_by: String,
    pub updated_at: Option<DateTimeUtc>,
    pub updated_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id"
    )]
    Category,
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.clone()),
            category_id: ActiveValue::Set(expense.category_id.clone()),
            price: ActiveValue::Set(expense.price.normalize().to_string()),
            currency: ActiveValue::Set(expense.currency.clone()),
            quantity: ActiveValue::Set(expense.quantity.normalize().to_string()),
            comment: ActiveValue::Set(expense.comment.clone()),
            trip: ActiveValue::Set(expense.trip.clone()),
            date: ActiveValue::Set(expense.date),
            created_at: ActiveValue::Set(expense.created_at),
            created_by: ActiveValue::Set(expense.created_by.clone()),
            updated_at: ActiveValue::Set(expense.updated_at),
            updated_by: ActiveValue::Set(expense.updated_by.clone()),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let decimal = |value: &str, label: &str| {
            Decimal::from_str(value).map_err(|_| {
                EngineError::Unknown(format!("invalid stored {label} for expense {}", model.id))
            })
        };
        Ok(Self {
            price: decimal(&model.price, "price")?,
            quantity: decimal(&model.quantity, "quantity")?,
            id: model.id.clone(),
            category_id: model.category_id,
            currency: model.currency,
            comment: model.comment,
            trip: model.trip,
            date: model.date,
            created_at: model.created_at,
            created_by: model.created_by,
            updated_at: model.updated_at,
            updated_by: model.updated_by,
        })
    }
}
