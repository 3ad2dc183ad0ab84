use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod error {
    use super::*;

    /// Error envelope with a human readable message.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ErrorBody {
        /// Short tag, e.g. `incorrect-input`.
        pub status: String,
        pub error: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FieldErrorView {
        pub field: String,
        pub message: String,
    }

    /// Error envelope listing every invalid field.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct FieldErrorsBody {
        pub status: String,
        pub errors: Vec<FieldErrorView>,
    }
}

pub mod user {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserCredentials {
        pub username: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RefreshTokens {
        pub refresh_token: String,
    }

    /// What a client gets back after signup, login or refresh. Never
    /// carries the password hash.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserView {
        pub id: String,
        pub username: String,
        pub token: String,
        pub refresh_token: String,
        pub created_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub updated_at: Option<DateTime<Utc>>,
    }
}

pub mod category {
    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct CategoryNew {
        pub name: String,
        #[serde(default)]
        pub icon: Option<String>,
        #[serde(default)]
        pub parent_id: Option<String>,
        /// Optional, must match the parent when given.
        #[serde(default)]
        pub level: Option<i32>,
        /// Optional `parent.path|<anything>`; the last segment is replaced
        /// by the generated id.
        #[serde(default)]
        pub path: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryCreated {
        pub id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryUpdate {
        pub name: String,
        #[serde(default)]
        pub icon: Option<String>,
    }

    /// Query of `GET /categories`.
    ///
    /// `all` lists everything, `parentId` + `allChildren` every descendant,
    /// `ids` (comma separated) the given categories, `parentId` alone the
    /// direct children. Without parameters the roots are listed.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CategoryListQuery {
        pub parent_id: Option<String>,
        pub all_children: Option<bool>,
        pub all: Option<bool>,
        pub ids: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CategoryMoveQuery {
        /// A category id or `root`.
        pub destination_id: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryCount {
        pub count: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryView {
        pub id: String,
        pub name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub icon: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub parent_id: Option<String>,
        pub path: String,
        pub level: i32,
        pub created_at: DateTime<Utc>,
        pub created_by: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub updated_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub updated_by: Option<String>,
        /// Ancestors root first, only on single-category reads.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub parents: Vec<CategoryView>,
    }
}

pub mod expense {
    use super::*;

    /// Decimals accept JSON strings or numbers; strings avoid float loss.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        pub category_id: String,
        pub price: Decimal,
        pub currency: String,
        pub quantity: Decimal,
        #[serde(default)]
        pub comment: Option<String>,
        #[serde(default)]
        pub trip: Option<String>,
        pub date: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseCreated {
        pub id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListQuery {
        pub from: NaiveDate,
        pub to: NaiveDate,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: String,
        pub category_id: String,
        pub price: Decimal,
        pub currency: String,
        pub quantity: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub comment: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub trip: Option<String>,
        pub date: DateTime<Utc>,
        pub created_at: DateTime<Utc>,
        pub created_by: String,
    }
}

pub mod exchange_rates {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct RatesQuery {
        pub from: NaiveDate,
        pub to: NaiveDate,
    }

    /// "1 `base_currency` = rate target".
    #[derive(Debug, Serialize, Deserialize)]
    pub struct RatesView {
        pub date: NaiveDate,
        pub base_currency: String,
        pub rates: BTreeMap<String, Decimal>,
    }
}

pub mod report {
    use super::*;
    use crate::{category::CategoryView, exchange_rates::RatesView, expense::ExpenseView};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReportQuery {
        pub from: NaiveDate,
        pub to: NaiveDate,
        /// `day`, `month` or `year`; defaults to `day`.
        #[serde(default)]
        pub interval: Option<String>,
        /// Base currency of the conversions.
        #[serde(default)]
        pub currency: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TotalView {
        pub sum: Decimal,
        pub currency: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TotalInfoView {
        pub original: TotalView,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub converted: Option<TotalView>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub rate: Option<RatesView>,
    }

    /// Per-currency sums plus the conversion, when one exists.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReportTotalView {
        pub original: Vec<TotalView>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub converted: Option<TotalView>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub rate: Option<RatesView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseEntryView {
        pub expense: ExpenseView,
        pub total: TotalInfoView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CategoryExpensesView {
        pub category: CategoryView,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        pub expenses: Vec<ExpenseEntryView>,
        pub sub_categories: Vec<CategoryExpensesView>,
        pub total: ReportTotalView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DateExpensesView {
        pub date: NaiveDate,
        pub sub_categories: Vec<CategoryExpensesView>,
        pub total: ReportTotalView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ReportView {
        pub from: NaiveDate,
        pub to: NaiveDate,
        pub interval: String,
        pub dates: Vec<DateExpensesView>,
        pub total: ReportTotalView,
    }
}
