//! Expense tracking engine.
//!
//! Owns the category tree, expenses, users with their tokens, the
//! exchange-rate cache and the report aggregation built on top of them.
//! Persistence goes through sea-orm; the HTTP surface lives in `server`.

pub use auth::{Claims, Credentials, TokenKind, TokenPair};
pub use categories::{
    Category, CategoryFilter, CategoryUpdate, MoveDestination, NewCategory, PATH_SEPARATOR,
    ROOT_DESTINATION, ancestor_ids, child_path, level_of, path_segments,
};
pub use error::{EngineError, ErrorKind, FieldError};
pub use exchange_rates::ExchangeRates;
pub use expenses::{Expense, ExpenseWithCategories, NewExpense};
pub use fetcher::{FetchError, HttpRateFetcher, RateFetcher};
pub use money::{GrandTotal, ReportTotal, Total, TotalInfo};
pub use ops::{Engine, EngineBuilder, ReportRequest};
pub use report::{
    CategoryExpenses, DateExpenses, ExpenseEntry, Interval, RatesByDate, Report, aggregate,
};
pub use users::User;

mod auth;
mod categories;
mod error;
mod exchange_rates;
mod expenses;
mod fetcher;
mod money;
mod ops;
mod report;
mod users;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
