//! Report aggregation.
//!
//! Turns a flat list of expenses, each joined with its category and the
//! category's ancestors, into one category forest per date bucket, with
//! totals rolled up from the leaves.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    str::FromStr,
};

use chrono::{Datelike, NaiveDate};

use crate::{
    Category, EngineError, Expense, ExchangeRates, ExpenseWithCategories, ReportTotal,
    ResultEngine, TotalInfo,
};

/// Calendar bucket of a report row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Interval {
    #[default]
    Day,
    Month,
    Year,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// First day of the bucket containing `date`.
    pub fn truncate(self, date: NaiveDate) -> NaiveDate {
        let truncated = match self {
            Self::Day => Some(date),
            Self::Month => date.with_day(1),
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        truncated.unwrap_or(date)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(EngineError::InvalidInput(format!(
                "invalid interval: {other} (expected day, month or year)"
            ))),
        }
    }
}

/// Rate tables keyed by the day they apply to.
pub type RatesByDate = HashMap<NaiveDate, ExchangeRates>;

/// One expense with its (possibly converted) total.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpenseEntry {
    pub expense: Expense,
    pub total: TotalInfo,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CategoryExpenses {
    pub category: Category,
    pub expenses: Vec<ExpenseEntry>,
    pub sub_categories: Vec<CategoryExpenses>,
    pub total: ReportTotal,
}

impl CategoryExpenses {
    fn empty(category: Category) -> Self {
        Self {
            category,
            expenses: Vec::new(),
            sub_categories: Vec::new(),
            total: ReportTotal::default(),
        }
    }

    /// Sorts children and computes the total of this subtree.
    fn finalize(&mut self) -> ResultEngine<()> {
        let mut total = ReportTotal::default();
        self.expenses.sort_by(|a, b| {
            (a.expense.date, a.expense.created_at, &a.expense.id)
                .cmp(&(b.expense.date, b.expense.created_at, &b.expense.id))
        });
        for entry in &self.expenses {
            total.add_info(&entry.total)?;
        }
        for child in &mut self.sub_categories {
            child.finalize()?;
            total.merge(&child.total)?;
        }
        sort_by_name(&mut self.sub_categories);
        self.total = total;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DateExpenses {
    /// First day of the bucket.
    pub date: NaiveDate,
    pub sub_categories: Vec<CategoryExpenses>,
    pub total: ReportTotal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub interval: Interval,
    /// Ascending by date.
    pub dates: Vec<DateExpenses>,
    pub total: ReportTotal,
}

fn sort_by_name(nodes: &mut [CategoryExpenses]) {
    nodes.sort_by(|a, b| {
        (&a.category.name, &a.category.id).cmp(&(&b.category.name, &b.category.id))
    });
}

/// Whether the ancestor list really is the chain named by the category path
/// and every parent link agrees with it.
fn chain_is_complete(row: &ExpenseWithCategories) -> bool {
    let expected = row.category.ancestor_ids();
    if expected.len() != row.ancestors.len()
        || expected
            .iter()
            .zip(&row.ancestors)
            .any(|(id, ancestor)| *id != ancestor.id)
    {
        return false;
    }
    let mut parent: Option<&str> = None;
    for node in row.ancestors.iter().chain(std::iter::once(&row.category)) {
        if node.parent_id.as_deref() != parent {
            return false;
        }
        parent = Some(node.id.as_str());
    }
    true
}

/// Builds the forest of one date bucket from its flat category map.
fn build_forest(mut nodes: HashMap<String, CategoryExpenses>) -> ResultEngine<Vec<CategoryExpenses>> {
    let mut order: Vec<(i32, String)> = nodes
        .values()
        .map(|n| (n.category.level, n.category.id.clone()))
        .collect();
    // Deepest first, so a node is complete before it is attached.
    order.sort_by(|a, b| b.cmp(a));

    for (_, id) in order {
        let Some(parent_id) = nodes
            .get(&id)
            .and_then(|node| node.category.parent_id.clone())
        else {
            continue;
        };
        let Some(node) = nodes.remove(&id) else {
            continue;
        };
        let parent = nodes.get_mut(&parent_id).ok_or_else(|| {
            EngineError::Unknown(format!("parent {parent_id} of {id} missing from report"))
        })?;
        parent.sub_categories.push(node);
    }

    let mut roots: Vec<CategoryExpenses> = nodes.into_values().collect();
    for root in &mut roots {
        root.finalize()?;
    }
    sort_by_name(&mut roots);
    Ok(roots)
}

/// Aggregates `rows` into a report.
///
/// Rows whose ancestor chain is incomplete (a category deleted while the
/// report ran) are skipped and contribute nothing.
pub fn aggregate(
    from: NaiveDate,
    to: NaiveDate,
    interval: Interval,
    rows: Vec<ExpenseWithCategories>,
    rates: &RatesByDate,
) -> ResultEngine<Report> {
    let mut buckets: BTreeMap<NaiveDate, HashMap<String, CategoryExpenses>> = BTreeMap::new();

    for row in rows {
        if !chain_is_complete(&row) {
            tracing::warn!(
                expense_id = %row.expense.id,
                category_id = %row.category.id,
                "dropping expense with incomplete category chain"
            );
            continue;
        }

        let day = row.expense.date.date_naive();
        let bucket = buckets.entry(interval.truncate(day)).or_default();
        for ancestor in row.ancestors {
            bucket
                .entry(ancestor.id.clone())
                .or_insert_with(|| CategoryExpenses::empty(ancestor));
        }

        let total = TotalInfo::with_rates(row.expense.amount(), rates.get(&day));
        bucket
            .entry(row.category.id.clone())
            .or_insert_with(|| CategoryExpenses::empty(row.category))
            .expenses
            .push(ExpenseEntry {
                expense: row.expense,
                total,
            });
    }

    let mut dates = Vec::with_capacity(buckets.len());
    let mut report_total = ReportTotal::default();
    for (date, nodes) in buckets {
        let sub_categories = build_forest(nodes)?;
        let mut total = ReportTotal::default();
        for root in &sub_categories {
            total.merge(&root.total)?;
        }
        report_total.merge(&total)?;
        dates.push(DateExpenses {
            date,
            sub_categories,
            total,
        });
    }

    Ok(Report {
        from,
        to,
        interval,
        dates,
        total: report_total,
    })
}
