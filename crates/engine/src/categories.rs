//! Category tree.
//!
//! Categories form a forest encoded with materialized paths: a node's
//! `path` is `|a1|a2|…|ak|self`, the ids of every proper ancestor from the
//! root down followed by its own id. Roots have `path = "|self"` and
//! `level = 1`; every other node has `path = parent.path + "|" + id` and
//! `level = parent.level + 1`. Descendant lookups are prefix matches on
//! `path`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{EngineError, ResultEngine};

pub const PATH_SEPARATOR: char = '|';

/// Keyword accepted by move requests to re-root a subtree.
pub const ROOT_DESTINATION: &str = "root";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub parent_id: Option<String>,
    pub path: String,
    pub level: i32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    /// Ancestors ordered root first. Filled only by queries that ask for
    /// them, never stored.
    pub parents: Vec<Category>,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Ids of the proper ancestors, root first.
    pub fn ancestor_ids(&self) -> Vec<&str> {
        ancestor_ids(&self.path)
    }

    /// Checks the path/level invariants against the (optional) parent.
    pub fn check_invariants(&self, parent: Option<&Category>) -> ResultEngine<()> {
        let broken = |what: &str| {
            Err(EngineError::InvalidInput(format!(
                "category {}: {what}",
                self.id
            )))
        };
        if !self.path.starts_with(PATH_SEPARATOR) {
            return broken("path must start with '|'");
        }
        if path_segments(&self.path).last() != Some(&self.id.as_str()) {
            return broken("path must end with its own id");
        }
        if self.level != level_of(&self.path) {
            return broken("level must equal the number of path segments");
        }
        match (&self.parent_id, parent) {
            (None, _) => {
                if self.path != child_path(None, &self.id) || self.level != 1 {
                    return broken("root must have path '|id' and level 1");
                }
            }
            (Some(parent_id), Some(parent)) => {
                if *parent_id != parent.id {
                    return broken("parent mismatch");
                }
                if self.path != child_path(Some(&parent.path), &self.id)
                    || self.level != parent.level + 1
                {
                    return broken("path must extend the parent path");
                }
            }
            (Some(_), None) => return broken("parent is missing"),
        }
        Ok(())
    }
}

/// Non-empty path segments, root first.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// Segments of `path` without the trailing self id.
pub fn ancestor_ids(path: &str) -> Vec<&str> {
    let mut segments = path_segments(path);
    segments.pop();
    segments
}

/// Depth encoded by `path` (1 for roots).
pub fn level_of(path: &str) -> i32 {
    path_segments(path).len() as i32
}

/// Path of a node with id `id` under a parent with `parent_path`.
pub fn child_path(parent_path: Option<&str>, id: &str) -> String {
    format!("{}{PATH_SEPARATOR}{id}", parent_path.unwrap_or_default())
}

/// Replaces everything up to and including the `target_id` segment of
/// `path` with `new_prefix`.
///
/// Returns `None` when `path` is not below `target_id`.
pub(crate) fn rewrite_below(path: &str, target_id: &str, new_prefix: &str) -> Option<String> {
    let needle = format!("{PATH_SEPARATOR}{target_id}{PATH_SEPARATOR}");
    let start = path.find(&needle)?;
    let rest = &path[start + 1 + target_id.len()..];
    Some(format!("{new_prefix}{rest}"))
}

/// Ensure an id can live inside a path.
pub(crate) fn validate_id(id: &str) -> ResultEngine<()> {
    if id.is_empty() || id.contains(PATH_SEPARATOR) {
        return Err(EngineError::InvalidInput(format!("invalid category id: {id}")));
    }
    Ok(())
}

/// Input of the create command.
///
/// `level` and `path` are optional pre-computed values; when present they
/// must agree with the parent. The last path segment stands for the id the
/// command generates and is not compared.
#[derive(Clone, Debug, Default)]
pub struct NewCategory {
    pub name: String,
    pub icon: Option<String>,
    pub parent_id: Option<String>,
    pub level: Option<i32>,
    pub path: Option<String>,
}

/// In-place update: only name and icon are editable.
#[derive(Clone, Debug, Default)]
pub struct CategoryUpdate {
    pub name: String,
    pub icon: Option<String>,
}

/// Where a subtree goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveDestination {
    Root,
    Category(String),
}

impl From<&str> for MoveDestination {
    fn from(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case(ROOT_DESTINATION) {
            Self::Root
        } else {
            Self::Category(value.to_string())
        }
    }
}

/// Listing filter.
///
/// Fields are orthogonal; when several are set the precedence is
/// `all` > `find_children_of` > `category_ids` > `parent_id`. With nothing
/// set the roots are returned.
#[derive(Clone, Debug, Default)]
pub struct CategoryFilter {
    pub parent_id: Option<String>,
    pub category_ids: Option<Vec<String>>,
    /// Every descendant (any depth) of this category.
    pub find_children_of: Option<String>,
    pub all: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub icon: Option<String>,
    pub parent_id: Option<String>,
    pub path: String,
    pub level: i32,
    pub created_at: DateTimeUtc,
    pub created_by: String,
    pub updated_at: Option<DateTimeUtc>,
    pub updated_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Category {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            icon: model.icon,
            parent_id: model.parent_id,
            path: model.path,
            level: model.level,
            created_at: model.created_at,
            created_by: model.created_by,
            updated_at: model.updated_at,
            updated_by: model.updated_by,
            parents: Vec::new(),
        }
    }
}

impl From<&Category> for ActiveModel {
    fn from(category: &Category) -> Self {
        Self {
            id: ActiveValue::Set(category.id.clone()),
            name: ActiveValue::Set(category.name.clone()),
            icon: ActiveValue::Set(category.icon.clone()),
            parent_id: ActiveValue::Set(category.parent_id.clone()),
            path: ActiveValue::Set(category.path.clone()),
            level: ActiveValue::Set(category.level),
            created_at: ActiveValue::Set(category.created_at),
            created_by: ActiveValue::Set(category.created_by.clone()),
            updated_at: ActiveValue::Set(category.updated_at),
            updated_by: ActiveValue::Set(category.updated_by.clone()),
        }
    }
}
