use std::time::Duration;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, Condition, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
    sea_query::{Expr, LikeExpr, SimpleExpr},
};

use crate::{
    Category, CategoryFilter, CategoryUpdate, EngineError, MoveDestination, NewCategory,
    ResultEngine,
    categories::{self, PATH_SEPARATOR, child_path, level_of, rewrite_below, validate_id},
    util::{escape_like, new_id, normalize_optional_text, normalize_required_text},
};

use super::{Engine, with_tx};

/// Attempts per document write during a move before giving up.
const MOVE_WRITE_ATTEMPTS: u32 = 3;
const MOVE_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// `path` itself or anything strictly below it.
fn subtree_condition(path: &str) -> Condition {
    Condition::any()
        .add(categories::Column::Path.eq(path))
        .add(below_condition(path))
}

/// Anything strictly below `path` (prefix match on `path|`).
fn below_condition(path: &str) -> SimpleExpr {
    let pattern = format!("{}{PATH_SEPARATOR}%", escape_like(path));
    categories::Column::Path.like(LikeExpr::new(pattern).escape('\\'))
}

/// Anything whose path carries the `|id|` segment, wherever it sits.
///
/// On a consistent tree this equals [`below_condition`] of the node's own
/// path; it also finds descendants a half-finished move left behind.
fn through_condition(id: &str) -> SimpleExpr {
    let pattern = format!(
        "%{PATH_SEPARATOR}{}{PATH_SEPARATOR}%",
        escape_like(id)
    );
    categories::Column::Path.like(LikeExpr::new(pattern).escape('\\'))
}

/// One pending document rewrite of a move.
struct PathRewrite {
    id: String,
    old_path: String,
    new_path: String,
    new_level: i32,
    /// Only the moved node changes parent.
    new_parent: Option<Option<String>>,
}

fn validate_create_hints(
    input: &NewCategory,
    parent: Option<&categories::Model>,
) -> ResultEngine<()> {
    let expected_level = parent.map_or(1, |p| p.level + 1);
    if let Some(level) = input.level
        && level != expected_level
    {
        return Err(EngineError::InvalidInput(format!(
            "level must be {expected_level}, got {level}"
        )));
    }
    if let Some(path) = input.path.as_deref() {
        let expected_prefix = parent.map(|p| p.path.as_str()).unwrap_or_default();
        let prefix = path
            .rsplit_once(PATH_SEPARATOR)
            .map(|(prefix, _)| prefix)
            .ok_or_else(|| {
                EngineError::InvalidInput(format!("path must start with '{PATH_SEPARATOR}'"))
            })?;
        if prefix != expected_prefix {
            return Err(EngineError::InvalidInput(format!(
                "path must be '{expected_prefix}{PATH_SEPARATOR}<id>', got '{path}'"
            )));
        }
    }
    Ok(())
}

impl Engine {
    /// Creates a category under `parent_id` (or as a root).
    ///
    /// The id is generated here so the stored path can embed it.
    pub async fn create_category(
        &self,
        input: NewCategory,
        user_id: &str,
    ) -> ResultEngine<Category> {
        let name = normalize_required_text(&input.name, "category name")?;
        let icon = normalize_optional_text(input.icon.as_deref());
        let parent_id = normalize_optional_text(input.parent_id.as_deref());

        with_tx!(self, |db_tx| {
            let parent = match parent_id.as_deref() {
                Some(parent_id) => Some(
                    categories::Entity::find_by_id(parent_id)
                        .one(&db_tx)
                        .await?
                        .ok_or_else(|| {
                            EngineError::InvalidInput(format!(
                                "parent category {parent_id} not found"
                            ))
                        })?,
                ),
                None => None,
            };
            validate_create_hints(&input, parent.as_ref())?;

            let id = new_id();
            let path = child_path(parent.as_ref().map(|p| p.path.as_str()), &id);
            let category = Category {
                level: level_of(&path),
                id,
                name,
                icon,
                parent_id: parent.map(|p| p.id),
                path,
                created_at: Utc::now(),
                created_by: user_id.to_string(),
                updated_at: None,
                updated_by: None,
                parents: Vec::new(),
            };
            categories::ActiveModel::from(&category)
                .insert(&db_tx)
                .await?;
            tracing::info!(category_id = %category.id, path = %category.path, "category created");
            Ok(category)
        })
    }

    /// Renames a category and/or changes its icon. Structure is untouched.
    pub async fn update_category(
        &self,
        category_id: &str,
        input: CategoryUpdate,
        user_id: &str,
    ) -> ResultEngine<Category> {
        let name = normalize_required_text(&input.name, "category name")?;
        let icon = normalize_optional_text(input.icon.as_deref());

        let model = categories::Entity::find_by_id(category_id)
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(category_id.to_string()))?;

        let mut active: categories::ActiveModel = model.into();
        active.name = ActiveValue::Set(name);
        active.icon = ActiveValue::Set(icon);
        active.updated_at = ActiveValue::Set(Some(Utc::now()));
        active.updated_by = ActiveValue::Set(Some(user_id.to_string()));
        let model = active.update(&self.database).await?;
        Ok(Category::from(model))
    }

    /// Deletes a category and its whole subtree.
    ///
    /// Returns `None` when the category does not exist, otherwise the number
    /// of removed rows. Expenses pointing to removed categories are kept;
    /// reports skip them.
    pub async fn delete_category(&self, category_id: &str) -> ResultEngine<Option<u64>> {
        let Some(target) = categories::Entity::find_by_id(category_id)
            .one(&self.database)
            .await?
        else {
            return Ok(None);
        };

        let result = categories::Entity::delete_many()
            .filter(subtree_condition(&target.path))
            .exec(&self.database)
            .await?;
        tracing::info!(
            category_id,
            deleted = result.rows_affected,
            "category subtree deleted"
        );
        Ok(Some(result.rows_affected))
    }

    /// Moves a category, with all its descendants, under `destination`.
    ///
    /// Returns the number of rewritten rows; `0` when the category or the
    /// destination does not exist. Moving a node under itself or one of its
    /// descendants fails with [`EngineError::InvalidInput`] before any write.
    ///
    /// Writes are independent: the moved node first, then descendants by
    /// ascending level. If a write keeps failing the error carries how many
    /// rows were already rewritten; calling again with the same arguments
    /// finishes the job, since descendants are found through the `|id|`
    /// segment and rows already carrying the new prefix are skipped.
    pub async fn move_category(
        &self,
        category_id: &str,
        destination: MoveDestination,
        user_id: &str,
    ) -> ResultEngine<u64> {
        validate_id(category_id)?;
        let Some(target) = categories::Entity::find_by_id(category_id)
            .one(&self.database)
            .await?
        else {
            return Ok(0);
        };

        let destination = match destination {
            MoveDestination::Root => None,
            MoveDestination::Category(id) => {
                validate_id(&id)?;
                match categories::Entity::find_by_id(id.as_str())
                    .one(&self.database)
                    .await?
                {
                    Some(model) => Some(model),
                    None => return Ok(0),
                }
            }
        };

        if let Some(dest) = &destination
            && (dest.id == target.id
                || dest.path.contains(&format!(
                    "{PATH_SEPARATOR}{}{PATH_SEPARATOR}",
                    target.id
                )))
        {
            return Err(EngineError::InvalidInput(format!(
                "cannot move category {} under itself or one of its descendants",
                target.id
            )));
        }

        let descendants = categories::Entity::find()
            .filter(through_condition(&target.id))
            .order_by_asc(categories::Column::Level)
            .order_by_asc(categories::Column::Id)
            .all(&self.database)
            .await?;

        let new_parent = destination.as_ref().map(|d| d.id.clone());
        let new_prefix = child_path(destination.as_ref().map(|d| d.path.as_str()), &target.id);
        tracing::debug!(
            category_id,
            old_prefix = %target.path,
            new_prefix = %new_prefix,
            descendants = descendants.len(),
            "moving category subtree"
        );

        let mut rewrites = Vec::with_capacity(descendants.len() + 1);
        if target.path != new_prefix || target.parent_id != new_parent {
            rewrites.push(PathRewrite {
                id: target.id.clone(),
                old_path: target.path.clone(),
                new_level: level_of(&new_prefix),
                new_path: new_prefix.clone(),
                new_parent: Some(new_parent),
            });
        }
        for child in descendants {
            let Some(new_path) = rewrite_below(&child.path, &target.id, &new_prefix) else {
                continue;
            };
            if new_path == child.path {
                continue;
            }
            rewrites.push(PathRewrite {
                id: child.id,
                old_path: child.path,
                // Same as old level + (new target level - old target level)
                // on a consistent tree.
                new_level: level_of(&new_path),
                new_path,
                new_parent: None,
            });
        }

        let mut updated = 0;
        for rewrite in &rewrites {
            updated += self.write_path(rewrite, user_id, updated).await?;
        }
        tracing::info!(category_id, updated, "category subtree moved");
        Ok(updated)
    }

    /// Persists one rewrite, retrying transient failures.
    ///
    /// The update is conditional on the old path so a concurrent rewrite of
    /// the same row is not clobbered.
    async fn write_path(
        &self,
        rewrite: &PathRewrite,
        user_id: &str,
        updated_so_far: u64,
    ) -> ResultEngine<u64> {
        let mut attempt = 1;
        loop {
            let mut update = categories::Entity::update_many()
                .col_expr(categories::Column::Path, Expr::value(rewrite.new_path.clone()))
                .col_expr(categories::Column::Level, Expr::value(rewrite.new_level))
                .col_expr(categories::Column::UpdatedAt, Expr::value(Some(Utc::now())))
                .col_expr(
                    categories::Column::UpdatedBy,
                    Expr::value(Some(user_id.to_string())),
                );
            if let Some(parent) = &rewrite.new_parent {
                update = update.col_expr(categories::Column::ParentId, Expr::value(parent.clone()));
            }
            let result = update
                .filter(categories::Column::Id.eq(rewrite.id.as_str()))
                .filter(categories::Column::Path.eq(rewrite.old_path.as_str()))
                .exec(&self.database)
                .await;

            match result {
                Ok(result) => return Ok(result.rows_affected),
                Err(err) if attempt < MOVE_WRITE_ATTEMPTS => {
                    tracing::warn!(
                        category_id = %rewrite.id,
                        attempt,
                        "category path write failed, retrying: {err}"
                    );
                    tokio::time::sleep(MOVE_RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(EngineError::PartialMove {
                        updated: updated_so_far,
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    pub async fn category(&self, category_id: &str) -> ResultEngine<Category> {
        categories::Entity::find_by_id(category_id)
            .one(&self.database)
            .await?
            .map(Category::from)
            .ok_or_else(|| EngineError::NotFound(category_id.to_string()))
    }

    /// A category with its ancestors (root first) in `parents`.
    pub async fn category_with_parents(&self, category_id: &str) -> ResultEngine<Category> {
        let mut category = self.category(category_id).await?;
        let ids: Vec<String> = category
            .ancestor_ids()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        category.parents = self.categories_by_ids(&ids).await?;
        Ok(category)
    }

    /// Lists categories according to `filter` (see [`CategoryFilter`] for
    /// precedence), ordered by level then name.
    pub async fn list_categories(&self, filter: &CategoryFilter) -> ResultEngine<Vec<Category>> {
        let mut query = categories::Entity::find();
        if filter.all {
            // no filter
        } else if let Some(parent_id) = &filter.find_children_of {
            let Some(parent) = categories::Entity::find_by_id(parent_id.as_str())
                .one(&self.database)
                .await?
            else {
                return Ok(Vec::new());
            };
            query = query.filter(below_condition(&parent.path));
        } else if let Some(ids) = &filter.category_ids {
            query = query.filter(categories::Column::Id.is_in(ids.iter().cloned()));
        } else if let Some(parent_id) = &filter.parent_id {
            query = query.filter(categories::Column::ParentId.eq(parent_id.as_str()));
        } else {
            query = query.filter(categories::Column::ParentId.is_null());
        }

        let models = query
            .order_by_asc(categories::Column::Level)
            .order_by_asc(categories::Column::Name)
            .order_by_asc(categories::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Category::from).collect())
    }

    /// Every descendant of `category_id`, at any depth.
    pub async fn category_descendants(&self, category_id: &str) -> ResultEngine<Vec<Category>> {
        self.list_categories(&CategoryFilter {
            find_children_of: Some(category_id.to_string()),
            ..CategoryFilter::default()
        })
        .await
    }

    /// Bulk fetch ordered by level ascending. Unknown ids are skipped.
    pub(crate) async fn categories_by_ids(&self, ids: &[String]) -> ResultEngine<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = categories::Entity::find()
            .filter(categories::Column::Id.is_in(ids.iter().cloned()))
            .order_by_asc(categories::Column::Level)
            .order_by_asc(categories::Column::Id)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Category::from).collect())
    }
}
