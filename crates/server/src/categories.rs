//! Categories API endpoints.

use api_types::category::{
    CategoryCount, CategoryCreated, CategoryListQuery, CategoryMoveQuery, CategoryNew,
    CategoryUpdate, CategoryView,
};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{CategoryFilter, EngineError, MoveDestination, NewCategory};

use crate::{ApiJson, ApiQuery, ServerError, server::AuthUser, server::ServerState};

pub(crate) fn map_category(category: engine::Category) -> CategoryView {
    CategoryView {
        id: category.id,
        name: category.name,
        icon: category.icon,
        parent_id: category.parent_id,
        path: category.path,
        level: category.level,
        created_at: category.created_at,
        created_by: category.created_by,
        updated_at: category.updated_at,
        updated_by: category.updated_by,
        parents: category.parents.into_iter().map(map_category).collect(),
    }
}

fn filter_from_query(query: CategoryListQuery) -> Result<CategoryFilter, ServerError> {
    let mut filter = CategoryFilter {
        all: query.all.unwrap_or(false),
        ..CategoryFilter::default()
    };
    if query.all_children.unwrap_or(false) {
        let Some(parent_id) = query.parent_id else {
            return Err(ServerError::BadRequest(
                "allChildren requires parentId".to_string(),
            ));
        };
        filter.find_children_of = Some(parent_id);
    } else {
        filter.parent_id = query.parent_id;
    }
    filter.category_ids = query.ids.map(|ids| {
        ids.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ToString::to_string)
            .collect()
    });
    Ok(filter)
}

pub async fn list(
    State(state): State<ServerState>,
    ApiQuery(query): ApiQuery<CategoryListQuery>,
) -> Result<Json<Vec<CategoryView>>, ServerError> {
    let filter = filter_from_query(query)?;
    let categories = state
        .engine
        .list_categories(&filter)
        .await?
        .into_iter()
        .map(map_category)
        .collect();
    Ok(Json(categories))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<CategoryView>, ServerError> {
    let category = state.engine.category_with_parents(&id).await?;
    Ok(Json(map_category(category)))
}

pub async fn create(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    ApiJson(payload): ApiJson<CategoryNew>,
) -> Result<(StatusCode, Json<CategoryCreated>), ServerError> {
    let category = state
        .engine
        .create_category(
            NewCategory {
                name: payload.name,
                icon: payload.icon,
                parent_id: payload.parent_id,
                level: payload.level,
                path: payload.path,
            },
            &user.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(CategoryCreated { id: category.id })))
}

pub async fn update(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<CategoryUpdate>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .update_category(
            &id,
            engine::CategoryUpdate {
                name: payload.name,
                icon: payload.icon,
            },
            &user.id,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<CategoryCount>, ServerError> {
    match state.engine.delete_category(&id).await? {
        Some(count) => Ok(Json(CategoryCount { count })),
        None => Err(EngineError::NotFound(id).into()),
    }
}

/// Moves the subtree rooted at `id`. A missing category or destination is
/// not an error: nothing moves and the count is zero.
pub async fn move_subtree(
    Extension(user): Extension<AuthUser>,
    State(state): State<ServerState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<CategoryMoveQuery>,
) -> Result<Json<CategoryCount>, ServerError> {
    let Some(destination) = query
        .destination_id
        .filter(|value| !value.trim().is_empty())
    else {
        return Err(ServerError::BadRequest(
            "destinationId is required".to_string(),
        ));
    };
    let count = state
        .engine
        .move_category(&id, MoveDestination::from(destination.as_str()), &user.id)
        .await?;
    Ok(Json(CategoryCount { count }))
}

pub async fn usages(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CategoryView>>, ServerError> {
    let categories = state
        .engine
        .category_descendants(&id)
        .await?
        .into_iter()
        .map(map_category)
        .collect();
    Ok(Json(categories))
}
