use api_types::error::{ErrorBody, FieldErrorView, FieldErrorsBody};
use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use engine::{EngineError, ErrorKind};

pub use server::{ServerConfig, ServerState, router, run_with_listener};

mod categories;
mod exchange_rates;
mod expenses;
mod reports;
mod server;
mod user;

pub mod types {
    pub mod category {
        pub use api_types::category::{
            CategoryCount, CategoryCreated, CategoryListQuery, CategoryMoveQuery, CategoryNew,
            CategoryUpdate, CategoryView,
        };
    }

    pub mod expense {
        pub use api_types::expense::{ExpenseCreated, ExpenseListQuery, ExpenseNew, ExpenseView};
    }

    pub mod report {
        pub use api_types::report::{ReportQuery, ReportView};
    }

    pub mod user {
        pub use api_types::user::{RefreshTokens, UserCredentials, UserView};
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    /// Malformed request (body, query or path).
    BadRequest(String),
    /// Missing or invalid bearer token.
    Unauthorized,
}

const INTERNAL_ERROR: &str = "internal server error";

fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::IncorrectInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Dependency | ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn text_body(status: StatusCode, kind: ErrorKind, error: String) -> Response {
    let body = ErrorBody {
        status: kind.as_str().to_string(),
        error,
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::Engine(EngineError::InvalidFields(fields)) => {
                let body = FieldErrorsBody {
                    status: ErrorKind::IncorrectInput.as_str().to_string(),
                    errors: fields
                        .into_iter()
                        .map(|f| FieldErrorView {
                            field: f.field,
                            message: f.message,
                        })
                        .collect(),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ServerError::Engine(err) => {
                let kind = err.kind();
                let status = status_for_kind(kind);
                let message = if status.is_server_error() {
                    tracing::error!("request failed: {err}");
                    INTERNAL_ERROR.to_string()
                } else {
                    err.to_string()
                };
                text_body(status, kind, message)
            }
            ServerError::BadRequest(message) => {
                text_body(StatusCode::BAD_REQUEST, ErrorKind::IncorrectInput, message)
            }
            ServerError::Unauthorized => text_body(
                StatusCode::UNAUTHORIZED,
                ErrorKind::Unauthorized,
                "missing or invalid token".to_string(),
            ),
        }
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<JsonRejection> for ServerError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(value: QueryRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

/// Body answered to a panicking handler.
pub(crate) fn panic_response() -> Response {
    text_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Unknown,
        INTERNAL_ERROR.to_string(),
    )
}

/// `Json` whose rejection uses the error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection uses the error envelope.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::FieldError;

    #[test]
    fn invalid_input_maps_to_400() {
        let res = ServerError::from(EngineError::InvalidInput("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_fields_map_to_400() {
        let err = EngineError::InvalidFields(vec![FieldError::new("price", "must be > 0")]);
        let res = ServerError::from(err).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let res = ServerError::from(EngineError::NotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let res = ServerError::from(EngineError::Unauthorized("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = ServerError::Unauthorized.into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn conflict_maps_to_409() {
        let res = ServerError::from(EngineError::ExistingKey("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn dependency_and_unknown_map_to_500() {
        let res = ServerError::from(EngineError::Fetch("down".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let res = ServerError::from(EngineError::PartialMove {
            updated: 2,
            message: "busy".to_string(),
        })
        .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let res = ServerError::from(EngineError::Unknown("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_maps_to_400() {
        let res = ServerError::BadRequest("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
