use std::{any::Any, future::IntoFuture, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::{ServerError, categories, exchange_rates, expenses, panic_response, reports, user};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

impl ServerState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Transport limits.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Upper bound for reading, handling and answering one request.
    pub request_timeout: Duration,
    /// How long in-flight requests may run after the shutdown signal.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Caller identity extracted from a valid access token.
#[derive(Clone, Debug)]
pub(crate) struct AuthUser {
    pub id: String,
}

async fn auth(
    State(state): State<ServerState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(TypedHeader(header)) = bearer else {
        return Err(ServerError::Unauthorized);
    };
    let claims = state
        .engine
        .validate_token(header.token())
        .await
        .map_err(|_| ServerError::Unauthorized)?;

    tracing::debug!(user = %claims.username, "authenticated request");
    request
        .extensions_mut()
        .insert(AuthUser { id: claims.id });
    Ok(next.run(request).await)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("handler panicked: {detail}");
    panic_response()
}

async fn health() -> &'static str {
    "OK"
}

pub fn router(state: ServerState, config: &ServerConfig) -> Router {
    let protected = Router::new()
        .route(
            "/categories",
            get(categories::list).post(categories::create),
        )
        .route(
            "/categories/{id}",
            get(categories::get)
                .put(categories::update)
                .delete(categories::delete),
        )
        .route("/categories/{id}/move", put(categories::move_subtree))
        .route("/categories/{id}/usages", get(categories::usages))
        .route("/expenses", get(expenses::list).post(expenses::create))
        .route("/report", get(reports::get))
        .route("/exchange-rates", get(exchange_rates::list))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth));

    Router::new()
        .route("/health", get(health))
        .route("/users/signup", post(user::signup))
        .route("/users/login", post(user::login))
        .route("/users/refresh", post(user::refresh))
        .merge(protected)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until `shutdown` resolves, then drains in-flight requests for at
/// most `config.shutdown_timeout`.
pub async fn run_with_listener<F>(
    engine: Engine,
    listener: tokio::net::TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let app = router(ServerState::new(engine), &config);
    let (signal_tx, mut signal_rx) = tokio::sync::watch::channel(false);
    let graceful = async move {
        shutdown.await;
        tracing::info!("shutdown signal received, draining connections");
        let _ = signal_tx.send(true);
    };
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();
    let drain_deadline = async move {
        if signal_rx.wait_for(|stopping| *stopping).await.is_ok() {
            tokio::time::sleep(config.shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = serve => result,
        _ = drain_deadline => {
            tracing::warn!("shutdown timeout elapsed, dropping open connections");
            Ok(())
        }
    }
}
