use std::{fs::OpenOptions, sync::Arc, sync::Mutex, time::Duration};

use engine::{Credentials, Engine, HttpRateFetcher};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, DatabaseConnection};
use tracing_subscriber::{EnvFilter, fmt::writer::BoxMakeWriter};

use settings::{DatabaseSettings, LoggerSettings, Settings};

mod settings;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let settings = settings::load()?;
    init_tracing(&settings.logger)?;
    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "starting expense tracker"
    );

    let db = connect(&settings.database).await?;
    let engine = build_engine(&settings, db).await?;

    let listener =
        tokio::net::TcpListener::bind((settings.server.host.as_str(), settings.server.port)).await?;
    let config = server::ServerConfig {
        request_timeout: Duration::from_secs(
            settings.server.read_timeout_secs + settings.server.write_timeout_secs,
        ),
        shutdown_timeout: Duration::from_secs(settings.server.shutdown_timeout_secs),
    };
    server::run_with_listener(engine, listener, config, shutdown_signal()).await?;

    tracing::info!("bye");
    Ok(())
}

/// Global subscriber from the `logger` section. `RUST_LOG` wins over
/// `logger.level` when set.
fn init_tracing(logger: &LoggerSettings) -> Result<(), BoxError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "{name}={level},server={level},engine={level},migration={level},tower_http={level}",
            name = logger.name,
            level = logger.level
        ))
    })?;

    let to_file = logger.file_writer.enabled;
    let writer = if to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&logger.file_writer.path)?;
        BoxMakeWriter::new(Mutex::new(file))
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(!to_file);
    if logger.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

async fn connect(settings: &DatabaseSettings) -> Result<DatabaseConnection, BoxError> {
    let mut options = ConnectOptions::new(settings.connection_url());
    if let Some(max) = settings.max_connections {
        options.max_connections(max);
    }
    options.sqlx_logging(false);

    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}

async fn build_engine(settings: &Settings, db: DatabaseConnection) -> Result<Engine, BoxError> {
    let jwt = &settings.security.jwt;
    if jwt.secret_key.is_empty() {
        return Err("security.jwt.secret_key must be set".into());
    }
    let mut credentials = Credentials::new(
        jwt.secret_key.clone(),
        chrono::Duration::hours(jwt.token_ttl_hours),
        chrono::Duration::hours(jwt.refresh_ttl_hours),
    );
    if let Some(cost) = jwt.bcrypt_cost {
        credentials = credentials.with_cost(cost);
    }

    let mut builder = Engine::builder().database(db).credentials(credentials);
    let fetcher = &settings.exchange_rate_fetcher;
    if fetcher.url.is_empty() {
        tracing::info!("no exchange rate provider configured, using stored rates only");
    } else {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.server.read_timeout_secs.max(1)))
            .build()?;
        builder = builder.rate_fetcher(Arc::new(HttpRateFetcher::new(
            client,
            fetcher.url.clone(),
            fetcher.apikey.clone(),
        )));
    }
    Ok(builder.build().await?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
