use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{Credentials, RateFetcher, ResultEngine};

mod categories;
mod exchange_rates;
mod expenses;
mod reports;
mod users;

pub use reports::ReportRequest;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    credentials: Credentials,
    fetcher: Option<Arc<dyn RateFetcher>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("credentials", &self.credentials)
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    credentials: Credentials,
    fetcher: Option<Arc<dyn RateFetcher>>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Signing key and token lifetimes.
    pub fn credentials(mut self, credentials: Credentials) -> EngineBuilder {
        self.credentials = credentials;
        self
    }

    /// Remote provider used to fill missing exchange-rate days. Without
    /// one, reports use stored rates only.
    pub fn rate_fetcher(mut self, fetcher: Arc<dyn RateFetcher>) -> EngineBuilder {
        self.fetcher = Some(fetcher);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            credentials: self.credentials,
            fetcher: self.fetcher,
        })
    }
}
