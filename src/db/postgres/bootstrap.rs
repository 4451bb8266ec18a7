use log::{error, info, warn};

use std::process;

use super::models::aluno_model::Aluno;
use super::models::model::{Model, PostgresModelError};
use super::postgres_db::{Database, DatabaseCredentials, MigrationSource};

/// Opens a database handle and syncs its schema.
#[allow(async_fn_in_trait)]
pub trait DatabaseConnector {
    type Handle;

    async fn open(&self, conn_str: &str) -> Result<Self::Handle, PostgresModelError>;

    async fn auto_migrate(&self, handle: &mut Self::Handle) -> Result<(), PostgresModelError>;
}

#[derive(Clone, Default)]
pub struct PostgresConnector {
    migrations: MigrationSource,
}

impl PostgresConnector {
    pub fn new(migrations: MigrationSource) -> Self {
        Self { migrations }
    }
}

impl DatabaseConnector for PostgresConnector {
    type Handle = Database;

    async fn open(&self, conn_str: &str) -> Result<Database, PostgresModelError> {
        Database::connect(conn_str, self.migrations.clone()).await
    }

    async fn auto_migrate(&self, handle: &mut Database) -> Result<(), PostgresModelError> {
        handle.migrate().await
    }
}

/// Connects with `credentials` and runs the schema migration once.
///
/// A failed connection is returned as `ConnectionFailed` and nothing is migrated.
/// A failed migration is only logged; the handle is still handed back.
pub async fn connect_to_database<C: DatabaseConnector>(
    connector: &C,
    credentials: &DatabaseCredentials,
) -> Result<C::Handle, PostgresModelError> {
    info!("Connecting to database: {}", credentials.describe());

    for key in credentials.empty_fields() {
        warn!("{} is empty, the connection string will not parse as intended", key);
    }

    let conn_str = credentials.build_connection_string();

    let mut handle = match connector.open(&conn_str).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Database connection error: {}", e);
            return Err(PostgresModelError::ConnectionFailed(e.to_string()));
        }
    };

    info!("Database connection established");

    if let Err(e) = connector.auto_migrate(&mut handle).await {
        warn!("Schema migration for {} failed: {}", Aluno::TABLE_NAME, e);
    }

    Ok(handle)
}

/// Startup variant of [`connect_to_database`]: a connection failure ends the process
/// with exit code 1.
pub async fn connect_or_exit<C: DatabaseConnector>(
    connector: &C,
    credentials: &DatabaseCredentials,
) -> C::Handle {
    match connect_to_database(connector, credentials).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Unable to connect to database, shutting down: {}", e);
            process::exit(1)
        }
    }
}
