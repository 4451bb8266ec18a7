 
use std::mem::discriminant;

use tokio_postgres::Error as PostgresError;

/// A row type backed by a single table.
pub trait Model {
    const TABLE_NAME: &'static str;
}

#[derive(Debug, thiserror::Error )]
pub enum PostgresModelError {
    #[error(transparent)]
    Postgres(#[from] PostgresError),

    #[error("ConnectionFailed {0}")]
    ConnectionFailed(String),

    #[error("MigrationSource {0}")]
    MigrationSource(String),
}

impl PartialEq for PostgresModelError {
    fn eq(&self, other: &Self) -> bool {
        discriminant(self) == discriminant(other)
    }
}

impl Eq for PostgresModelError {}
