use log::{error, info};
use tokio_postgres::NoTls;

use include_dir::{include_dir, Dir};
use tokio_postgres_migration::Migration;

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use super::models::model::PostgresModelError;

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: &str = "5432";

const MIGRATIONS_TABLE: &str = "migrations";

pub static EMBEDDED_MIGRATIONS: Dir<'static> =
    include_dir!("$CARGO_MANIFEST_DIR/src/db/postgres/migrations");

type MigrationDefinition = (String, String);

pub trait MigrationAsStr {
    fn to_str(&self) -> (&str, &str);
}

impl MigrationAsStr for MigrationDefinition {
    fn to_str(&self) -> (&str, &str) {
        (self.0.as_str(), self.1.as_str())
    }
}

/// Where `*.up.sql` migration scripts are read from.
#[derive(Clone)]
pub enum MigrationSource {
    Embedded(&'static Dir<'static>),
    Directory(PathBuf),
}

impl Default for MigrationSource {
    fn default() -> Self {
        MigrationSource::Embedded(&EMBEDDED_MIGRATIONS)
    }
}

impl MigrationSource {
    /// Uses `MIGRATIONS_DIR` when set, otherwise the scripts compiled into the crate.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("MIGRATIONS_DIR") {
            Some(path) if !path.is_empty() => MigrationSource::Directory(path.into()),
            _ => MigrationSource::default(),
        }
    }

    pub fn load(&self) -> Result<Vec<MigrationDefinition>, PostgresModelError> {
        let mut files = Vec::new();

        match self {
            MigrationSource::Embedded(dir) => {
                for file in dir.files() {
                    let name = file_name(file.path())?;
                    let contents = file.contents_utf8().ok_or_else(|| {
                        PostgresModelError::MigrationSource(format!("{} is not valid utf-8", name))
                    })?;
                    files.push((name, contents.to_string()));
                }
            }
            MigrationSource::Directory(dir) => {
                let entries = fs::read_dir(dir).map_err(|e| {
                    PostgresModelError::MigrationSource(format!("{}: {}", dir.display(), e))
                })?;

                for entry in entries {
                    let path = entry
                        .map_err(|e| PostgresModelError::MigrationSource(e.to_string()))?
                        .path();
                    if !path.is_file() {
                        continue;
                    }

                    let contents = fs::read_to_string(&path).map_err(|e| {
                        PostgresModelError::MigrationSource(format!("{}: {}", path.display(), e))
                    })?;
                    files.push((file_name(&path)?, contents));
                }
            }
        }

        Ok(collect_up_migrations(files))
    }
}

fn file_name(path: &Path) -> Result<String, PostgresModelError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            PostgresModelError::MigrationSource(format!("bad file name {}", path.display()))
        })
}

/// Keeps `<name>.up.sql` files and orders them by name, ascending.
pub fn collect_up_migrations(
    files: impl IntoIterator<Item = (String, String)>,
) -> Vec<MigrationDefinition> {
    let mut up = Vec::new();

    for (file_name, contents) in files {
        let stem = match file_name.strip_suffix(".sql") {
            Some(stem) => stem,
            None => continue,
        };

        if !stem.ends_with(".up") {
            continue;
        }

        let name = stem.split('.').next().unwrap_or(stem);
        up.push((name.to_string(), contents));
    }

    up.sort_by(|a, b| a.0.cmp(&b.0));

    up
}

pub struct Database {
    pub client: tokio_postgres::Client,
    pub migrations: MigrationSource,
}

#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    pub db_host: String,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_port: String,
}

impl Default for DatabaseCredentials {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("db_host", &self.db_host)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("db_port", &self.db_port)
            .finish()
    }
}

impl DatabaseCredentials {
    pub fn from_env() -> Self {
        //load the .env file beforehand if there is one
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `HOST` and `DB_PORT` fall back to their defaults when missing or empty.
    /// The remaining fields are left empty when missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let with_default = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            db_host: with_default("HOST", DEFAULT_DB_HOST),
            db_user: lookup("DB_USER").unwrap_or_default(),
            db_password: lookup("DB_PASSWORD").unwrap_or_default(),
            db_name: lookup("DB_NAME").unwrap_or_default(),
            db_port: with_default("DB_PORT", DEFAULT_DB_PORT),
        }
    }

    pub fn build_connection_string(&self) -> String {
        format!(
            "host={} user={} password={} dbname={} port={} sslmode=disable",
            self.db_host, self.db_user, self.db_password, self.db_name, self.db_port
        )
    }

    /// Env variables with no default whose value came out empty. The driver reads an
    /// empty `key=` as swallowing the next pair, so these are worth flagging.
    pub fn empty_fields(&self) -> Vec<&'static str> {
        [
            ("DB_USER", &self.db_user),
            ("DB_PASSWORD", &self.db_password),
            ("DB_NAME", &self.db_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(key, _)| key)
        .collect()
    }

    /// Connection summary without the password, safe for logs.
    pub fn describe(&self) -> String {
        format!(
            "host={} user={} dbname={} port={}",
            self.db_host, self.db_user, self.db_name, self.db_port
        )
    }
}

impl Database {
    pub async fn connect(
        conn_str: &str,
        migrations: MigrationSource,
    ) -> Result<Database, PostgresModelError> {
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls).await?;

        // The connection object performs the actual communication with the database,
        // so spawn it off to run on its own.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("postgres connection error: {}", e);
            }
        });

        Ok(Database { client, migrations })
    }

    /// Applies every up migration that is not yet recorded in the migrations table.
    pub async fn migrate(&mut self) -> Result<(), PostgresModelError> {
        let up_migrations = self.migrations.load()?;

        let client = &mut self.client;

        for up_migration in up_migrations {
            info!("migrating {}", up_migration.0);
            let migration = Migration::new(MIGRATIONS_TABLE.to_string());

            migration.up(client, &[up_migration.to_str()]).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::postgres::models::aluno_model::Aluno;
    use crate::db::postgres::models::model::Model;
    use std::collections::HashMap;

    fn credentials_from(vars: &[(&str, &str)]) -> DatabaseCredentials {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DatabaseCredentials::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_connection_string_field_order() {
        let credentials = credentials_from(&[
            ("DB_PORT", "6543"),
            ("DB_NAME", "escola"),
            ("DB_PASSWORD", "s3cret"),
            ("DB_USER", "root"),
            ("HOST", "db.internal"),
        ]);

        assert_eq!(
            credentials.build_connection_string(),
            "host=db.internal user=root password=s3cret dbname=escola port=6543 sslmode=disable"
        );
    }

    #[test]
    fn test_missing_variables_leave_empty_segments() {
        let credentials = credentials_from(&[("DB_USER", "root")]);

        assert_eq!(
            credentials.build_connection_string(),
            "host=localhost user=root password= dbname= port=5432 sslmode=disable"
        );
    }

    #[test]
    fn test_empty_host_and_port_use_defaults() {
        let credentials = credentials_from(&[("HOST", ""), ("DB_PORT", ""), ("DB_NAME", "")]);

        assert_eq!(credentials.db_host, DEFAULT_DB_HOST);
        assert_eq!(credentials.db_port, DEFAULT_DB_PORT);
        assert_eq!(credentials.db_name, "");
        assert_eq!(credentials, DatabaseCredentials::default());
    }

    #[test]
    fn test_legacy_port_variable_is_not_read() {
        let credentials = credentials_from(&[("PORT", "8080")]);
        assert_eq!(credentials.db_port, DEFAULT_DB_PORT);
    }

    #[test]
    fn test_password_is_never_printed() {
        let credentials = credentials_from(&[("DB_PASSWORD", "hunter2"), ("DB_USER", "root")]);

        assert!(!format!("{:?}", credentials).contains("hunter2"));
        assert!(!credentials.describe().contains("hunter2"));
        assert_eq!(
            credentials.describe(),
            "host=localhost user=root dbname= port=5432"
        );
    }

    #[test]
    fn test_empty_fields() {
        let credentials = credentials_from(&[("DB_USER", "root"), ("DB_NAME", "")]);
        assert_eq!(credentials.empty_fields(), vec!["DB_PASSWORD", "DB_NAME"]);

        let credentials = credentials_from(&[
            ("DB_USER", "root"),
            ("DB_PASSWORD", "root"),
            ("DB_NAME", "escola"),
        ]);
        assert!(credentials.empty_fields().is_empty());
    }

    #[test]
    fn test_empty_password_breaks_driver_parsing() {
        let credentials = credentials_from(&[("DB_USER", "root"), ("DB_NAME", "escola")]);

        let config: tokio_postgres::Config = credentials.build_connection_string().parse().unwrap();

        assert_eq!(config.get_password(), Some("dbname=escola".as_bytes()));
        assert_eq!(config.get_dbname(), None);
        assert_eq!(credentials.empty_fields(), vec!["DB_PASSWORD"]);
    }

    #[test]
    fn test_migration_source_selection() {
        let source = MigrationSource::from_lookup(|key| match key {
            "MIGRATIONS_DIR" => Some("/srv/alunos/migrations".to_string()),
            _ => None,
        });
        assert!(matches!(
            source,
            MigrationSource::Directory(ref path) if path == Path::new("/srv/alunos/migrations")
        ));

        let source = MigrationSource::from_lookup(|_| Some(String::new()));
        assert!(matches!(source, MigrationSource::Embedded(_)));

        let source = MigrationSource::from_lookup(|_| None);
        assert!(matches!(source, MigrationSource::Embedded(_)));
    }

    #[test]
    fn test_collect_up_migrations() {
        let files = vec![
            ("2_add_index.up.sql".to_string(), "B".to_string()),
            ("2_add_index.down.sql".to_string(), "drop".to_string()),
            ("README.md".to_string(), "docs".to_string()),
            ("1_create.up.sql".to_string(), "A".to_string()),
        ];

        let up = collect_up_migrations(files);

        assert_eq!(
            up,
            vec![
                ("1_create".to_string(), "A".to_string()),
                ("2_add_index".to_string(), "B".to_string()),
            ]
        );
    }

    #[test]
    fn test_embedded_migrations_create_alunos_table() {
        let up = MigrationSource::default().load().unwrap();

        assert_eq!(up.len(), 1);
        let (name, sql) = up[0].to_str();
        assert_eq!(name, "20240101000000_create_alunos");
        assert!(sql.contains(&format!("CREATE TABLE IF NOT EXISTS {}", Aluno::TABLE_NAME)));
        for column in Aluno::COLUMNS {
            assert!(sql.contains(column), "migration is missing column {}", column);
        }
    }

    #[test]
    fn test_directory_migrations() {
        let dir = env::temp_dir().join(format!("alunos_db_migrations_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("0002_second.up.sql"), "SELECT 2;").unwrap();
        fs::write(dir.join("0001_first.up.sql"), "SELECT 1;").unwrap();
        fs::write(dir.join("0001_first.down.sql"), "SELECT 0;").unwrap();

        let up = MigrationSource::Directory(dir.clone()).load().unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let names: Vec<&str> = up.iter().map(|m| m.0.as_str()).collect();
        assert_eq!(names, vec!["0001_first", "0002_second"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let source = MigrationSource::Directory(PathBuf::from("/nonexistent/alunos/migrations"));

        assert_eq!(
            source.load().unwrap_err(),
            PostgresModelError::MigrationSource(String::new())
        );
    }
}
