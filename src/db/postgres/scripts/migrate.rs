use alunos_db::db::postgres::bootstrap::{connect_or_exit, PostgresConnector};
use alunos_db::db::postgres::postgres_db::{DatabaseCredentials, MigrationSource};

use dotenvy::dotenv;
use log::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let credentials = DatabaseCredentials::from_env();
    let connector = PostgresConnector::new(MigrationSource::from_env());

    let _database = connect_or_exit(&connector, &credentials).await;

    info!("Database ready");

    Ok(())
}
