pub mod bootstrap;
pub mod models;
pub mod postgres_db;
