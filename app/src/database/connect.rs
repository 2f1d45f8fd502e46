use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;
use thiserror::Error;

use crate::config::config::Config;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection Error: {0}")]
    ConnectionError(#[from] DbErr),

    #[error("Configuration Error: {0}")]
    ConfigError(String),
}

pub async fn connect_database(config: &Config) -> Result<DatabaseConnection, DatabaseError> {
    let database_url = &config.database_url;

    if !database_url.starts_with("postgres://") {
        return Err(DatabaseError::ConfigError(
            "Invalid Database URL - It must start with postgres://".to_string(),
        ));
    }

    let mut opt = ConnectOptions::new(database_url);
    opt.max_connections(config.db_pool_size + config.db_max_overflow)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(config.db_pool_timeout))
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;

    Ok(db)
}

pub async fn run_migrations(connection: &DatabaseConnection) -> Result<(), DatabaseError> {
    Migrator::up(connection, None).await?;
    Ok(())
}
