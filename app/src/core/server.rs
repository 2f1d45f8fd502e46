use anyhow::Result;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use axum::Router;

use crate::{
    config::config::Config,
    core::{runtime::Runtime, state::AppState},
    database::connect::{connect_database, run_migrations},
    routes::create_routers,
};

pub async fn create_server(config: Config) -> Result<(Router<()>, DatabaseConnection, Runtime)> {
    let db_conn = connect_database(&config).await?;
    if !config.test_run {
        run_migrations(&db_conn).await?;
    }

    let runtime = Runtime::new(db_conn.clone(), config.clone())?;

    let state = AppState {
        database: db_conn.clone(),
        config,
        runtime: runtime.clone(),
    };

    let app = create_routers(Arc::new(state));

    Ok((app, db_conn, runtime))
}
