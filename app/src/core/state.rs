use sea_orm::DatabaseConnection;

use crate::config::config::Config;
use crate::core::runtime::Runtime;

#[derive(Clone)]
pub struct AppState {
    pub database: DatabaseConnection,
    pub config: Config,
    pub runtime: Runtime,
}
