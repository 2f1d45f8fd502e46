pub mod config;
pub mod core;
pub mod database;
pub mod export;
pub mod import;
pub mod mm;
pub mod models;
pub mod repos;
pub mod routes;
pub mod supervisor;
pub mod utils;
