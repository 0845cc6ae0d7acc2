pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;
