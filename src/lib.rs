pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod refill;
pub mod routes;
pub mod services;
pub mod state;
