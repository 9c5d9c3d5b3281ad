pub mod config;
mod config_env;
pub mod gateway;
pub mod models;
