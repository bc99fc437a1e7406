pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod http;
pub mod logging;
