pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod rcon;
pub mod state;
pub mod storage;
pub mod utils;
