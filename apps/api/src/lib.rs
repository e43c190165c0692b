pub mod analysis;
pub mod chat;
pub mod config;
pub mod db;
pub mod errors;
pub mod llm_client;
pub mod models;
pub mod resume;
pub mod routes;
pub mod state;
