pub mod analytics;
pub mod api;
pub mod cache;
pub mod cloudflare;
pub mod config;
pub mod refresh;
pub mod server;
pub mod service;
pub mod settings;
