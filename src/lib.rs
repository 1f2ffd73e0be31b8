pub mod cli;
pub mod client;
pub mod config;
pub mod core;
pub mod exit;
pub mod export;
pub mod ui;
pub mod workflow;
