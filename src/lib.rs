pub mod config;
pub mod lcapi;
pub mod lcbot;
pub mod lcdb;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod sheets;
pub mod suggest;
