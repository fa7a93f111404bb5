pub mod access;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod log;
pub mod order;
pub mod service;
pub mod split;
pub mod status;
pub mod utils;
