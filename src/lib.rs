pub mod backend;
pub mod cli;
pub mod config;
pub mod export;
pub mod models;
pub mod session;
pub mod storage;
pub mod voice;
