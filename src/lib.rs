pub mod config;
pub mod history;
pub mod ingest;
pub mod logging;
pub mod process;
pub mod schema;
pub mod service;
pub mod storage;
pub mod warehouse;
