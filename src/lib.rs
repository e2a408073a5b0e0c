pub mod config;
pub mod contracts;
pub mod db;
pub mod utils;
pub mod worker;

pub use config::Settings;
pub use db::{MemoryStorage, PostgresClient, Storage};
pub use worker::{ChunkProcessor, LcdClient, LcdFeed, SyncWorker};
