mod settings;

pub use settings::{ChainSettings, PostgresSettings, Settings, SyncSettings};
