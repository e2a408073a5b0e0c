pub mod analytics;
pub mod chain_client;
pub mod feed;
pub mod pair_registry;
pub mod parser;
pub mod pool_state;
pub mod price_resolver;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use chain_client::{ChainQuerier, LcdClient};
pub use feed::{Chunk, ChunkProcessor, LcdFeed};
pub use pair_registry::PairRegistry;
pub use parser::{parse_txs, DomainEvent, RawMessage, RawTx};
pub use pool_state::{PoolSnapshot, PoolStateResolver};
pub use price_resolver::PriceResolver;
pub use worker::{SyncState, SyncWorker};
