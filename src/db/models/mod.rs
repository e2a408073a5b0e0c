mod aggregate;
mod checkpoint;
mod liquidity_operation;
mod ohlcv;
mod pair_info;
mod pool_amount_history;
mod pool_apr;
mod staking;
mod swap_operation;

pub use aggregate::{DenomAmount, PoolOverview, VolumeRange};
pub use checkpoint::SyncCheckpoint;
pub use liquidity_operation::{LiquidityOpType, LiquidityOperation};
pub use ohlcv::OhlcvCandle;
pub use pair_info::PairInfoData;
pub use pool_amount_history::PoolAmountHistory;
pub use pool_apr::PoolApr;
pub use staking::{EarningOperation, StakingOperation};
pub use swap_operation::SwapOperation;
