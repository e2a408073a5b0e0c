//! Wire types of the exchange contracts (pair, router, factory, staking,
//! cw20 and multicall).

pub mod asset;
pub mod cw20;
pub mod factory;
pub mod multicall;
pub mod pair;
pub mod router;
pub mod staking;

pub use asset::{Asset, AssetInfo, Coin};
pub use cw20::{Cw20HookMsg, Cw20QueryMsg, Cw20Send, TokenInfoResponse};
pub use factory::{FactoryQueryMsg, PairsResponse, PAIRS_PAGE_LIMIT};
pub use multicall::{AggregateResponse, Call, CallResult, MulticallQueryMsg};
pub use pair::{PairInfo, PairQueryMsg, PoolResponse};
pub use router::{ExecuteSwapOperations, SwapOperation};
pub use staking::{PoolInfoResponse, RewardsPerSecResponse, StakingQueryMsg};
