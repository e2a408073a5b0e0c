use base64::{engine::general_purpose::STANDARD, Engine};
use log::warn;
use num_bigint::BigInt;
use num_traits::Zero;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::{
    contracts::{Asset, Coin, Cw20HookMsg, Cw20Send, ExecuteSwapOperations},
    db::models::{
        EarningOperation, LiquidityOpType, LiquidityOperation, StakingOperation, SwapOperation,
    },
    utils::{concat_data_to_unique_key, concat_event_key, parse_timestamp},
};

pub const EXECUTE_CONTRACT_TYPE_URL: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";

const CONTRACT_ADDRESS_KEY: &str = "_contract_address";

// ============================================
// Raw Input
// ============================================

/// A transaction as delivered by the feed.
#[derive(Debug, Clone, Default)]
pub struct RawTx {
    pub hash: String,
    pub height: u64,
    /// RFC 3339 block time
    pub timestamp: String,
    pub code: u32,
    pub messages: Vec<RawMessage>,
}

/// One message of a transaction with the events it emitted.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub type_url: String,
    pub sender: String,
    pub msg: Value,
    pub events: Vec<TxEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

// ============================================
// Decoded Messages
// ============================================

/// Execute messages the indexer understands.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractMsg {
    Swap {
        offer_asset: Asset,
    },
    ExecuteSwapOperations(ExecuteSwapOperations),
    ProvideLiquidity {
        assets: Vec<Asset>,
    },
    Send(Cw20Send),
    Bond {},
    Unbond {},
    #[serde(rename = "withdraw")]
    WithdrawReward {},
    #[serde(skip_deserializing)]
    Unrecognized,
}

const CONTRACT_MSG_KEYS: &[&str] = &[
    "swap",
    "execute_swap_operations",
    "provide_liquidity",
    "send",
    "bond",
    "unbond",
    "withdraw",
];

const HOOK_MSG_KEYS: &[&str] = &["swap", "execute_swap_operations", "withdraw_liquidity", "bond"];

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid block timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("malformed `{key}` message: {source}")]
    MalformedMessage {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid base64 hook message: {0}")]
    InvalidHook(String),
    #[error("`{action}` event is missing attribute `{key}`")]
    MissingAttribute { action: &'static str, key: &'static str },
    #[error("invalid amount {0:?}")]
    InvalidAmount(String),
    #[error("invalid coin {0:?}")]
    InvalidCoin(String),
}

/// Single top-level key of a message object.
fn message_key(msg: &Value) -> Option<&str> {
    let object = msg.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.keys().next().map(String::as_str)
}

impl ContractMsg {
    /// Unknown shapes decode to `Unrecognized`; a known key with a body
    /// that does not decode is an error.
    pub fn decode(msg: &Value) -> Result<Self, ParseError> {
        match message_key(msg) {
            Some(key) if CONTRACT_MSG_KEYS.contains(&key) => serde_json::from_value(msg.clone())
                .map_err(|source| ParseError::MalformedMessage {
                    key: key.to_string(),
                    source,
                }),
            _ => Ok(ContractMsg::Unrecognized),
        }
    }
}

/// Decode the base64 hook of a cw20 `send`.
pub fn decode_hook(encoded: &str) -> Result<Cw20HookMsg, ParseError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ParseError::InvalidHook(e.to_string()))?;
    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| ParseError::InvalidHook(e.to_string()))?;
    match message_key(&value) {
        Some(key) if HOOK_MSG_KEYS.contains(&key) => {
            serde_json::from_value(value.clone()).map_err(|source| ParseError::MalformedMessage {
                key: key.to_string(),
                source,
            })
        },
        _ => Ok(Cw20HookMsg::Unrecognized),
    }
}

// ============================================
// Domain Events
// ============================================

/// Indexable effect of a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Swap(SwapOperation),
    Liquidity(LiquidityOperation),
    Stake(StakingOperation),
    Earn(EarningOperation),
}

impl DomainEvent {
    pub fn txheight(&self) -> u64 {
        match self {
            DomainEvent::Swap(op) => op.txheight,
            DomainEvent::Liquidity(op) => op.txheight,
            DomainEvent::Stake(op) => op.txheight,
            DomainEvent::Earn(op) => op.txheight,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            DomainEvent::Swap(op) => op.timestamp,
            DomainEvent::Liquidity(op) => op.timestamp,
            DomainEvent::Stake(op) => op.timestamp,
            DomainEvent::Earn(op) => op.timestamp,
        }
    }
}

/// What a message emitted, determined by its decoded shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Harvest {
    Swaps,
    Provide,
    Withdraw,
    Bond,
    Rewards,
    Nothing,
}

fn harvest_of(msg: &ContractMsg) -> Result<Harvest, ParseError> {
    Ok(match msg {
        ContractMsg::Swap { .. } | ContractMsg::ExecuteSwapOperations(_) => Harvest::Swaps,
        ContractMsg::ProvideLiquidity { .. } => Harvest::Provide,
        ContractMsg::Send(send) => match decode_hook(&send.msg)? {
            Cw20HookMsg::Swap { .. } | Cw20HookMsg::ExecuteSwapOperations(_) => Harvest::Swaps,
            Cw20HookMsg::WithdrawLiquidity {} => Harvest::Withdraw,
            Cw20HookMsg::Bond {} => Harvest::Bond,
            Cw20HookMsg::Unrecognized => Harvest::Nothing,
        },
        ContractMsg::Bond {} => Harvest::Bond,
        ContractMsg::WithdrawReward {} => Harvest::Rewards,
        ContractMsg::Unbond {} | ContractMsg::Unrecognized => Harvest::Nothing,
    })
}

// ============================================
// Event Attributes
// ============================================

/// Attributes emitted by one contract execution.
#[derive(Debug)]
struct AttributeGroup<'a> {
    contract: &'a str,
    attributes: Vec<(&'a str, &'a str)>,
}

impl<'a> AttributeGroup<'a> {
    fn get(&self, key: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }

    fn require(&self, action: &'static str, key: &'static str) -> Result<&'a str, ParseError> {
        self.get(key).ok_or(ParseError::MissingAttribute { action, key })
    }

    fn action(&self) -> Option<&'a str> {
        self.get("action")
    }
}

/// Split `wasm` attributes into one group per contract execution.
/// A new group starts at every `_contract_address` key.
fn group_wasm_attributes(events: &[TxEvent]) -> Vec<AttributeGroup<'_>> {
    let mut groups: Vec<AttributeGroup<'_>> = Vec::new();

    for attribute in events
        .iter()
        .filter(|event| event.kind == "wasm")
        .flat_map(|event| event.attributes.iter())
    {
        if attribute.key == CONTRACT_ADDRESS_KEY {
            groups.push(AttributeGroup {
                contract: attribute.value.as_str(),
                attributes: Vec::new(),
            });
        } else if let Some(group) = groups.last_mut() {
            group.attributes.push((attribute.key.as_str(), attribute.value.as_str()));
        }
    }

    groups
}

fn parse_amount(value: &str) -> Result<BigInt, ParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(BigInt::zero());
    }
    BigInt::from_str(trimmed).map_err(|_| ParseError::InvalidAmount(value.to_string()))
}

/// Parse `"<amount><denom>"`: leading digits are the amount.
pub fn parse_coin(value: &str) -> Result<Coin, ParseError> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, denom) = value.split_at(split);
    if amount.is_empty() || denom.is_empty() {
        return Err(ParseError::InvalidCoin(value.to_string()));
    }
    Ok(Coin {
        denom: denom.to_string(),
        amount: parse_amount(amount)?,
    })
}

/// Parse a comma separated coin list such as `"100orai, 200ibc/ABC"`.
pub fn parse_coin_list(value: &str) -> Result<Vec<Coin>, ParseError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_coin)
        .collect()
}

// ============================================
// Parsing
// ============================================

struct TxContext<'a> {
    hash: &'a str,
    height: u64,
    timestamp: i64,
    sender: &'a str,
}

fn swap_from_group(ctx: &TxContext, group: &AttributeGroup) -> Result<SwapOperation, ParseError> {
    const ACTION: &str = "swap";
    let offer_denom = group.require(ACTION, "offer_asset")?.to_string();
    let ask_denom = group.require(ACTION, "ask_asset")?.to_string();
    let offer_amount = parse_amount(group.require(ACTION, "offer_amount")?)?;
    let return_amount = parse_amount(group.require(ACTION, "return_amount")?)?;
    let optional = |key| group.get(key).map(parse_amount).unwrap_or(Ok(BigInt::zero()));

    Ok(SwapOperation {
        unique_key: concat_data_to_unique_key(
            ctx.timestamp,
            &offer_denom,
            &offer_amount,
            &ask_denom,
            &return_amount,
        ),
        txhash: ctx.hash.to_string(),
        txheight: ctx.height,
        timestamp: ctx.timestamp,
        pair_addr: group.contract.to_string(),
        sender: ctx.sender.to_string(),
        offer_denom,
        offer_amount,
        ask_denom,
        return_amount,
        tax_amount: optional("tax_amount")?,
        commission_amount: optional("commission_amount")?,
        spread_amount: optional("spread_amount")?,
        volume_usdt: BigInt::zero(),
        commission_usdt: BigInt::zero(),
    })
}

fn liquidity_from_group(
    ctx: &TxContext,
    group: &AttributeGroup,
    op_type: LiquidityOpType,
) -> Result<LiquidityOperation, ParseError> {
    let (action, assets_key, share_key) = match op_type {
        LiquidityOpType::Provide => ("provide_liquidity", "assets", "share"),
        LiquidityOpType::Withdraw => ("withdraw_liquidity", "refund_assets", "withdrawn_share"),
    };
    let coins = parse_coin_list(group.require(action, assets_key)?)?;
    let [first, second] = <[Coin; 2]>::try_from(coins)
        .map_err(|_| ParseError::InvalidCoin(group.get(assets_key).unwrap_or_default().to_string()))?;
    let lp_share = parse_amount(group.require(action, share_key)?)?;

    Ok(LiquidityOperation {
        unique_key: concat_data_to_unique_key(
            ctx.timestamp,
            &first.denom,
            &first.amount,
            &second.denom,
            &second.amount,
        ),
        txhash: ctx.hash.to_string(),
        txheight: ctx.height,
        timestamp: ctx.timestamp,
        pair_addr: group.contract.to_string(),
        tx_creator: ctx.sender.to_string(),
        op_type,
        first_token_denom: first.denom,
        first_token_amount: first.amount,
        second_token_denom: second.denom,
        second_token_amount: second.amount,
        lp_share,
        first_token_lp: BigInt::zero(),
        second_token_lp: BigInt::zero(),
        tax_rate: BigInt::zero(),
    })
}

/// LP token of a staking event; older contracts call it `asset_info`.
fn staking_token<'a>(group: &AttributeGroup<'a>, action: &'static str) -> Result<&'a str, ParseError> {
    group
        .get("staking_token")
        .or_else(|| group.get("asset_info"))
        .ok_or(ParseError::MissingAttribute {
            action,
            key: "staking_token",
        })
}

fn stake_from_group(ctx: &TxContext, group: &AttributeGroup) -> Result<StakingOperation, ParseError> {
    const ACTION: &str = "bond";
    let staker = group.require(ACTION, "staker_addr")?;
    let token = staking_token(group, ACTION)?;
    let amount = parse_amount(group.require(ACTION, "amount")?)?;

    Ok(StakingOperation {
        unique_key: concat_event_key(&[
            &ctx.timestamp.to_string(),
            ctx.hash,
            staker,
            token,
            &amount.to_string(),
        ]),
        txhash: ctx.hash.to_string(),
        txheight: ctx.height,
        timestamp: ctx.timestamp,
        staker_address: staker.to_string(),
        staking_asset_denom: token.to_string(),
        stake_amount: amount,
        stake_amount_in_usdt: BigInt::zero(),
    })
}

fn earnings_from_group(
    ctx: &TxContext,
    group: &AttributeGroup,
) -> Result<Vec<EarningOperation>, ParseError> {
    const ACTION: &str = "withdraw_reward";
    let staker = group.require(ACTION, "staker_addr")?;
    let token = staking_token(group, ACTION)?;
    let rewards = parse_coin_list(group.require(ACTION, "reward_amount")?)?;

    Ok(rewards
        .into_iter()
        .map(|reward| EarningOperation {
            unique_key: concat_event_key(&[
                &ctx.timestamp.to_string(),
                ctx.hash,
                staker,
                token,
                &reward.denom,
                &reward.amount.to_string(),
            ]),
            txhash: ctx.hash.to_string(),
            txheight: ctx.height,
            timestamp: ctx.timestamp,
            staker_address: staker.to_string(),
            staking_asset_denom: token.to_string(),
            reward_asset_denom: reward.denom,
            earn_amount: reward.amount,
            earn_amount_in_usdt: BigInt::zero(),
        })
        .collect())
}

fn parse_message(ctx: &TxContext, message: &RawMessage) -> Result<Vec<DomainEvent>, ParseError> {
    let harvest = harvest_of(&ContractMsg::decode(&message.msg)?)?;
    if harvest == Harvest::Nothing {
        return Ok(Vec::new());
    }

    let mut events = Vec::new();
    for group in group_wasm_attributes(&message.events) {
        match (harvest, group.action()) {
            (Harvest::Swaps, Some("swap")) => {
                events.push(DomainEvent::Swap(swap_from_group(ctx, &group)?));
            },
            (Harvest::Provide, Some("provide_liquidity")) => {
                events.push(DomainEvent::Liquidity(liquidity_from_group(
                    ctx,
                    &group,
                    LiquidityOpType::Provide,
                )?));
            },
            (Harvest::Withdraw, Some("withdraw_liquidity")) => {
                events.push(DomainEvent::Liquidity(liquidity_from_group(
                    ctx,
                    &group,
                    LiquidityOpType::Withdraw,
                )?));
            },
            (Harvest::Bond, Some("bond")) => {
                events.push(DomainEvent::Stake(stake_from_group(ctx, &group)?));
            },
            (Harvest::Rewards, Some("withdraw_reward")) => {
                events.extend(earnings_from_group(ctx, &group)?.into_iter().map(DomainEvent::Earn));
            },
            _ => {},
        }
    }

    Ok(events)
}

/// Domain events of one successful transaction, in message order.
pub fn parse_tx(tx: &RawTx) -> Result<Vec<DomainEvent>, ParseError> {
    let timestamp = parse_timestamp(&tx.timestamp)
        .map_err(|_| ParseError::InvalidTimestamp(tx.timestamp.clone()))?;

    let mut events = Vec::new();
    for message in tx
        .messages
        .iter()
        .filter(|m| m.type_url == EXECUTE_CONTRACT_TYPE_URL)
    {
        let ctx = TxContext {
            hash: &tx.hash,
            height: tx.height,
            timestamp,
            sender: &message.sender,
        };
        events.extend(parse_message(&ctx, message)?);
    }
    Ok(events)
}

/// Parse a chunk of transactions into chronologically ordered events.
///
/// Failed transactions (`code != 0`) are ignored. A transaction that
/// cannot be parsed is logged and skipped without affecting the others.
pub fn parse_txs(txs: &[RawTx]) -> Vec<DomainEvent> {
    let mut events = Vec::new();

    for tx in txs.iter().filter(|tx| tx.code == 0) {
        match parse_tx(tx) {
            Ok(parsed) => events.extend(parsed),
            Err(e) => warn!("Skipping tx {} at height {}: {}", tx.hash, tx.height, e),
        }
    }

    // Stable: keeps message order within a block
    events.sort_by_key(DomainEvent::txheight);
    events
}
