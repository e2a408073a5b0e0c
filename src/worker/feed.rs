use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::{ChainSettings, SyncSettings},
    worker::parser::{RawMessage, RawTx, TxEvent, EXECUTE_CONTRACT_TYPE_URL},
};

/// Transactions per page of the tx search endpoint
const TXS_PAGE_LIMIT: u64 = 100;

/// A contiguous block range delivered to the processor.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub txs: Vec<RawTx>,
    /// Last height covered by the chunk
    pub new_height: u64,
}

/// Consumer of delivered chunks.
///
/// `process` returns `true` once the chunk is durably applied (or was
/// already applied). `false` asks the feed to redeliver the same chunk.
#[async_trait]
pub trait ChunkProcessor: Send + Sync {
    async fn process(&self, chunk: &Chunk) -> bool;

    /// Once halted the feed stops delivering.
    fn halted(&self) -> bool;
}

// ============================================
// LCD responses
// ============================================

#[derive(Deserialize)]
struct LatestBlockResponse {
    block: Block,
}

#[derive(Deserialize)]
struct Block {
    header: BlockHeader,
}

#[derive(Deserialize)]
struct BlockHeader {
    height: String,
}

#[derive(Debug, Default, Deserialize)]
struct TxsResponse {
    #[serde(default)]
    txs: Vec<TxEnvelope>,
    #[serde(default)]
    tx_responses: Vec<TxResponse>,
    #[serde(default)]
    total: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TxEnvelope {
    #[serde(default)]
    body: TxBody,
}

#[derive(Debug, Default, Deserialize)]
struct TxBody {
    #[serde(default)]
    messages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    height: String,
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    timestamp: String,
    /// Per-message events, only populated by older nodes
    #[serde(default)]
    logs: Vec<MessageLog>,
    /// Flat event list tagged with `msg_index`
    #[serde(default)]
    events: Vec<TxEvent>,
}

#[derive(Debug, Deserialize)]
struct MessageLog {
    #[serde(default)]
    msg_index: usize,
    #[serde(default)]
    events: Vec<TxEvent>,
}

#[derive(Deserialize)]
struct ExecuteContractMessage {
    #[serde(default)]
    sender: String,
    #[serde(default)]
    msg: Value,
}

fn message_events(response: &TxResponse, index: usize) -> Vec<TxEvent> {
    if !response.logs.is_empty() {
        return response
            .logs
            .iter()
            .find(|log| log.msg_index == index)
            .map(|log| log.events.clone())
            .unwrap_or_default();
    }

    let index = index.to_string();
    response
        .events
        .iter()
        .filter(|event| {
            event
                .attributes
                .iter()
                .any(|attr| attr.key == "msg_index" && attr.value == index)
        })
        .cloned()
        .collect()
}

fn convert_message(response: &TxResponse, index: usize, message: &Value) -> Result<RawMessage> {
    let type_url = message
        .get("@type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if type_url != EXECUTE_CONTRACT_TYPE_URL {
        return Ok(RawMessage {
            type_url,
            ..Default::default()
        });
    }

    let execute: ExecuteContractMessage = serde_json::from_value(message.clone())
        .with_context(|| format!("Invalid execute message {} of tx {}", index, response.txhash))?;

    Ok(RawMessage {
        type_url,
        sender: execute.sender,
        msg: execute.msg,
        events: message_events(response, index),
    })
}

fn convert_tx(tx_response: &TxResponse, envelope: &TxEnvelope) -> Result<RawTx> {
    let height = tx_response
        .height
        .parse::<u64>()
        .with_context(|| format!("Invalid height {:?}", tx_response.height))?;
    let messages = envelope
        .body
        .messages
        .iter()
        .enumerate()
        .map(|(index, message)| convert_message(tx_response, index, message))
        .collect::<Result<Vec<_>>>()?;

    Ok(RawTx {
        hash: tx_response.txhash.clone(),
        height,
        timestamp: tx_response.timestamp.clone(),
        code: tx_response.code,
        messages,
    })
}

/// Pair each tx response with its body. Bodies and responses are
/// positionally aligned. A tx that fails to convert is logged and
/// dropped, the rest of the page is kept.
fn convert_txs(response: TxsResponse) -> Result<Vec<RawTx>> {
    if response.txs.len() != response.tx_responses.len() {
        return Err(anyhow!(
            "Mismatched tx search result: {} bodies, {} responses",
            response.txs.len(),
            response.tx_responses.len()
        ));
    }

    Ok(response
        .tx_responses
        .iter()
        .zip(response.txs.iter())
        .filter_map(|(tx_response, envelope)| match convert_tx(tx_response, envelope) {
            Ok(tx) => Some(tx),
            Err(e) => {
                warn!("Skipping tx {}: {:#}", tx_response.txhash, e);
                None
            },
        })
        .collect())
}

/// Exponential backoff for redelivery `attempt` (1-based), capped.
fn redelivery_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(20);
    Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
}

/// Polls the LCD for new blocks and delivers their transactions in
/// chunks of at most `chunk_limit` blocks.
///
/// A chunk the processor rejects is redelivered unchanged after an
/// exponential backoff. Delivery stops once the processor halts or the
/// token is cancelled; cancellation is only observed between chunks.
pub struct LcdFeed {
    http: Client,
    lcd_url: Url,
    offset: u64,
    chunk_limit: u64,
    poll_interval: Duration,
    retry_base_delay_ms: u64,
    retry_max_delay_ms: u64,
}

impl LcdFeed {
    /// `offset` is the first height to fetch.
    pub fn new(chain: &ChainSettings, sync: &SyncSettings, offset: u64) -> Result<Self> {
        let lcd_url = Url::parse(&chain.lcd_url).context("Invalid LCD URL")?;
        let http = Client::builder()
            .timeout(Duration::from_secs(chain.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            lcd_url,
            offset,
            chunk_limit: sync.chunk_limit.max(1),
            poll_interval: Duration::from_millis(sync.poll_interval_ms),
            retry_base_delay_ms: sync.retry_base_delay_ms,
            retry_max_delay_ms: sync.retry_max_delay_ms,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.lcd_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("LCD URL {} cannot be a base", self.lcd_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn latest_height(&self) -> Result<u64> {
        let url = self.endpoint(&["cosmos", "base", "tendermint", "v1beta1", "blocks", "latest"])?;
        let response: LatestBlockResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Failed to decode latest block")?;

        response
            .block
            .header
            .height
            .parse()
            .context("Invalid latest block height")
    }

    /// Every transaction in `[from, to]`, across all pages.
    async fn fetch_txs(&self, from: u64, to: u64) -> Result<Vec<RawTx>> {
        let query = format!("tx.height>={} AND tx.height<={}", from, to);
        let mut txs = Vec::new();
        let mut page = 1u64;

        loop {
            let mut url = self.endpoint(&["cosmos", "tx", "v1beta1", "txs"])?;
            url.query_pairs_mut()
                .append_pair("query", &query)
                .append_pair("order_by", "ORDER_BY_ASC")
                .append_pair("page", &page.to_string())
                .append_pair("limit", &TXS_PAGE_LIMIT.to_string());

            let response: TxsResponse = self
                .http
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .with_context(|| format!("Failed to decode txs of heights {}..={}", from, to))?;

            let total = response
                .total
                .as_deref()
                .and_then(|total| total.parse::<usize>().ok());
            let fetched = response.tx_responses.len();
            txs.extend(convert_txs(response)?);

            let done = match total {
                Some(total) => txs.len() >= total,
                None => false,
            };
            if done || (fetched as u64) < TXS_PAGE_LIMIT {
                break;
            }
            page += 1;
        }

        Ok(txs)
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(token: &CancellationToken, delay: Duration) -> bool {
        tokio::select! {
            _ = token.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    pub async fn run(
        mut self,
        processor: Arc<dyn ChunkProcessor>,
        token: CancellationToken,
    ) -> Result<()> {
        info!("Chunk feed starting at height {}", self.offset);

        loop {
            if token.is_cancelled() {
                info!("Chunk feed received cancellation signal");
                return Ok(());
            }
            if processor.halted() {
                warn!("Processor halted, chunk feed stopping at height {}", self.offset);
                return Ok(());
            }

            let latest = match self.latest_height().await {
                Ok(height) => height,
                Err(e) => {
                    warn!("Failed to fetch latest height: {:#}", e);
                    if !Self::pause(&token, self.poll_interval).await {
                        return Ok(());
                    }
                    continue;
                },
            };

            if self.offset > latest {
                if !Self::pause(&token, self.poll_interval).await {
                    return Ok(());
                }
                continue;
            }

            let to = (self.offset + self.chunk_limit - 1).min(latest);
            let txs = match self.fetch_txs(self.offset, to).await {
                Ok(txs) => txs,
                Err(e) => {
                    warn!("Failed to fetch txs {}..={}: {:#}", self.offset, to, e);
                    if !Self::pause(&token, self.poll_interval).await {
                        return Ok(());
                    }
                    continue;
                },
            };

            debug!("Delivering {} txs of heights {}..={}", txs.len(), self.offset, to);
            let chunk = Chunk { txs, new_height: to };

            let mut attempt = 0u32;
            while !processor.process(&chunk).await {
                if processor.halted() {
                    warn!("Processor halted on chunk ending at {}", to);
                    return Ok(());
                }
                attempt += 1;
                let delay =
                    redelivery_delay(self.retry_base_delay_ms, self.retry_max_delay_ms, attempt);
                debug!("Redelivering chunk ending at {} in {:?}", to, delay);
                if !Self::pause(&token, delay).await {
                    return Ok(());
                }
            }

            self.offset = to + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn wasm_message() -> Value {
        json!({
            "@type": "/cosmwasm.wasm.v1.MsgExecuteContract",
            "sender": "orai1sender",
            "contract": "orai1pair",
            "msg": {"swap": {"offer_asset": {"info": {"native_token": {"denom": "orai"}}, "amount": "10"}}},
            "funds": [{"denom": "orai", "amount": "10"}]
        })
    }

    fn wasm_event(msg_index: &str) -> Value {
        json!({
            "type": "wasm",
            "attributes": [
                {"key": "_contract_address", "value": "orai1pair"},
                {"key": "action", "value": "swap"},
                {"key": "msg_index", "value": msg_index}
            ]
        })
    }

    #[test]
    fn test_convert_txs_with_indexed_events() {
        let response: TxsResponse = serde_json::from_value(json!({
            "txs": [{"body": {"messages": [
                {"@type": "/cosmos.bank.v1beta1.MsgSend", "from_address": "orai1a"},
                wasm_message()
            ]}}],
            "tx_responses": [{
                "height": "12388900",
                "txhash": "ABC",
                "code": 0,
                "timestamp": "2023-07-12T15:12:16Z",
                "events": [wasm_event("0"), wasm_event("1")]
            }],
            "total": "1"
        }))
        .unwrap();

        let txs = convert_txs(response).unwrap();
        assert_eq!(txs.len(), 1);
        let tx = &txs[0];
        assert_eq!(tx.height, 12_388_900);
        assert_eq!(tx.messages.len(), 2);
        assert!(tx.messages[0].events.is_empty());

        let execute = &tx.messages[1];
        assert_eq!(execute.sender, "orai1sender");
        assert!(execute.msg.get("swap").is_some());
        assert_eq!(execute.events.len(), 1);
        assert!(execute.events[0]
            .attributes
            .iter()
            .any(|attr| attr.key == "msg_index" && attr.value == "1"));
    }

    #[test]
    fn test_convert_txs_prefers_message_logs() {
        let response: TxsResponse = serde_json::from_value(json!({
            "txs": [{"body": {"messages": [wasm_message()]}}],
            "tx_responses": [{
                "height": "5",
                "txhash": "DEF",
                "code": 5,
                "timestamp": "2023-07-12T15:12:16Z",
                "logs": [{"msg_index": 0, "events": [wasm_event("0"), wasm_event("0")]}],
                "events": []
            }]
        }))
        .unwrap();

        let txs = convert_txs(response).unwrap();
        assert_eq!(txs[0].code, 5);
        assert_eq!(txs[0].messages[0].events.len(), 2);
    }

    #[test]
    fn test_convert_txs_drops_only_the_malformed_tx() {
        let mut broken = wasm_message();
        broken["sender"] = json!(5);
        let response: TxsResponse = serde_json::from_value(json!({
            "txs": [
                {"body": {"messages": [wasm_message()]}},
                {"body": {"messages": [broken]}},
                {"body": {"messages": []}}
            ],
            "tx_responses": [
                {"height": "10", "txhash": "GOOD", "timestamp": "2023-07-12T15:12:16Z"},
                {"height": "10", "txhash": "BAD", "timestamp": "2023-07-12T15:12:16Z"},
                {"height": "ten", "txhash": "NOHEIGHT", "timestamp": "2023-07-12T15:12:16Z"}
            ]
        }))
        .unwrap();

        let txs = convert_txs(response).unwrap();
        let hashes: Vec<&str> = txs.iter().map(|tx| tx.hash.as_str()).collect();
        assert_eq!(hashes, vec!["GOOD"]);
        assert_eq!(txs[0].messages.len(), 1);
    }

    #[test]
    fn test_convert_txs_rejects_misaligned_result() {
        let response = TxsResponse {
            txs: vec![TxEnvelope::default()],
            ..Default::default()
        };
        assert!(convert_txs(response).is_err());
    }

    #[rstest]
    #[case(1, 500)]
    #[case(2, 1_000)]
    #[case(4, 4_000)]
    #[case(10, 60_000)]
    #[case(40, 60_000)]
    fn test_redelivery_delay(#[case] attempt: u32, #[case] expected_ms: u64) {
        assert_eq!(redelivery_delay(500, 60_000, attempt), Duration::from_millis(expected_ms));
    }
}
