//! CometBFT JSON-RPC provider with multi-endpoint failover
//!
//! Ledger queries go through `abci_query` with protobuf request/response
//! bodies; envelopes go out through `broadcast_tx_sync`.

use super::{
    AccountInfo, BlockResults, Broadcaster, BroadcastResponse, FeeMarketParams, LedgerClient,
    CODE_MEMPOOL_IS_FULL, CODE_TX_IN_MEMPOOL_CACHE, CODE_TX_TOO_LARGE,
};
use crate::config::ChainConfig;
use crate::error::{RelayerError, RelayerResult};
use crate::proto::{self, Any};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ethers::providers::{Http, Provider, ProviderError, RpcError};
use num_bigint::BigUint;
use prost::Message;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Multi-endpoint CometBFT RPC client
pub struct RpcProvider {
    /// Chain configuration
    config: ChainConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
}

#[derive(Debug, Serialize, Deserialize)]
struct BlockResultsResponse {
    height: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AbciQueryResponse {
    response: AbciQueryResult,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct AbciQueryResult {
    code: u32,
    log: String,
    codespace: String,
    value: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct BroadcastTxResponse {
    code: u32,
    log: String,
    codespace: String,
    hash: String,
}

impl RpcProvider {
    /// Create a new provider from the chain configuration
    pub fn new(config: ChainConfig) -> RelayerResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    http_providers.push(provider);
                    debug!("Added RPC endpoint for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(RelayerError::Config(format!(
                "No valid RPC endpoints for chain {}",
                config.chain_id
            )));
        }

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
        })
    }

    /// Get the active HTTP provider
    fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to endpoint {}", self.config.chain_id, next);
    }

    /// Issue a JSON-RPC call, failing over on transport errors.
    ///
    /// An error object returned by the node is final and not retried
    /// against the next endpoint.
    async fn request<R>(&self, method: &str, params: Value) -> Result<R, ProviderError>
    where
        R: Serialize + DeserializeOwned + Debug + Send,
    {
        let mut last_error = None;
        for _ in 0..self.http_providers.len() {
            match self.http().request::<_, R>(method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) if e.as_error_response().is_some() => return Err(e),
                Err(e) => {
                    warn!(
                        "{} failed on chain {}: {}",
                        method, self.config.chain_id, e
                    );
                    self.failover();
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::CustomError("no RPC endpoints configured".to_string())
        }))
    }

    /// Run an ABCI query and decode the protobuf response body
    async fn abci_query<Req, Resp>(
        &self,
        query: &'static str,
        path: &str,
        request: &Req,
        height: Option<u64>,
    ) -> RelayerResult<Resp>
    where
        Req: Message,
        Resp: Message + Default,
    {
        let params = json!({
            "path": path,
            "data": hex::encode(request.encode_to_vec()),
            "height": height.unwrap_or(0).to_string(),
            "prove": false,
        });

        let result: AbciQueryResponse =
            self.request("abci_query", params)
                .await
                .map_err(|e| RelayerError::Query {
                    query,
                    message: e.to_string(),
                })?;

        let response = result.response;
        if response.code != 0 {
            return Err(RelayerError::Query {
                query,
                message: format!(
                    "{}/{}: {}",
                    response.codespace, response.code, response.log
                ),
            });
        }

        let value = match response.value {
            Some(value) => BASE64.decode(value).map_err(|e| RelayerError::Query {
                query,
                message: format!("invalid base64 response: {}", e),
            })?,
            None => Vec::new(),
        };

        Resp::decode(value.as_slice()).map_err(|e| RelayerError::Query {
            query,
            message: format!("invalid protobuf response: {}", e),
        })
    }
}

#[async_trait]
impl LedgerClient for RpcProvider {
    async fn block_results(&self, height: Option<u64>) -> RelayerResult<BlockResults> {
        let params = match height {
            Some(h) => json!({ "height": h.to_string() }),
            None => json!({}),
        };

        let result: BlockResultsResponse =
            self.request("block_results", params)
                .await
                .map_err(|e| RelayerError::Query {
                    query: "block_results",
                    message: e.to_string(),
                })?;

        let height = result.height.parse().map_err(|_| RelayerError::Query {
            query: "block_results",
            message: format!("invalid block height {:?}", result.height),
        })?;

        Ok(BlockResults { height })
    }

    async fn base_fee(&self, height: u64) -> RelayerResult<Option<BigUint>> {
        let response: proto::QueryBaseFeeResponse = self
            .abci_query(
                "base_fee",
                proto::QUERY_PATH_BASE_FEE,
                &proto::QueryBaseFeeRequest {},
                Some(height),
            )
            .await?;

        parse_base_fee(&response.base_fee)
    }

    async fn fee_market_params(&self) -> RelayerResult<FeeMarketParams> {
        let response: proto::QueryFeeMarketParamsResponse = self
            .abci_query(
                "fee_market_params",
                proto::QUERY_PATH_FEE_MARKET_PARAMS,
                &proto::QueryFeeMarketParamsRequest {},
                None,
            )
            .await?;

        let params = response.params.ok_or_else(|| RelayerError::Query {
            query: "fee_market_params",
            message: "response carries no params".to_string(),
        })?;

        Ok(FeeMarketParams {
            base_fee_change_denominator: params.base_fee_change_denominator,
        })
    }

    async fn account_number_sequence(&self, address: &str) -> RelayerResult<AccountInfo> {
        let response: proto::QueryAccountResponse = self
            .abci_query(
                "account",
                proto::QUERY_PATH_ACCOUNT,
                &proto::QueryAccountRequest {
                    address: address.to_string(),
                },
                None,
            )
            .await?;

        let account = response.account.ok_or_else(|| RelayerError::Query {
            query: "account",
            message: format!("account {} not found", address),
        })?;

        decode_account(&account)
    }
}

#[async_trait]
impl Broadcaster for RpcProvider {
    async fn broadcast_sync(&self, tx_bytes: Vec<u8>) -> RelayerResult<BroadcastResponse> {
        let params = json!({ "tx": BASE64.encode(&tx_bytes) });

        match self
            .request::<BroadcastTxResponse>("broadcast_tx_sync", params)
            .await
        {
            Ok(result) => Ok(BroadcastResponse {
                code: result.code,
                codespace: result.codespace,
                raw_log: result.log,
                hash: result.hash,
            }),
            Err(e) => {
                let message = e.to_string();
                match classify_rpc_error(&message) {
                    Some(code) => Ok(BroadcastResponse::sdk_error(code, message)),
                    None => Err(RelayerError::Transport(message)),
                }
            }
        }
    }
}

/// Map node RPC errors that stand in for a response code
fn classify_rpc_error(message: &str) -> Option<u32> {
    let message = message.to_lowercase();
    if message.contains("tx already exists in cache") {
        Some(CODE_TX_IN_MEMPOOL_CACHE)
    } else if message.contains("mempool is full") {
        Some(CODE_MEMPOOL_IS_FULL)
    } else if message.contains("tx too large") {
        Some(CODE_TX_TOO_LARGE)
    } else {
        None
    }
}

fn parse_base_fee(raw: &str) -> RelayerResult<Option<BigUint>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse::<BigUint>()
        .map(Some)
        .map_err(|e| RelayerError::Query {
            query: "base_fee",
            message: format!("invalid base fee {:?}: {}", raw, e),
        })
}

fn decode_account(account: &Any) -> RelayerResult<AccountInfo> {
    let invalid = |e: prost::DecodeError| RelayerError::Query {
        query: "account",
        message: format!("invalid {}: {}", account.type_url, e),
    };

    let base = match account.type_url.as_str() {
        proto::TYPE_URL_BASE_ACCOUNT => {
            proto::BaseAccount::decode(account.value.as_slice()).map_err(invalid)?
        }
        proto::TYPE_URL_ETH_ACCOUNT => proto::EthAccount::decode(account.value.as_slice())
            .map_err(invalid)?
            .base_account
            .ok_or_else(|| RelayerError::Query {
                query: "account",
                message: "EthAccount without base account".to_string(),
            })?,
        other => {
            return Err(RelayerError::Query {
                query: "account",
                message: format!("unsupported account type {}", other),
            })
        }
    };

    Ok(AccountInfo {
        account_number: base.account_number,
        sequence: base.sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BroadcastOutcome;
    use axum::{routing::post, Json, Router};

    /// Local JSON-RPC endpoint answering every call with `reply` merged into
    /// the response envelope
    async fn rpc_stub(reply: Value) -> String {
        let app = Router::new().route(
            "/",
            post(move |Json(request): Json<Value>| {
                let reply = reply.clone();
                async move {
                    let mut body = json!({ "jsonrpc": "2.0", "id": request["id"] });
                    if let (Some(body), Some(reply)) = (body.as_object_mut(), reply.as_object()) {
                        body.extend(reply.clone());
                    }
                    Json(body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{}", addr)
    }

    /// Address nothing listens on
    async fn dead_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn provider(rpc_urls: Vec<String>) -> RpcProvider {
        RpcProvider::new(ChainConfig {
            chain_id: "evmos_9000-1".to_string(),
            rpc_urls,
            evm_denom: "aevmos".to_string(),
            bech32_prefix: "evmos".to_string(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_rpc_error_becomes_duplicate_pending() {
        let url = rpc_stub(json!({
            "error": {
                "code": -32603,
                "message": "Internal error",
                "data": "tx already exists in cache"
            }
        }))
        .await;

        let response = provider(vec![url]).broadcast_sync(vec![1, 2, 3]).await.unwrap();
        assert_eq!(response.code, CODE_TX_IN_MEMPOOL_CACHE);
        assert_eq!(response.codespace, "sdk");
        assert_eq!(response.outcome(), BroadcastOutcome::DuplicatePending);
    }

    #[tokio::test]
    async fn test_broadcast_result_is_passed_through() {
        let url = rpc_stub(json!({
            "result": {
                "code": 32,
                "data": "",
                "log": "account sequence mismatch, expected 8, got 7",
                "codespace": "sdk",
                "hash": "ABCD"
            }
        }))
        .await;

        let response = provider(vec![url]).broadcast_sync(vec![1]).await.unwrap();
        assert_eq!(response.outcome(), BroadcastOutcome::SequenceMismatch);
        assert_eq!(response.hash, "ABCD");
        assert!(response.raw_log.contains("expected 8"));
    }

    #[tokio::test]
    async fn test_broadcast_fails_over_to_next_endpoint() {
        let live = rpc_stub(json!({
            "result": { "code": 0, "log": "", "codespace": "", "hash": "EF01" }
        }))
        .await;

        let provider = provider(vec![dead_endpoint().await, live]);
        let response = provider.broadcast_sync(vec![1]).await.unwrap();
        assert_eq!(response.outcome(), BroadcastOutcome::Accepted);
        assert_eq!(response.hash, "EF01");
    }

    #[tokio::test]
    async fn test_broadcast_unreachable_is_transport_error() {
        let provider = provider(vec![dead_endpoint().await]);
        let err = provider.broadcast_sync(vec![1]).await.unwrap_err();
        assert!(matches!(err, RelayerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_account_query_over_rpc() {
        let account = proto::QueryAccountResponse {
            account: Some(Any::pack(
                proto::TYPE_URL_BASE_ACCOUNT,
                &proto::BaseAccount {
                    address: "evmos1payer".to_string(),
                    pub_key: None,
                    account_number: 2,
                    sequence: 7,
                },
            )),
        };
        let url = rpc_stub(json!({
            "result": {
                "response": {
                    "code": 0,
                    "log": "",
                    "codespace": "",
                    "value": BASE64.encode(account.encode_to_vec())
                }
            }
        }))
        .await;

        let info = provider(vec![url])
            .account_number_sequence("evmos1payer")
            .await
            .unwrap();
        assert_eq!(
            info,
            AccountInfo {
                account_number: 2,
                sequence: 7
            }
        );
    }

    #[test]
    fn test_rpc_error_normalization() {
        assert_eq!(
            classify_rpc_error("(code: -32603, message: Internal error, data: Some(String(\"tx already exists in cache\")))"),
            Some(CODE_TX_IN_MEMPOOL_CACHE)
        );
        assert_eq!(
            classify_rpc_error("mempool is full: number of txs 5000"),
            Some(CODE_MEMPOOL_IS_FULL)
        );
        assert_eq!(classify_rpc_error("Tx too large. Max size is 1048576"), Some(CODE_TX_TOO_LARGE));
        assert_eq!(classify_rpc_error("connection refused"), None);
    }

    #[test]
    fn test_parse_base_fee() {
        assert_eq!(parse_base_fee("").unwrap(), None);
        assert_eq!(parse_base_fee("123").unwrap(), Some(BigUint::from(123u32)));
        assert!(parse_base_fee("-1").is_err());
        assert!(parse_base_fee("1.5").is_err());
    }

    #[test]
    fn test_decode_eth_account() {
        let base = proto::BaseAccount {
            address: "evmos1xyz".to_string(),
            pub_key: None,
            account_number: 2,
            sequence: 7,
        };
        let eth = proto::EthAccount {
            base_account: Some(base.clone()),
            code_hash: String::new(),
        };

        let info = decode_account(&Any::pack(proto::TYPE_URL_ETH_ACCOUNT, &eth)).unwrap();
        assert_eq!(
            info,
            AccountInfo {
                account_number: 2,
                sequence: 7
            }
        );

        let info = decode_account(&Any::pack(proto::TYPE_URL_BASE_ACCOUNT, &base)).unwrap();
        assert_eq!(info.sequence, 7);

        let unknown = Any {
            type_url: "/cosmos.vesting.v1beta1.DelayedVestingAccount".to_string(),
            value: Vec::new(),
        };
        assert!(decode_account(&unknown).is_err());
    }

    #[test]
    fn test_new_rejects_no_endpoints() {
        let config = ChainConfig {
            chain_id: "evmos_9000-1".to_string(),
            rpc_urls: vec!["not a url".to_string()],
            evm_denom: "aevmos".to_string(),
            bech32_prefix: "evmos".to_string(),
        };
        assert!(RpcProvider::new(config).is_err());
    }
}
