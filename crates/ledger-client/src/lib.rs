use serde::{
    Deserialize,
    Serialize,
};
use std::future::Future;
use url::Url;

mod classify;

/// Seam between the lookup pipeline and the ledger RPC.
///
/// The coordinator is generic over this trait so tests can substitute a
/// scripted ledger without a running RPC endpoint.
pub trait Ledger: Send + Sync + 'static {
    /// Fetches the raw block stored at `block_number`.
    fn fetch_block(
        &self,
        block_number: u64,
    ) -> impl Future<Output = Result<RawBlock, LedgerError>> + Send;
}

/// A client for the Solana JSON-RPC `getBlock` endpoint.
///
/// Owns its HTTP connection pool; construct it once at startup and share it
/// across lookups.
///
/// ``` no_run
/// use blockmeter_ledger_client::SolanaLedgerClient;
///
/// #[tokio::main]
/// async fn main() {
///     let client =
///         SolanaLedgerClient::new("https://api.mainnet-beta.solana.com", "confirmed").unwrap();
///     let block = client.get_block(359399609).await.unwrap();
///     println!("{} transactions", block.transactions.len());
/// }
/// ```
#[derive(Debug)]
pub struct SolanaLedgerClient {
    client: reqwest::Client,
    rpc_url: Url,
    commitment: String,
    request_id: std::sync::atomic::AtomicU64,
}

/// Failure modes of a ledger fetch, classified at the collaborator boundary.
///
/// Callers match on variants; the upstream message survives verbatim inside
/// `Rpc` so operators can diagnose the root cause.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("block not found")]
    NotFound,
    #[error("ledger RPC error code {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("HTTP client error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<T> {
    jsonrpc: String,
    method: String,
    params: T,
    id: u64,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    id: u64,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Configuration object passed as the second `getBlock` parameter.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetBlockConfig<'a> {
    max_supported_transaction_version: u8,
    commitment: &'a str,
}

/// Raw block payload as returned by `getBlock`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub blockhash: String,
    #[serde(default)]
    pub previous_blockhash: String,
    #[serde(default)]
    pub parent_slot: u64,
    /// Opaque transaction entries; the pipeline only needs their count.
    #[serde(default)]
    pub transactions: Vec<serde_json::Value>,
    /// Estimated production time as a unix timestamp; null on old blocks.
    #[serde(default)]
    pub block_time: Option<i64>,
}

impl SolanaLedgerClient {
    /// Create a new ledger client against `rpc_url`.
    pub fn new(rpc_url: &str, commitment: impl Into<String>) -> Result<Self, LedgerError> {
        let rpc_url = Url::parse(rpc_url)?;
        let client = reqwest::Client::builder().use_rustls_tls().build()?;

        Ok(Self {
            client,
            rpc_url,
            commitment: commitment.into(),
            request_id: std::sync::atomic::AtomicU64::new(1),
        })
    }

    /// Get next request ID
    fn next_request_id(&self) -> u64 {
        self.request_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }

    /// Make a JSON-RPC request.
    ///
    /// Returns `Ok(None)` when the server answered with a null `result`,
    /// which `getBlock` uses for slots it holds no block for.
    async fn make_request<P, R>(&self, method: &str, params: P) -> Result<Option<R>, LedgerError>
    where
        P: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let request_id = self.next_request_id();
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: request_id,
        };

        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LedgerError::InvalidResponse(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let response_body: JsonRpcResponse<R> = response.json().await?;

        // Validate JSON-RPC 2.0 compliance
        if response_body.jsonrpc != "2.0" {
            return Err(LedgerError::InvalidResponse(format!(
                "Invalid JSON-RPC version: expected '2.0', got '{}'",
                response_body.jsonrpc
            )));
        }

        if response_body.id != request_id {
            return Err(LedgerError::InvalidResponse(format!(
                "Request/response ID mismatch: expected {}, got {}",
                request_id, response_body.id
            )));
        }

        if let Some(error) = response_body.error {
            return Err(classify::classify_rpc_error(error.code, error.message));
        }

        Ok(response_body.result)
    }

    /// Fetch the block stored at `block_number` from the ledger.
    pub async fn get_block(&self, block_number: u64) -> Result<RawBlock, LedgerError> {
        let config = GetBlockConfig {
            max_supported_transaction_version: 0,
            commitment: &self.commitment,
        };

        match self.make_request("getBlock", (block_number, config)).await {
            Ok(Some(block)) => Ok(block),
            Ok(None) => Err(LedgerError::NotFound),
            Err(err) => {
                tracing::debug!(block_number, error = %err, "getBlock request failed");
                Err(err)
            }
        }
    }
}

impl Ledger for SolanaLedgerClient {
    fn fetch_block(
        &self,
        block_number: u64,
    ) -> impl Future<Output = Result<RawBlock, LedgerError>> + Send {
        self.get_block(block_number)
    }
}
