//! Thin HTTP surface over the block service.

use crate::{
    service::{
        BlockService,
        LookupError,
    },
    types::BlockRecord,
};
use axum::{
    Json,
    Router,
    extract::{
        Path,
        State,
    },
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
    routing::get,
};
use blockmeter_ledger_client::Ledger;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

impl IntoResponse for LookupError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Ledger { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn get_block<L: Ledger>(
    State(service): State<BlockService<L>>,
    Path(block_number): Path<u64>,
) -> Result<Json<BlockRecord>, LookupError> {
    service.lookup_block(block_number).await.map(Json)
}

async fn health() -> &'static str {
    "OK"
}

/// Routes: `GET /blocks/{block_number}` and `GET /health`.
///
/// A non-numeric or negative path parameter is rejected with a 400 before
/// the service runs.
pub fn router<L: Ledger>(service: BlockService<L>) -> Router {
    Router::new()
        .route("/blocks/{block_number}", get(get_block::<L>))
        .route("/health", get(health))
        .with_state(service)
}

/// Serves the API on `listener` until `cancel` fires.
pub async fn serve<L: Ledger>(
    listener: TcpListener,
    service: BlockService<L>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    info!(local_addr = ?listener.local_addr().ok(), "API server starting");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{
            BlockCache,
            MemoryTier,
        },
        persist::{
            JobOptions,
            PersistQueue,
        },
    };
    use blockmeter_ledger_client::{
        LedgerError,
        RawBlock,
    };
    use std::{
        future::Future,
        sync::Arc,
        time::Duration,
    };

    #[derive(Debug)]
    struct StaticLedger {
        result: Result<RawBlock, LedgerError>,
    }

    impl Ledger for StaticLedger {
        fn fetch_block(
            &self,
            _block_number: u64,
        ) -> impl Future<Output = Result<RawBlock, LedgerError>> + Send {
            let result = match &self.result {
                Ok(raw) => Ok(raw.clone()),
                Err(LedgerError::NotFound) => Err(LedgerError::NotFound),
                Err(other) => Err(LedgerError::Rpc {
                    code: -32005,
                    message: other.to_string(),
                }),
            };
            async move { result }
        }
    }

    async fn spawn_server(result: Result<RawBlock, LedgerError>) -> String {
        let cache = BlockCache::new(
            vec![Arc::new(MemoryTier::new(100))],
            Duration::from_secs(600),
        );
        let (queue, _rx) = PersistQueue::new(JobOptions::default());
        let service = BlockService::new(StaticLedger { result }, cache, queue);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            serve(listener, service, CancellationToken::new())
                .await
                .unwrap();
        });

        format!("http://{addr}")
    }

    fn raw_block() -> RawBlock {
        RawBlock {
            blockhash: "7SnecFadW1NizZ7eysE94xQ5uXAdE32PiaXiaWhr2efb".to_string(),
            previous_blockhash: String::new(),
            parent_slot: 0,
            transactions: vec![serde_json::Value::Null; 3],
            block_time: Some(1754938644),
        }
    }

    #[tokio::test]
    async fn get_block_returns_record_json() {
        let base_url = spawn_server(Ok(raw_block())).await;

        let response = reqwest::get(format!("{base_url}/blocks/42")).await.unwrap();
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["blockNumber"], 42);
        assert_eq!(body["transactionCount"], 3);
        assert_eq!(
            body["blockhash"],
            "7SnecFadW1NizZ7eysE94xQ5uXAdE32PiaXiaWhr2efb"
        );
        assert_eq!(body["timestamp"], 1754938644);
    }

    #[tokio::test]
    async fn missing_block_is_404() {
        let base_url = spawn_server(Err(LedgerError::NotFound)).await;

        let response = reqwest::get(format!("{base_url}/blocks/42")).await.unwrap();
        assert_eq!(response.status(), 404);

        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("42"));
    }

    #[tokio::test]
    async fn ledger_failure_is_500_with_upstream_message() {
        let base_url = spawn_server(Err(LedgerError::Rpc {
            code: -32005,
            message: "Node is behind by 150 slots".to_string(),
        }))
        .await;

        let response = reqwest::get(format!("{base_url}/blocks/42")).await.unwrap();
        assert_eq!(response.status(), 500);

        let body: serde_json::Value = response.json().await.unwrap();
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .contains("Node is behind by 150 slots")
        );
    }

    #[tokio::test]
    async fn malformed_block_number_is_400() {
        let base_url = spawn_server(Ok(raw_block())).await;

        for path in ["/blocks/not-a-number", "/blocks/-1"] {
            let response = reqwest::get(format!("{base_url}{path}")).await.unwrap();
            assert_eq!(response.status(), 400, "path {path}");
        }
    }

    #[tokio::test]
    async fn health_endpoint() {
        let base_url = spawn_server(Ok(raw_block())).await;

        let response = reqwest::get(format!("{base_url}/health")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "OK");
    }
}
