//! JSON-RPC stock ledger client
//!
//! Implements `StockLedgerService` over the inventory module's JSON routes:
//!
//! | Operation         | Route                                              |
//! |-------------------|----------------------------------------------------|
//! | `list_positions`  | `/mobile_inventory/get_quants`                     |
//! | `set_count`       | `/mobile_inventory/set_quantity`                   |
//! | `apply_all`       | `/mobile_inventory/apply_all`                      |
//! | `list_locations`  | `/mobile_inventory/get_locations`                  |
//! | `create_position` | `/mobile_inventory/create_quant`                   |
//! | `search_products` | `/web/dataset/call_kw/product.product/search_read` |
//!
//! Every route takes a JSON-RPC 2.0 `call` envelope. Authentication is the
//! host's concern: a session cookie can be supplied with `with_session`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, COOKIE};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, warn};

use tally_domain::{
    ApplyScope, Location, LocationId, PageRequest, PositionFilter, PositionId, Product, ProductId,
};
use tally_ledger::{CountReceipt, LedgerError, LedgerResult, PositionPage, StockLedgerService};

use crate::wire::{
    RpcRequest, RpcResponse, WireCountReceipt, WireCreated, WireLocation, WireProduct,
    WireQuantPage,
};

// =============================================================================
// Constants
// =============================================================================

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const GET_QUANTS: &str = "/mobile_inventory/get_quants";
const SET_QUANTITY: &str = "/mobile_inventory/set_quantity";
const APPLY_ALL: &str = "/mobile_inventory/apply_all";
const GET_LOCATIONS: &str = "/mobile_inventory/get_locations";
const CREATE_QUANT: &str = "/mobile_inventory/create_quant";
const PRODUCT_SEARCH: &str = "/web/dataset/call_kw/product.product/search_read";

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the remote stock ledger.
pub struct HttpLedgerClient {
    /// HTTP client
    client: Client,
    /// Server base URL, without trailing slash
    base_url: String,
    /// Per-request timeout
    timeout: Duration,
    /// Session cookie forwarded on every request
    session: Option<HeaderValue>,
    /// JSON-RPC request id counter
    next_id: AtomicU64,
}

impl HttpLedgerClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Forward a `session_id` cookie on every request.
    pub fn with_session(mut self, session_id: &str) -> LedgerResult<Self> {
        let cookie = HeaderValue::from_str(&format!("session_id={}", session_id))
            .map_err(|e| LedgerError::Transport(format!("invalid session id: {}", e)))?;
        self.session = Some(cookie);
        Ok(self)
    }

    /// Server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON-RPC call and decode its result.
    async fn call<P, T>(&self, route: &str, params: P) -> LedgerResult<T>
    where
        P: Serialize + Send,
        T: DeserializeOwned + Send,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}{}", self.base_url, route);
        debug!(route, rpc_id = id, "Ledger call");

        let mut request = self.client.post(&url).json(&RpcRequest::call(id, params));
        if let Some(cookie) = &self.session {
            request = request.header(COOKIE, cookie.clone());
        }

        let response = timeout(self.timeout, request.send())
            .await
            .map_err(|_| LedgerError::Timeout(self.timeout))?
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        let body = timeout(self.timeout, response.text())
            .await
            .map_err(|_| LedgerError::Timeout(self.timeout))?
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(route, %status, "Ledger call failed");
            // Error envelopes are also sent with non-2xx statuses
            if let Ok(envelope) = serde_json::from_str::<RpcResponse>(&body) {
                if let Some(error) = envelope.error {
                    return Err(LedgerError::remote(error.message()));
                }
            }
            return Err(LedgerError::remote(format!("HTTP {}", status)));
        }

        let envelope: RpcResponse =
            serde_json::from_str(&body).map_err(|e| LedgerError::Decode(e.to_string()))?;
        let result = envelope.into_result()?;
        serde_json::from_value(result).map_err(|e| LedgerError::Decode(format!("{}: {}", route, e)))
    }
}

#[async_trait]
impl StockLedgerService for HttpLedgerClient {
    async fn list_positions(
        &self,
        filter: &PositionFilter,
        page: PageRequest,
    ) -> LedgerResult<PositionPage> {
        let params = json!({
            "location_id": filter.location_id,
            "search": filter.search.clone().unwrap_or_default(),
            "offset": page.offset,
            "limit": page.limit,
        });
        let wire: WireQuantPage = self.call(GET_QUANTS, params).await?;

        let positions = wire
            .quants
            .into_iter()
            .map(|q| q.into_position())
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(PositionPage {
            positions,
            total: wire.total,
        })
    }

    async fn list_locations(&self) -> LedgerResult<Vec<Location>> {
        let wire: Vec<WireLocation> = self.call(GET_LOCATIONS, json!({})).await?;
        Ok(wire.into_iter().map(Location::from).collect())
    }

    async fn search_products(&self, query: &str, limit: usize) -> LedgerResult<Vec<Product>> {
        let params = json!({
            "model": "product.product",
            "method": "search_read",
            "args": [],
            "kwargs": {
                "domain": [["active", "=", true], ["name", "ilike", query]],
                "fields": ["id", "display_name", "default_code"],
                "limit": limit,
            },
        });
        let wire: Vec<WireProduct> = self.call(PRODUCT_SEARCH, params).await?;
        Ok(wire.into_iter().map(Product::from).collect())
    }

    async fn set_count(&self, id: PositionId, quantity: Decimal) -> LedgerResult<CountReceipt> {
        let params = json!({ "quant_id": id, "quantity": quantity });
        let wire: WireCountReceipt = self.call(SET_QUANTITY, params).await?;
        wire.into_receipt()
    }

    async fn apply_all(&self, scope: ApplyScope) -> LedgerResult<()> {
        let params = json!({ "location_id": scope.location_id });
        let _: Value = self.call(APPLY_ALL, params).await?;
        Ok(())
    }

    async fn create_position(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        quantity: Decimal,
    ) -> LedgerResult<PositionId> {
        let params = json!({
            "product_id": product_id,
            "location_id": location_id,
            "quantity": quantity,
        });
        let wire: WireCreated = self.call(CREATE_QUANT, params).await?;
        Ok(wire.quant_id)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Json;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use rust_decimal_macros::dec;

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn ok(result: Value) -> Json<Value> {
        Json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
    }

    #[tokio::test]
    async fn test_list_positions_normalises_quants() {
        let router = Router::new().route(
            GET_QUANTS,
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["jsonrpc"], "2.0");
                assert_eq!(body["method"], "call");
                assert_eq!(body["params"]["location_id"], 8);
                assert_eq!(body["params"]["limit"], 2);
                ok(json!({
                    "quants": [{
                        "id": 1,
                        "product_id": [42, "Office Chair"],
                        "location_id": [8, "WH/Stock"],
                        "lot_id": false,
                        "product_uom_id": [1, "Units"],
                        "quantity": 10.0,
                        "inventory_quantity": 0.0,
                        "inventory_quantity_set": false
                    }],
                    "total": 3
                }))
            }),
        );
        let client = HttpLedgerClient::new(serve(router).await);

        let page = client
            .list_positions(&PositionFilter::at_location(Some(8)), PageRequest::first(2))
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.positions.len(), 1);
        assert_eq!(page.positions[0].product_name, "Office Chair");
        assert_eq!(page.positions[0].expected_quantity, dec!(10));
    }

    #[tokio::test]
    async fn test_set_count_receipt() {
        let router = Router::new().route(
            SET_QUANTITY,
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["params"]["quant_id"], 5);
                ok(json!({
                    "success": true,
                    "inventory_quantity": 7.0,
                    "inventory_diff_quantity": 2.0
                }))
            }),
        );
        let client = HttpLedgerClient::new(serve(router).await);

        let receipt = client.set_count(5, dec!(7)).await.unwrap();
        assert_eq!(receipt.quantity, dec!(7));
        assert_eq!(receipt.diff_quantity, dec!(2));
    }

    #[tokio::test]
    async fn test_result_level_failure_is_remote_error() {
        let router = Router::new().route(
            APPLY_ALL,
            post(|| async { ok(json!({ "success": false, "error": "Quants are locked" })) }),
        );
        let client = HttpLedgerClient::new(serve(router).await);

        let err = client.apply_all(ApplyScope::default()).await.unwrap_err();
        assert_eq!(err, LedgerError::remote("Quants are locked"));
    }

    #[tokio::test]
    async fn test_rpc_error_prefers_data_message() {
        let router = Router::new().route(
            CREATE_QUANT,
            post(|| async {
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {
                        "code": 200,
                        "message": "Odoo Server Error",
                        "data": { "message": "You are not allowed to modify quants" }
                    }
                }))
            }),
        );
        let client = HttpLedgerClient::new(serve(router).await);

        let err = client.create_position(1, 2, dec!(3)).await.unwrap_err();
        assert_eq!(err.message(), "You are not allowed to modify quants");
    }

    #[tokio::test]
    async fn test_http_status_failure() {
        let router = Router::new().route(
            GET_LOCATIONS,
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let client = HttpLedgerClient::new(serve(router).await);

        let err = client.list_locations().await.unwrap_err();
        assert_eq!(err, LedgerError::remote("HTTP 500 Internal Server Error"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let router = Router::new().route(
            GET_LOCATIONS,
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                ok(json!([]))
            }),
        );
        let client =
            HttpLedgerClient::new(serve(router).await).with_timeout(Duration::from_millis(50));

        let err = client.list_locations().await.unwrap_err();
        assert_eq!(err, LedgerError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_search_products_and_locations() {
        let router = Router::new()
            .route(
                PRODUCT_SEARCH,
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["params"]["kwargs"]["limit"], 10);
                    assert_eq!(body["params"]["kwargs"]["domain"][1][2], "lamp");
                    ok(json!([
                        { "id": 5, "display_name": "Desk Lamp", "default_code": false },
                        { "id": 6, "display_name": "Floor Lamp", "default_code": "LMP-6" }
                    ]))
                }),
            )
            .route(
                GET_LOCATIONS,
                post(|| async { ok(json!([{ "id": 8, "name": "WH/Stock" }])) }),
            );
        let client = HttpLedgerClient::new(serve(router).await);

        let products = client.search_products("lamp", 10).await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].code, None);
        assert_eq!(products[1].code.as_deref(), Some("LMP-6"));

        let locations = client.list_locations().await.unwrap();
        assert_eq!(locations, vec![Location::new(8, "WH/Stock")]);
    }

    #[test]
    fn test_base_url_trims_slash() {
        let client = HttpLedgerClient::new("http://odoo.local/");
        assert_eq!(client.base_url(), "http://odoo.local");
    }
}
