//! # JSON-RPC + WebSocket API
//!
//! Builds the axum router that exposes the vault. All endpoints share
//! application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                 | Description                          |
//! |--------|----------------------|--------------------------------------|
//! | GET    | `/health`            | Liveness probe                       |
//! | GET    | `/status`            | Vault status summary                 |
//! | POST   | `/rpc`               | JSON-RPC 2.0 gateway (`vault_*`)     |
//! | GET    | `/ws`                | WebSocket stream of vault events     |
//! | GET    | `/accounts/:address` | Shares, balances and roles of one id |
//!
//! ## Calls
//!
//! Every vault operation is a JSON-RPC method taking one params object.
//! Mutating methods name their caller in `params.from`; the node does not
//! authenticate it. Amounts are 256-bit integers encoded as `0x` hex
//! strings. A rejected call returns error code `-32010` with the stable
//! error kind in `error.data.kind`.

use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::{Address, U256};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bridgepool_vault::config::PROTOCOL_VERSION;
use bridgepool_vault::{
    AssetId, Bank, DebtPosting, L2Address, MemoryBank, Role, SettlementPayload, Vault, VaultError,
    VaultEvent, VaultResult,
};

use crate::config::NodeConfig;
use crate::metrics::SharedMetrics;
use crate::store::VaultStore;

/// JSON-RPC error code for a call the vault rejected.
pub const VAULT_ERROR_CODE: i32 = -32010;

/// Upper bound on events returned by one `vault_events` call.
const MAX_EVENTS_PER_CALL: usize = 1_000;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// The vault as hosted by the node. One lock serializes every call.
pub type SharedVault = Arc<Mutex<Vault<MemoryBank>>>;

/// Shared application state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub vault: SharedVault,
    pub store: VaultStore,
    pub event_tx: broadcast::Sender<StreamEvent>,
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(
        vault: Vault<MemoryBank>,
        store: VaultStore,
        metrics: SharedMetrics,
        event_capacity: usize,
    ) -> Self {
        metrics.observe(&vault);
        let (event_tx, _) = broadcast::channel(event_capacity);
        Self {
            version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
            vault: Arc::new(Mutex::new(vault)),
            store,
            event_tx,
            metrics,
        }
    }
}

/// A vault event with its position in the persisted log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    pub seq: u64,
    pub event: VaultEvent,
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// Restores the vault from `store`, or creates it from `config` and commits
/// the genesis snapshot. Idempotent.
pub fn load_or_genesis(config: &NodeConfig, store: &VaultStore) -> anyhow::Result<Vault<MemoryBank>> {
    if let Some(vault) = store.load::<MemoryBank>()? {
        tracing::info!(
            vault = %vault.address(),
            nonce = vault.last_settled_nonce(),
            block = vault.last_processed_block(),
            "vault restored from snapshot"
        );
        return Ok(vault);
    }

    let bank = config.genesis_bank()?;
    let mut vault = Vault::new(config.vault.clone(), config.admin, bank)?;
    let events = vault.drain_events();
    store.commit(&vault, &events)?;
    tracing::info!(
        vault = %vault.address(),
        asset = %vault.asset(),
        allocations = config.genesis.len(),
        "genesis vault created"
    );
    Ok(vault)
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .route("/accounts/:address", get(account_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Why a call produced no result.
#[derive(Debug)]
enum RpcFailure {
    MethodNotFound(String),
    InvalidParams(String),
    Vault(VaultError),
    Internal(String),
}

impl RpcFailure {
    fn into_error(self) -> JsonRpcError {
        match self {
            RpcFailure::MethodNotFound(method) => JsonRpcError {
                code: -32601,
                message: format!("Method not found: {method}"),
                data: None,
            },
            RpcFailure::InvalidParams(msg) => JsonRpcError {
                code: -32602,
                message: format!("Invalid params: {msg}"),
                data: None,
            },
            RpcFailure::Vault(err) => JsonRpcError {
                code: VAULT_ERROR_CODE,
                message: err.to_string(),
                data: Some(serde_json::json!({ "kind": err.kind() })),
            },
            RpcFailure::Internal(msg) => JsonRpcError {
                code: -32603,
                message: format!("Internal error: {msg}"),
                data: None,
            },
        }
    }
}

impl From<VaultError> for RpcFailure {
    fn from(err: VaultError) -> Self {
        RpcFailure::Vault(err)
    }
}

/// Named call parameters.
struct Params(serde_json::Map<String, Value>);

impl Params {
    /// Accepts an object, a one-element array holding an object, or nothing.
    fn parse(raw: Option<Value>) -> Result<Self, RpcFailure> {
        match raw {
            None | Some(Value::Null) => Ok(Params(serde_json::Map::new())),
            Some(Value::Object(map)) => Ok(Params(map)),
            Some(Value::Array(mut items)) if items.len() == 1 => match items.pop() {
                Some(Value::Object(map)) => Ok(Params(map)),
                _ => Err(RpcFailure::InvalidParams("expected a params object".into())),
            },
            Some(_) => Err(RpcFailure::InvalidParams("expected a params object".into())),
        }
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, RpcFailure> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| RpcFailure::InvalidParams(format!("missing field `{key}`")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| RpcFailure::InvalidParams(format!("field `{key}`: {e}")))
    }

    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, RpcFailure> {
        if self.0.contains_key(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    fn caller(&self) -> Result<Address, RpcFailure> {
        self.get("from")
    }

    fn amount(&self, key: &str) -> Result<U256, RpcFailure> {
        self.get(key)
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status` and `vault_state`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: String,
    pub vault: Address,
    pub asset: AssetId,
    pub share_name: String,
    pub share_symbol: String,
    pub paused: bool,
    pub liquid_balance: U256,
    pub pending_debt: U256,
    pub total_assets: U256,
    pub total_shares: U256,
    pub last_settled_nonce: u64,
    pub last_processed_block: u64,
    pub event_count: u64,
    pub timestamp: String,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub address: Address,
    pub shares: U256,
    /// Underlying balance held outside the vault.
    pub underlying: U256,
    pub max_withdraw: U256,
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    match status(&state) {
        Ok(resp) => (StatusCode::OK, Json(serde_json::json!(resp))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!(ErrorResponse {
                error: format!("store error: {e}")
            })),
        )
            .into_response(),
    }
}

fn status(state: &AppState) -> Result<StatusResponse, crate::store::StoreError> {
    let event_count = state.store.event_count()?;
    let vault = state.vault.lock();
    Ok(StatusResponse {
        version: state.version.clone(),
        vault: vault.address(),
        asset: vault.asset(),
        share_name: vault.share_name().to_string(),
        share_symbol: vault.share_symbol().to_string(),
        paused: vault.paused(),
        liquid_balance: vault.liquid_balance(),
        pending_debt: vault.pending_debt(),
        total_assets: vault.total_assets(),
        total_shares: vault.total_shares(),
        last_settled_nonce: vault.last_settled_nonce(),
        last_processed_block: vault.last_processed_block(),
        event_count,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /accounts/:address`
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let address: Address = match address.parse() {
        Ok(a) => a,
        Err(e) => {
            let err = ErrorResponse {
                error: format!("invalid address {address}: {e}"),
            };
            return (StatusCode::BAD_REQUEST, Json(serde_json::json!(err))).into_response();
        }
    };

    let vault = state.vault.lock();
    let max_withdraw = match vault.max_withdraw(address) {
        Ok(v) => v,
        Err(e) => {
            let err = ErrorResponse {
                error: e.to_string(),
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!(err)))
                .into_response();
        }
    };
    let account = AccountResponse {
        address,
        shares: vault.balance_of(address),
        underlying: vault.bank().balance_of(vault.asset(), address),
        max_withdraw,
        roles: vault.roles().roles_of(address),
    };
    (StatusCode::OK, Json(serde_json::json!(account))).into_response()
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
async fn rpc_handler(State(state): State<AppState>, Json(req): Json<JsonRpcRequest>) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code: -32600,
                message: "Invalid Request: jsonrpc must be \"2.0\"".into(),
                data: None,
            }),
            id: req.id,
        });
    }

    let call_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("rpc", %call_id, method = %req.method);
    let _entered = span.enter();

    let started = Instant::now();
    let outcome = Params::parse(req.params).and_then(|params| dispatch(&state, &req.method, &params));
    state
        .metrics
        .call_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    let label = if matches!(outcome, Err(RpcFailure::MethodNotFound(_))) {
        "unknown"
    } else {
        req.method.as_str()
    };
    state.metrics.calls_total.with_label_values(&[label]).inc();

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(failure) => {
            if let RpcFailure::Vault(err) = &failure {
                state
                    .metrics
                    .rejections_total
                    .with_label_values(&[err.kind()])
                    .inc();
                tracing::debug!(kind = err.kind(), error = %err, "call rejected");
            }
            (None, Some(failure.into_error()))
        }
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

/// Routes one call to the vault.
fn dispatch(state: &AppState, method: &str, p: &Params) -> Result<Value, RpcFailure> {
    match method {
        // -- LP operations --------------------------------------------------
        "vault_deposit" => {
            let (from, assets, receiver) = (p.caller()?, p.amount("assets")?, p.get("receiver")?);
            mutate(state, |v| v.deposit(from, assets, receiver))
        }
        "vault_mint" => {
            let (from, shares, receiver) = (p.caller()?, p.amount("shares")?, p.get("receiver")?);
            mutate(state, |v| v.mint(from, shares, receiver))
        }
        "vault_withdraw" => {
            let (from, assets) = (p.caller()?, p.amount("assets")?);
            let (receiver, owner) = (p.get("receiver")?, p.get_or("owner", from)?);
            mutate(state, |v| v.withdraw(from, assets, receiver, owner))
        }
        "vault_redeem" => {
            let (from, shares) = (p.caller()?, p.amount("shares")?);
            let (receiver, owner) = (p.get("receiver")?, p.get_or("owner", from)?);
            mutate(state, |v| v.redeem(from, shares, receiver, owner))
        }

        // -- Share token ----------------------------------------------------
        "vault_transfer" => {
            let (from, to, shares) = (p.caller()?, p.get("to")?, p.amount("shares")?);
            mutate(state, |v| v.transfer(from, to, shares))
        }
        "vault_approve" => {
            let (from, spender, shares) = (p.caller()?, p.get("spender")?, p.amount("shares")?);
            mutate(state, |v| v.approve(from, spender, shares))
        }
        "vault_transferFrom" => {
            let (from, owner) = (p.caller()?, p.get("owner")?);
            let (to, shares) = (p.get("to")?, p.amount("shares")?);
            mutate(state, |v| v.transfer_from(from, owner, to, shares))
        }

        // -- Settlement -----------------------------------------------------
        "vault_handleBridgeUsers" => {
            let (from, postings): (Address, Vec<DebtPosting>) = (p.caller()?, p.get("postings")?);
            mutate(state, |v| v.handle_bridge_users(from, &postings))
        }
        "vault_handleBridgeUsersManually" => {
            let (from, postings): (Address, Vec<DebtPosting>) = (p.caller()?, p.get("postings")?);
            mutate(state, |v| v.handle_bridge_users_manually(from, &postings))
        }
        "vault_executeBatch" => {
            let (from, payload): (Address, SettlementPayload) = (p.caller()?, p.get("payload")?);
            mutate(state, |v| v.execute_batch(from, &payload))
        }

        // -- Pause, roles, maintenance --------------------------------------
        "vault_pause" => {
            let from = p.caller()?;
            mutate(state, |v| v.pause(from))
        }
        "vault_unpause" => {
            let from = p.caller()?;
            mutate(state, |v| v.unpause(from))
        }
        "vault_grantRole" => {
            let (from, role, account) = (p.caller()?, p.get("role")?, p.get("account")?);
            mutate(state, |v| v.grant_role(from, role, account))
        }
        "vault_revokeRole" => {
            let (from, role, account) = (p.caller()?, p.get("role")?, p.get("account")?);
            mutate(state, |v| v.revoke_role(from, role, account))
        }
        "vault_renounceRole" => {
            let (from, role) = (p.caller()?, p.get("role")?);
            mutate(state, |v| Ok(v.renounce_role(from, role)))
        }
        "vault_setL2Fw" => {
            let (from, l2_fw): (Address, L2Address) = (p.caller()?, p.get("l2Fw")?);
            mutate(state, |v| v.set_l2_fw(from, l2_fw))
        }
        "vault_harvestErc20" => {
            let (from, token) = (p.caller()?, p.get("token")?);
            mutate(state, |v| v.harvest_erc20(from, token))
        }
        "vault_harvestEth" => {
            let from = p.caller()?;
            mutate(state, |v| v.harvest_eth(from))
        }

        // -- Reads ----------------------------------------------------------
        "vault_state" => to_value(status(state).map_err(|e| RpcFailure::Internal(e.to_string()))?),
        "vault_totalAssets" => read(state, |v| Ok(v.total_assets())),
        "vault_balanceOf" => {
            let holder = p.get("holder")?;
            read(state, |v| Ok(v.balance_of(holder)))
        }
        "vault_allowance" => {
            let (owner, spender) = (p.get("owner")?, p.get("spender")?);
            read(state, |v| Ok(v.allowance(owner, spender)))
        }
        "vault_convertToShares" => {
            let assets = p.amount("assets")?;
            read(state, |v| v.convert_to_shares(assets))
        }
        "vault_convertToAssets" => {
            let shares = p.amount("shares")?;
            read(state, |v| v.convert_to_assets(shares))
        }
        "vault_previewDeposit" => {
            let assets = p.amount("assets")?;
            read(state, |v| v.preview_deposit(assets))
        }
        "vault_previewMint" => {
            let shares = p.amount("shares")?;
            read(state, |v| v.preview_mint(shares))
        }
        "vault_previewWithdraw" => {
            let assets = p.amount("assets")?;
            read(state, |v| v.preview_withdraw(assets))
        }
        "vault_previewRedeem" => {
            let shares = p.amount("shares")?;
            read(state, |v| v.preview_redeem(shares))
        }
        "vault_maxWithdraw" => {
            let owner = p.get("owner")?;
            read(state, |v| v.max_withdraw(owner))
        }
        "vault_maxRedeem" => {
            let owner = p.get("owner")?;
            read(state, |v| Ok(v.max_redeem(owner)))
        }
        "vault_hasRole" => {
            let (role, account) = (p.get("role")?, p.get("account")?);
            read(state, |v| Ok(v.has_role(role, account)))
        }
        "vault_peers" => read(state, |v| Ok(v.peers().clone())),
        "vault_events" => {
            let from = p.get_or("from", 0u64)?;
            let limit = p.get_or("limit", 100usize)?.min(MAX_EVENTS_PER_CALL);
            let events = state
                .store
                .events_from(from, limit)
                .map_err(|e| RpcFailure::Internal(e.to_string()))?;
            let events: Vec<StreamEvent> = events
                .into_iter()
                .map(|(seq, event)| StreamEvent { seq, event })
                .collect();
            to_value(events)
        }
        "vault_version" => to_value(&state.version),

        other => Err(RpcFailure::MethodNotFound(other.to_string())),
    }
}

/// Runs a mutating call under the vault lock, then persists and publishes
/// its events. If persistence fails the in-memory vault is rolled back so
/// memory never runs ahead of disk.
fn mutate<T: Serialize>(
    state: &AppState,
    op: impl FnOnce(&mut Vault<MemoryBank>) -> VaultResult<T>,
) -> Result<Value, RpcFailure> {
    let mut vault = state.vault.lock();
    let before = vault.clone();

    let value = op(&mut *vault)?;
    let events = vault.drain_events();
    let next = match state.store.commit(&*vault, &events) {
        Ok(next) => next,
        Err(e) => {
            tracing::error!(error = %e, "failed to persist vault, rolling back call");
            *vault = before;
            return Err(RpcFailure::Internal(format!("persistence failed: {e}")));
        }
    };
    state.metrics.observe(&*vault);

    let first = next - events.len() as u64;
    for (offset, event) in events.into_iter().enumerate() {
        tracing::debug!(seq = first + offset as u64, event = event.name(), "event");
        // No receivers is fine; the event is already persisted.
        let _ = state.event_tx.send(StreamEvent {
            seq: first + offset as u64,
            event,
        });
    }
    drop(vault);

    to_value(value)
}

fn read<T: Serialize>(
    state: &AppState,
    op: impl FnOnce(&Vault<MemoryBank>) -> VaultResult<T>,
) -> Result<Value, RpcFailure> {
    let vault = state.vault.lock();
    to_value(op(&*vault)?)
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcFailure> {
    serde_json::to_value(value).map_err(|e| RpcFailure::Internal(e.to_string()))
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws`: pushes every [`StreamEvent`] as a JSON text frame. Client
/// messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::utils::parse_ether;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const ADMIN: Address = Address::repeat_byte(0x01);
    const STRANGER: Address = Address::repeat_byte(0x09);

    fn eth(amount: &str) -> U256 {
        parse_ether(amount).unwrap()
    }

    /// Creates a test AppState over a temporary store with the devnet genesis.
    fn test_app_state() -> AppState {
        let store = VaultStore::open_temporary().expect("temp store");
        let config = NodeConfig::devnet().unwrap();
        let vault = load_or_genesis(&config, &store).unwrap();
        let metrics = Arc::new(crate::metrics::VaultMetrics::new().unwrap());
        AppState::new(vault, store, metrics, 16)
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn rpc(router: &Router, method: &str, params: Value) -> Value {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn u256(value: &Value) -> U256 {
        serde_json::from_value(value.clone()).unwrap()
    }

    // -- REST ----------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_genesis_vault() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["paused"], false);
        assert_eq!(body["lastSettledNonce"], 0);
        assert_eq!(u256(&body["totalAssets"]), U256::ZERO);
        // One RoleGranted per deployer role.
        assert_eq!(body["eventCount"], 4);
    }

    #[tokio::test]
    async fn account_endpoint_reports_roles_and_balances() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, &format!("/accounts/{ADMIN}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(u256(&body["underlying"]), eth("1000"));
        assert_eq!(body["roles"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn account_endpoint_rejects_bad_address() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/accounts/not-an-address").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid address"));
    }

    // -- RPC -----------------------------------------------------------------

    #[tokio::test]
    async fn deposit_settle_and_redeem_over_rpc() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let mut events = state.event_tx.subscribe();

        let resp = rpc(
            &router,
            "vault_deposit",
            serde_json::json!({ "from": ADMIN, "assets": eth("50"), "receiver": ADMIN }),
        )
        .await;
        assert_eq!(u256(&resp["result"]), eth("50"));

        let resp = rpc(
            &router,
            "vault_handleBridgeUsers",
            serde_json::json!({
                "from": ADMIN,
                "postings": [
                    { "user": STRANGER, "debt": eth("25"), "nonce": 0, "l2Block": 1 },
                    { "recipient": STRANGER, "amount": eth("25"), "nonce": 1, "l2Block": 2 }
                ]
            }),
        )
        .await;
        assert_eq!(u256(&resp["result"]), eth("50"));

        let resp = rpc(
            &router,
            "vault_executeBatch",
            serde_json::json!({
                "from": ADMIN,
                "payload": { "nonce": 0, "amountUnderlying": eth("50"), "amountLpFees": eth("0.5") }
            }),
        )
        .await;
        assert_eq!(u256(&resp["result"]), eth("50.5"));

        let resp = rpc(&router, "vault_state", Value::Null).await;
        assert_eq!(u256(&resp["result"]["liquidBalance"]), eth("50.5"));
        assert_eq!(resp["result"]["lastProcessedBlock"], 2);

        let resp = rpc(
            &router,
            "vault_redeem",
            serde_json::json!({ "from": ADMIN, "shares": eth("50"), "receiver": STRANGER }),
        )
        .await;
        assert_eq!(u256(&resp["result"]), eth("50.499999999999999999"));

        // Deposit emits Transfer + Deposit; the first streamed event follows genesis.
        let first = events.recv().await.unwrap();
        assert_eq!(first.seq, 4);
        assert_eq!(first.event.name(), "Transfer");

        let vault = state.vault.lock();
        assert_eq!(
            vault.bank().balance_of(vault.asset(), STRANGER),
            eth("100.499999999999999999")
        );
    }

    #[tokio::test]
    async fn rejected_call_returns_kind_and_changes_nothing() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let before = state.vault.lock().clone();

        let resp = rpc(&router, "vault_pause", serde_json::json!({ "from": STRANGER })).await;
        assert_eq!(resp["error"]["code"], VAULT_ERROR_CODE);
        assert_eq!(resp["error"]["data"]["kind"], "Unauthorized");
        assert!(resp.get("result").is_none());

        let resp = rpc(
            &router,
            "vault_executeBatch",
            serde_json::json!({
                "from": ADMIN,
                "payload": { "nonce": 123, "amountUnderlying": eth("1"), "amountLpFees": eth("0.01") }
            }),
        )
        .await;
        assert_eq!(resp["error"]["data"]["kind"], "InvalidBatchNonce");

        assert_eq!(*state.vault.lock(), before);
        assert_eq!(state.store.event_count().unwrap(), 4);
    }

    #[tokio::test]
    async fn reads_do_not_need_a_caller() {
        let router = create_router(test_app_state());
        let resp = rpc(
            &router,
            "vault_hasRole",
            serde_json::json!({ "role": "PROCESS", "account": ADMIN }),
        )
        .await;
        assert_eq!(resp["result"], true);

        let resp = rpc(
            &router,
            "vault_previewDeposit",
            serde_json::json!({ "assets": eth("3") }),
        )
        .await;
        assert_eq!(u256(&resp["result"]), eth("3"));

        let resp = rpc(&router, "vault_events", serde_json::json!({ "limit": 2 })).await;
        assert_eq!(resp["result"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_calls_get_protocol_errors() {
        let router = create_router(test_app_state());

        let resp = rpc(&router, "vault_nope", Value::Null).await;
        assert_eq!(resp["error"]["code"], -32601);

        let resp = rpc(&router, "vault_deposit", serde_json::json!({ "from": ADMIN })).await;
        assert_eq!(resp["error"]["code"], -32602);
        assert!(resp["error"]["message"].as_str().unwrap().contains("assets"));

        let resp = rpc(&router, "vault_pause", serde_json::json!("oops")).await;
        assert_eq!(resp["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn invalid_jsonrpc_version_is_rejected() {
        let router = create_router(test_app_state());
        let body = serde_json::json!({ "jsonrpc": "1.0", "method": "vault_version", "id": 7 });
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], -32600);
        assert_eq!(json["id"], 7);
    }

    #[tokio::test]
    async fn genesis_is_idempotent() {
        let store = VaultStore::open_temporary().unwrap();
        let config = NodeConfig::devnet().unwrap();
        let mut first = load_or_genesis(&config, &store).unwrap();
        first.pause(ADMIN).unwrap();
        let events = first.drain_events();
        store.commit(&first, &events).unwrap();

        let second = load_or_genesis(&config, &store).unwrap();
        assert!(second.paused());
        assert_eq!(store.event_count().unwrap(), 5);
    }
}
