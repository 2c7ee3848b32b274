//! # REST API
//!
//! Builds the axum router that exposes the node's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                                   | Description                         |
//! |--------|----------------------------------------|-------------------------------------|
//! | GET    | `/health`                              | Liveness check                      |
//! | GET    | `/status`                              | Node and factory summary            |
//! | POST   | `/instances`                           | Signed instance creation            |
//! | GET    | `/factory/deployer`                    | Factory deployer address            |
//! | GET    | `/factory/instances/:caller`           | Latest instance created by a caller |
//! | POST   | `/instances/:address/calls`            | Signed registry call                |
//! | GET    | `/instances/:address`                  | Registry summary                    |
//! | GET    | `/instances/:address/credentials/:id`  | Credential by id                    |
//! | GET    | `/instances/:address/holders/:holder`  | Credential held by an address       |
//!
//! ## Authentication
//!
//! Mutating endpoints take a [`SignedEnvelope`] addressed to the instance
//! being called, or to the factory for creations. The caller address handed
//! to the registry is the one derived from the verified key, and each
//! caller's nonce must strictly increase, across restarts too.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use humanpass_contracts::credential_registry::{
    CallOutcome, CredentialId, RegistryCall, RegistryError, RegistryEvent, RevocationMode,
};
use humanpass_contracts::instance_factory::{FactoryError, InstanceFactory, InstanceReceipt};
use humanpass_contracts::roles::Role;
use humanpass_protocol::envelope::{EnvelopeError, SignedEnvelope};
use humanpass_protocol::identity::Address;
use humanpass_protocol::storage::db::{DbError, PassDB};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone. Everything sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The factory every instance on this node comes from.
    pub factory: Arc<InstanceFactory>,
    /// Persistent storage for instances and the caller index.
    pub db: Arc<PassDB>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Highest nonce accepted per caller, mirrored in the database.
    pub nonces: Arc<DashMap<Address, u64>>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/instances", post(create_instance_handler))
        .route("/factory/deployer", get(deployer_handler))
        .route("/factory/instances/:caller", get(instance_of_handler))
        .route("/instances/:address", get(instance_handler))
        .route("/instances/:address/calls", post(call_handler))
        .route("/instances/:address/credentials/:id", get(credential_handler))
        .route("/instances/:address/holders/:holder", get(holder_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request Types
// ---------------------------------------------------------------------------

/// Body of a signed `POST /instances`.
///
/// With both `admin` and `issuer` set the instance is created already
/// initialized; with neither it is created empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateInstanceRequest {
    #[serde(default)]
    pub admin: Option<Address>,
    #[serde(default)]
    pub issuer: Option<Address>,
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub factory: Address,
    pub deployer: Address,
    pub template_name: String,
    pub template_symbol: String,
    /// Hex-encoded template code hash.
    pub code_hash: String,
    pub instance_count: usize,
    pub sequence: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeployerResponse {
    pub deployer: Address,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceOfResponse {
    pub caller: Address,
    pub instance: Option<Address>,
}

/// Response payload for `GET /instances/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceResponse {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub initialized: bool,
    pub total_supply: u64,
    pub admin_count: usize,
    pub admins: Vec<Address>,
    pub issuers: Vec<Address>,
    pub burners: Vec<Address>,
}

/// Response payload for `GET /instances/:address/credentials/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub id: CredentialId,
    pub holder: Address,
    pub mode: RevocationMode,
    /// Numeric revocation code (1 IssuerOnly, 2 Both, 3 Neither).
    pub burn_auth: u8,
    pub issuer: Address,
    pub issued_at: String,
}

/// Response payload for `GET /instances/:address/holders/:holder`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HolderResponse {
    pub holder: Address,
    pub credential_id: Option<CredentialId>,
    pub balance: u64,
}

/// Response payload for a successful signed registry call.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallResponse {
    pub caller: Address,
    pub outcome: CallOutcome,
    pub events: Vec<RegistryEvent>,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Machine-readable error kind, e.g. `NonTransferable`.
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a handler can fail with, mapped onto HTTP statuses.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Envelope(EnvelopeError),
    StaleNonce { nonce: u64, last: u64 },
    InstanceNotFound(Address),
    Registry(RegistryError),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Envelope(_) | ApiError::StaleNonce { .. } => StatusCode::UNAUTHORIZED,
            ApiError::InstanceNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Registry(err) => registry_status(err),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Envelope(EnvelopeError::WrongTarget { .. }) => "WrongTarget",
            ApiError::Envelope(_) => "InvalidEnvelope",
            ApiError::StaleNonce { .. } => "StaleNonce",
            ApiError::InstanceNotFound(_) => "InstanceNotFound",
            ApiError::Registry(err) => err.kind(),
            ApiError::Internal(_) => "Internal",
        }
    }
}

fn registry_status(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::Unauthorized(_)
        | RegistryError::Forbidden(_)
        | RegistryError::SelfIssuanceViolation => StatusCode::FORBIDDEN,
        RegistryError::AlreadyInitialized
        | RegistryError::NotInitialized
        | RegistryError::DuplicateHolder(_)
        | RegistryError::DuplicateId(_)
        | RegistryError::NotAllowed(_)
        | RegistryError::NonTransferable
        | RegistryError::AdminRoleManaged => StatusCode::CONFLICT,
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            ApiError::Envelope(e) => write!(f, "invalid envelope: {e}"),
            ApiError::StaleNonce { nonce, last } => {
                write!(f, "nonce {nonce} already used (last accepted {last})")
            }
            ApiError::InstanceNotFound(address) => write!(f, "instance {address} not found"),
            ApiError::Registry(e) => write!(f, "{e}"),
            ApiError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        ApiError::Registry(e)
    }
}

impl From<EnvelopeError> for ApiError {
    fn from(e: EnvelopeError) -> Self {
        ApiError::Envelope(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<FactoryError> for ApiError {
    fn from(e: FactoryError) -> Self {
        match e {
            FactoryError::Registry(inner) => ApiError::Registry(inner),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_address(text: &str) -> Result<Address, ApiError> {
    text.parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid address '{text}': {e}")))
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Verify `envelope` as delivered to `target`, enforce the caller's nonce,
/// and hand back the authenticated caller with the body.
///
/// The nonce is persisted before it is accepted in memory, so a restarted
/// node still refuses envelopes it has already run. A refused envelope
/// (bad signature, wrong target) does not consume its nonce.
fn authenticate<T>(
    state: &AppState,
    envelope: SignedEnvelope<T>,
    target: &Address,
) -> Result<(Address, T), ApiError>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    let (caller, nonce, body) = envelope.open(target).map_err(|e| {
        let err = ApiError::from(e);
        state.metrics.reject(err.kind());
        err
    })?;

    let mut last = state.nonces.entry(caller).or_insert(0);
    if nonce <= *last {
        let err = ApiError::StaleNonce {
            nonce,
            last: *last,
        };
        drop(last);
        state.metrics.reject("StaleNonce");
        return Err(err);
    }
    state.db.record_nonce(&caller, nonce)?;
    *last = nonce;
    Ok((caller, body))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: node and factory summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let template = state.factory.template();
    Json(StatusResponse {
        version: state.version.clone(),
        factory: state.factory.address(),
        deployer: state.factory.deployer_address(),
        template_name: template.name().to_string(),
        template_symbol: template.symbol().to_string(),
        code_hash: template.code_hash_hex(),
        instance_count: state.factory.instance_count(),
        sequence: state.factory.sequence(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /instances`: create a registry for the signing caller.
///
/// Envelopes are addressed to the factory. The instance is written to the
/// database before it becomes visible, and a failed write leaves no trace.
async fn create_instance_handler(
    State(state): State<AppState>,
    payload: Result<Json<SignedEnvelope<CreateInstanceRequest>>, JsonRejection>,
) -> ApiResult<InstanceReceipt> {
    let Json(envelope) = payload?;
    let (caller, request) = authenticate(&state, envelope, &state.factory.address())?;

    let init = match (request.admin, request.issuer) {
        (Some(admin), Some(issuer)) => Some((admin, issuer)),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "admin and issuer must be given together".to_string(),
            ))
        }
    };

    let receipt = state
        .factory
        .create_committed(caller, init, |receipt, registry| {
            state
                .db
                .put_instance(&receipt.instance, &caller, receipt.sequence, registry)
                .map_err(ApiError::from)
        })?;

    state.metrics.instances_created_total.inc();
    state
        .metrics
        .live_instances
        .set(state.factory.instance_count() as i64);

    Ok(Json(receipt))
}

/// `GET /factory/deployer`
async fn deployer_handler(State(state): State<AppState>) -> Json<DeployerResponse> {
    Json(DeployerResponse {
        deployer: state.factory.deployer_address(),
    })
}

/// `GET /factory/instances/:caller`: the caller's latest instance, or null.
async fn instance_of_handler(
    Path(caller): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<InstanceOfResponse> {
    let caller = parse_address(&caller)?;
    Ok(Json(InstanceOfResponse {
        caller,
        instance: state.factory.instance_of(&caller),
    }))
}

/// `POST /instances/:address/calls`: run a signed registry call.
///
/// The instance stays locked until the new state is on disk, so writes to
/// one instance land in the order they were applied. If the write fails the
/// call is rolled back in memory too.
async fn call_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
    payload: Result<Json<SignedEnvelope<RegistryCall>>, JsonRejection>,
) -> ApiResult<CallResponse> {
    let address = parse_address(&address)?;
    let Json(envelope) = payload?;
    let registry = state
        .factory
        .registry(&address)
        .ok_or(ApiError::InstanceNotFound(address))?;
    let (caller, call) = authenticate(&state, envelope, &address)?;

    let operation = call.name();
    let result = registry.lock().execute_committed(&caller, call, |snapshot| {
        state
            .db
            .update_instance(&address, snapshot)
            .map_err(ApiError::from)
    });

    let (outcome, events) = match result {
        Ok(done) => done,
        Err(ApiError::Registry(err)) => {
            tracing::debug!(
                instance = %address.short(),
                caller = %caller.short(),
                operation,
                kind = err.kind(),
                "registry call rejected"
            );
            state.metrics.reject(err.kind());
            return Err(err.into());
        }
        Err(other) => return Err(other),
    };

    for event in &events {
        match event {
            RegistryEvent::Issued { .. } => state.metrics.credentials_issued_total.inc(),
            RegistryEvent::Revoked { .. } => state.metrics.credentials_revoked_total.inc(),
            _ => {}
        }
    }

    Ok(Json(CallResponse {
        caller,
        outcome,
        events,
    }))
}

/// `GET /instances/:address`
async fn instance_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<InstanceResponse> {
    let address = parse_address(&address)?;
    let registry = state
        .factory
        .registry(&address)
        .ok_or(ApiError::InstanceNotFound(address))?;
    let registry = registry.lock();

    Ok(Json(InstanceResponse {
        address,
        name: registry.name().to_string(),
        symbol: registry.symbol().to_string(),
        initialized: registry.is_initialized(),
        total_supply: registry.total_supply(),
        admin_count: registry.admin_holder_count(),
        admins: registry.role_members(Role::Admin),
        issuers: registry.role_members(Role::Issuer),
        burners: registry.role_members(Role::Burner),
    }))
}

/// `GET /instances/:address/credentials/:id`
async fn credential_handler(
    Path((address, id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<CredentialResponse> {
    let address = parse_address(&address)?;
    let id: CredentialId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid credential id '{id}'")))?;
    let registry = state
        .factory
        .registry(&address)
        .ok_or(ApiError::InstanceNotFound(address))?;
    let registry = registry.lock();

    let credential = registry.credential(id).ok_or(RegistryError::NotFound(id))?;
    Ok(Json(CredentialResponse {
        id,
        holder: credential.holder,
        mode: credential.mode,
        burn_auth: credential.mode.code(),
        issuer: credential.issuer,
        issued_at: credential.issued_at.to_rfc3339(),
    }))
}

/// `GET /instances/:address/holders/:holder`
async fn holder_handler(
    Path((address, holder)): Path<(String, String)>,
    State(state): State<AppState>,
) -> ApiResult<HolderResponse> {
    let address = parse_address(&address)?;
    let holder = parse_address(&holder)?;
    let registry = state
        .factory
        .registry(&address)
        .ok_or(ApiError::InstanceNotFound(address))?;
    let registry = registry.lock();

    Ok(Json(HolderResponse {
        holder,
        credential_id: registry.holder_credential_id(&holder),
        balance: registry.balance_of(&holder),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use humanpass_contracts::template::TemplateDefinition;
    use humanpass_protocol::crypto::PassKeypair;
    use serde_json::json;
    use tower::ServiceExt;

    fn deployer() -> PassKeypair {
        PassKeypair::from_seed(&[1u8; 32])
    }

    /// Creates a test AppState backed by a temporary database.
    fn test_app_state() -> AppState {
        let db = Arc::new(PassDB::open_temporary().expect("temp db"));
        let deployer = Address::from_public_key(&deployer().public_key());
        let factory = InstanceFactory::new(deployer, TemplateDefinition::new("Human Pass", "HPASS"))
            .expect("factory");

        AppState {
            version: "0.1.0-test".into(),
            factory: Arc::new(factory),
            db,
            metrics: Arc::new(crate::metrics::NodeMetrics::new().expect("metrics")),
            nonces: Arc::new(DashMap::new()),
        }
    }

    fn address_of(keypair: &PassKeypair) -> Address {
        Address::from_public_key(&keypair.public_key())
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json<B: Serialize>(router: &Router, path: &str, body: &B) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    async fn factory_address(router: &Router) -> Address {
        let (_, body) = get(router, "/status").await;
        let status: StatusResponse = serde_json::from_slice(&body).unwrap();
        status.factory
    }

    /// Creates an instance initialized with `keypair` as both admin and
    /// issuer.
    async fn create_own_instance(
        router: &Router,
        keypair: &PassKeypair,
        nonce: u64,
    ) -> InstanceReceipt {
        let me = address_of(keypair);
        let envelope = SignedEnvelope::sign(
            keypair,
            factory_address(router).await,
            nonce,
            CreateInstanceRequest {
                admin: Some(me),
                issuer: Some(me),
            },
        )
        .unwrap();
        let (status, body) = post_json(router, "/instances", &envelope).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    async fn call(
        router: &Router,
        instance: &Address,
        keypair: &PassKeypair,
        nonce: u64,
        call: RegistryCall,
    ) -> (StatusCode, Vec<u8>) {
        let envelope = SignedEnvelope::sign(keypair, *instance, nonce, call).unwrap();
        post_json(router, &format!("/instances/{instance}/calls"), &envelope).await
    }

    // -- Liveness and status ---------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_factory() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/status").await;

        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.deployer, address_of(&deployer()));
        assert_eq!(resp.template_symbol, "HPASS");
        assert_eq!(resp.instance_count, 0);
    }

    #[tokio::test]
    async fn deployer_endpoint() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/factory/deployer").await;

        assert_eq!(status, StatusCode::OK);
        let resp: DeployerResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.deployer, address_of(&deployer()));
    }

    // -- Instance creation -----------------------------------------------------

    #[tokio::test]
    async fn create_instance_persists_and_indexes() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let alice = PassKeypair::from_seed(&[2u8; 32]);

        let receipt = create_own_instance(&router, &alice, 1).await;
        assert_eq!(receipt.creator, address_of(&alice));
        assert_eq!(state.db.instance_count(), 1);
        assert_eq!(
            state.db.get_caller_instance(&address_of(&alice)).unwrap(),
            Some(receipt.instance)
        );

        let (status, body) =
            get(&router, &format!("/factory/instances/{}", address_of(&alice))).await;
        assert_eq!(status, StatusCode::OK);
        let resp: InstanceOfResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.instance, Some(receipt.instance));

        let (status, body) = get(&router, &format!("/instances/{}", receipt.instance)).await;
        assert_eq!(status, StatusCode::OK);
        let resp: InstanceResponse = serde_json::from_slice(&body).unwrap();
        assert!(resp.initialized);
        assert_eq!(resp.admin_count, 1);
        assert_eq!(resp.issuers, vec![address_of(&alice)]);
    }

    #[tokio::test]
    async fn create_instance_rejects_half_initialization() {
        let router = create_router(test_app_state());
        let alice = PassKeypair::from_seed(&[2u8; 32]);
        let envelope = SignedEnvelope::sign(
            &alice,
            factory_address(&router).await,
            1,
            CreateInstanceRequest {
                admin: Some(address_of(&alice)),
                issuer: None,
            },
        )
        .unwrap();

        let (status, _) = post_json(&router, "/instances", &envelope).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_caller_has_no_instance() {
        let router = create_router(test_app_state());
        let nobody = address_of(&PassKeypair::from_seed(&[9u8; 32]));
        let (status, body) = get(&router, &format!("/factory/instances/{nobody}")).await;

        assert_eq!(status, StatusCode::OK);
        let resp: InstanceOfResponse = serde_json::from_slice(&body).unwrap();
        assert!(resp.instance.is_none());
    }

    // -- Registry calls --------------------------------------------------------

    #[tokio::test]
    async fn mint_then_query_credential_and_holder() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let alice = PassKeypair::from_seed(&[2u8; 32]);
        let me = address_of(&alice);
        let receipt = create_own_instance(&router, &alice, 1).await;

        let (status, body) = call(
            &router,
            &receipt.instance,
            &alice,
            2,
            RegistryCall::Mint {
                to: me,
                id: 1,
                mode: RevocationMode::IssuerOnly,
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let resp: CallResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.outcome, CallOutcome::Completed);
        assert!(matches!(resp.events.as_slice(), [RegistryEvent::Issued { id: 1, .. }]));

        let (status, body) =
            get(&router, &format!("/instances/{}/credentials/1", receipt.instance)).await;
        assert_eq!(status, StatusCode::OK);
        let cred: CredentialResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(cred.holder, me);
        assert_eq!(cred.burn_auth, 1);

        let (_, body) = get(&router, &format!("/instances/{}/holders/{me}", receipt.instance)).await;
        let holder: HolderResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(holder.credential_id, Some(1));
        assert_eq!(holder.balance, 1);

        // The persisted state reflects the mint.
        let stored: humanpass_contracts::credential_registry::RegistryState =
            state.db.get_instance(&receipt.instance).unwrap().unwrap();
        assert_eq!(stored.credentials().len(), 1);
    }

    #[tokio::test]
    async fn registry_errors_map_to_statuses() {
        let router = create_router(test_app_state());
        let alice = PassKeypair::from_seed(&[2u8; 32]);
        let bob = PassKeypair::from_seed(&[3u8; 32]);
        let me = address_of(&alice);
        let receipt = create_own_instance(&router, &alice, 1).await;

        call(
            &router,
            &receipt.instance,
            &alice,
            2,
            RegistryCall::Mint {
                to: me,
                id: 1,
                mode: RevocationMode::Neither,
            },
        )
        .await;

        // Bob is not an issuer.
        let (status, body) = call(
            &router,
            &receipt.instance,
            &bob,
            1,
            RegistryCall::Mint {
                to: address_of(&bob),
                id: 2,
                mode: RevocationMode::Both,
            },
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "Unauthorized");

        let (status, body) = call(
            &router,
            &receipt.instance,
            &alice,
            3,
            RegistryCall::TransferFrom {
                from: me,
                to: address_of(&bob),
                id: 1,
            },
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "NonTransferable");

        let (status, _) = call(&router, &receipt.instance, &alice, 4, RegistryCall::Burn { id: 1 }).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = call(&router, &receipt.instance, &alice, 5, RegistryCall::Burn { id: 99 }).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn replayed_nonce_is_rejected() {
        let router = create_router(test_app_state());
        let alice = PassKeypair::from_seed(&[2u8; 32]);
        let me = address_of(&alice);
        let receipt = create_own_instance(&router, &alice, 1).await;

        let envelope = SignedEnvelope::sign(
            &alice,
            receipt.instance,
            2,
            RegistryCall::Issue {
                to: me,
                mode: RevocationMode::Both,
            },
        )
        .unwrap();
        let path = format!("/instances/{}/calls", receipt.instance);

        let (status, _) = post_json(&router, &path, &envelope).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = post_json(&router, &path, &envelope).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "StaleNonce");
    }

    #[tokio::test]
    async fn envelope_for_another_instance_is_rejected() {
        let router = create_router(test_app_state());
        let alice = PassKeypair::from_seed(&[2u8; 32]);
        let me = address_of(&alice);
        let first = create_own_instance(&router, &alice, 1).await;
        let second = create_own_instance(&router, &alice, 2).await;
        for (instance, nonce) in [(&first.instance, 3), (&second.instance, 4)] {
            let (status, _) = call(
                &router,
                instance,
                &alice,
                nonce,
                RegistryCall::Issue {
                    to: me,
                    mode: RevocationMode::Both,
                },
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        // A burn signed for the first instance, delivered to the second.
        let burn =
            SignedEnvelope::sign(&alice, first.instance, 5, RegistryCall::Burn { id: 1 }).unwrap();
        let (status, body) = post_json(
            &router,
            &format!("/instances/{}/calls", second.instance),
            &burn,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "WrongTarget");

        let (status, _) =
            get(&router, &format!("/instances/{}/credentials/1", second.instance)).await;
        assert_eq!(status, StatusCode::OK);

        // The refused delivery did not burn the nonce for the real target.
        let (status, _) = post_json(
            &router,
            &format!("/instances/{}/calls", first.instance),
            &burn,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn creation_envelope_is_bound_to_the_factory() {
        let router = create_router(test_app_state());
        let alice = PassKeypair::from_seed(&[2u8; 32]);
        let other_factory = Address::from_bytes([8u8; 32]);
        let envelope =
            SignedEnvelope::sign(&alice, other_factory, 1, CreateInstanceRequest::default())
                .unwrap();

        let (status, body) = post_json(&router, "/instances", &envelope).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "WrongTarget");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_leave_disk_matching_memory() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let admin = PassKeypair::from_seed(&[2u8; 32]);
        let receipt = create_own_instance(&router, &admin, 1).await;

        let issuers: Vec<PassKeypair> = (10u8..18)
            .map(|b| PassKeypair::from_seed(&[b; 32]))
            .collect();
        for (nonce, issuer) in (2u64..).zip(&issuers) {
            let (status, _) = call(
                &router,
                &receipt.instance,
                &admin,
                nonce,
                RegistryCall::GrantRole {
                    role: Role::Issuer,
                    account: address_of(issuer),
                },
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let mut tasks = Vec::new();
        for issuer in issuers {
            let router = router.clone();
            let instance = receipt.instance;
            tasks.push(tokio::spawn(async move {
                let me = address_of(&issuer);
                call(
                    &router,
                    &instance,
                    &issuer,
                    1,
                    RegistryCall::Issue {
                        to: me,
                        mode: RevocationMode::IssuerOnly,
                    },
                )
                .await
                .0
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::OK);
        }

        let stored: humanpass_contracts::credential_registry::RegistryState =
            state.db.get_instance(&receipt.instance).unwrap().unwrap();
        let registry = state.factory.registry(&receipt.instance).unwrap();
        let live = registry.lock().state().clone();
        assert_eq!(stored.credentials().len(), 8);
        assert_eq!(&stored, &live);
    }

    #[tokio::test]
    async fn tampered_envelope_is_rejected() {
        let router = create_router(test_app_state());
        let alice = PassKeypair::from_seed(&[2u8; 32]);
        let receipt = create_own_instance(&router, &alice, 1).await;

        let mut envelope =
            SignedEnvelope::sign(&alice, receipt.instance, 2, RegistryCall::Burn { id: 1 })
                .unwrap();
        envelope.body = RegistryCall::Burn { id: 2 };
        let (status, body) = post_json(
            &router,
            &format!("/instances/{}/calls", receipt.instance),
            &envelope,
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "InvalidEnvelope");
    }

    #[tokio::test]
    async fn malformed_input_is_bad_request() {
        let router = create_router(test_app_state());

        let (status, _) = get(&router, "/instances/not-an-address").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post_json(&router, "/instances", &json!({ "nonce": "x" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_instance_is_not_found() {
        let router = create_router(test_app_state());
        let ghost = Address::from_bytes([7u8; 32]);

        let (status, body) = get(&router, &format!("/instances/{ghost}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "InstanceNotFound");
    }
}
