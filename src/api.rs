//! HTTP and WebSocket surface
//!
//! Every mutating route resolves the caller from the `x-account` header,
//! passes the per-account rate limiter, then runs one engine call under the
//! write lock. Events from a successful call are appended to the event log
//! and fanned out to WebSocket subscribers before the lock is released, so
//! both see engine order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Path, Query, State,
    },
    http::{header, request::Parts, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::access::Component;
use crate::address::Address;
use crate::booster::BoosterTier;
use crate::db::Database;
use crate::error::{ErrorCategory, RewardError};
use crate::events::RewardEvent;
use crate::protocol::{self, ServerMessage};
use crate::quest::{streak_multiplier, QuestCatalog, QuestDefinition, QuestStatus};
use crate::rate_limit::RateLimiter;
use crate::system::{Outcome, RewardSystem};
use crate::types::{Amount, Timestamp};

pub const ACCOUNT_HEADER: &str = "x-account";

/// Broadcast buffer; slower subscribers get a `lagged` frame
const EVENT_CHANNEL_CAPACITY: usize = 256;

const DEFAULT_RECENT_EVENTS: i64 = 50;
const MAX_RECENT_EVENTS: i64 = 500;

// ============================================================================
// Clock
// ============================================================================

/// Source of the current unix time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp()
    }
}

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub system: Arc<RwLock<RewardSystem>>,
    pub db: Arc<Database>,
    pub events_tx: broadcast::Sender<RewardEvent>,
    pub rate_limiter: RateLimiter,
    /// Set by every successful mutation, cleared by a snapshot save
    pub dirty: Arc<AtomicBool>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        system: RewardSystem,
        db: Arc<Database>,
        rate_limiter: RateLimiter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            system: Arc::new(RwLock::new(system)),
            db,
            events_tx,
            rate_limiter,
            dirty: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    /// Run one engine call for `caller` under the write lock
    async fn mutate<T>(
        &self,
        caller: &Address,
        op: impl FnOnce(&mut RewardSystem, Timestamp) -> Result<Outcome<T>, RewardError>,
    ) -> Result<T, ApiError> {
        if !self.rate_limiter.check(caller.as_str()) {
            warn!("Rate limit exceeded for {}", caller);
            return Err(ApiError::RateLimited);
        }

        let mut system = self.system.write().await;
        let outcome = op(&mut *system, self.clock.now())?;
        self.publish(&outcome.events).await;
        drop(system);

        Ok(outcome.value)
    }

    async fn publish(&self, events: &[RewardEvent]) {
        self.dirty.store(true, Ordering::Release);
        if let Err(e) = self.db.append_events(events).await {
            error!("Failed to append {} event(s) to the log: {}", events.len(), e);
        }
        for event in events {
            debug!("Event: {}", event.event_type());
            // No subscribers is fine
            let _ = self.events_tx.send(event.clone());
        }
    }

    /// Persist the engine if anything changed since the last save
    pub async fn save_snapshot(&self) -> Result<bool, String> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let json = {
            let system = self.system.read().await;
            system.snapshot()
        };
        let result = match json {
            Ok(json) => self
                .db
                .save_snapshot(&json)
                .await
                .map_err(|e| format!("Failed to save snapshot: {}", e)),
            Err(e) => Err(format!("Failed to serialize snapshot: {}", e)),
        };

        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result.map(|_| true)
    }

    pub async fn replace_catalog(&self, catalog: Arc<QuestCatalog>) {
        self.system.write().await.replace_catalog(catalog);
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Engine(RewardError),
    RateLimited,
    Internal(String),
}

impl From<RewardError> for ApiError {
    fn from(err: RewardError) -> Self {
        ApiError::Engine(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
}

pub fn status_for(err: &RewardError) -> StatusCode {
    match err.category() {
        ErrorCategory::Authorization => match err {
            RewardError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::FORBIDDEN,
        },
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::System => match err {
            RewardError::ContractPaused => StatusCode::SERVICE_UNAVAILABLE,
            RewardError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::CONFLICT,
        },
        ErrorCategory::Reward if *err == RewardError::RewardCalculationOverflow => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Engine(err) => (status_for(&err), err.code(), err.to_string()),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RateLimited",
                "Too many requests. Please try again later.".to_string(),
            ),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal", message),
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                error,
                message,
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

// ============================================================================
// Caller identity
// ============================================================================

/// Account resolved from the `x-account` header
pub struct Caller(pub Address);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACCOUNT_HEADER)
            .ok_or(RewardError::Unauthorized)?;
        let raw = value
            .to_str()
            .map_err(|_| RewardError::InvalidAddress("non-ascii header value".to_string()))?;
        let address = Address::parse(raw)?;
        address.ensure_non_zero()?;
        Ok(Caller(address))
    }
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Ok(Address::parse(raw)?)
}

fn parse_component(raw: &str) -> Result<Component, ApiError> {
    Component::from_str(raw)
        .ok_or_else(|| RewardError::ValueOutOfRange(format!("unknown component '{}'", raw)).into())
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Quests and rewards
        .route("/quests", get(list_quests))
        .route("/quests/:quest_id/complete", post(complete_quest))
        .route("/rewards/claim", post(claim_rewards))
        // Boosters and referrals
        .route("/boosters/activate", post(activate_booster))
        .route("/boosters/tiers", get(booster_tiers))
        .route("/referrals", post(set_referrer))
        // Token
        .route("/token", get(token_info))
        .route("/token/transfer", post(transfer))
        .route("/token/approve", post(approve))
        .route("/token/transfer-from", post(transfer_from))
        .route("/token/batch-transfer", post(batch_transfer))
        // Administration
        .route("/admin/minters", post(add_minter))
        .route("/admin/minters/:address", delete(remove_minter))
        .route("/admin/:component/pause", post(pause_component))
        .route("/admin/:component/unpause", post(unpause_component))
        .route("/admin/:component/owner", post(transfer_ownership))
        // Queries
        .route("/accounts/:address/streak", get(account_streak))
        .route("/accounts/:address/rewards", get(account_rewards))
        .route("/accounts/:address/booster", get(account_booster))
        .route("/accounts/:address/referrals", get(account_referrals))
        .route("/accounts/:address/balance", get(account_balance))
        .route("/minters/:address", get(minter_status))
        // Events
        .route("/events/recent", get(recent_events))
        .route("/events/ws", get(ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(ACCOUNT_HEADER)]),
        )
        .with_state(state)
}

// ============================================================================
// HTTP Handlers - Quests and rewards
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis()
    }))
}

#[derive(Serialize)]
struct QuestView {
    #[serde(flatten)]
    quest: QuestDefinition,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<QuestStatus>,
}

/// GET /quests - catalog, with per-quest status when `x-account` is present
async fn list_quests(State(state): State<AppState>, caller: Option<Caller>) -> impl IntoResponse {
    let system = state.system.read().await;
    let engine = system.engine();
    let quests: Vec<QuestView> = match caller {
        Some(Caller(user)) => engine
            .quest_board(&user, state.clock.now())
            .into_iter()
            .map(|(quest, status)| QuestView {
                quest: (*quest).clone(),
                status: Some(status),
            })
            .collect(),
        None => engine
            .catalog()
            .iter()
            .map(|quest| QuestView {
                quest: (**quest).clone(),
                status: None,
            })
            .collect(),
    };
    ok(quests)
}

/// POST /quests/:quest_id/complete
async fn complete_quest(
    State(state): State<AppState>,
    Caller(user): Caller,
    Path(quest_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .mutate(&user, |sys, now| sys.complete_quest(&user, &quest_id, now))
        .await?;
    Ok(ok(receipt))
}

/// POST /rewards/claim
async fn claim_rewards(
    State(state): State<AppState>,
    Caller(user): Caller,
) -> Result<impl IntoResponse, ApiError> {
    let amount = state
        .mutate(&user, |sys, now| sys.claim_rewards(&user, now))
        .await?;
    Ok(ok(serde_json::json!({ "claimed": amount })))
}

// ============================================================================
// HTTP Handlers - Boosters and referrals
// ============================================================================

/// Tier given either by level (0-5) or by name
#[derive(Deserialize)]
#[serde(untagged)]
enum TierInput {
    Level(u32),
    Name(String),
}

impl TierInput {
    fn resolve(&self) -> Result<BoosterTier, RewardError> {
        match self {
            TierInput::Level(level) => BoosterTier::try_from(*level),
            TierInput::Name(name) => BoosterTier::from_str(name)
                .ok_or_else(|| RewardError::InvalidBoosterTier(name.clone())),
        }
    }
}

#[derive(Deserialize)]
struct ActivateBoosterRequest {
    tier: TierInput,
    /// Target account; defaults to the caller
    #[serde(default)]
    user: Option<String>,
}

/// POST /boosters/activate
async fn activate_booster(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<ActivateBoosterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tier = req.tier.resolve()?;
    let user = match req.user.as_deref() {
        Some(raw) => parse_address(raw)?,
        None => caller.clone(),
    };
    let record = state
        .mutate(&caller, |sys, now| sys.activate_booster(&caller, &user, tier, now))
        .await?;
    Ok(ok(record))
}

/// GET /boosters/tiers
async fn booster_tiers() -> impl IntoResponse {
    let tiers: Vec<serde_json::Value> = BoosterTier::ALL
        .iter()
        .map(|tier| {
            serde_json::json!({
                "tier": tier,
                "level": tier.as_u32(),
                "multiplier": tier.multiplier_bps(),
            })
        })
        .collect();
    ok(tiers)
}

#[derive(Deserialize)]
struct ReferralRequest {
    referrer: String,
}

/// POST /referrals
async fn set_referrer(
    State(state): State<AppState>,
    Caller(user): Caller,
    Json(req): Json<ReferralRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let referrer = parse_address(&req.referrer)?;
    state
        .mutate(&user, |sys, _| sys.set_referrer(&user, &referrer))
        .await?;
    Ok(ok(serde_json::json!({ "user": user, "referrer": referrer })))
}

// ============================================================================
// HTTP Handlers - Token
// ============================================================================

/// GET /token
async fn token_info(State(state): State<AppState>) -> impl IntoResponse {
    let system = state.system.read().await;
    let token = system.token();
    ok(serde_json::json!({
        "name": token.name,
        "symbol": token.symbol,
        "decimals": token.decimals,
        "total_supply": token.total_supply(),
        "max_supply": token.max_supply(),
        "remaining_supply": token.remaining_supply(),
        "paused": token.access().is_paused(),
    }))
}

#[derive(Deserialize)]
struct TransferRequest {
    to: String,
    amount: Amount,
}

#[derive(Deserialize)]
struct ApproveRequest {
    spender: String,
    amount: Amount,
}

#[derive(Deserialize)]
struct TransferFromRequest {
    from: String,
    to: String,
    amount: Amount,
}

#[derive(Deserialize)]
struct BatchTransferRequest {
    recipients: Vec<String>,
    amounts: Vec<Amount>,
}

async fn transfer(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let to = parse_address(&req.to)?;
    state
        .mutate(&caller, |sys, _| sys.transfer(&caller, &to, req.amount))
        .await?;
    let balance = state.system.read().await.token().balance_of(&caller);
    Ok(ok(serde_json::json!({ "balance": balance })))
}

async fn approve(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<ApproveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let spender = parse_address(&req.spender)?;
    state
        .mutate(&caller, |sys, _| sys.approve(&caller, &spender, req.amount))
        .await?;
    Ok(ok(serde_json::json!({ "spender": spender, "allowance": req.amount })))
}

async fn transfer_from(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<TransferFromRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let from = parse_address(&req.from)?;
    let to = parse_address(&req.to)?;
    state
        .mutate(&caller, |sys, _| sys.transfer_from(&caller, &from, &to, req.amount))
        .await?;
    Ok(ok(serde_json::json!({ "from": from, "to": to, "amount": req.amount })))
}

async fn batch_transfer(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<BatchTransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let recipients = req
        .recipients
        .iter()
        .map(|raw| parse_address(raw))
        .collect::<Result<Vec<_>, _>>()?;
    state
        .mutate(&caller, |sys, _| sys.batch_transfer(&caller, &recipients, &req.amounts))
        .await?;
    Ok(ok(serde_json::json!({ "transfers": recipients.len() })))
}

// ============================================================================
// HTTP Handlers - Administration
// ============================================================================

#[derive(Deserialize)]
struct MinterRequest {
    minter: String,
}

#[derive(Deserialize)]
struct OwnershipRequest {
    new_owner: String,
}

async fn add_minter(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<MinterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let minter = parse_address(&req.minter)?;
    state
        .mutate(&caller, |sys, _| sys.add_minter(&caller, &minter))
        .await?;
    Ok(ok(serde_json::json!({ "minter": minter, "is_minter": true })))
}

async fn remove_minter(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let minter = parse_address(&address)?;
    state
        .mutate(&caller, |sys, _| sys.remove_minter(&caller, &minter))
        .await?;
    Ok(ok(serde_json::json!({ "minter": minter, "is_minter": false })))
}

async fn pause_component(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(component): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let component = parse_component(&component)?;
    state
        .mutate(&caller, |sys, _| sys.pause(&caller, component))
        .await?;
    Ok(ok(serde_json::json!({ "component": component, "paused": true })))
}

async fn unpause_component(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(component): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let component = parse_component(&component)?;
    state
        .mutate(&caller, |sys, _| sys.unpause(&caller, component))
        .await?;
    Ok(ok(serde_json::json!({ "component": component, "paused": false })))
}

async fn transfer_ownership(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(component): Path<String>,
    Json(req): Json<OwnershipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let component = parse_component(&component)?;
    let new_owner = parse_address(&req.new_owner)?;
    state
        .mutate(&caller, |sys, _| sys.transfer_ownership(&caller, component, &new_owner))
        .await?;
    info!("Ownership of {} handed to {}", component, new_owner);
    Ok(ok(serde_json::json!({ "component": component, "owner": new_owner })))
}

// ============================================================================
// HTTP Handlers - Queries
// ============================================================================

async fn account_streak(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = parse_address(&address)?;
    let now = state.clock.now();
    let system = state.system.read().await;
    let engine = system.engine();
    let streak = engine.get_streak_data(&user);
    let effective = engine.get_effective_streak(&user, now);
    Ok(ok(serde_json::json!({
        "address": user,
        "current_streak": streak.current_streak,
        "effective_streak": effective,
        "longest_streak": streak.longest_streak,
        "last_completion_time": streak.last_completion_time,
        "multiplier": streak_multiplier(effective),
    })))
}

async fn account_rewards(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = parse_address(&address)?;
    let system = state.system.read().await;
    let accrual = system.vault().get_accrual(&user);
    Ok(ok(serde_json::json!({
        "address": user,
        "pending_rewards": accrual.pending_rewards,
        "total_earned": accrual.total_earned,
        "total_claimed": accrual.total_claimed,
        "last_claim_at": accrual.last_claim_at,
    })))
}

async fn account_booster(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = parse_address(&address)?;
    let now = state.clock.now();
    let system = state.system.read().await;
    let booster = system.booster();
    let record = booster.get_user_booster(&user);
    Ok(ok(serde_json::json!({
        "address": user,
        "tier": record.tier,
        "expiry": record.expiry,
        "activated_at": record.activated_at,
        "active": record.is_active(now),
        "boost_multiplier": booster.get_boost_multiplier(&user, now),
    })))
}

async fn account_referrals(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = parse_address(&address)?;
    let system = state.system.read().await;
    let booster = system.booster();
    let record = booster.get_referral_record(&user);
    Ok(ok(serde_json::json!({
        "address": user,
        "referrer": record.referrer,
        "referral_count": record.referral_count,
        "referral_bonus": booster.get_referral_bonus(&user),
    })))
}

async fn account_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = parse_address(&address)?;
    let system = state.system.read().await;
    let token = system.token();
    Ok(ok(serde_json::json!({
        "address": user,
        "balance": token.balance_of(&user),
        "symbol": token.symbol,
        "decimals": token.decimals,
    })))
}

async fn minter_status(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let addr = parse_address(&address)?;
    let is_minter = state.system.read().await.token().is_minter(&addr);
    Ok(ok(serde_json::json!({ "address": addr, "is_minter": is_minter })))
}

// ============================================================================
// Events
// ============================================================================

#[derive(Deserialize)]
struct EventQuery {
    account: Option<String>,
    limit: Option<i64>,
}

/// GET /events/recent - tail of the persisted event log
async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let account = query.account.as_deref().map(parse_address).transpose()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_EVENTS)
        .clamp(1, MAX_RECENT_EVENTS);

    let records = state
        .db
        .recent_events(account.as_ref().map(|a| a.as_str()), limit)
        .await
        .map_err(|e| {
            error!("Failed to read event log: {}", e);
            ApiError::Internal("Failed to read event log".to_string())
        })?;
    Ok(ok(records))
}

/// GET /events/ws - live event stream, optionally filtered to one account
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.account.as_deref().map(parse_address).transpose()?;
    let rx = state.events_tx.subscribe();
    let now = state.clock.now();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, rx, filter, now)))
}

async fn handle_socket(
    socket: WebSocket,
    rx: broadcast::Receiver<RewardEvent>,
    filter: Option<Address>,
    now: Timestamp,
) {
    let (mut sender, mut receiver) = socket.split();
    info!("Event subscriber connected (filter: {:?})", filter.as_ref().map(|a| a.as_str()));

    let welcome = ServerMessage::Welcome {
        account: filter.as_ref().map(|a| a.to_string()),
        timestamp: now,
    };
    if let Ok(bytes) = protocol::encode_server_message(&welcome) {
        if sender.send(Message::Binary(bytes)).await.is_err() {
            return;
        }
    }

    let mut events = BroadcastStream::new(rx);
    loop {
        tokio::select! {
            item = events.next() => {
                let msg = match item {
                    Some(Ok(event)) => {
                        if filter.as_ref().is_some_and(|account| !event.involves(account)) {
                            continue;
                        }
                        ServerMessage::Event { event }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                        warn!("Event subscriber lagged, {} event(s) dropped", missed);
                        ServerMessage::Lagged { missed }
                    }
                    None => break,
                };
                match protocol::encode_server_message(&msg) {
                    Ok(bytes) => {
                        if sender.send(Message::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    info!("Event subscriber disconnected");
}
