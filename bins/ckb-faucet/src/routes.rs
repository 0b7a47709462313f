//! Axum router and HTTP handlers.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use ckb_faucet_core::address::Address;
use ckb_faucet_core::crypto::{
    PrivateKey, PublicKey, derive_public_key, generate_private_key, validate_private_key,
    validate_public_key,
};
use ckb_faucet_service::{FaucetError, FaucetResponse};

use crate::AppState;

/// Longest JSONP callback name accepted.
const MAX_CALLBACK_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/faucet", get(faucet))
        .route("/address", get(address))
        .route("/address/random", get(random_address))
        .route("/status", get(status))
        .with_state(state)
        .layer(cors)
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

/// `callback` is honoured only when it is a plain JavaScript identifier path.
fn valid_callback(callback: &str) -> bool {
    let mut chars = callback.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$');
    first_ok
        && callback.len() <= MAX_CALLBACK_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}

/// Encode `body` as JSON, or as a JSONP call when a usable callback was given.
///
/// JSONP replies are always 200 so that the script tag loads and the caller
/// sees the error body.
fn reply<T: Serialize>(status: StatusCode, body: &T, callback: Option<&str>) -> Response {
    match callback.filter(|cb| valid_callback(cb)) {
        Some(cb) => {
            let json = match serde_json::to_string(body) {
                Ok(json) => json,
                Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
            };
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
                format!("{cb}({json});"),
            )
                .into_response()
        }
        None => (status, Json(body)).into_response(),
    }
}

fn status_of(e: &FaucetError) -> StatusCode {
    StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn error_reply(e: &FaucetError, callback: Option<&str>) -> Response {
    reply(status_of(e), &FaucetResponse::from(e), callback)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FaucetQuery {
    address: Option<String>,
    access_token: Option<String>,
    callback: Option<String>,
}

/// Bearer token from the `Authorization` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// `GET /faucet`: pay the configured amount to `address`.
async fn faucet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<FaucetQuery>,
) -> Response {
    let callback = query.callback.as_deref();
    let credential = query.access_token.as_deref().or_else(|| bearer_token(&headers));
    let address = query.address.as_deref().unwrap_or_default();

    let result = state.service.request_payout(address, credential).await;
    let status = result.as_ref().err().map_or(StatusCode::OK, status_of);
    reply(status, &FaucetResponse::from_result(&result), callback)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddressQuery {
    private_key: Option<String>,
    public_key: Option<String>,
    callback: Option<String>,
}

/// Key material and the address it controls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
    public_key: String,
    address: String,
}

impl KeyInfo {
    fn from_private_key(state: &AppState, key: &PrivateKey) -> Self {
        let mut info = Self::from_public_key(state, &derive_public_key(key));
        info.private_key = Some(format!("0x{}", key.to_hex()));
        info
    }

    fn from_public_key(state: &AppState, public_key: &PublicKey) -> Self {
        let network = state.service.wallet().network();
        Self {
            private_key: None,
            public_key: public_key.to_hex(),
            address: Address::from_public_key(public_key, network).encode(),
        }
    }
}

/// `GET /address`: derive the address of a private or public key.
///
/// `privateKey` wins when both are given.
async fn address(State(state): State<AppState>, Query(query): Query<AddressQuery>) -> Response {
    let callback = query.callback.as_deref();
    let info = match (query.private_key.as_deref(), query.public_key.as_deref()) {
        (Some(key), _) => validate_private_key(key.trim())
            .map(|key| KeyInfo::from_private_key(&state, &key))
            .map_err(|_| FaucetError::InvalidPrivateKey),
        (None, Some(key)) => validate_public_key(key.trim())
            .map(|key| KeyInfo::from_public_key(&state, &key))
            .map_err(|_| FaucetError::InvalidPublicKey),
        (None, None) => Err(FaucetError::InvalidPublicKey),
    };

    match info {
        Ok(info) => reply(StatusCode::OK, &info, callback),
        Err(e) => error_reply(&e, callback),
    }
}

#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    callback: Option<String>,
}

/// `GET /address/random`: a fresh key pair and its address.
async fn random_address(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let info = KeyInfo::from_private_key(&state, &generate_private_key());
    reply(StatusCode::OK, &info, query.callback.as_deref())
}

/// `GET /status`: faucet address, balance and payout policy.
async fn status(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Response {
    let callback = query.callback.as_deref();
    match state.service.status().await {
        Ok(status) => reply(StatusCode::OK, &status, callback),
        Err(e) => error_reply(&e, callback),
    }
}
