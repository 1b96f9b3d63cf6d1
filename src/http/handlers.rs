//! Bridge endpoints.
//!
//! | Method | Path | Query | Response |
//! |---|---|---|---|
//! | GET | `/controls` | `context` | JSON control list |
//! | GET | `/paraminfo` | `uri` | JSON parameter description |
//! | GET | `/madigan-parameter` | `context, type, key[, wait_ms]` | reported value or empty |
//! | PATCH | `/madigan-parameter` | `context, type, key, value` | confirmation |
//! | GET | `/madigan-state` | `id` | recent device messages, one per line |
//! | GET | `/madigan-send` | `id[, type, key, value]` | confirmation |

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::time::Duration;

use crate::controls::{build_controls, Control};
use crate::error::BridgeError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::paraminfo::{describe_blocking, AllInfo};
use crate::protocol::{Command, CompositeKey};

type Params = Query<HashMap<String, String>>;

/// A required, non-empty query parameter.
fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, BridgeError> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| BridgeError::BadRequest(format!("Missing '{name}' parameter")))
}

/// A required parameter that may be empty.
fn present<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str, BridgeError> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| BridgeError::BadRequest(format!("Missing '{name}' parameter")))
}

fn optional<'a>(params: &'a HashMap<String, String>, name: &str) -> &'a str {
    params.get(name).map(String::as_str).unwrap_or_default()
}

/// `key` may be empty: (`control1`, ``) is a distinct, legal key.
fn composite_key(params: &HashMap<String, String>) -> Result<CompositeKey, BridgeError> {
    Ok(CompositeKey::new(required(params, "type")?, present(params, "key")?))
}

fn respond<T: IntoResponse>(endpoint: &'static str, result: Result<T, BridgeError>) -> Response {
    let response = match result {
        Ok(body) => body.into_response(),
        Err(e) => {
            match &e {
                BridgeError::Transport(_) | BridgeError::Protocol(_) => {
                    tracing::warn!(endpoint, error = %e, "Request failed")
                }
                _ => tracing::debug!(endpoint, error = %e, "Request rejected"),
            }
            e.into_response()
        }
    };
    metrics::record_http_request(endpoint, response.status().as_u16());
    response
}

/// GET /controls?context=ID
pub async fn controls(State(state): State<AppState>, Query(params): Params) -> Response {
    respond("controls", list_controls(&state, &params))
}

fn list_controls(state: &AppState, params: &HashMap<String, String>) -> Result<Json<Vec<Control>>, BridgeError> {
    let context = required(params, "context")?;
    let entry = state.registry.lookup(context)?;
    Ok(Json(build_controls(&entry.description())))
}

/// GET /paraminfo?uri=PLUGIN
///
/// A failing source answers with an empty description.
pub async fn paraminfo(State(state): State<AppState>, Query(params): Params) -> Response {
    let uri = match required(&params, "uri") {
        Ok(uri) => uri,
        Err(e) => return respond::<Json<AllInfo>>("paraminfo", Err(e)),
    };
    let info = match describe_blocking(state.source.clone(), uri).await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(plugin = %uri, error = %e, "Parameter description unavailable");
            AllInfo::default()
        }
    };
    respond("paraminfo", Ok(Json(info)))
}

/// GET /madigan-parameter?context=ID&type=T&key=K[&wait_ms=N]
///
/// Answers from the reported-values cache when possible. On a miss a `get`
/// command is sent and, by default, the current (empty) value is returned
/// immediately: the device reports back asynchronously and the caller is
/// expected to poll. With `wait_ms` the handler instead waits up to that
/// long (capped by `query.max_wait_ms`) for the report.
pub async fn query_parameter(State(state): State<AppState>, Query(params): Params) -> Response {
    respond("parameter_get", read_parameter(&state, &params).await)
}

async fn read_parameter(state: &AppState, params: &HashMap<String, String>) -> Result<String, BridgeError> {
    let context = required(params, "context")?;
    let key = composite_key(params)?;
    let wait_ms = match params.get("wait_ms") {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| BridgeError::BadRequest(format!("Invalid 'wait_ms' value '{raw}'")))?,
        None => 0,
    };
    let entry = state.registry.lookup(context)?;

    if let Some(value) = entry.reported(&key) {
        metrics::record_query_cache(true);
        return Ok(value);
    }
    metrics::record_query_cache(false);

    entry.send(&Command::Get { key: key.clone() }).await?;

    let wait = Duration::from_millis(wait_ms.min(state.query.max_wait_ms));
    if wait.is_zero() {
        return Ok(String::new());
    }
    Ok(entry.wait_for_report(&key, wait).await.unwrap_or_default())
}

/// PATCH /madigan-parameter?context=ID&type=T&key=K&value=V
///
/// Fire-and-forget: responds once the frame is written.
pub async fn set_parameter(State(state): State<AppState>, Query(params): Params) -> Response {
    respond("parameter_set", write_parameter(&state, &params).await)
}

async fn write_parameter(state: &AppState, params: &HashMap<String, String>) -> Result<String, BridgeError> {
    let context = required(params, "context")?;
    let key = composite_key(params)?;
    let value = present(params, "value")?;
    let entry = state.registry.lookup(context)?;

    entry
        .send(&Command::Set {
            key: key.clone(),
            value: value.to_string(),
        })
        .await?;
    Ok(format!("Set {} {} = {} on {}", key.kind, key.key, value, context))
}

/// GET /madigan-state?id=ID
pub async fn state(State(state): State<AppState>, Query(params): Params) -> Response {
    respond("state", recent_messages(&state, &params))
}

fn recent_messages(state: &AppState, params: &HashMap<String, String>) -> Result<String, BridgeError> {
    let id = required(params, "id")?;
    let entry = state.registry.lookup(id)?;
    Ok(entry.history().into_iter().map(|line| line + "\n").collect())
}

/// GET /madigan-send?id=ID&type=T&key=K&value=V
///
/// Legacy path: the untagged type/key/value triple is sent verbatim.
pub async fn send(State(state): State<AppState>, Query(params): Params) -> Response {
    respond("send", send_raw(&state, &params).await)
}

async fn send_raw(state: &AppState, params: &HashMap<String, String>) -> Result<String, BridgeError> {
    let id = required(params, "id")?;
    let entry = state.registry.lookup(id)?;
    let command = Command::Raw {
        kind: optional(params, "type").to_string(),
        key: optional(params, "key").to_string(),
        value: optional(params, "value").to_string(),
    };
    entry.send(&command).await?;
    Ok(format!("Sent to {}: {}", id, command.encode()))
}
