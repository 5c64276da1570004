//! # HTTP Route Handlers
//!
//! This module defines the Axum route handlers for the normalization service.
//!
//! ## Normalization Pipeline
//!
//! `run_normalize` does the work behind `POST /normalize`:
//!
//! 1. **Configure**: Start from the server's limits and add the request's disabled rules.
//! 2. **Register**: Create a fresh memo and register the request's columns. Column ids
//!    are assigned in request order starting at 1.
//! 3. **Build**: Memoize the bound tree bottom-up. Every node is normalized as it is built.
//! 4. **Report**: Extract the normalized tree, render it, and collect memo statistics.
//!
//! ## Error Handling
//!
//! Errors are returned as HTTP status codes with a JSON `{"error": ...}` body:
//! - 400 Bad Request: malformed JSON or an unknown rule name
//! - 501 Not Implemented: the tree uses an operator the memo does not support
//! - 500 Internal Server Error: any other normalization failure

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use normx_core::memo::Memo;
use normx_core::rule::RuleCategory;
use normx_core::{GroupId, OptError, Tree, Type};

use crate::state::AppState;

/// Failure of a request, mapped onto a status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Normalize(#[from] OptError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Normalize(e) if e.is_unimplemented() => StatusCode::NOT_IMPLEMENTED,
            ApiError::Normalize(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(%status, "request failed: {}", self);
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /rules: list rules in the order they are tried.
pub async fn list_rules(State(state): State<Arc<AppState>>) -> Json<RulesResponse> {
    let rules = state
        .rules
        .rules()
        .iter()
        .map(|r| RuleInfo {
            name: r.name.to_string(),
            category: r.category,
            disabled: state.config.normalize.disabled_rules.contains(r.name),
        })
        .collect();

    Json(RulesResponse { rules })
}

#[derive(Serialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleInfo>,
}

#[derive(Serialize)]
pub struct RuleInfo {
    pub name: String,
    pub category: RuleCategory,
    /// Disabled by server configuration.
    pub disabled: bool,
}

/// A column the tree may reference. The nth column gets id `n + 1`.
#[derive(Debug, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// Request body for `POST /normalize`.
#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    pub expr: Tree,
    /// Rules to skip for this request only.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub root: GroupId,
    pub normalized: Tree,
    /// Indented rendering with group ids and types.
    pub display: String,
    pub groups: usize,
    pub expressions: usize,
    pub rules_fired: BTreeMap<String, usize>,
}

/// POST /normalize: build a bound tree into a fresh memo and return its normal form.
pub async fn normalize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NormalizeRequest>, JsonRejection>,
) -> Result<Json<NormalizeResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    run_normalize(&state, req).map(Json)
}

/// Core normalization logic behind the endpoint.
///
/// Each request gets a fresh memo: groups are never shared between requests.
pub fn run_normalize(state: &AppState, req: NormalizeRequest) -> Result<NormalizeResponse, ApiError> {
    let mut config = state.config.normalize.clone();
    for name in req.disabled_rules {
        if state.rules.get(&name).is_none() {
            return Err(ApiError::BadRequest(format!("unknown rule {}", name)));
        }
        config.disabled_rules.insert(name);
    }

    let mut memo = Memo::with_config(Arc::clone(&state.rules), config);
    for col in req.columns {
        memo.metadata_mut().add_column(col.name, col.ty);
    }

    let root = memo.build(&req.expr)?;
    let stats = memo.stats();
    debug!(
        groups = memo.num_groups(),
        rewrites = stats.rewrites,
        "normalized expression to {}",
        root
    );

    Ok(NormalizeResponse {
        root,
        normalized: memo.extract(root)?,
        display: memo.format(root),
        groups: memo.num_groups(),
        expressions: memo.num_exprs(),
        rules_fired: stats.rules_fired.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use serde_json::json;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(ServerConfig::default()))
    }

    fn request(body: serde_json::Value) -> NormalizeRequest {
        serde_json::from_value(body).unwrap()
    }

    fn eq_const_var() -> serde_json::Value {
        json!({
            "columns": [{"name": "x", "type": "int"}],
            "expr": {"op": "eq", "children": [
                {"op": "const", "private": {"datum": {"int": 5}}},
                {"op": "variable", "private": {"column": 1}}
            ]}
        })
    }

    #[tokio::test]
    async fn test_health() {
        let resp = health().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_list_rules_in_order() {
        let Json(resp) = list_rules(State(state())).await;
        assert_eq!(resp.rules.len(), 26);
        assert_eq!(resp.rules[0].name, "CommuteVarInequality");
        assert!(resp.rules.iter().all(|r| r.category == RuleCategory::Normalize));
        assert!(resp.rules.iter().all(|r| !r.disabled));
    }

    #[tokio::test]
    async fn test_normalize_commutes_constant() {
        let Json(resp) = normalize(State(state()), Ok(Json(request(eq_const_var()))))
            .await
            .unwrap();

        assert_eq!(resp.normalized.op, "Eq");
        assert_eq!(resp.normalized.children[0].op, "Variable");
        assert_eq!(resp.normalized.children[1].op, "Const");
        assert_eq!(resp.rules_fired.get("CommuteVar"), Some(&1));
        assert!(resp.display.starts_with("Eq ["), "{}", resp.display);
        assert_eq!(resp.groups, 3);
    }

    #[test]
    fn test_request_disabled_rules() {
        let mut body = eq_const_var();
        body["disabled_rules"] = json!(["CommuteVar", "CommuteConst"]);
        let resp = run_normalize(&state(), request(body)).unwrap();
        assert_eq!(resp.normalized.children[0].op, "Const");
        assert!(resp.rules_fired.is_empty());

        let mut body = eq_const_var();
        body["disabled_rules"] = json!(["NoSuchRule"]);
        let err = run_normalize(&state(), request(body)).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_status_codes() {
        let body = json!({"expr": {"op": "lateral_join"}});
        let err = run_normalize(&state(), request(body)).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_IMPLEMENTED);

        // Column 7 was never registered.
        let body = json!({"expr": {"op": "variable", "private": {"column": 7}}});
        let err = run_normalize(&state(), request(body)).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = ApiError::BadRequest("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
