//! # Application State
//!
//! This module defines the shared state that is available to all HTTP request handlers.
//! The state is created once at server startup and shared via `Arc` across all
//! concurrent requests.
//!
//! ## Components
//!
//! - **Rule Set**: The compiled normalization rules. Shared (not rebuilt per request)
//!   because rules are stateless; every request gets its own `Memo` over the same set.
//! - **Server Config**: Listen address and the normalization limits applied to each
//!   request.

use crate::config::ServerConfig;
use normx_core::rule::RuleSet;
use std::sync::Arc;

/// Shared application state, accessible by all request handlers via Axum's State extractor.
pub struct AppState {
    /// All normalization rules, in declared order.
    pub rules: Arc<RuleSet>,
    pub config: ServerConfig,
}

impl AppState {
    /// Create the state with the built-in rule set.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rules: normx_rules::default_rule_set(),
            config,
        }
    }
}
