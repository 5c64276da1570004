//! # Server Configuration
//!
//! Settings are read once at startup. The listen address comes from `NORMX_LISTEN`
//! (default `0.0.0.0:3000`); normalization limits apply to every request.

use normx_core::memo::NormalizeConfig;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the HTTP listener binds to.
    pub listen: String,
    /// Limits and disabled rules applied to every request. A request may disable more
    /// rules on top of these.
    pub normalize: NormalizeConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            listen: std::env::var("NORMX_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.to_string()),
            normalize: NormalizeConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            normalize: NormalizeConfig::default(),
        }
    }
}
