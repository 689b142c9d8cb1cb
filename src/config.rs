//! Environment configuration (`.env` is loaded by `main` before this runs)

use std::net::SocketAddr;
use std::time::Duration;

use crate::settlement::TierPolicy;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
    pub timeout: Duration,
}

/// Supabase Auth token verification for user routes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthConfig {
    pub jwks_url: String,
    pub project_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
    pub supabase: Option<SupabaseConfig>,
    pub admin_api_key: String,
    pub tier_policy: TierPolicy,
    /// `None` disables the join route
    pub user_auth: Option<UserAuthConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = get("HUNTER_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "HUNTER_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let backend = match get("HUNTER_STORE").as_deref() {
            None | Some("supabase") => StoreBackend::Supabase,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid { name: "HUNTER_STORE", value: other.to_string() })
            }
        };

        let tier_policy = match get("HUNTER_TIER_POLICY").as_deref() {
            None | Some("floor") => TierPolicy::Floor,
            Some("exact") => TierPolicy::ExactOnly,
            Some(other) => {
                return Err(ConfigError::Invalid { name: "HUNTER_TIER_POLICY", value: other.to_string() })
            }
        };

        let supabase = match backend {
            StoreBackend::Memory => None,
            StoreBackend::Supabase => {
                let timeout_secs = match get("HUNTER_HTTP_TIMEOUT_SECS") {
                    None => DEFAULT_HTTP_TIMEOUT_SECS,
                    Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                        name: "HUNTER_HTTP_TIMEOUT_SECS",
                        value: raw.clone(),
                    })?,
                };
                Some(SupabaseConfig {
                    url: get("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
                    service_role_key: get("SUPABASE_SERVICE_ROLE_KEY")
                        .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY"))?,
                    timeout: Duration::from_secs(timeout_secs),
                })
            }
        };

        let admin_api_key = get("ADMIN_API_KEY").ok_or(ConfigError::Missing("ADMIN_API_KEY"))?;

        let user_auth = match (get("SUPABASE_JWKS_URL"), get("SUPABASE_PROJECT_ID")) {
            (None, None) => None,
            (Some(jwks_url), Some(project_id)) => Some(UserAuthConfig { jwks_url, project_id }),
            (Some(_), None) => return Err(ConfigError::Missing("SUPABASE_PROJECT_ID")),
            (None, Some(_)) => return Err(ConfigError::Missing("SUPABASE_JWKS_URL")),
        };

        Ok(Self {
            bind_addr,
            backend,
            supabase,
            admin_api_key,
            tier_policy,
            user_auth,
        })
    }
}
