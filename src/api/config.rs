//! Portal configuration

use std::sync::OnceLock;

use crate::state::AuthError;

const DEFAULT_AUTH_URL: &str = "http://localhost:54321";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Base URL of the hosted backend (auth and REST live under it).
    pub auth_url: String,
    pub anon_key: String,
}

impl AppConfig {
    /// Build from a variable lookup. `AUTH_ANON_KEY` is required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AuthError> {
        let auth_url = lookup("AUTH_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string());
        let anon_key = lookup("AUTH_ANON_KEY")
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AuthError::Config("AUTH_ANON_KEY must be set".to_string()))?;

        Ok(Self { auth_url, anon_key })
    }

    /// Environment (after `.env`) on native builds.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Result<Self, AuthError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same origin as the page; the key is baked in at build time.
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Result<Self, AuthError> {
        let origin = web_sys::window().and_then(|w| w.location().origin().ok());
        Self::from_lookup(|name| match name {
            "AUTH_URL" => option_env!("AUTH_URL").map(str::to_string).or_else(|| origin.clone()),
            "AUTH_ANON_KEY" => option_env!("AUTH_ANON_KEY").map(str::to_string),
            _ => None,
        })
    }
}

static CONFIG: OnceLock<Result<AppConfig, AuthError>> = OnceLock::new();

pub fn init_config() -> &'static Result<AppConfig, AuthError> {
    CONFIG.get_or_init(AppConfig::load)
}

pub fn app_config() -> Result<&'static AppConfig, AuthError> {
    init_config().as_ref().map_err(Clone::clone)
}
