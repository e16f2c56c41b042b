use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Session lookup failed: {0}")]
    Session(ApiError),

    #[error("Session has no email address")]
    MissingEmail,

    #[error("Profile lookup failed: {0}")]
    Profile(ApiError),

    #[error("Sign-out failed: {0}")]
    SignOut(ApiError),

    #[error("use_auth must be used within an AuthProviderRoot")]
    MissingProvider,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
