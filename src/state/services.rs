//! Collaborators the auth state consumes.
//!
//! The portal runs on the UI thread, so the traits use `?Send` futures and
//! are shared through `Rc`.

use async_trait::async_trait;

use super::events::Subscription;
use crate::api::ApiError;
use crate::models::{AuthChange, Session, UserProfile};

pub type AuthChangeSubscription = Subscription<AuthChange>;

/// Hosted session backend.
#[async_trait(?Send)]
pub trait SessionService {
    /// Current session, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<Session>, ApiError>;

    /// Subscribe to sign-in/sign-out notifications.
    /// Dropping the subscription unsubscribes.
    fn on_auth_state_change(&self) -> AuthChangeSubscription;

    async fn sign_out(&self) -> Result<(), ApiError>;
}

#[async_trait(?Send)]
pub trait ProfileService {
    /// `Ok(None)` means the lookup succeeded and no such user exists.
    async fn get_user_profile(&self, email: &str) -> Result<Option<UserProfile>, ApiError>;
}
