//! Signed-in user state for the portal.
//!
//! [`AuthProvider`] resolves the current profile from the session and
//! profile services and keeps it current while mounted. Every resolution
//! takes a ticket; only the latest ticket may write state, so a slow lookup
//! can never overwrite a newer one (or undo a logout).

use std::cell::Cell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::watch;

use super::events::{AuthEventBus, Delivery, Subscription};
use super::rbac::{is_admin_role, is_teacher_role};
use super::services::{AuthChangeSubscription, ProfileService, SessionService};
use super::storage::{clear_logged_user, read_logged_user, KeyValueStore};
use super::AuthError;
use crate::models::{AppEvent, AuthChange, AuthChangeEvent, UserProfile};

#[derive(Clone, Debug, PartialEq)]
pub struct AuthState {
    pub user_profile: Option<UserProfile>,
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user_profile: None,
            loading: true,
        }
    }
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.user_profile.is_some()
    }

    pub fn is_admin(&self) -> bool {
        is_admin_role(self.user_profile.as_ref())
    }

    pub fn is_teacher(&self) -> bool {
        is_teacher_role(self.user_profile.as_ref())
    }

    pub fn email(&self) -> Option<&str> {
        self.user_profile.as_ref().map(|p| p.email.as_str())
    }

    fn sign_out(&mut self) {
        self.user_profile = None;
        self.loading = false;
    }
}

/// Everything the provider talks to.
#[derive(Clone)]
pub struct AuthServices {
    pub session: Rc<dyn SessionService>,
    pub profiles: Rc<dyn ProfileService>,
    pub store: Rc<dyn KeyValueStore>,
    pub events: AuthEventBus,
}

impl PartialEq for AuthServices {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.session, &other.session)
            && Rc::ptr_eq(&self.profiles, &other.profiles)
            && Rc::ptr_eq(&self.store, &other.store)
    }
}

enum Resolution {
    SignedOut,
    Found(UserProfile),
    /// Session exists but the profile service has no such user.
    Deleted(String),
}

#[derive(Clone)]
pub struct AuthProvider {
    inner: Rc<Inner>,
}

struct Inner {
    services: AuthServices,
    state: watch::Sender<AuthState>,
    latest_ticket: Cell<u64>,
    mount_id: Cell<u64>,
    detached: Cell<bool>,
}

impl AuthProvider {
    pub fn new(services: AuthServices) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Rc::new(Inner {
                services,
                state,
                latest_ticket: Cell::new(0),
                mount_id: Cell::new(0),
                detached: Cell::new(false),
            }),
        }
    }

    pub fn services(&self) -> &AuthServices {
        &self.inner.services
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        self.inner.state.borrow().user_profile.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub fn is_admin(&self) -> bool {
        self.inner.state.borrow().is_admin()
    }

    pub fn is_teacher(&self) -> bool {
        self.inner.state.borrow().is_teacher()
    }

    /// Re-resolve the profile now. Failures are logged and leave the
    /// provider signed out.
    pub async fn refresh_profile(&self) {
        self.load_profile().await;
    }

    /// Sign out remotely, forget the persisted user and clear local state.
    /// Local state is cleared even when the remote sign-out fails.
    pub async fn logout(&self) {
        // supersede any resolution still in flight
        self.issue_ticket();

        if let Err(e) = self.inner.services.session.sign_out().await {
            tracing::error!("Error during logout: {}", AuthError::SignOut(e));
        }
        if let Err(e) = clear_logged_user(self.inner.services.store.as_ref()) {
            tracing::warn!("Failed to clear persisted user: {}", e);
        }

        self.apply(AuthState::sign_out);
        tracing::info!("Logged out");
    }

    /// Subscribe to session and portal events. Nothing happens until the
    /// returned [`Mounted`] is run; dropping it unsubscribes.
    pub fn mount(&self) -> Mounted {
        let id = self.inner.mount_id.get() + 1;
        self.inner.mount_id.set(id);
        self.inner.detached.set(false);

        Mounted {
            provider: self.clone(),
            id,
            auth_changes: self.inner.services.session.on_auth_state_change(),
            app_events: self.inner.services.events.subscribe(),
        }
    }

    fn issue_ticket(&self) -> u64 {
        let ticket = self.inner.latest_ticket.get() + 1;
        self.inner.latest_ticket.set(ticket);
        ticket
    }

    fn apply(&self, update: impl FnOnce(&mut AuthState)) {
        if self.inner.detached.get() {
            tracing::debug!("Auth provider unmounted, dropping state update");
            return;
        }
        self.inner.state.send_modify(update);
    }

    async fn load_profile(&self) {
        let ticket = self.issue_ticket();
        let outcome = self.resolve().await;

        if self.inner.latest_ticket.get() != ticket {
            tracing::debug!(ticket, "Discarding superseded profile resolution");
            return;
        }

        match outcome {
            Ok(Resolution::Found(profile)) => {
                tracing::info!("Loaded profile for {} ({})", profile.email, profile.role.as_str());
                self.apply(|state| {
                    state.user_profile = Some(profile);
                    state.loading = false;
                });
            }
            Ok(Resolution::SignedOut) => self.apply(AuthState::sign_out),
            Ok(Resolution::Deleted(email)) => {
                tracing::warn!("User {} no longer exists, logging out", email);
                self.logout().await;
            }
            Err(e) => {
                tracing::error!("Error loading user profile: {}", e);
                self.apply(AuthState::sign_out);
            }
        }
    }

    async fn resolve(&self) -> Result<Resolution, AuthError> {
        let services = &self.inner.services;

        let Some(session) = services.session.get_session().await.map_err(AuthError::Session)? else {
            return Ok(Resolution::SignedOut);
        };
        let email = session.user.email.ok_or(AuthError::MissingEmail)?;

        match services.profiles.get_user_profile(&email).await.map_err(AuthError::Profile)? {
            Some(profile) => Ok(Resolution::Found(profile)),
            None => Ok(Resolution::Deleted(email)),
        }
    }

    fn clear_profile(&self) {
        self.issue_ticket();
        self.apply(AuthState::sign_out);
    }

    fn refresh_task(&self) -> LocalBoxFuture<'static, ()> {
        let provider = self.clone();
        async move { provider.load_profile().await }.boxed_local()
    }

    fn logout_task(&self) -> LocalBoxFuture<'static, ()> {
        let provider = self.clone();
        async move { provider.logout().await }.boxed_local()
    }

    fn on_auth_change(&self, change: AuthChange) -> Option<LocalBoxFuture<'static, ()>> {
        match change.event {
            AuthChangeEvent::SignedOut => {
                tracing::info!("Session signed out");
                self.clear_profile();
                None
            }
            event if change.session.is_some() => {
                tracing::debug!(?event, "Auth state changed, reloading profile");
                Some(self.refresh_task())
            }
            event => {
                tracing::debug!(?event, "Ignoring auth change without a session");
                None
            }
        }
    }

    fn on_app_event(&self, event: AppEvent) -> Option<LocalBoxFuture<'static, ()>> {
        match event {
            AppEvent::AuthChanged => Some(self.refresh_task()),
            AppEvent::UserDeleted(deleted) => {
                let logged = read_logged_user(self.inner.services.store.as_ref())?;
                if logged.email != deleted.email {
                    return None;
                }
                tracing::info!("Logged-in user {} was deleted, logging out", deleted.email);
                Some(self.logout_task())
            }
        }
    }
}

/// A provider with live subscriptions.
pub struct Mounted {
    provider: AuthProvider,
    id: u64,
    auth_changes: AuthChangeSubscription,
    app_events: Subscription<AppEvent>,
}

impl Mounted {
    /// Resolve the profile, then react to events until both sources close.
    ///
    /// Handlers run concurrently, so a slow lookup does not hold up later
    /// events. Dropping the future unmounts the provider.
    pub async fn run(mut self) {
        let mut pending: FuturesUnordered<LocalBoxFuture<'static, ()>> = FuturesUnordered::new();
        pending.push(self.provider.refresh_task());

        let mut auth_open = true;
        let mut app_open = true;

        loop {
            tokio::select! {
                delivery = self.auth_changes.recv(), if auth_open => match delivery {
                    Some(Delivery::Event(change)) => pending.extend(self.provider.on_auth_change(change)),
                    Some(Delivery::Lagged(missed)) => {
                        tracing::warn!("Missed {} session notifications, reloading profile", missed);
                        pending.push(self.provider.refresh_task());
                    }
                    None => auth_open = false,
                },
                delivery = self.app_events.recv(), if app_open => match delivery {
                    Some(Delivery::Event(event)) => pending.extend(self.provider.on_app_event(event)),
                    Some(Delivery::Lagged(missed)) => {
                        tracing::warn!("Missed {} portal events, reloading profile", missed);
                        pending.push(self.provider.refresh_task());
                    }
                    None => app_open = false,
                },
                Some(()) = pending.next(), if !pending.is_empty() => {}
                else => break,
            }
        }
    }
}

impl Drop for Mounted {
    fn drop(&mut self) {
        let inner = &self.provider.inner;
        if inner.mount_id.get() == self.id {
            inner.detached.set(true);
        }
    }
}
