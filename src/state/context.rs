use dioxus::prelude::*;

use super::{AuthError, AuthProvider, AuthServices, AuthState};
use crate::models::UserProfile;

/// Auth state and actions as seen by components under [`AuthProviderRoot`].
#[derive(Clone)]
pub struct AuthContext {
    provider: AuthProvider,
    state: Signal<AuthState>,
}

impl AuthContext {
    pub fn state(&self) -> AuthState {
        self.state.read().clone()
    }

    pub fn user_profile(&self) -> Option<UserProfile> {
        self.state.read().user_profile.clone()
    }

    pub fn loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn is_admin(&self) -> bool {
        self.state.read().is_admin()
    }

    pub fn is_teacher(&self) -> bool {
        self.state.read().is_teacher()
    }

    pub async fn refresh_profile(&self) {
        self.provider.refresh_profile().await;
    }

    pub async fn logout(&self) {
        self.provider.logout().await;
    }

    pub fn services(&self) -> &AuthServices {
        self.provider.services()
    }
}

/// Owns the auth state for its subtree. Subscriptions live as long as the
/// component is mounted.
#[component]
pub fn AuthProviderRoot(services: AuthServices, children: Element) -> Element {
    let provider = use_hook(|| AuthProvider::new(services.clone()));
    let state = use_signal(|| provider.state());

    use_context_provider(|| AuthContext {
        provider: provider.clone(),
        state,
    });

    use_hook(|| {
        spawn(provider.mount().run());

        let mut changes = provider.subscribe();
        let mut mirror = state;
        spawn(async move {
            while changes.changed().await.is_ok() {
                let next = changes.borrow_and_update().clone();
                mirror.set(next);
            }
        });
    });

    #[cfg(target_arch = "wasm32")]
    use_hook(|| std::rc::Rc::new(super::events::bridge_window_events(&services.events)));

    rsx! {
        {children}
    }
}

pub fn try_use_auth() -> Result<AuthContext, AuthError> {
    try_consume_context::<AuthContext>().ok_or(AuthError::MissingProvider)
}

/// Panics when called outside an [`AuthProviderRoot`].
pub fn use_auth() -> AuthContext {
    match try_use_auth() {
        Ok(context) => context,
        Err(e) => panic!("{}", e),
    }
}
