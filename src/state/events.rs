//! Event plumbing between the auth state and the rest of the portal.
//!
//! Components that need to announce "auth changed" or "user deleted" get an
//! [`AuthEventBus`] handed to them instead of firing browser-global events.

use tokio::sync::broadcast;

use crate::models::{AppEvent, LoggedUser, UserRole};

const BUS_CAPACITY: usize = 32;

/// Name of the legacy window event asking listeners to re-check the login.
pub const AUTH_CHANGED_EVENT: &str = "authChanged";
/// Name of the legacy window event carrying `{email, role}` of a deleted user.
pub const USER_DELETED_EVENT: &str = "userDeleted";

/// One item taken off a [`Subscription`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    Event(T),
    /// The subscriber fell behind and this many notifications were dropped.
    Lagged(u64),
}

/// Receiving end of a broadcast channel. Dropping it unsubscribes.
pub struct Subscription<T> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    pub fn new(receiver: broadcast::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Next delivery, or `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Delivery<T>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Delivery::Event(event)),
            Err(broadcast::error::RecvError::Lagged(missed)) => Some(Delivery::Lagged(missed)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    pub fn unsubscribe(self) {}
}

#[derive(Clone)]
pub struct AuthEventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> Subscription<AppEvent> {
        Subscription::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns how many subscribers saw the event.
    pub fn publish(&self, event: AppEvent) -> usize {
        match self.sender.send(event) {
            Ok(count) => count,
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(?event, "no auth listeners for event");
                0
            }
        }
    }

    pub fn publish_auth_changed(&self) -> usize {
        self.publish(AppEvent::AuthChanged)
    }

    pub fn publish_user_deleted(&self, email: impl Into<String>, role: UserRole) -> usize {
        self.publish(AppEvent::UserDeleted(LoggedUser {
            email: email.into(),
            role,
        }))
    }
}

#[cfg(target_arch = "wasm32")]
pub use bridge::{bridge_window_events, WindowEventBridge};

#[cfg(target_arch = "wasm32")]
mod bridge {
    use js_sys::Reflect;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::{JsCast, JsValue};

    use super::{AuthEventBus, AUTH_CHANGED_EVENT, USER_DELETED_EVENT};
    use crate::models::UserRole;

    /// Forwards the legacy window events into an [`AuthEventBus`].
    /// Listeners are removed when this is dropped.
    pub struct WindowEventBridge {
        window: web_sys::Window,
        auth_changed: Closure<dyn FnMut(web_sys::Event)>,
        user_deleted: Closure<dyn FnMut(web_sys::CustomEvent)>,
    }

    pub fn bridge_window_events(bus: &AuthEventBus) -> Option<WindowEventBridge> {
        let window = web_sys::window()?;

        let auth_bus = bus.clone();
        let auth_changed = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            auth_bus.publish_auth_changed();
        }) as Box<dyn FnMut(web_sys::Event)>);

        let deleted_bus = bus.clone();
        let user_deleted = Closure::wrap(Box::new(move |event: web_sys::CustomEvent| {
            let detail = event.detail();
            let field = |name: &str| {
                Reflect::get(&detail, &JsValue::from_str(name))
                    .ok()
                    .and_then(|v| v.as_string())
            };

            match field("email") {
                Some(email) => {
                    let role = field("role").unwrap_or_default();
                    deleted_bus.publish_user_deleted(email, UserRole::from(role.as_str()));
                }
                None => tracing::warn!("{} event without an email", USER_DELETED_EVENT),
            }
        }) as Box<dyn FnMut(web_sys::CustomEvent)>);

        for (name, callback) in [
            (AUTH_CHANGED_EVENT, auth_changed.as_ref()),
            (USER_DELETED_EVENT, user_deleted.as_ref()),
        ] {
            if let Err(e) = window.add_event_listener_with_callback(name, callback.unchecked_ref()) {
                tracing::warn!("Failed to listen for {}: {:?}", name, e);
            }
        }

        Some(WindowEventBridge {
            window,
            auth_changed,
            user_deleted,
        })
    }

    impl Drop for WindowEventBridge {
        fn drop(&mut self) {
            let _ = self.window.remove_event_listener_with_callback(
                AUTH_CHANGED_EVENT,
                self.auth_changed.as_ref().unchecked_ref(),
            );
            let _ = self.window.remove_event_listener_with_callback(
                USER_DELETED_EVENT,
                self.user_deleted.as_ref().unchecked_ref(),
            );
        }
    }
}
