//! Campus Portal - Dioxus frontend
//!
//! School portal for admins, teachers and students. Who is signed in is
//! tracked by the auth provider in `state`; the hosted auth backend and the
//! profile table are reached through `api`.

mod api;
mod components;
mod models;
mod state;

use std::rc::Rc;

use anyhow::Context;
use dioxus::prelude::*;

use api::{app_config, ApiClient, AppConfig, HostedSessionService, RestProfileService};
use components::common::{Button, Card, ErrorMessage, LoadingSpinner, RoleBadge};
use models::UserProfile;
use state::{
    read_logged_user, use_auth, write_logged_user, AuthEventBus, AuthProviderRoot, AuthServices,
    KeyValueStore,
};

fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("campus_portal=info"));
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    if let Err(e) = api::init_config() {
        tracing::error!("Invalid configuration: {}", e);
    }

    dioxus::launch(App);
}

/// Services wired against the hosted backend.
#[derive(Clone)]
struct Backend {
    services: AuthServices,
    session: Rc<HostedSessionService>,
}

impl PartialEq for Backend {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.session, &other.session) && self.services == other.services
    }
}

fn connect(config: &AppConfig) -> anyhow::Result<Backend> {
    let client = ApiClient::new(&config.auth_url, &config.anon_key)
        .context("Failed to create HTTP client")?;
    let session = Rc::new(HostedSessionService::new(client.clone()));

    #[cfg(target_arch = "wasm32")]
    let store: Rc<dyn KeyValueStore> =
        Rc::new(state::LocalStorageStore::new().context("Failed to open local storage")?);

    #[cfg(not(target_arch = "wasm32"))]
    let store: Rc<dyn KeyValueStore> = Rc::new(state::MemoryStore::new());

    tracing::info!("Using auth backend at {}", config.auth_url);

    Ok(Backend {
        services: AuthServices {
            session: session.clone(),
            profiles: Rc::new(RestProfileService::new(client)),
            store,
            events: AuthEventBus::new(),
        },
        session,
    })
}

#[component]
fn App() -> Element {
    let backend = use_hook(|| {
        app_config()
            .map_err(anyhow::Error::from)
            .and_then(connect)
            .map_err(|e| format!("{:#}", e))
    });

    rsx! {
        // Global styles
        style { {include_str!("../assets/styles.css")} }

        match backend {
            Ok(backend) => rsx! { Portal { backend } },
            Err(message) => rsx! {
                div { class: "min-h-screen flex items-center justify-center bg-gray-100",
                    ErrorMessage { message }
                }
            },
        }
    }
}

#[component]
fn Portal(backend: Backend) -> Element {
    use_context_provider(|| backend.session.clone());

    rsx! {
        AuthProviderRoot { services: backend.services.clone(),
            Shell {}
        }
    }
}

#[component]
fn Shell() -> Element {
    let auth = use_auth();

    // Remember who is signed in so a deletion announced elsewhere can be matched.
    let persist = auth.clone();
    use_effect(move || {
        let Some(profile) = persist.user_profile() else {
            return;
        };
        let store = persist.services().store.clone();
        let logged = profile.to_logged_user();
        if read_logged_user(store.as_ref()).as_ref() != Some(&logged) {
            if let Err(e) = write_logged_user(store.as_ref(), &logged) {
                tracing::warn!("Failed to persist logged user: {}", e);
            }
        }
    });

    let state = auth.state();

    if state.loading {
        rsx! {
            div { class: "min-h-screen flex items-center justify-center bg-gray-100",
                LoadingSpinner { label: "Checking your session...".to_string() }
            }
        }
    } else if let Some(profile) = state.user_profile {
        rsx! { Dashboard { profile } }
    } else {
        rsx! { LoginPage {} }
    }
}

#[component]
fn Dashboard(profile: UserProfile) -> Element {
    let auth = use_auth();
    let name = profile.display_name().to_string();

    let refresh = {
        let auth = auth.clone();
        move |_| {
            let auth = auth.clone();
            spawn(async move {
                auth.refresh_profile().await;
            });
        }
    };

    let logout = {
        let auth = auth.clone();
        move |_| {
            let auth = auth.clone();
            spawn(async move {
                auth.logout().await;
            });
        }
    };

    rsx! {
        div { class: "h-screen flex flex-col bg-gray-100",
            header { class: "bg-white border-b px-6 py-3 flex items-center justify-between",
                div { class: "flex items-center gap-3",
                    span { class: "text-2xl", "\u{1F393}" }
                    h1 { class: "text-xl font-bold text-gray-800", "Campus Portal" }
                }

                div { class: "flex items-center gap-4",
                    span { class: "text-gray-600", "Welcome, {name}" }
                    RoleBadge { role: profile.role.clone() }
                    Button { variant: "secondary".to_string(), onclick: refresh, "Refresh" }
                    Button { variant: "danger".to_string(), onclick: logout, "Logout" }
                }
            }

            main { class: "flex-1 p-6",
                if auth.is_admin() {
                    Card { title: "Administration".to_string(),
                        p { class: "text-gray-600", "Manage teachers, students and classes." }
                    }
                } else if auth.is_teacher() {
                    Card { title: "My Classes".to_string(),
                        p { class: "text-gray-600", "Grade assignments and track attendance." }
                    }
                } else {
                    Card { title: "My Courses".to_string(),
                        p { class: "text-gray-600", "See your schedule and grades." }
                    }
                }
            }
        }
    }
}

#[component]
fn LoginPage() -> Element {
    let session = use_context::<Rc<HostedSessionService>>();
    let events = use_auth().services().events.clone();
    let mut email = use_signal(String::new);
    let mut password = use_signal(String::new);
    let mut is_loading = use_signal(|| false);
    let mut error = use_signal(|| None::<String>);

    let mut login = move |_| {
        let user = email();
        let pass = password();

        if user.is_empty() || pass.is_empty() {
            error.set(Some("Please enter email and password".to_string()));
            return;
        }

        is_loading.set(true);
        error.set(None);

        let session = session.clone();
        let events = events.clone();
        spawn(async move {
            match session.sign_in_with_password(&user, &pass).await {
                Ok(_) => {
                    events.publish_auth_changed();
                }
                Err(e) => error.set(Some(format!("Login failed: {}", e))),
            }
            is_loading.set(false);
        });
    };

    rsx! {
        div { class: "min-h-screen flex items-center justify-center bg-gray-100",
            div { class: "bg-white rounded-lg shadow-lg p-8 w-full max-w-md",
                div { class: "text-center mb-8",
                    span { class: "text-5xl", "\u{1F393}" }
                    h1 { class: "text-2xl font-bold mt-4", "Campus Portal" }
                    p { class: "text-gray-500", "Sign in to continue" }
                }

                if let Some(err) = error.read().as_ref() {
                    div { class: "mb-4",
                        ErrorMessage { message: err.clone() }
                    }
                }

                form {
                    onsubmit: move |e| {
                        e.prevent_default();
                        login(e);
                    },

                    div { class: "mb-4",
                        label { class: "block text-sm font-medium text-gray-700 mb-1", "Email" }
                        input {
                            class: "w-full px-4 py-3 border border-gray-300 rounded-lg focus:outline-none focus:ring-2 focus:ring-blue-500",
                            r#type: "email",
                            placeholder: "you@school.edu",
                            value: "{email}",
                            oninput: move |e| email.set(e.value()),
                        }
                    }

                    div { class: "mb-6",
                        label { class: "block text-sm font-medium text-gray-700 mb-1", "Password" }
                        input {
                            class: "w-full px-4 py-3 border border-gray-300 rounded-lg focus:outline-none focus:ring-2 focus:ring-blue-500",
                            r#type: "password",
                            placeholder: "Enter your password",
                            value: "{password}",
                            oninput: move |e| password.set(e.value()),
                        }
                    }

                    button {
                        class: "w-full py-3 bg-blue-600 text-white rounded-lg hover:bg-blue-700 font-medium disabled:opacity-50",
                        r#type: "submit",
                        disabled: *is_loading.read(),
                        if *is_loading.read() { "Signing in..." } else { "Sign In" }
                    }
                }
            }
        }
    }
}
