use dioxus::prelude::*;

use crate::models::UserRole;

/// Centered spinner with a caption underneath.
#[component]
pub fn LoadingSpinner(#[props(default = "Loading...".to_string())] label: String) -> Element {
    rsx! {
        div { class: "flex flex-col items-center gap-3 p-6", role: "status",
            div { class: "animate-spin rounded-full h-10 w-10 border-4 border-blue-100 border-t-blue-600" }
            span { class: "text-sm text-gray-500", "{label}" }
        }
    }
}

#[component]
pub fn ErrorMessage(message: String) -> Element {
    rsx! {
        div { class: "flex items-start gap-3 bg-red-50 border-l-4 border-red-500 text-red-700 px-4 py-3 rounded-lg",
            role: "alert",
            span { class: "font-bold", "!" }
            p { class: "text-sm", "{message}" }
        }
    }
}

#[component]
pub fn Button(
    onclick: EventHandler<MouseEvent>,
    children: Element,
    #[props(default = "primary".to_string())]
    variant: String,
    #[props(default = false)]
    disabled: bool,
) -> Element {
    let palette = match variant.as_str() {
        "secondary" => "bg-white border border-gray-300 text-gray-700 hover:bg-gray-100",
        "danger" => "bg-red-600 text-white hover:bg-red-700",
        _ => "bg-blue-600 text-white hover:bg-blue-700",
    };
    let state = if disabled { "opacity-50 cursor-not-allowed" } else { "" };

    rsx! {
        button {
            class: "px-4 py-2 rounded-lg text-sm font-medium {palette} {state}",
            disabled: disabled,
            onclick: move |e| {
                if !disabled {
                    onclick.call(e);
                }
            },
            {children}
        }
    }
}

/// White panel; `title` renders as a header row above the content.
#[component]
pub fn Card(
    children: Element,
    #[props(default)] title: Option<String>,
    #[props(default = "".to_string())] class: String,
) -> Element {
    rsx! {
        section { class: "bg-white rounded-lg shadow-md border border-gray-200 {class}",
            if let Some(title) = title {
                h2 { class: "px-6 py-3 border-b text-lg font-semibold text-gray-800", "{title}" }
            }
            div { class: "p-6", {children} }
        }
    }
}

#[component]
pub fn RoleBadge(role: UserRole) -> Element {
    let color_class = match role {
        UserRole::Admin => "bg-purple-100 text-purple-800",
        UserRole::Teacher => "bg-green-100 text-green-800",
        UserRole::Student => "bg-blue-100 text-blue-800",
        UserRole::Other(_) => "bg-gray-100 text-gray-800",
    };
    let text = role.label().to_string();

    rsx! {
        span { class: "inline-flex items-center px-2.5 py-0.5 rounded-full text-xs font-medium {color_class}",
            "{text}"
        }
    }
}
