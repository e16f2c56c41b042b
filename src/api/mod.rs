pub mod client;
pub mod config;
pub mod profiles;
pub mod session;

pub use client::*;
pub use config::*;
pub use profiles::RestProfileService;
pub use session::HostedSessionService;
