pub mod auth;
pub mod context;
pub mod error;
pub mod events;
pub mod rbac;
pub mod services;
pub mod storage;


pub use auth::*;
pub use context::*;
pub use error::*;
pub use events::*;
pub use services::*;
pub use storage::*;
