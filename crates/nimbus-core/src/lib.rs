pub mod auth;
pub mod config;
pub mod event_bus;
pub mod events;

pub use auth::*;
pub use config::*;
pub use event_bus::*;
pub use events::*;
