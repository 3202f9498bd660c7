//! Request layer: axum handlers that run the authentication core against
//! the store. Handlers stay thin; crypto decisions live in nook-auth and
//! persistence in nook-db, with this crate sequencing them per route.

pub mod error;
pub mod messages;
pub mod rooms;
pub mod state;
pub mod users;

pub use error::ApiError;
pub use state::{AppState, AppStateInner, health};
