//! Filebox API Library
//!
//! HTTP handlers, error rendering, and application setup for the file store.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod utils;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
