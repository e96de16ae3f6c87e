//! Request handlers.

pub mod health;
pub mod submissions;
pub mod videos;

pub use health::{health, ready};
