//! User profile records, including the stored role.

pub mod entity;
pub mod error;

pub use entity::UserAction;
pub use error::*;
