//! Order store: order documents, their status lifecycle and reservation arena.

mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use error::*;
