//! Inventory ledger: product documents and their atomic stock actions.

mod actions;
pub mod entity;
pub mod error;

pub use actions::*;
pub use error::*;
