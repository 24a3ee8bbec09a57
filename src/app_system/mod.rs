//! System orchestration, startup, and shutdown logic.

pub mod order_system;
pub mod seed;
pub mod tracing;

pub use order_system::*;
pub use seed::*;
pub use self::tracing::*;
