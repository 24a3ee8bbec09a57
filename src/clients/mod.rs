//! Typed clients over the collection actors.

#[macro_use]
mod macros;
pub mod order_client;
pub mod product_client;
pub mod user_client;

pub use order_client::OrderClient;
pub use product_client::ProductClient;
pub use user_client::UserClient;
