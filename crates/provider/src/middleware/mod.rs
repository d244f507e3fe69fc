//! Middlewares for a [`JsonRpcRouter`](crate::JsonRpcRouter).

mod cache;
mod eager;
mod signing;

pub use cache::CachedProvider;
pub use eager::EagerProvider;
pub use signing::SigningProvider;
